//! AWS CloudWatch Logs backend.
//!
//! Thin wrapper mapping the three calls the retrieval core needs onto
//! `DescribeLogGroups`, `DescribeLogStreams` and `GetLogEvents`. Credentials,
//! signing and SDK-level retries are all left to `aws-config`.

// Local crates
use crate::backend::client::{BackendError, BackendOperation, LogStorageClient};
use crate::backend::models::{LogGroup, LogGroupPage, LogStream, RawEvent};

// External crates
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudwatchlogs as cloudwatchlogs;
use cloudwatchlogs::config::Region;
use cloudwatchlogs::error::DisplayErrorContext;
use cloudwatchlogs::types::{OrderBy, OutputLogEvent};
use tracing::instrument;

/// `DescribeLogStreams` rejects limits above this value.
const MAX_DESCRIBE_STREAMS_LIMIT: usize = 50;

/// CloudWatch Logs implementation of [`LogStorageClient`].
#[derive(Debug, Clone)]
pub struct CloudWatchLogsClient {
    client: cloudwatchlogs::Client,
}

impl CloudWatchLogsClient {
    /// Build a client from the standard AWS configuration chain, optionally
    /// pinned to a named profile and/or region.
    #[instrument(
        name = "cwtail_backend::cloudwatch::connect",
        target = "backend::cloudwatch",
        level = "debug"
    )]
    pub async fn connect(profile: Option<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }

        let aws_config = loader.load().await;
        tracing::debug!(
            region = ?aws_config.region(),
            "Loaded AWS configuration for CloudWatch Logs"
        );

        Self::from_sdk_client(cloudwatchlogs::Client::new(&aws_config))
    }

    /// Wrap an already configured SDK client.
    pub fn from_sdk_client(client: cloudwatchlogs::Client) -> Self {
        Self { client }
    }
}

/// The typed SDK error becomes the cause; its full context chain is logged.
fn sdk_error<E>(operation: BackendOperation, err: E) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
{
    tracing::debug!(
        operation = %operation,
        error = %DisplayErrorContext(&err),
        "CloudWatch Logs request failed"
    );
    BackendError::new(operation, err)
}

/// Events without a timestamp cannot be ordered against the stream's
/// watermark and are dropped.
fn into_raw_events(log_stream: &str, events: Vec<OutputLogEvent>) -> Vec<RawEvent> {
    events
        .into_iter()
        .filter_map(|event| match event.timestamp {
            Some(timestamp) => Some(RawEvent {
                timestamp,
                message: event.message.unwrap_or_default(),
            }),
            None => {
                tracing::warn!(
                    log_stream = %log_stream,
                    "Skipping CloudWatch Logs event without a timestamp"
                );
                None
            }
        })
        .collect()
}

#[async_trait]
impl LogStorageClient for CloudWatchLogsClient {
    async fn list_log_groups(
        &self,
        next_token: Option<String>,
    ) -> Result<LogGroupPage, BackendError> {
        let response = self
            .client
            .describe_log_groups()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error(BackendOperation::ListLogGroups, e))?;

        let log_groups = response
            .log_groups
            .unwrap_or_default()
            .into_iter()
            .filter_map(|group| {
                Some(LogGroup {
                    name: group.log_group_name?,
                    arn: group.arn,
                    creation_time: group.creation_time,
                    retention_in_days: group.retention_in_days,
                    stored_bytes: group.stored_bytes,
                })
            })
            .collect();

        Ok(LogGroupPage {
            log_groups,
            next_token: response.next_token,
        })
    }

    async fn list_streams(
        &self,
        log_group: &str,
        limit: usize,
    ) -> Result<Vec<LogStream>, BackendError> {
        let limit = limit.clamp(1, MAX_DESCRIBE_STREAMS_LIMIT) as i32;

        let response = self
            .client
            .describe_log_streams()
            .log_group_name(log_group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .limit(limit)
            .send()
            .await
            .map_err(|e| sdk_error(BackendOperation::ListStreams, e))?;

        let streams = response
            .log_streams
            .unwrap_or_default()
            .into_iter()
            .filter_map(|stream| {
                Some(LogStream {
                    name: stream.log_stream_name?,
                    last_event_timestamp: stream.last_event_timestamp,
                })
            })
            .collect();

        Ok(streams)
    }

    async fn fetch_events(
        &self,
        log_group: &str,
        log_stream: &str,
    ) -> Result<Vec<RawEvent>, BackendError> {
        let response = self
            .client
            .get_log_events()
            .log_group_name(log_group)
            .log_stream_name(log_stream)
            .send()
            .await
            .map_err(|e| sdk_error(BackendOperation::FetchEvents, e))?;

        Ok(into_raw_events(log_stream, response.events.unwrap_or_default()))
    }
}
