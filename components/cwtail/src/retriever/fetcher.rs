//! Per-stream event reads.

// Local crates
use crate::backend::client::{BackendError, BackendOperation, LogStorageClient};
use crate::backend::models::LogRecord;
use crate::retriever::metered;

// External crates
use std::sync::Arc;
use tracing::instrument;

/// Reads the current page of events for one stream and stamps each event
/// with the stream it came from.
///
/// One backend call per stream per cycle. A burst larger than a backend page
/// drains over later follow cycles.
#[derive(Debug, Clone)]
pub struct EventFetcher {
    client: Arc<dyn LogStorageClient>,
}

impl EventFetcher {
    /// Fetcher reading through `client`.
    pub fn new(client: Arc<dyn LogStorageClient>) -> Self {
        Self { client }
    }

    /// Current page of `log_stream`, oldest first.
    #[instrument(
        name = "cwtail_retriever::fetch_events",
        target = "retriever::fetcher",
        skip(self),
        level = "debug"
    )]
    pub async fn fetch(
        &self,
        log_group: &str,
        log_stream: &str,
    ) -> Result<Vec<LogRecord>, BackendError> {
        let events = metered(
            BackendOperation::FetchEvents,
            self.client.fetch_events(log_group, log_stream),
        )
        .await?;

        tracing::trace!(events = events.len(), "Fetched log stream events");
        Ok(events
            .into_iter()
            .map(|event| event.into_record(log_stream))
            .collect())
    }
}
