//! Per-cycle candidate stream selection.

// Local crates
use crate::backend::client::{BackendError, BackendOperation, LogStorageClient};
use crate::retriever::metered;

// External crates
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::instrument;

/// Picks the streams a poll cycle reads, most recently active first.
///
/// The candidate set is rebuilt from scratch every cycle; nothing about
/// streams is remembered between cycles.
#[derive(Debug, Clone)]
pub struct StreamSelector {
    client: Arc<dyn LogStorageClient>,
    fan_out: usize,
}

impl StreamSelector {
    /// Selector considering at most `fan_out` streams.
    pub fn new(client: Arc<dyn LogStorageClient>, fan_out: usize) -> Self {
        Self { client, fan_out }
    }

    /// Up to `fan_out` stream names in descending recency. Streams that never
    /// received an event are dropped.
    #[instrument(
        name = "cwtail_retriever::select_streams",
        target = "retriever::selector",
        skip(self),
        fields(fan_out = self.fan_out),
        level = "debug"
    )]
    pub async fn select(&self, log_group: &str) -> Result<VecDeque<String>, BackendError> {
        let streams = metered(
            BackendOperation::ListStreams,
            self.client.list_streams(log_group, self.fan_out),
        )
        .await?;

        let listed = streams.len();
        let candidates: VecDeque<String> = streams
            .into_iter()
            .take(self.fan_out)
            .filter(|stream| stream.last_event_timestamp.is_some())
            .map(|stream| stream.name)
            .collect();

        tracing::debug!(
            listed,
            candidates = candidates.len(),
            "Selected candidate log streams"
        );
        Ok(candidates)
    }
}
