//! The Log-Storage Client seam.
//!
//! Everything the retrieval core knows about the remote log service goes
//! through [`LogStorageClient`]. Implementations own authentication, transport
//! and retry policy; the core only sees the three calls below and treats every
//! failure as fatal to the operation that issued it.

// Local crates
use crate::backend::models::{LogGroupPage, LogStream, RawEvent};

// External crates
use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;

/// Boxed cause carried by [`BackendError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The backend call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    /// [`LogStorageClient::list_log_groups`]
    ListLogGroups,
    /// [`LogStorageClient::list_streams`]
    ListStreams,
    /// [`LogStorageClient::fetch_events`]
    FetchEvents,
}

impl BackendOperation {
    /// Stable label used for logging and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BackendOperation::ListLogGroups => "list_log_groups",
            BackendOperation::ListStreams => "list_streams",
            BackendOperation::FetchEvents => "fetch_events",
        }
    }
}

impl fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any failure from the storage client: network, auth, throttling, malformed
/// response. The subtype is never interpreted by the core.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {source}")]
pub struct BackendError {
    operation: BackendOperation,
    #[source]
    source: BoxError,
}

impl BackendError {
    /// Wrap `source` as a failure of `operation`.
    pub fn new(operation: BackendOperation, source: impl Into<BoxError>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }

    /// Which backend call produced the error.
    pub fn operation(&self) -> BackendOperation {
        self.operation
    }
}

/// Remote, paginated, multi-stream log storage.
#[async_trait]
pub trait LogStorageClient: Send + Sync + fmt::Debug {
    /// One page of log groups, starting at `next_token` (or the beginning).
    async fn list_log_groups(
        &self,
        next_token: Option<String>,
    ) -> Result<LogGroupPage, BackendError>;

    /// Up to `limit` streams of `log_group`, most recently written first.
    async fn list_streams(
        &self,
        log_group: &str,
        limit: usize,
    ) -> Result<Vec<LogStream>, BackendError>;

    /// The currently available page of events for one stream.
    async fn fetch_events(
        &self,
        log_group: &str,
        log_stream: &str,
    ) -> Result<Vec<RawEvent>, BackendError>;
}
