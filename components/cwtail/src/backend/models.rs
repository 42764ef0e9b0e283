//! Data returned by log-storage backends.

// External crates
use serde::{Deserialize, Serialize};

/// A named collection of log streams, as returned by the backend.
///
/// Everything beyond `name` is opaque metadata that the core passes through
/// unchanged to whoever asked for the listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogGroup {
    /// Unique name within the account and region.
    pub name: String,
    /// Backend resource identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<i64>,
    /// Retention policy; `None` keeps events forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_in_days: Option<i32>,
    /// Bytes stored, as reported by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_bytes: Option<i64>,
}

impl LogGroup {
    /// Log group carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// One page of a log group listing. `next_token` is the backend's
/// continuation token, absent on the last page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogGroupPage {
    /// Groups on this page.
    pub log_groups: Vec<LogGroup>,
    /// Token for the following page.
    pub next_token: Option<String>,
}

/// A single append-only stream inside a log group.
///
/// `last_event_timestamp` is `None` for streams that never received an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStream {
    /// Stream name, unique within its group.
    pub name: String,
    /// Timestamp of the newest event, if any.
    pub last_event_timestamp: Option<i64>,
}

/// An event exactly as the backend returns it. Events carry no stream identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Event time.
    pub timestamp: i64,
    /// Payload, passed through verbatim.
    pub message: String,
}

impl RawEvent {
    /// Event with the given time and payload.
    pub fn new(timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    /// Stamp the event with the stream it was fetched from.
    pub fn into_record(self, stream_name: &str) -> LogRecord {
        LogRecord {
            timestamp: self.timestamp,
            message: self.message,
            stream_name: stream_name.to_owned(),
        }
    }
}

/// The unit the retrieval engine emits: a backend event annotated with its
/// originating stream. `timestamp` is in backend clock units (milliseconds
/// since the epoch for CloudWatch Logs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Event time.
    pub timestamp: i64,
    /// Payload, passed through verbatim.
    pub message: String,
    /// Stream the event was read from.
    pub stream_name: String,
}
