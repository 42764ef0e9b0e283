//! Operation parameters and their validation.

// External crates
use std::time::Duration;

/// Default soft cap on records read per poll cycle.
pub const DEFAULT_NUM_RECORDS: usize = 30;
/// Default delay between follow-mode poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
/// Default number of most-recent streams considered per poll cycle.
pub const DEFAULT_STREAM_FAN_OUT: usize = 10;

/// Rejected operation parameters, reported before any retrieval begins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Empty or blank log group name.
    #[error("log group name required")]
    MissingLogGroup,
    #[error("number of records must be a positive integer")]
    /// `num_records` of zero.
    NonPositiveRecordCount,
    #[error("a poll interval is required when following a log group")]
    /// Follow mode without a poll interval.
    MissingPollInterval,
    #[error("poll interval must be a positive number of milliseconds")]
    /// Zero poll interval.
    NonPositivePollInterval,
    #[error("stream fan-out must be a positive integer")]
    /// Zero stream fan-out.
    NonPositiveFanOut,
    #[error("maximum page count must be a positive integer")]
    /// Page bound of zero.
    NonPositivePageCount,
}

/// Parameters of one retrieval operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalOptions {
    /// Soft per-cycle cap, applied at stream granularity.
    pub num_records: usize,
    /// Keep polling until cancelled instead of stopping after one cycle.
    pub follow: bool,
    /// Delay between cycles; required when `follow` is set.
    pub poll_interval: Option<Duration>,
    /// How many of the most recently written streams a cycle considers.
    pub stream_fan_out: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            num_records: DEFAULT_NUM_RECORDS,
            follow: false,
            poll_interval: Some(DEFAULT_POLL_INTERVAL),
            stream_fan_out: DEFAULT_STREAM_FAN_OUT,
        }
    }
}

impl RetrievalOptions {
    /// Set the per-cycle record cap.
    pub fn with_num_records(mut self, num_records: usize) -> Self {
        self.num_records = num_records;
        self
    }

    /// Keep polling after the first cycle.
    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Set the delay between follow-mode cycles.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    /// Set how many streams a cycle considers.
    pub fn with_stream_fan_out(mut self, stream_fan_out: usize) -> Self {
        self.stream_fan_out = stream_fan_out;
        self
    }

    /// Check the options against the log group they will be used with.
    pub fn validate(&self, log_group: &str) -> Result<(), ConfigurationError> {
        if log_group.trim().is_empty() {
            return Err(ConfigurationError::MissingLogGroup);
        }
        self.validate_settings()
    }

    /// Check everything that does not depend on the log group.
    pub fn validate_settings(&self) -> Result<(), ConfigurationError> {
        if self.num_records == 0 {
            return Err(ConfigurationError::NonPositiveRecordCount);
        }
        if self.stream_fan_out == 0 {
            return Err(ConfigurationError::NonPositiveFanOut);
        }
        match self.poll_interval {
            Some(interval) if interval.is_zero() => {
                Err(ConfigurationError::NonPositivePollInterval)
            }
            None if self.follow => Err(ConfigurationError::MissingPollInterval),
            _ => Ok(()),
        }
    }
}

/// Parameters of a log group listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupListingOptions {
    /// Stop after this many pages; `None` follows continuation tokens to the end.
    pub max_pages: Option<usize>,
}

impl GroupListingOptions {
    /// Reject a page bound of zero.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self.max_pages {
            Some(0) => Err(ConfigurationError::NonPositivePageCount),
            _ => Ok(()),
        }
    }
}
