//! Plain-text rendering of records and log groups.

// Local crates
use crate::backend::models::{LogGroup, LogRecord};

// External crates
use anyhow::Result;
use chrono::{DateTime, SecondsFormat};
use std::io::Write;

const SEPARATOR_WIDTH: usize = 78;

/// How records are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFormat {
    /// Print a banner with the stream name before each run of records.
    pub show_streams: bool,
    /// Prefix each record with its RFC 3339 timestamp.
    pub show_time: bool,
    /// Terminate each record with a newline.
    pub append_eol: bool,
}

impl RecordFormat {
    /// Banner announcing a new stream, when enabled.
    pub fn write_stream_boundary(&self, out: &mut impl Write, log_stream: &str) -> Result<()> {
        if !self.show_streams {
            return Ok(());
        }
        let separator = "-".repeat(SEPARATOR_WIDTH);
        writeln!(out, "{separator}")?;
        writeln!(out, "{log_stream}")?;
        writeln!(out, "{separator}")?;
        Ok(())
    }

    /// One record, with the optional time prefix and newline.
    pub fn write_record(&self, out: &mut impl Write, record: &LogRecord) -> Result<()> {
        if self.show_time {
            write!(out, "[{}] ", format_timestamp(record.timestamp))?;
        }
        out.write_all(record.message.as_bytes())?;
        if self.append_eol {
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Millisecond epoch timestamp as RFC 3339, or the raw number when out of range.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// One line per group: the name, or the whole group as JSON when `long`.
pub fn write_group(out: &mut impl Write, group: &LogGroup, long: bool) -> Result<()> {
    if long {
        serde_json::to_writer(&mut *out, group)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{}", group.name)?;
    }
    Ok(())
}
