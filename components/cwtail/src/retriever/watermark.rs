//! Per-stream dedup watermarks.
//!
//! A retrieval session keeps, for every stream it has emitted from, the highest
//! timestamp already delivered. A cycle's records are filtered against the
//! table as it stood when the cycle started; the highest timestamps seen in the
//! cycle are kept in a separate scratch map and only folded into the table once
//! the whole cycle has been filtered. Records sharing a timestamp inside one
//! cycle therefore never suppress each other, while a later cycle drops
//! anything at or below the committed mark.

// Local crates
use crate::backend::models::LogRecord;

// External crates
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Result of filtering one cycle's records, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleOutcome {
    /// Records to emit, in arrival order.
    pub records: Vec<LogRecord>,
    /// How many records were dropped as already seen.
    pub suppressed: usize,
    new_timestamps: HashMap<String, i64>,
}

impl CycleOutcome {
    /// Highest timestamp emitted this cycle for `stream`, if any.
    pub fn new_timestamp(&self, stream: &str) -> Option<i64> {
        self.new_timestamps.get(stream).copied()
    }
}

/// Mapping from stream name to the highest timestamp already emitted.
///
/// Values only ever move forward.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatermarkTable {
    marks: HashMap<String, i64>,
}

impl WatermarkTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed watermark for `stream`.
    pub fn get(&self, stream: &str) -> Option<i64> {
        self.marks.get(stream).copied()
    }

    /// Number of streams with a committed watermark.
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// Whether nothing has been committed yet.
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Split `records` into those to emit and those already delivered,
    /// judged only against the committed table.
    pub fn filter(&self, records: Vec<LogRecord>) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();

        for record in records {
            if self
                .get(&record.stream_name)
                .is_some_and(|seen| record.timestamp <= seen)
            {
                outcome.suppressed += 1;
                continue;
            }

            match outcome.new_timestamps.entry(record.stream_name.clone()) {
                Entry::Occupied(mut entry) => {
                    if record.timestamp > *entry.get() {
                        entry.insert(record.timestamp);
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(record.timestamp);
                }
            }
            outcome.records.push(record);
        }

        outcome
    }

    /// Fold a filtered cycle's highest timestamps into the table.
    pub fn commit(&mut self, outcome: &CycleOutcome) {
        for (stream, &timestamp) in &outcome.new_timestamps {
            self.marks
                .entry(stream.clone())
                .and_modify(|mark| *mark = (*mark).max(timestamp))
                .or_insert(timestamp);
        }
    }

    /// Filter then commit in one step.
    pub fn apply(&mut self, records: Vec<LogRecord>) -> CycleOutcome {
        let outcome = self.filter(records);
        self.commit(&outcome);
        outcome
    }
}
