//! Metric definitions.

// External crates
use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder, register_histogram,
    register_int_counter, register_int_counter_vec,
};
use std::time::Instant;

/// Helper to observe histogram duration
pub fn observe_duration(hist: &Histogram, start: Instant) {
    hist.observe(start.elapsed().as_secs_f64());
}

lazy_static! {
    // ======== Retrieval Metrics ========

    /// Poll cycles started by any retrieval operation
    pub static ref POLL_CYCLES_TOTAL: IntCounter = register_int_counter!(
        "cwtail_poll_cycles_total",
        "Number of poll cycles started"
    ).unwrap();

    /// Records delivered to consumers
    pub static ref RECORDS_EMITTED_TOTAL: IntCounter = register_int_counter!(
        "cwtail_records_emitted_total",
        "Records emitted after watermark filtering"
    ).unwrap();

    /// Records dropped because their stream watermark already covered them
    pub static ref RECORDS_SUPPRESSED_TOTAL: IntCounter = register_int_counter!(
        "cwtail_records_suppressed_total",
        "Records dropped as already emitted"
    ).unwrap();

    /// Log group pages delivered by listings
    pub static ref GROUP_PAGES_TOTAL: IntCounter = register_int_counter!(
        "cwtail_group_pages_total",
        "Log group listing pages emitted"
    ).unwrap();

    // ======== Backend Metrics ========

    /// Backend calls by operation
    pub static ref BACKEND_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cwtail_backend_calls_total",
        "Backend calls issued, by operation",
        &["operation"]
    ).unwrap();

    /// Failed backend calls by operation
    pub static ref BACKEND_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cwtail_backend_failures_total",
        "Backend calls that returned an error, by operation",
        &["operation"]
    ).unwrap();

    /// Backend round-trip latency in seconds
    pub static ref BACKEND_CALL_DURATION_SECONDS: Histogram = register_histogram!(
        "cwtail_backend_call_duration_seconds",
        "Histogram of backend call durations in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();
}

/// Encode every registered metric in the Prometheus text format.
pub fn render() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
