//! Process-local Prometheus metrics.

pub mod metrics;
