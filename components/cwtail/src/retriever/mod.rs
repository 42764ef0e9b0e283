//! Incremental, deduplicated retrieval of log records across every stream of
//! a log group, plus paginated log group listing.

pub mod engine;
pub mod events;
pub mod fetcher;
pub mod groups;
pub mod options;
pub mod selector;
pub mod watermark;

// Local crates
use crate::backend::client::{BackendError, BackendOperation};
use crate::metrics::metrics::{
    BACKEND_CALL_DURATION_SECONDS, BACKEND_CALLS_TOTAL, BACKEND_FAILURES_TOTAL, observe_duration,
};

// External crates
use std::time::Instant;

/// Await one backend call, recording count, latency and failure.
pub(crate) async fn metered<T, F>(operation: BackendOperation, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    let start = Instant::now();
    BACKEND_CALLS_TOTAL
        .with_label_values(&[operation.as_str()])
        .inc();

    let result = call.await;
    observe_duration(&BACKEND_CALL_DURATION_SECONDS, start);

    if let Err(e) = &result {
        BACKEND_FAILURES_TOTAL
            .with_label_values(&[operation.as_str()])
            .inc();
        tracing::warn!(operation = %operation, error = %e, "Backend call failed");
    }

    result
}
