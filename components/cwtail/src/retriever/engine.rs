//! Retrieval engine.
//!
//! One retrieval operation is one task owning one [`WatermarkTable`]. Each
//! poll cycle:
//!
//! 1. asks the [`StreamSelector`] for candidate streams, newest first,
//! 2. fetches streams one at a time until the candidates run out or the
//!    running record count reaches `num_records` (a stream already fetched is
//!    always kept whole, so the cap can be overshot),
//! 3. filters the accumulated records through the watermark table and
//!    commits the new marks,
//! 4. emits a `StreamBoundary` whenever the stream changes, then each record.
//!
//! Without `follow` the operation ends after one cycle. With `follow` it
//! sleeps `poll_interval` and repeats, unless the group had no stream with
//! events, in which case there is nothing to watch and it ends.
//!
//! Any backend error aborts the operation before the cycle's watermarks are
//! committed. Cancellation is observed at both suspension points (backend
//! calls and the follow sleep).

// Local crates
use crate::backend::client::{BackendError, LogStorageClient};
use crate::backend::models::LogRecord;
use crate::metrics::metrics::{POLL_CYCLES_TOTAL, RECORDS_EMITTED_TOTAL, RECORDS_SUPPRESSED_TOTAL};
use crate::retriever::events::{Emitter, OperationHandle, RetrievalEvent, RetrievalHandle};
use crate::retriever::fetcher::EventFetcher;
use crate::retriever::options::{ConfigurationError, DEFAULT_POLL_INTERVAL, RetrievalOptions};
use crate::retriever::selector::StreamSelector;
use crate::retriever::watermark::WatermarkTable;

// External crates
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, instrument};

/// Entry point for retrieval and listing operations against one backend.
///
/// Operations are spawned onto the current Tokio runtime.
#[derive(Debug, Clone)]
pub struct LogRetriever {
    pub(crate) client: Arc<dyn LogStorageClient>,
}

impl LogRetriever {
    /// Retriever issuing every backend call through `client`.
    pub fn new(client: Arc<dyn LogStorageClient>) -> Self {
        Self { client }
    }

    /// Start reading `log_group`. Options are validated before anything runs.
    pub fn start_retrieval(
        &self,
        log_group: impl Into<String>,
        options: RetrievalOptions,
    ) -> Result<RetrievalHandle, ConfigurationError> {
        self.start_retrieval_with_cancel(log_group, options, &CancellationToken::new())
    }

    /// Like [`start_retrieval`](Self::start_retrieval), but cancelled along
    /// with `parent`.
    pub fn start_retrieval_with_cancel(
        &self,
        log_group: impl Into<String>,
        options: RetrievalOptions,
        parent: &CancellationToken,
    ) -> Result<RetrievalHandle, ConfigurationError> {
        let log_group = log_group.into();
        options.validate(&log_group)?;

        let span = tracing::info_span!(
            target: "retriever::engine",
            "cwtail_retriever::session",
            log_group = %log_group,
            follow = options.follow,
        );
        let session = RetrievalSession::new(Arc::clone(&self.client), log_group, options);

        Ok(OperationHandle::spawn(
            parent.child_token(),
            move |emitter, cancel| session.run(emitter, cancel).instrument(span),
        ))
    }
}

/// How a cycle ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleFlow {
    /// Sleep and poll again (follow mode only).
    Continue,
    /// End the operation: nothing to watch, cancelled, or consumer gone.
    Stop,
}

#[derive(Debug)]
struct RetrievalSession {
    log_group: String,
    options: RetrievalOptions,
    selector: StreamSelector,
    fetcher: EventFetcher,
    watermarks: WatermarkTable,
    cycle: u64,
}

impl RetrievalSession {
    fn new(client: Arc<dyn LogStorageClient>, log_group: String, options: RetrievalOptions) -> Self {
        Self {
            selector: StreamSelector::new(Arc::clone(&client), options.stream_fan_out),
            fetcher: EventFetcher::new(client),
            log_group,
            options,
            watermarks: WatermarkTable::new(),
            cycle: 0,
        }
    }

    /// Drive the operation to its end and deliver the terminal notification(s).
    async fn run(mut self, emitter: Emitter<RetrievalEvent>, cancel: CancellationToken) {
        if let Err(e) = self.poll(&emitter, &cancel).await {
            tracing::error!(error = %e, cycle = self.cycle, "Log retrieval aborted");
            emitter.emit(RetrievalEvent::Error(e));
        }

        tracing::debug!(cycles = self.cycle, "Log retrieval finished");
        emitter.emit(RetrievalEvent::Done);
    }

    async fn poll(
        &mut self,
        emitter: &Emitter<RetrievalEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), BackendError> {
        loop {
            if self.run_cycle(emitter, cancel).await? == CycleFlow::Stop || !self.options.follow {
                return Ok(());
            }

            let interval = self.options.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
            tracing::trace!(interval_ms = interval.as_millis() as u64, "Sleeping until next poll");

            if cancel
                .run_until_cancelled(tokio::time::sleep(interval))
                .await
                .is_none()
            {
                tracing::debug!("Retrieval cancelled while waiting for next poll");
                return Ok(());
            }
        }
    }

    #[instrument(
        name = "cwtail_retriever::poll_cycle",
        target = "retriever::engine",
        skip_all,
        fields(cycle = self.cycle + 1),
        level = "debug"
    )]
    async fn run_cycle(
        &mut self,
        emitter: &Emitter<RetrievalEvent>,
        cancel: &CancellationToken,
    ) -> Result<CycleFlow, BackendError> {
        self.cycle += 1;
        POLL_CYCLES_TOTAL.inc();

        let Some(selected) = cancel
            .run_until_cancelled(self.selector.select(&self.log_group))
            .await
        else {
            tracing::debug!("Retrieval cancelled during stream selection");
            return Ok(CycleFlow::Stop);
        };
        let mut candidates = selected?;

        if candidates.is_empty() {
            tracing::info!("Log group has no streams with events, nothing to watch");
            return Ok(CycleFlow::Stop);
        }

        let mut accumulated: Vec<LogRecord> = Vec::new();
        while accumulated.len() < self.options.num_records {
            let Some(log_stream) = candidates.pop_front() else {
                break;
            };

            let Some(fetched) = cancel
                .run_until_cancelled(self.fetcher.fetch(&self.log_group, &log_stream))
                .await
            else {
                tracing::debug!(log_stream = %log_stream, "Retrieval cancelled during fetch");
                return Ok(CycleFlow::Stop);
            };
            accumulated.extend(fetched?);
        }

        let read = accumulated.len();
        let outcome = self.watermarks.apply(accumulated);
        RECORDS_SUPPRESSED_TOTAL.inc_by(outcome.suppressed as u64);

        tracing::debug!(
            read,
            emitted = outcome.records.len(),
            suppressed = outcome.suppressed,
            unread_streams = candidates.len(),
            "Poll cycle complete"
        );

        if !emit_records(emitter, outcome.records) {
            tracing::debug!("Consumer dropped the retrieval handle, stopping");
            return Ok(CycleFlow::Stop);
        }

        Ok(CycleFlow::Continue)
    }
}

/// Emit `records` with a boundary notification at every change of stream.
/// Returns `false` if the consumer is gone.
fn emit_records(emitter: &Emitter<RetrievalEvent>, records: Vec<LogRecord>) -> bool {
    let mut current_stream: Option<String> = None;

    for record in records {
        if current_stream.as_deref() != Some(record.stream_name.as_str()) {
            current_stream = Some(record.stream_name.clone());
            if !emitter.emit(RetrievalEvent::StreamBoundary(record.stream_name.clone())) {
                return false;
            }
        }
        if !emitter.emit(RetrievalEvent::Record(record)) {
            return false;
        }
        RECORDS_EMITTED_TOTAL.inc();
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{FailurePoint, InMemoryLogStore};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn session(store: &Arc<InMemoryLogStore>, options: RetrievalOptions) -> RetrievalSession {
        RetrievalSession::new(store.clone(), "svc".to_owned(), options)
    }

    fn drain(rx: &mut UnboundedReceiver<RetrievalEvent>) -> Vec<String> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(match event {
                RetrievalEvent::StreamBoundary(stream) => format!("boundary:{stream}"),
                RetrievalEvent::Record(r) => format!("{}@{}", r.stream_name, r.timestamp),
                RetrievalEvent::Error(e) => format!("error:{e}"),
                RetrievalEvent::Done => "done".to_owned(),
            });
        }
        seen
    }

    #[tokio::test]
    async fn cycle_commits_per_stream_watermarks() {
        let store = Arc::new(InMemoryLogStore::new());
        store.append_events("svc", "B", [(5, "b5")]);
        store.append_events("svc", "A", [(1, "a1"), (2, "a2"), (3, "a3")]);
        let (emitter, mut rx) = Emitter::channel();
        let cancel = CancellationToken::new();

        let mut session = session(&store, RetrievalOptions::default().with_num_records(10));
        let flow = session.run_cycle(&emitter, &cancel).await.unwrap();

        assert_eq!(flow, CycleFlow::Continue);
        assert_eq!(
            drain(&mut rx),
            vec!["boundary:A", "A@1", "A@2", "A@3", "boundary:B", "B@5"]
        );
        assert_eq!(session.watermarks.get("A"), Some(3));
        assert_eq!(session.watermarks.get("B"), Some(5));

        // Nothing new: the second cycle is silent and the marks hold.
        let flow = session.run_cycle(&emitter, &cancel).await.unwrap();
        assert_eq!(flow, CycleFlow::Continue);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.watermarks.get("A"), Some(3));
    }

    #[tokio::test]
    async fn failed_fetch_commits_nothing() {
        let store = Arc::new(InMemoryLogStore::new());
        store.append_events("svc", "B", [(5, "b5")]);
        store.append_events("svc", "A", [(1, "a1")]);
        store.fail_next(
            FailurePoint::FetchEvents {
                log_group: "svc".into(),
                log_stream: "B".into(),
            },
            "throttled",
        );
        let (emitter, mut rx) = Emitter::channel();

        let mut session = session(&store, RetrievalOptions::default());
        let err = session
            .run_cycle(&emitter, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("throttled"));
        assert!(drain(&mut rx).is_empty());
        assert!(session.watermarks.is_empty());
    }

    #[tokio::test]
    async fn cancelled_cycle_issues_no_backend_calls() {
        let store = Arc::new(InMemoryLogStore::new());
        store.append_events("svc", "A", [(1, "a1")]);
        let (emitter, _rx) = Emitter::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut session = session(&store, RetrievalOptions::default());
        let flow = session.run_cycle(&emitter, &cancel).await.unwrap();

        assert_eq!(flow, CycleFlow::Stop);
        assert!(store.calls().is_empty());
        assert!(session.watermarks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_in_flight_fetch_discards_the_cycle() {
        let store = Arc::new(InMemoryLogStore::new());
        store.append_events("svc", "B", [(5, "b5")]);
        store.append_events("svc", "A", [(1, "a1"), (2, "a2")]);
        store.stall(FailurePoint::FetchEvents {
            log_group: "svc".into(),
            log_stream: "B".into(),
        });
        let (emitter, mut rx) = Emitter::channel();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let mut session = session(&store, RetrievalOptions::default());
        let flow = session.run_cycle(&emitter, &cancel).await.unwrap();

        // A was read before B hung; none of it may surface or be committed.
        assert_eq!(flow, CycleFlow::Stop);
        assert_eq!(store.fetched_streams(), vec!["A", "B"]);
        assert!(drain(&mut rx).is_empty());
        assert!(session.watermarks.is_empty());
    }

    #[tokio::test]
    async fn empty_group_stops_the_session() {
        let store = Arc::new(InMemoryLogStore::new());
        store.add_empty_stream("svc", "idle");
        let (emitter, _rx) = Emitter::channel();

        let mut session = session(&store, RetrievalOptions::default().with_follow(true));
        let flow = session
            .run_cycle(&emitter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(flow, CycleFlow::Stop);
        assert!(store.fetched_streams().is_empty());
    }

    #[tokio::test]
    async fn dropped_consumer_stops_the_session() {
        let store = Arc::new(InMemoryLogStore::new());
        store.append_events("svc", "A", [(1, "a1")]);
        let (emitter, rx) = Emitter::channel();
        drop(rx);

        let mut session = session(&store, RetrievalOptions::default().with_follow(true));
        let flow = session
            .run_cycle(&emitter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(flow, CycleFlow::Stop);
    }
}
