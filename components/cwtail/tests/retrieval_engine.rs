use std::sync::Arc;

use cwtail::backend::client::BackendOperation;
use cwtail::backend::memory::{BackendCall, FailurePoint, InMemoryLogStore};
use cwtail::retriever::engine::LogRetriever;
use cwtail::retriever::events::RetrievalEvent;
use cwtail::retriever::options::{ConfigurationError, RetrievalOptions};
use futures::StreamExt;

fn describe(event: &RetrievalEvent) -> String {
    match event {
        RetrievalEvent::StreamBoundary(stream) => format!("boundary:{stream}"),
        RetrievalEvent::Record(r) => format!("{}@{}", r.stream_name, r.timestamp),
        RetrievalEvent::Error(e) => format!("error:{}", e.operation()),
        RetrievalEvent::Done => "done".to_owned(),
    }
}

async fn run_once(store: &Arc<InMemoryLogStore>, options: RetrievalOptions) -> Vec<String> {
    let retriever = LogRetriever::new(store.clone());
    let handle = retriever.start_retrieval("svc", options).unwrap();
    handle.collect_events().await.iter().map(describe).collect()
}

/// Streams A (t=1,2,3) and B (t=5), A written to most recently.
fn two_stream_group() -> Arc<InMemoryLogStore> {
    let store = Arc::new(InMemoryLogStore::new());
    store.append_events("svc", "B", [(5, "b5\n")]);
    store.append_events("svc", "A", [(1, "a1\n"), (2, "a2\n"), (3, "a3\n")]);
    store
}

#[tokio::test]
async fn single_cycle_groups_records_by_stream() {
    let store = two_stream_group();

    let events = run_once(&store, RetrievalOptions::default().with_num_records(10)).await;

    assert_eq!(
        events,
        vec!["boundary:A", "A@1", "A@2", "A@3", "boundary:B", "B@5", "done"]
    );
}

#[tokio::test]
async fn record_messages_are_passed_through() {
    let store = two_stream_group();
    let retriever = LogRetriever::new(store.clone());
    let handle = retriever
        .start_retrieval("svc", RetrievalOptions::default())
        .unwrap();

    let messages: Vec<String> = handle
        .collect_events()
        .await
        .into_iter()
        .filter_map(|event| match event {
            RetrievalEvent::Record(record) => Some(record.message),
            _ => None,
        })
        .collect();

    assert_eq!(messages, vec!["a1\n", "a2\n", "a3\n", "b5\n"]);
}

#[tokio::test]
async fn cap_reached_inside_a_stream_skips_the_rest() {
    let store = two_stream_group();

    let events = run_once(&store, RetrievalOptions::default().with_num_records(2)).await;

    // A overshoots the cap of 2 and is kept whole; B is never fetched.
    assert_eq!(events, vec!["boundary:A", "A@1", "A@2", "A@3", "done"]);
    assert_eq!(store.fetched_streams(), vec!["A"]);
}

#[tokio::test]
async fn cap_is_checked_before_each_new_stream() {
    let store = Arc::new(InMemoryLogStore::new());
    store.append_events("svc", "C", [(1, "c")]);
    store.append_events("svc", "B", [(1, "b"), (2, "b")]);
    store.append_events("svc", "A", [(1, "a"), (2, "a")]);

    let events = run_once(&store, RetrievalOptions::default().with_num_records(3)).await;

    assert_eq!(store.fetched_streams(), vec!["A", "B"]);
    assert_eq!(events.iter().filter(|e| e.contains('@')).count(), 4);
}

#[tokio::test]
async fn same_timestamp_records_in_one_stream_are_all_emitted() {
    let store = Arc::new(InMemoryLogStore::new());
    store.append_events("svc", "A", [(7, "x"), (7, "y"), (7, "z")]);

    let events = run_once(&store, RetrievalOptions::default()).await;

    assert_eq!(events, vec!["boundary:A", "A@7", "A@7", "A@7", "done"]);
}

#[tokio::test]
async fn empty_streams_are_never_fetched() {
    let store = Arc::new(InMemoryLogStore::new());
    store.add_empty_stream("svc", "idle");
    store.append_events("svc", "A", [(1, "a")]);

    let events = run_once(&store, RetrievalOptions::default()).await;

    assert_eq!(events, vec!["boundary:A", "A@1", "done"]);
    assert_eq!(store.fetched_streams(), vec!["A"]);
}

#[tokio::test]
async fn group_without_events_finishes_cleanly() {
    let store = Arc::new(InMemoryLogStore::new());
    store.add_empty_stream("svc", "idle");

    let events = run_once(&store, RetrievalOptions::default()).await;

    assert_eq!(events, vec!["done"]);
}

#[tokio::test]
async fn fan_out_limits_streams_requested() {
    let store = Arc::new(InMemoryLogStore::new());
    for i in 0..12 {
        store.append_events("svc", &format!("s{i:02}"), [(i, "x")]);
    }

    let events = run_once(
        &store,
        RetrievalOptions::default()
            .with_num_records(100)
            .with_stream_fan_out(4),
    )
    .await;

    assert_eq!(
        store.calls()[0],
        BackendCall::ListStreams {
            log_group: "svc".into(),
            limit: 4
        }
    );
    assert_eq!(store.fetched_streams(), vec!["s11", "s10", "s09", "s08"]);
    assert_eq!(events.iter().filter(|e| e.starts_with("boundary")).count(), 4);
}

#[tokio::test]
async fn fetch_failure_on_second_stream_aborts_without_records() {
    let store = two_stream_group();
    store.fail_next(
        FailurePoint::FetchEvents {
            log_group: "svc".into(),
            log_stream: "B".into(),
        },
        "throttled",
    );

    let events = run_once(&store, RetrievalOptions::default()).await;

    assert_eq!(events, vec!["error:fetch_events", "done"]);
    assert_eq!(store.fetched_streams(), vec!["A", "B"]);
}

#[tokio::test]
async fn selector_failure_aborts_before_any_fetch() {
    let store = two_stream_group();
    store.fail_next(
        FailurePoint::ListStreams {
            log_group: "svc".into(),
        },
        "network unreachable",
    );

    let retriever = LogRetriever::new(store.clone());
    let events = retriever
        .start_retrieval("svc", RetrievalOptions::default())
        .unwrap()
        .collect_events()
        .await;

    assert_eq!(events.len(), 2);
    match &events[0] {
        RetrievalEvent::Error(e) => {
            assert_eq!(e.operation(), BackendOperation::ListStreams);
            assert!(e.to_string().contains("network unreachable"));
        }
        other => panic!("expected an error, got {other:?}"),
    }
    assert!(matches!(events[1], RetrievalEvent::Done));
    assert!(store.fetched_streams().is_empty());
}

#[tokio::test]
async fn unknown_group_reports_a_backend_error() {
    let store = Arc::new(InMemoryLogStore::new());

    let events = run_once(&store, RetrievalOptions::default()).await;

    assert_eq!(events, vec!["error:list_streams", "done"]);
}

#[tokio::test]
async fn invalid_options_are_rejected_before_spawning() {
    let store = two_stream_group();
    let retriever = LogRetriever::new(store.clone());

    let err = retriever
        .start_retrieval("", RetrievalOptions::default())
        .unwrap_err();
    assert_eq!(err, ConfigurationError::MissingLogGroup);

    let mut options = RetrievalOptions::default().with_follow(true);
    options.poll_interval = None;
    let err = retriever.start_retrieval("svc", options).unwrap_err();
    assert_eq!(err, ConfigurationError::MissingPollInterval);

    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn concurrent_operations_are_independent() {
    let store = Arc::new(InMemoryLogStore::new());
    store.append_events("one", "A", [(1, "a")]);
    store.append_events("two", "A", [(1, "a"), (2, "b")]);
    let retriever = LogRetriever::new(store.clone());

    let first = retriever
        .start_retrieval("one", RetrievalOptions::default())
        .unwrap();
    let second = retriever
        .start_retrieval("two", RetrievalOptions::default())
        .unwrap();

    let (first, second) = tokio::join!(first.collect_events(), second.collect_events());
    let first: Vec<_> = first.iter().map(describe).collect();
    let second: Vec<_> = second.iter().map(describe).collect();

    // Same stream name in different groups: separate watermark tables.
    assert_eq!(first, vec!["boundary:A", "A@1", "done"]);
    assert_eq!(second, vec!["boundary:A", "A@1", "A@2", "done"]);
}

#[tokio::test]
async fn handle_can_be_consumed_as_a_stream() {
    let store = two_stream_group();
    let retriever = LogRetriever::new(store.clone());

    let records = retriever
        .start_retrieval("svc", RetrievalOptions::default())
        .unwrap()
        .into_stream()
        .filter(|event| futures::future::ready(matches!(event, RetrievalEvent::Record(_))))
        .count()
        .await;

    assert_eq!(records, 4);
}
