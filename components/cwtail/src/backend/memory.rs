//! In-process log store.
//!
//! Behaves like the remote service from the retrieval core's point of view:
//! group listings are paginated, streams come back most recently appended to
//! first, and each fetch returns at most one page (the newest events). Every
//! call is journaled, and failures or never-answering calls can be scripted,
//! which makes it the backend of choice for exercising the engine
//! deterministically.

// Local crates
use crate::backend::client::{BackendError, BackendOperation, LogStorageClient};
use crate::backend::models::{LogGroup, LogGroupPage, LogStream, RawEvent};

// External crates
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

const DEFAULT_GROUP_PAGE_SIZE: usize = 50;
const DEFAULT_EVENT_PAGE_SIZE: usize = 10_000;

/// A backend call as observed by [`InMemoryLogStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BackendCall {
    ListLogGroups { next_token: Option<String> },
    ListStreams { log_group: String, limit: usize },
    FetchEvents { log_group: String, log_stream: String },
}

/// Which call a scripted failure applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum FailurePoint {
    ListLogGroups,
    ListStreams { log_group: String },
    FetchEvents { log_group: String, log_stream: String },
}

impl FailurePoint {
    fn operation(&self) -> BackendOperation {
        match self {
            FailurePoint::ListLogGroups => BackendOperation::ListLogGroups,
            FailurePoint::ListStreams { .. } => BackendOperation::ListStreams,
            FailurePoint::FetchEvents { .. } => BackendOperation::FetchEvents,
        }
    }
}

#[derive(Debug, Default)]
struct StoredStream {
    events: Vec<RawEvent>,
    // Sequence number of the latest append (or of creation).
    last_activity: u64,
}

impl StoredStream {
    fn last_event_timestamp(&self) -> Option<i64> {
        self.events.iter().map(|e| e.timestamp).max()
    }
}

#[derive(Debug, Default)]
struct StoreState {
    groups: BTreeMap<String, LogGroup>,
    streams: HashMap<String, BTreeMap<String, StoredStream>>,
    failures: HashMap<FailurePoint, String>,
    stalls: HashSet<FailurePoint>,
    calls: Vec<BackendCall>,
    activity_seq: u64,
}

/// Deterministic in-memory [`LogStorageClient`].
#[derive(Debug)]
pub struct InMemoryLogStore {
    state: Mutex<StoreState>,
    group_page_size: usize,
    event_page_size: usize,
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLogStore {
    /// Empty store with default page sizes.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            group_page_size: DEFAULT_GROUP_PAGE_SIZE,
            event_page_size: DEFAULT_EVENT_PAGE_SIZE,
        }
    }

    /// Number of log groups returned per listing page.
    pub fn with_group_page_size(mut self, size: usize) -> Self {
        self.group_page_size = size.max(1);
        self
    }

    /// Maximum number of events returned by a single fetch.
    pub fn with_event_page_size(mut self, size: usize) -> Self {
        self.event_page_size = size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a log group, replacing any group with the same name.
    pub fn add_group(&self, group: LogGroup) {
        let mut state = self.lock();
        state.streams.entry(group.name.clone()).or_default();
        state.groups.insert(group.name.clone(), group);
    }

    /// Create a stream that has never received an event.
    pub fn add_empty_stream(&self, log_group: &str, log_stream: &str) {
        let mut state = self.lock();
        Self::stream_entry(&mut state, log_group, log_stream);
    }

    /// Append events to a stream, creating the group and stream on demand.
    pub fn append_events<I, M>(&self, log_group: &str, log_stream: &str, events: I)
    where
        I: IntoIterator<Item = (i64, M)>,
        M: Into<String>,
    {
        let mut state = self.lock();
        let stream = Self::stream_entry(&mut state, log_group, log_stream);
        stream
            .events
            .extend(events.into_iter().map(|(ts, msg)| RawEvent::new(ts, msg)));
    }

    fn stream_entry<'a>(
        state: &'a mut StoreState,
        log_group: &str,
        log_stream: &str,
    ) -> &'a mut StoredStream {
        if !state.groups.contains_key(log_group) {
            state
                .groups
                .insert(log_group.to_owned(), LogGroup::named(log_group));
        }

        state.activity_seq += 1;
        let activity = state.activity_seq;
        let stream = state
            .streams
            .entry(log_group.to_owned())
            .or_default()
            .entry(log_stream.to_owned())
            .or_default();
        stream.last_activity = activity;
        stream
    }

    /// Make the next call matching `point` fail with `message`.
    pub fn fail_next(&self, point: FailurePoint, message: impl Into<String>) {
        self.lock().failures.insert(point, message.into());
    }

    /// Make every call matching `point` hang forever, as a request the
    /// service never answers would. The call is still journaled.
    pub fn stall(&self, point: FailurePoint) {
        self.lock().stalls.insert(point);
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Names of the streams fetched so far, in call order.
    pub fn fetched_streams(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::FetchEvents { log_stream, .. } => Some(log_stream.clone()),
                _ => None,
            })
            .collect()
    }

    /// Journal `call`. `Ok(false)` means the call must never complete.
    fn record_call(
        state: &mut StoreState,
        call: BackendCall,
        point: FailurePoint,
    ) -> Result<bool, BackendError> {
        state.calls.push(call);
        if let Some(message) = state.failures.remove(&point) {
            return Err(BackendError::new(point.operation(), message));
        }
        Ok(!state.stalls.contains(&point))
    }

    fn group_page(
        &self,
        state: &StoreState,
        next_token: Option<&str>,
    ) -> Result<LogGroupPage, BackendError> {
        let start = match next_token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|e| {
                BackendError::new(
                    BackendOperation::ListLogGroups,
                    format!("invalid continuation token {token:?}: {e}"),
                )
            })?,
        };

        let log_groups: Vec<LogGroup> = state
            .groups
            .values()
            .skip(start)
            .take(self.group_page_size)
            .cloned()
            .collect();
        let end = start + log_groups.len();
        let next_token = (end < state.groups.len()).then(|| end.to_string());

        Ok(LogGroupPage {
            log_groups,
            next_token,
        })
    }

    fn stream_listing(
        state: &StoreState,
        log_group: &str,
        limit: usize,
    ) -> Result<Vec<LogStream>, BackendError> {
        let Some(streams) = state.streams.get(log_group) else {
            return Err(BackendError::new(
                BackendOperation::ListStreams,
                format!("log group {log_group:?} does not exist"),
            ));
        };

        let mut ordered: Vec<(&String, &StoredStream)> = streams.iter().collect();
        // Most recently appended first, never-written streams last.
        ordered.sort_by(|(_, a), (_, b)| {
            (!b.events.is_empty())
                .cmp(&!a.events.is_empty())
                .then(b.last_activity.cmp(&a.last_activity))
        });

        Ok(ordered
            .into_iter()
            .take(limit)
            .map(|(name, stream)| LogStream {
                name: name.clone(),
                last_event_timestamp: stream.last_event_timestamp(),
            })
            .collect())
    }

    fn event_page(
        &self,
        state: &StoreState,
        log_group: &str,
        log_stream: &str,
    ) -> Result<Vec<RawEvent>, BackendError> {
        let Some(stream) = state
            .streams
            .get(log_group)
            .and_then(|streams| streams.get(log_stream))
        else {
            return Err(BackendError::new(
                BackendOperation::FetchEvents,
                format!("log stream {log_stream:?} does not exist in {log_group:?}"),
            ));
        };

        // Like GetLogEvents without a start position: the newest page, oldest first.
        let skip = stream.events.len().saturating_sub(self.event_page_size);
        Ok(stream.events[skip..].to_vec())
    }
}

#[async_trait]
impl LogStorageClient for InMemoryLogStore {
    async fn list_log_groups(
        &self,
        next_token: Option<String>,
    ) -> Result<LogGroupPage, BackendError> {
        let page = {
            let mut state = self.lock();
            let answered = Self::record_call(
                &mut state,
                BackendCall::ListLogGroups {
                    next_token: next_token.clone(),
                },
                FailurePoint::ListLogGroups,
            )?;
            answered.then(|| self.group_page(&state, next_token.as_deref()))
        };

        match page {
            Some(page) => page,
            None => std::future::pending().await,
        }
    }

    async fn list_streams(
        &self,
        log_group: &str,
        limit: usize,
    ) -> Result<Vec<LogStream>, BackendError> {
        let listing = {
            let mut state = self.lock();
            let answered = Self::record_call(
                &mut state,
                BackendCall::ListStreams {
                    log_group: log_group.to_owned(),
                    limit,
                },
                FailurePoint::ListStreams {
                    log_group: log_group.to_owned(),
                },
            )?;
            answered.then(|| Self::stream_listing(&state, log_group, limit))
        };

        match listing {
            Some(listing) => listing,
            None => std::future::pending().await,
        }
    }

    async fn fetch_events(
        &self,
        log_group: &str,
        log_stream: &str,
    ) -> Result<Vec<RawEvent>, BackendError> {
        let events = {
            let mut state = self.lock();
            let answered = Self::record_call(
                &mut state,
                BackendCall::FetchEvents {
                    log_group: log_group.to_owned(),
                    log_stream: log_stream.to_owned(),
                },
                FailurePoint::FetchEvents {
                    log_group: log_group.to_owned(),
                    log_stream: log_stream.to_owned(),
                },
            )?;
            answered.then(|| self.event_page(&state, log_group, log_stream))
        };

        match events {
            Some(events) => events,
            None => std::future::pending().await,
        }
    }
}
