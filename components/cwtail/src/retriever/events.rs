//! Notifications pushed by running operations, and the handle a caller uses
//! to consume and cancel them.
//!
//! ```text
//! (StreamBoundary | Record)* -> [Error] -> Done
//! Page*                      -> [Error] -> Done
//! ```
//!
//! The channel is unbounded: emission is push-based and paced only by the
//! poll interval, so a slow consumer buffers rather than stalling the poller.

// Local crates
use crate::backend::client::BackendError;
use crate::backend::models::{LogGroupPage, LogRecord};

// External crates
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Notifications of a log retrieval operation.
#[derive(Debug)]
pub enum RetrievalEvent {
    /// The following records come from a different stream than the previous one.
    StreamBoundary(String),
    /// One record, in emission order.
    Record(LogRecord),
    /// Fatal; always followed by `Done`.
    Error(BackendError),
    /// Terminal; nothing follows.
    Done,
}

/// Notifications of a log group listing.
#[derive(Debug)]
pub enum GroupListingEvent {
    /// One backend page, delivered as soon as it arrives.
    Page(LogGroupPage),
    /// Fatal; always followed by `Done`.
    Error(BackendError),
    /// Terminal; nothing follows.
    Done,
}

/// Sending side owned by the operation task.
#[derive(Debug)]
pub(crate) struct Emitter<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> Emitter<E> {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `false` once the consumer has gone away.
    pub(crate) fn emit(&self, event: E) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Caller side of a running operation.
///
/// Dropping the handle (or the stream returned by
/// [`into_stream`](Self::into_stream)) cancels the operation, exactly like
/// [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct OperationHandle<E> {
    events: mpsc::UnboundedReceiver<E>,
    cancel: CancellationToken,
    cancel_on_drop: DropGuard,
    task: JoinHandle<()>,
}

/// Handle of a retrieval operation.
pub type RetrievalHandle = OperationHandle<RetrievalEvent>;
/// Handle of a group listing operation.
pub type GroupListingHandle = OperationHandle<GroupListingEvent>;

impl<E: Send + 'static> OperationHandle<E> {
    /// Spawn `operation` with a fresh emitter and wrap it in a handle.
    pub(crate) fn spawn<F, Fut>(cancel: CancellationToken, operation: F) -> Self
    where
        F: FnOnce(Emitter<E>, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (emitter, events) = Emitter::channel();
        let task = tokio::spawn(operation(emitter, cancel.clone()));

        Self {
            events,
            cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }

    /// Next notification, or `None` once the terminal `Done` has been consumed.
    pub async fn next_event(&mut self) -> Option<E> {
        self.events.recv().await
    }

    /// Ask the operation to stop. It still delivers `Done`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token of this operation, e.g. to tie other work to its lifetime.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the operation task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Consume the handle as a `Stream` of notifications. The operation is
    /// cancelled when the stream is dropped.
    pub fn into_stream(self) -> EventStream<E> {
        EventStream {
            inner: UnboundedReceiverStream::new(self.events),
            _cancel_on_drop: self.cancel_on_drop,
        }
    }

    /// Drain every notification up to and including the terminal one.
    pub async fn collect_events(mut self) -> Vec<E> {
        let mut collected = Vec::new();
        while let Some(event) = self.events.recv().await {
            collected.push(event);
        }
        collected
    }
}

/// Notifications of one operation as a [`Stream`].
#[derive(Debug)]
pub struct EventStream<E> {
    inner: UnboundedReceiverStream<E>,
    _cancel_on_drop: DropGuard,
}

impl<E> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
