//! Process-wide cancellation.

// External crates
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Process-wide shutdown signal, built on-top of a `CancellationToken`.
///
/// - Every running operation is started with a child of `token`.
/// - Calling `.trigger()` cancels all of them at once.
/// - Each operation still delivers its own `Done` notification after it stops,
/// so the runtime can drain it before exiting.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Fresh, untriggered shutdown signal.
    #[instrument(name = "cwtail_shutdown_channel", target = "helpers::shutdown", level = "trace")]
    pub fn new() -> Self {
        tracing::trace!("Creating new global shutdown token");
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Parent token to hand to operations.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Trigger shutdown, cancelling every operation started from this token.
    #[instrument(name = "cwtail_shutdown_trigger", target = "helpers::shutdown", level = "trace")]
    pub fn trigger(&self) {
        tracing::trace!("Shutdown triggered, cancelling running operations");
        self.token.cancel();
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a background task that triggers shutdown on Ctrl+C.
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = signal::ctrl_c() => match res {
                    Ok(()) => {
                        tracing::info!("Ctrl+C signal detected, shutting down");
                        shutdown.trigger();
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl+C signal"),
                },
                _ = shutdown.token.cancelled() => {}
            }
        })
    }
}
