//! Signal-triggered callbacks.
//!
//! Each waiter is one spawned task that parks on a notification and then
//! runs a callback on that task. Callbacks are `FnOnce`, so a waiter can
//! never run its callback twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// How a cancellable waiter finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal arrived and the callback ran.
    Fired,
    /// The waiter was cancelled first; the callback did not run.
    Cancelled,
}

/// Run `on_signal` once `signal` fires.
///
/// A dropped sender counts as a signal, matching a receive on a closed
/// channel. There is no way to abandon the wait: if the sender is kept
/// alive and never used, the task parks forever. Use
/// [`poll_channel_with_cancel`] when the waiter must be reclaimable.
pub fn poll_channel<F>(signal: oneshot::Receiver<()>, on_signal: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        let _ = signal.await;
        on_signal();
    })
}

/// Run `on_signal` once `signal` fires, unless `cancel` fires first.
///
/// The spawned task always terminates once either side fires. If both are
/// ready at the same time, cancellation wins.
pub fn poll_channel_with_cancel<F>(
    signal: oneshot::Receiver<()>,
    cancel: CancellationToken,
    on_signal: F,
) -> JoinHandle<SignalOutcome>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!("Signal waiter cancelled");
                SignalOutcome::Cancelled
            }
            _ = signal => {
                on_signal();
                SignalOutcome::Fired
            }
        }
    })
}

/// Run `f` on its own task after `token` is cancelled.
///
/// Returns a handle that can stop the call if it has not started yet.
/// Dropping the handle leaves the registration in place.
pub fn after_cancel<F>(token: CancellationToken, f: F) -> AfterCancel
where
    F: FnOnce() + Send + 'static,
{
    let claimed = Arc::new(AtomicBool::new(false));
    let stop = CancellationToken::new();

    let handle = tokio::spawn({
        let claimed = Arc::clone(&claimed);
        let stop = stop.clone();
        async move {
            tokio::select! {
                _ = token.cancelled() => {
                    if claim(&claimed) {
                        f();
                    }
                }
                _ = stop.cancelled() => {}
            }
        }
    });

    AfterCancel {
        claimed,
        stop,
        handle,
    }
}

/// Registration returned by [`after_cancel`].
#[derive(Debug)]
pub struct AfterCancel {
    claimed: Arc<AtomicBool>,
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl AfterCancel {
    /// Prevent the callback from running.
    ///
    /// Returns `true` if this call stopped it, `false` if it had already
    /// started or was already stopped.
    pub fn stop(&self) -> bool {
        let stopped = claim(&self.claimed);
        self.stop.cancel();
        stopped
    }

    /// Wait for the registration task to finish, i.e. until the callback
    /// has returned or the registration was stopped.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }
}

fn claim(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}
