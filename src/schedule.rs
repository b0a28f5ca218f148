//! Cancellable delayed work.
//!
//! Consumers of the link routinely need "after N seconds, clear this
//! setting" behavior - and need to abandon it when the user changes the
//! setting again first. [`run_after`] models that as a task carrying a
//! cancellation token rather than a raw timer callback: the returned
//! [`DelayedTask`] is the token, and dropping it cancels the work.
//!
//! The closure runs on the async runtime, not on the owner thread. Work
//! that must touch owner-thread state should post a command through
//! [`Inbox::post`](crate::dispatch::Inbox::post) and let the next tick
//! execute it:
//!
//! ```ignore
//! let inbox = dispatcher.inbox();
//! let reset = run_after(Duration::from_secs(3), move || {
//!     inbox.post(commands::CLEAR_HIGHLIGHT, &Value::None);
//! });
//! // ...user changed the setting again:
//! reset.cancel();
//! ```

use std::time::Duration;

use tokio::sync::oneshot;

/// Handle for a scheduled closure; doubles as its cancellation token.
///
/// Dropping the handle cancels the work. Call [`detach`](Self::detach)
/// to let it run unattended instead.
pub struct DelayedTask {
    cancel: Option<oneshot::Sender<()>>,
}

/// Run `f` after `delay`, unless cancelled first.
///
/// Must be called within a tokio runtime.
pub fn run_after<F>(delay: Duration, f: F) -> DelayedTask
where
    F: FnOnce() + Send + 'static,
{
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => f(),
            _ = cancel_rx => {
                tracing::debug!("delayed task cancelled");
            }
        }
    });

    DelayedTask {
        cancel: Some(cancel_tx),
    }
}

impl DelayedTask {
    /// Cancel the scheduled work if it has not fired yet.
    ///
    /// Safe to call after the work already ran; it is a no-op then.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Let the work run without keeping the handle alive.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}
