//! A cloneable handle for poking a session from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for aborting or awaiting a session's request.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) in_flight: Arc<AtomicBool>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            in_flight: Arc::new(AtomicBool::new(false)),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Claim the in-flight slot. Returns `None` if a request is already
    /// running. The slot is released when the guard drops.
    pub(crate) fn try_begin(&self) -> Option<(InFlightGuard, CancellationToken)> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let token = {
            let mut cancel = self.cancel.lock();
            *cancel = CancellationToken::new();
            cancel.clone()
        };
        Some((
            InFlightGuard {
                handle: self.clone(),
            },
            token,
        ))
    }

    /// Abort the current request, if any.
    pub fn abort(&self) {
        if self.is_in_flight() {
            tracing::debug!("Aborting in-flight request");
        }
        self.cancel.lock().cancel();
    }

    /// Whether a request is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait until no request is in flight.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if !self.is_in_flight() {
            return;
        }
        notified.await;
    }

    /// Wait until idle, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        if !self.is_in_flight() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }
}

/// Releases the in-flight slot on drop, including when the request future is
/// dropped mid-stream.
pub(crate) struct InFlightGuard {
    handle: SessionHandle,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.handle.in_flight.store(false, Ordering::Release);
        self.handle.idle_notify.notify_waiters();
    }
}
