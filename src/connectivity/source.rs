//! Pluggable origin of connectivity signals.
//!
//! The monitor never talks to the platform directly; whatever the host has
//! (browser events behind a webview bridge, netlink, a reachability probe)
//! is adapted to [`ConnectivitySource`]. [`PushConnectivitySource`] is the
//! bundled implementation: the host pushes transitions into it.

use std::sync::{Arc, Mutex, MutexGuard};

use super::ConnectionStatus;

/// Callback invoked with every status snapshot.
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// A source of connectivity transitions.
pub trait ConnectivitySource: Send + Sync {
    /// Last-known status. Never blocks.
    fn current(&self) -> ConnectionStatus;

    /// Register a callback for future transitions. The callback is not
    /// replayed with the current status; the monitor handles replay for its
    /// own listeners.
    fn subscribe(&self, callback: StatusCallback) -> SourceSubscription;
}

/// RAII subscription to a [`ConnectivitySource`]; unsubscribes on drop.
pub struct SourceSubscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SourceSubscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for SourceSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

struct PushInner {
    status: ConnectionStatus,
    callbacks: Vec<(u64, StatusCallback)>,
    next_id: u64,
}

/// A [`ConnectivitySource`] fed by explicit [`push`](Self::push) calls.
pub struct PushConnectivitySource {
    inner: Arc<Mutex<PushInner>>,
}

/// Recover the guard even if a callback panicked while holding nothing of
/// ours; the inner state is always left consistent.
fn lock_inner(inner: &Mutex<PushInner>) -> MutexGuard<'_, PushInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PushConnectivitySource {
    pub fn new(initial: ConnectionStatus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PushInner {
                status: initial,
                callbacks: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Record a new status and notify subscribers.
    ///
    /// Callbacks are invoked outside the lock, so a callback may push or
    /// subscribe again without deadlocking.
    pub fn push(&self, status: ConnectionStatus) {
        let callbacks: Vec<StatusCallback> = {
            let mut inner = lock_inner(&self.inner);
            inner.status = status.clone();
            inner.callbacks.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            callback(status.clone());
        }
    }
}

impl ConnectivitySource for PushConnectivitySource {
    fn current(&self) -> ConnectionStatus {
        lock_inner(&self.inner).status.clone()
    }

    fn subscribe(&self, callback: StatusCallback) -> SourceSubscription {
        let id = {
            let mut inner = lock_inner(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.callbacks.push((id, callback));
            id
        };
        let inner = Arc::clone(&self.inner);
        SourceSubscription::new(move || {
            lock_inner(&inner).callbacks.retain(|(cb_id, _)| *cb_id != id);
        })
    }
}
