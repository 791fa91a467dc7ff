//! Process-wide connectivity monitor.
//!
//! Holds the last-known [`ConnectionStatus`], notifies listeners on every
//! transition, and answers the policy questions the sync layer asks
//! ("should we prefer the offline copy right now?").

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tracing::{debug, error};

use super::source::{ConnectivitySource, SourceSubscription, StatusCallback};
use super::{ConnectionStatus, NetworkQuality};

type Listener = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

struct MonitorInner {
    status: Mutex<ConnectionStatus>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

/// Recover the guard from a poisoned lock; listener panics are already
/// contained, so the state behind the lock is consistent.
fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MonitorInner {
    fn handle_transition(&self, status: ConnectionStatus) {
        debug!(online = status.is_online, "connectivity transition");
        *lock(&self.status) = status.clone();
        // Snapshot before invoking so a listener may subscribe or
        // unsubscribe from inside its own callback.
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            Self::invoke(&listener, status.clone());
        }
    }

    fn invoke(listener: &Listener, status: ConnectionStatus) {
        if panic::catch_unwind(AssertUnwindSafe(|| listener(status))).is_err() {
            error!("connectivity listener panicked");
        }
    }
}

/// Handle to a registered listener. Unsubscribes when dropped;
/// [`unsubscribe`](Self::unsubscribe) may also be called explicitly and is
/// idempotent.
pub struct ListenerHandle {
    inner: Weak<MonitorInner>,
    id: u64,
}

impl ListenerHandle {
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Observes a [`ConnectivitySource`] and fans status changes out to
/// listeners. Construct one per application and share it via `Arc`.
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
    _source_subscription: SourceSubscription,
}

impl ConnectivityMonitor {
    pub fn new(source: Arc<dyn ConnectivitySource>) -> Arc<Self> {
        let inner = Arc::new(MonitorInner {
            status: Mutex::new(source.current()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        });

        let weak = Arc::downgrade(&inner);
        let callback: StatusCallback = Arc::new(move |status| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_transition(status);
            }
        });
        let subscription = source.subscribe(callback);

        Arc::new(Self {
            inner,
            _source_subscription: subscription,
        })
    }

    /// Last-known snapshot; never blocks on I/O.
    pub fn status(&self) -> ConnectionStatus {
        lock(&self.inner.status).clone()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online
    }

    pub fn network_quality(&self) -> NetworkQuality {
        self.status().quality()
    }

    /// True when offline, or when the link is too poor to be worth a
    /// network round-trip.
    pub fn should_prefer_offline(&self) -> bool {
        let status = self.status();
        !status.is_online || status.quality() == NetworkQuality::Slow
    }

    /// Register a listener. It is invoked immediately with the current
    /// status so new subscribers do not wait for the next transition.
    pub fn add_listener(
        &self,
        listener: impl Fn(ConnectionStatus) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let listener: Listener = Arc::new(listener);
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, listener.clone()));

        MonitorInner::invoke(&listener, self.status());

        ListenerHandle {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Wait until the monitor sees an online status, or until `timeout`
    /// elapses. Resolves immediately when already online.
    pub async fn wait_for_connection(&self, timeout: Duration) -> bool {
        if self.is_online() {
            return true;
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = self.add_listener(move |status| {
            let _ = tx.send(status.is_online);
        });

        let connected = tokio::time::timeout(timeout, async {
            while let Some(online) = rx.recv().await {
                if online {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        handle.unsubscribe();
        connected
    }
}
