//! Parallel resource loading and background refresh.
//!
//! `DataLoader` drives the orchestrator for both resources at once, keeps
//! an observable per-resource state, and self-heals: stale results
//! schedule a single-flight background refresh, and every reconnect
//! triggers a forced reload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connectivity::{ConnectivityMonitor, ListenerHandle};
use crate::models::{BuildingFeature, StreetFeature};
use crate::sync::{DataError, LoadResult, OfflineDataService};

/// Delay before a scheduled background refresh runs. Stands in for an
/// idle-callback primitive: long enough to let the triggering load settle,
/// short enough that stale data does not linger.
const BACKGROUND_REFRESH_DELAY_MS: u64 = 50;

/// Observable per-resource state. Starts as `{ empty, loading: true }`
/// until the first load resolves.
#[derive(Debug, Clone)]
pub struct ResourceState<T> {
    pub data: Vec<T>,
    pub loading: bool,
    pub error: Option<Arc<DataError>>,
    pub from_cache: bool,
    pub is_stale: bool,
    pub last_updated: Option<i64>,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            loading: true,
            error: None,
            from_cache: false,
            is_stale: false,
            last_updated: None,
        }
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Loads both resources concurrently and manages background refreshes.
pub struct DataLoader {
    service: Arc<OfflineDataService>,
    monitor: Arc<ConnectivityMonitor>,
    buildings: Mutex<ResourceState<BuildingFeature>>,
    streets: Mutex<ResourceState<StreetFeature>>,
    changed: watch::Sender<u64>,
    refresh_delay: Duration,
    /// At most one background refresh in flight across both resources;
    /// extra triggers are dropped, not queued.
    background_inflight: AtomicBool,
    was_online: AtomicBool,
    connectivity_listener: Mutex<Option<ListenerHandle>>,
}

impl DataLoader {
    /// Create the loader and attach it to the monitor. Must be called from
    /// within a tokio runtime: reconnects spawn refresh tasks.
    pub fn new(
        service: Arc<OfflineDataService>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Arc<Self> {
        Self::with_refresh_delay(
            service,
            monitor,
            Duration::from_millis(BACKGROUND_REFRESH_DELAY_MS),
        )
    }

    /// Like [`new`](Self::new) with an explicit background-refresh delay,
    /// for hosts with their own idle heuristics.
    pub fn with_refresh_delay(
        service: Arc<OfflineDataService>,
        monitor: Arc<ConnectivityMonitor>,
        refresh_delay: Duration,
    ) -> Arc<Self> {
        let (changed, _) = watch::channel(0);
        let loader = Arc::new(Self {
            service,
            was_online: AtomicBool::new(monitor.is_online()),
            monitor: Arc::clone(&monitor),
            buildings: Mutex::new(ResourceState::default()),
            streets: Mutex::new(ResourceState::default()),
            changed,
            refresh_delay,
            background_inflight: AtomicBool::new(false),
            connectivity_listener: Mutex::new(None),
        });

        let weak = Arc::downgrade(&loader);
        let handle = monitor.add_listener(move |status| {
            let Some(loader) = weak.upgrade() else {
                return;
            };
            let was_online = loader.was_online.swap(status.is_online, Ordering::SeqCst);
            if status.is_online && !was_online {
                info!("connection restored, refreshing all resources");
                tokio::spawn(async move {
                    loader.load_all(true).await;
                });
            }
        });
        *lock(&loader.connectivity_listener) = Some(handle);

        loader
    }

    /// Current state snapshots.
    pub fn buildings(&self) -> ResourceState<BuildingFeature> {
        lock(&self.buildings).clone()
    }

    pub fn streets(&self) -> ResourceState<StreetFeature> {
        lock(&self.streets).clone()
    }

    /// Receiver that ticks on every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// Load both resources concurrently. Each resource's state updates
    /// independently, so a failure in one never blocks the other.
    pub async fn load_all(self: &Arc<Self>, force_refresh: bool) {
        debug!(force_refresh, "loading all resources");
        self.mark_loading();

        let options = self.service.options(force_refresh);
        let (buildings, streets) = tokio::join!(
            self.service.load_buildings(&options),
            self.service.load_streets(&options),
        );

        let mut any_stale = false;
        any_stale |= Self::apply("buildings", &self.buildings, buildings);
        any_stale |= Self::apply("streets", &self.streets, streets);
        self.notify();

        // Stale data served while online means a newer copy is worth
        // fetching; forced calls already came from the network path.
        if any_stale && !force_refresh && self.monitor.is_online() {
            self.schedule_background_refresh();
        }
    }

    /// Manual refresh trigger; equivalent to `load_all(true)`.
    pub async fn refresh(self: &Arc<Self>) {
        self.load_all(true).await;
    }

    /// Detach from the connectivity monitor. In-flight loads finish on
    /// their own; their results are still applied.
    pub fn dispose(&self) {
        lock(&self.connectivity_listener).take();
    }

    fn mark_loading(&self) {
        update_state(&self.buildings, |state| {
            state.loading = true;
            state.error = None;
        });
        update_state(&self.streets, |state| {
            state.loading = true;
            state.error = None;
        });
        self.notify();
    }

    /// Fold one load outcome into the resource's state. Returns whether
    /// the result was stale.
    fn apply<T>(
        resource: &str,
        slot: &Mutex<ResourceState<T>>,
        outcome: Result<LoadResult<Vec<T>>, DataError>,
    ) -> bool {
        match outcome {
            Ok(result) => {
                let is_stale = result.is_stale;
                debug!(
                    resource,
                    from_cache = result.from_cache,
                    is_stale,
                    count = result.data.len(),
                    "resource loaded"
                );
                *lock(slot) = ResourceState {
                    data: result.data,
                    loading: false,
                    error: None,
                    from_cache: result.from_cache,
                    is_stale,
                    last_updated: result.last_updated,
                };
                is_stale
            }
            Err(err) => {
                warn!(resource, error = %err, "resource load failed");
                *lock(slot) = ResourceState {
                    data: Vec::new(),
                    loading: false,
                    error: Some(Arc::new(err)),
                    from_cache: false,
                    is_stale: false,
                    last_updated: None,
                };
                false
            }
        }
    }

    fn schedule_background_refresh(self: &Arc<Self>) {
        if self
            .background_inflight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("background refresh already in flight, dropping trigger");
            return;
        }

        debug!("scheduling background refresh");
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(loader.refresh_delay).await;
            loader.load_all(true).await;
            loader.background_inflight.store(false, Ordering::SeqCst);
        });
    }

    fn notify(&self) {
        self.changed.send_modify(|version| *version += 1);
    }
}

fn update_state<T>(slot: &Mutex<ResourceState<T>>, update: impl FnOnce(&mut ResourceState<T>)) {
    update(&mut lock(slot));
}
