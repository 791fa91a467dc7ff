//! Fetch-with-cache orchestrator.
//!
//! For each named resource, `OfflineDataService` decides whether to serve
//! the persisted copy, fetch fresh data, or both, under the current
//! connectivity conditions. Every successful fetch is written through to
//! the cache store before it is returned.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStore, SyncStatus};
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{BuildingFeature, StreetFeature};

use super::DataError;

/// Cache keys for the two managed resources.
pub const BUILDINGS_CACHE_KEY: &str = "buildings";
pub const STREETS_CACHE_KEY: &str = "streets";

/// Version tag written with every entry. Could be derived from response
/// headers once the server publishes one.
const CACHE_VERSION: &str = "1.0.0";

/// HTTP request timeout in seconds.
/// The GeoJSON assets are a few hundred KB; 30s covers slow links while
/// still failing fast enough to fall back to the cache.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Per-call cache policy.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// How old a cached copy may be before it counts as stale.
    pub max_cache_age: Duration,
    /// Skip the cache-first branches and go straight to the network.
    pub force_refresh: bool,
    /// Serve any cached copy, even stale, before touching the network.
    pub prefer_offline: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_cache_age: Config::default().max_cache_age(),
            force_refresh: false,
            prefer_offline: false,
        }
    }
}

/// Data plus freshness metadata; constructed fresh per call.
#[derive(Debug, Clone)]
pub struct LoadResult<T> {
    pub data: T,
    pub from_cache: bool,
    pub is_stale: bool,
    /// Epoch milliseconds of the last successful fetch backing this data.
    pub last_updated: Option<i64>,
}

/// Snapshot of what the cache currently holds.
#[derive(Debug)]
pub struct CacheInfo {
    pub buildings: Option<CacheEntry<Vec<BuildingFeature>>>,
    pub streets: Option<CacheEntry<Vec<StreetFeature>>>,
    pub total_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfflineAvailability {
    pub buildings: bool,
    pub streets: bool,
}

/// The fetch-with-cache orchestrator. Construct one and share it via
/// `Arc`; it holds no per-call state.
pub struct OfflineDataService {
    client: Client,
    store: Arc<CacheStore>,
    monitor: Arc<ConnectivityMonitor>,
    config: Config,
}

impl OfflineDataService {
    pub fn new(
        store: Arc<CacheStore>,
        monitor: Arc<ConnectivityMonitor>,
        config: Config,
    ) -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(DataError::ClientBuild)?;
        Ok(Self {
            client,
            store,
            monitor,
            config,
        })
    }

    /// Options matching this service's configured max cache age.
    pub fn options(&self, force_refresh: bool) -> LoadOptions {
        LoadOptions {
            max_cache_age: self.config.max_cache_age(),
            force_refresh,
            prefer_offline: false,
        }
    }

    pub async fn load_buildings(
        &self,
        options: &LoadOptions,
    ) -> Result<LoadResult<Vec<BuildingFeature>>, DataError> {
        let url = self.config.buildings_url();
        self.fetch_with_cache(BUILDINGS_CACHE_KEY, &url, options).await
    }

    pub async fn load_streets(
        &self,
        options: &LoadOptions,
    ) -> Result<LoadResult<Vec<StreetFeature>>, DataError> {
        let url = self.config.streets_url();
        self.fetch_with_cache(STREETS_CACHE_KEY, &url, options).await
    }

    /// The decision policy. Branches are evaluated in order; the first
    /// match wins:
    ///
    /// 1. offline-preferred and a copy exists (and no force): serve it,
    ///    stale or not, without touching the network
    /// 2. online and (forced, missing, or stale): fetch, write through,
    ///    serve fresh; on network failure fall back to any cached copy
    /// 3. any cached copy left: serve it
    /// 4. nothing ever cached while offline: hard failure
    async fn fetch_with_cache<T>(
        &self,
        cache_key: &str,
        url: &str,
        options: &LoadOptions,
    ) -> Result<LoadResult<Vec<T>>, DataError>
    where
        T: DeserializeOwned + Serialize,
    {
        let is_online = self.monitor.is_online();
        let offline_first = options.prefer_offline || self.monitor.should_prefer_offline();

        let cached: Option<CacheEntry<Vec<T>>> = self.store.get(cache_key).await?;
        let now = Utc::now().timestamp_millis();
        let is_fresh = cached
            .as_ref()
            .is_some_and(|entry| now - entry.timestamp < options.max_cache_age.as_millis() as i64);

        let cached = match cached {
            Some(entry) if offline_first && !options.force_refresh => {
                debug!(
                    resource = cache_key,
                    stale = !is_fresh,
                    "serving cached copy (offline preferred)"
                );
                return Ok(Self::result_from_entry(entry, is_fresh));
            }
            other => other,
        };

        if is_online && (options.force_refresh || !is_fresh) {
            match self.fetch_from_network::<T>(url).await {
                Ok(fresh) => {
                    // Write through even when the caller will not use the
                    // cache this time; the next call benefits.
                    self.store.put(cache_key, &fresh, CACHE_VERSION, None).await?;
                    debug!(resource = cache_key, count = fresh.len(), "fetched from network");
                    return Ok(LoadResult {
                        data: fresh,
                        from_cache: false,
                        is_stale: false,
                        last_updated: Some(Utc::now().timestamp_millis()),
                    });
                }
                Err(err) if err.is_recoverable() => match cached {
                    Some(entry) => {
                        warn!(
                            resource = cache_key,
                            error = %err,
                            "network request failed, serving stale cached copy"
                        );
                        return Ok(LoadResult {
                            data: entry.data,
                            from_cache: true,
                            is_stale: true,
                            last_updated: Some(entry.timestamp),
                        });
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }

        if let Some(entry) = cached {
            debug!(resource = cache_key, stale = !is_fresh, "serving cached copy (offline)");
            return Ok(Self::result_from_entry(entry, is_fresh));
        }

        Err(DataError::NoCachedDataOffline {
            resource: cache_key.to_string(),
        })
    }

    fn result_from_entry<T>(entry: CacheEntry<Vec<T>>, is_fresh: bool) -> LoadResult<Vec<T>> {
        LoadResult {
            data: entry.data,
            from_cache: true,
            is_stale: !is_fresh,
            last_updated: Some(entry.timestamp),
        }
    }

    async fn fetch_from_network<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Vec<T>, DataError> {
        let response = self
            .client
            .get(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| DataError::Network {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::Status {
                url: url.to_string(),
                status,
            });
        }

        let payload: Value = response.json().await.map_err(|e| DataError::Network {
            url: url.to_string(),
            source: e,
        })?;
        Self::parse_features(url, payload)
    }

    /// Accept either a bare feature array or a FeatureCollection-style
    /// object carrying a `features` array.
    fn parse_features<T: DeserializeOwned>(url: &str, payload: Value) -> Result<Vec<T>, DataError> {
        let features = match payload {
            Value::Array(_) => payload,
            Value::Object(mut map) => match map.remove("features") {
                Some(features @ Value::Array(_)) => features,
                _ => {
                    return Err(DataError::InvalidFormat {
                        url: url.to_string(),
                    })
                }
            },
            _ => {
                return Err(DataError::InvalidFormat {
                    url: url.to_string(),
                })
            }
        };

        serde_json::from_value(features).map_err(|_| DataError::InvalidFormat {
            url: url.to_string(),
        })
    }

    // ===== Cache management =====

    pub async fn get_cache_info(&self) -> Result<CacheInfo, DataError> {
        let (buildings, streets, total_size) = futures::join!(
            self.store.get::<Vec<BuildingFeature>>(BUILDINGS_CACHE_KEY),
            self.store.get::<Vec<StreetFeature>>(STREETS_CACHE_KEY),
            self.store.total_size(),
        );
        Ok(CacheInfo {
            buildings: buildings?,
            streets: streets?,
            total_size: total_size?,
        })
    }

    /// Force both resources through the network, regardless of cache age,
    /// then record the sync time.
    pub async fn refresh_cache(&self) -> Result<(), DataError> {
        let options = LoadOptions {
            max_cache_age: Duration::ZERO,
            force_refresh: true,
            prefer_offline: false,
        };
        let (buildings, streets) =
            futures::join!(self.load_buildings(&options), self.load_streets(&options));
        buildings?;
        streets?;
        self.record_sync().await;
        Ok(())
    }

    /// Best-effort advisory bookkeeping; never affects the read path.
    async fn record_sync(&self) {
        let status = SyncStatus {
            last_sync: Utc::now().timestamp_millis(),
            is_online: self.monitor.is_online(),
            pending_updates: Vec::new(),
        };
        if let Err(e) = self.store.put_sync_status(&status).await {
            debug!(error = %e, "failed to record sync status");
        }
    }

    pub async fn sync_status(&self) -> Result<Option<SyncStatus>, DataError> {
        Ok(self.store.get_sync_status().await?)
    }

    pub async fn clear_cache(&self) -> Result<(), DataError> {
        Ok(self.store.clear().await?)
    }

    /// Whether each resource has a copy fresh enough to serve offline,
    /// judged against the configured max cache age.
    pub async fn is_data_available_offline(&self) -> Result<OfflineAvailability, DataError> {
        let max_age = self.config.max_cache_age();
        let (buildings, streets) = futures::join!(
            self.store.is_fresh(BUILDINGS_CACHE_KEY, max_age),
            self.store.is_fresh(STREETS_CACHE_KEY, max_age),
        );
        Ok(OfflineAvailability {
            buildings: buildings?,
            streets: streets?,
        })
    }
}
