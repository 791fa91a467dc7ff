//! Offline-first data layer for the MapaSur building map.
//!
//! This crate implements the synchronization core that decides, for each of
//! the two map datasets (buildings and streets), whether to serve a persisted
//! copy, fetch fresh data, or blend both:
//!
//! - [`connectivity::ConnectivityMonitor`]: connectivity state and
//!   network-quality signals, fed by an injectable source.
//! - [`cache::CacheStore`]: durable versioned key-value storage for cached
//!   resources.
//! - [`sync::OfflineDataService`]: the fetch-with-cache orchestrator applying
//!   a stale-while-revalidate policy.
//! - [`loader::DataLoader`]: loads both resources concurrently and schedules
//!   single-flight background refreshes when connectivity allows.
//!
//! Map rendering, geolocation, and search live in the consuming application;
//! this crate only produces data plus freshness metadata.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod loader;
pub mod models;
pub mod sync;

pub use cache::{CacheEntry, CacheStore, StorageError, SyncStatus};
pub use config::Config;
pub use connectivity::{
    ConnectionStatus, ConnectivityMonitor, ConnectivitySource, NetworkQuality,
    PushConnectivitySource,
};
pub use loader::{DataLoader, ResourceState};
pub use models::{BuildingFeature, StreetFeature};
pub use sync::{DataError, LoadOptions, LoadResult, OfflineDataService};
