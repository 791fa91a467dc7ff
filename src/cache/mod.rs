//! Local caching module for offline data access.
//!
//! This module provides the `CacheStore` for persisting fetched GeoJSON
//! resources locally. Each resource is one versioned `CacheEntry` written
//! atomically, so the map keeps working without a network connection once
//! a copy has been stored.

pub mod store;

pub use store::{CacheEntry, CacheStore, StorageError, SyncStatus};
