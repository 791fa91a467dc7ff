//! Offline-first synchronization.
//!
//! This module provides the `OfflineDataService`, which applies a
//! stale-while-revalidate policy per resource: serve the cache when the
//! connection is poor or the copy is fresh, hit the network when it is
//! not, and degrade to a stale copy rather than erroring whenever any
//! copy exists.

pub mod error;
pub mod service;

pub use error::DataError;
pub use service::{
    CacheInfo, LoadOptions, LoadResult, OfflineAvailability, OfflineDataService,
    BUILDINGS_CACHE_KEY, STREETS_CACHE_KEY,
};
