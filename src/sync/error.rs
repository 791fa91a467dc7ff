use reqwest::StatusCode;
use thiserror::Error;

use crate::cache::StorageError;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("request for {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {url} returned status {status}")]
    Status { url: String, status: StatusCode },

    #[error("invalid data format from {url}")]
    InvalidFormat { url: String },

    #[error("no cached data available for {resource} and device is offline")]
    NoCachedDataOffline { resource: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl DataError {
    /// Network-class failures may be recovered by serving a stale cached
    /// copy. Format and storage failures never are: serving malformed data
    /// is worse than failing, and a masked storage failure would corrupt
    /// freshness accounting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Status { .. })
    }
}
