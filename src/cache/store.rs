//! Durable versioned cache storage.
//!
//! Each resource is persisted as one JSON file holding a [`CacheEntry`]
//! envelope. Writes go through a temp file plus rename so concurrent
//! readers never observe a partial entry. A separate advisory
//! [`SyncStatus`] record lives next to the entries, outside their store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::debug;

/// Subdirectory holding resource entries; the sync-status record lives
/// outside it so `clear`/`list_ids` never touch it.
const ENTRIES_DIR: &str = "entries";

/// File name of the single advisory sync record.
const SYNC_STATUS_FILE: &str = "sync_status.json";

/// A persisted copy of one resource.
///
/// `timestamp` is epoch milliseconds of the last successful network fetch;
/// it is never bumped on reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub id: String,
    pub data: T,
    pub timestamp: i64,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Advisory bookkeeping record, single row keyed "main". Not consulted by
/// the read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_sync: i64,
    pub is_online: bool,
    pub pending_updates: Vec<String>,
}

/// Minimal view of an entry used for freshness checks without
/// deserializing the payload.
#[derive(Deserialize)]
struct EntryMeta {
    timestamp: i64,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cache {op} failed for {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache {op} found invalid entry at {path}: {source}")]
    Corrupt {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid cache id {id:?}")]
    InvalidId { id: String },
}

impl StorageError {
    fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(op: &'static str, path: &Path, source: serde_json::Error) -> Self {
        Self::Corrupt {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Durable key-value store for cached resources.
///
/// Directory setup is lazy: the first operation creates the layout, later
/// operations reuse it.
pub struct CacheStore {
    dir: PathBuf,
    init: OnceCell<()>,
}

impl CacheStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            init: OnceCell::new(),
        }
    }

    async fn ensure_init(&self) -> Result<(), StorageError> {
        self.init
            .get_or_try_init(|| async {
                let entries = self.entries_dir();
                fs::create_dir_all(&entries)
                    .await
                    .map_err(|e| StorageError::io("init", &entries, e))
            })
            .await?;
        Ok(())
    }

    fn entries_dir(&self) -> PathBuf {
        self.dir.join(ENTRIES_DIR)
    }

    fn entry_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidId { id: id.to_string() });
        }
        Ok(self.entries_dir().join(format!("{}.json", id)))
    }

    /// Atomically replace the file at `path` with `contents`.
    ///
    /// The temp name is unique per write so concurrent writers to the same
    /// key race only on the final rename; the last rename committed wins.
    async fn write_atomic(
        op: &'static str,
        path: &Path,
        contents: String,
    ) -> Result<(), StorageError> {
        static WRITE_SEQ: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let seq = WRITE_SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp{}", seq));
        fs::write(&tmp, contents)
            .await
            .map_err(|e| StorageError::io(op, &tmp, e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| StorageError::io(op, path, e))
    }

    /// Upsert the entry for `id`, overwriting any prior entry wholesale.
    /// The entry timestamp is the moment of this write.
    pub async fn put<T: Serialize>(
        &self,
        id: &str,
        data: &T,
        version: &str,
        etag: Option<String>,
    ) -> Result<(), StorageError> {
        self.ensure_init().await?;
        let path = self.entry_path(id)?;

        let entry = CacheEntry {
            id: id.to_string(),
            data,
            timestamp: Utc::now().timestamp_millis(),
            version: version.to_string(),
            etag,
        };
        let contents = serde_json::to_string(&entry)
            .map_err(|e| StorageError::corrupt("put", &path, e))?;

        Self::write_atomic("put", &path, contents).await?;
        debug!(id, version, "cache entry written");
        Ok(())
    }

    /// Fetch the entry for `id`. Absence is `Ok(None)`, never an error.
    pub async fn get<T: DeserializeOwned>(
        &self,
        id: &str,
    ) -> Result<Option<CacheEntry<T>>, StorageError> {
        self.ensure_init().await?;
        let path = self.entry_path(id)?;

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io("get", &path, e)),
        };

        let entry = serde_json::from_str(&contents)
            .map_err(|e| StorageError::corrupt("get", &path, e))?;
        Ok(Some(entry))
    }

    pub async fn list_ids(&self) -> Result<Vec<String>, StorageError> {
        self.ensure_init().await?;
        let dir = self.entries_dir();

        let mut ids = Vec::new();
        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::io("list", &dir, e))?;
        while let Some(dirent) = read_dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io("list", &dir, e))?
        {
            let name = dirent.file_name();
            if let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// True iff an entry exists and was written less than `max_age` ago.
    pub async fn is_fresh(&self, id: &str, max_age: Duration) -> Result<bool, StorageError> {
        self.ensure_init().await?;
        let path = self.entry_path(id)?;

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StorageError::io("is_fresh", &path, e)),
        };
        let meta: EntryMeta = serde_json::from_str(&contents)
            .map_err(|e| StorageError::corrupt("is_fresh", &path, e))?;

        let age_ms = Utc::now().timestamp_millis() - meta.timestamp;
        Ok(age_ms < max_age.as_millis() as i64)
    }

    /// Remove all resource entries. The advisory sync record is untouched.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.ensure_init().await?;
        let dir = self.entries_dir();

        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::io("clear", &dir, e))?;
        while let Some(dirent) = read_dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io("clear", &dir, e))?
        {
            let path = dirent.path();
            fs::remove_file(&path)
                .await
                .map_err(|e| StorageError::io("clear", &path, e))?;
        }
        debug!("cache cleared");
        Ok(())
    }

    /// Sum of serialized entry sizes in bytes, by full traversal.
    pub async fn total_size(&self) -> Result<u64, StorageError> {
        self.ensure_init().await?;
        let dir = self.entries_dir();

        let mut total = 0u64;
        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::io("total_size", &dir, e))?;
        while let Some(dirent) = read_dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io("total_size", &dir, e))?
        {
            let metadata = dirent
                .metadata()
                .await
                .map_err(|e| StorageError::io("total_size", &dirent.path(), e))?;
            total += metadata.len();
        }
        Ok(total)
    }

    pub async fn put_sync_status(&self, status: &SyncStatus) -> Result<(), StorageError> {
        self.ensure_init().await?;
        let path = self.dir.join(SYNC_STATUS_FILE);
        let contents = serde_json::to_string(status)
            .map_err(|e| StorageError::corrupt("put_sync_status", &path, e))?;
        Self::write_atomic("put_sync_status", &path, contents).await
    }

    pub async fn get_sync_status(&self) -> Result<Option<SyncStatus>, StorageError> {
        self.ensure_init().await?;
        let path = self.dir.join(SYNC_STATUS_FILE);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io("get_sync_status", &path, e)),
        };
        let status = serde_json::from_str(&contents)
            .map_err(|e| StorageError::corrupt("get_sync_status", &path, e))?;
        Ok(Some(status))
    }
}
