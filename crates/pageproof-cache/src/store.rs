//! Durable disk store for cached analysis results
//!
//! One JSON file per fingerprint under the cache directory. Writes go to a
//! temporary sibling file first and are renamed into place, so a reader can
//! only ever observe a whole entry or no entry.

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// A cache entry as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cached analysis result
    pub result: V,
    /// When the entry was written
    pub stored_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Create an entry stamped with the current time
    #[inline]
    #[must_use]
    pub fn new(result: V) -> Self {
        Self {
            result,
            stored_at: Utc::now(),
        }
    }
}

/// Disk store errors
///
/// Callers downgrade every variant to a cache miss; storage trouble must
/// never fail a batch.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Underlying I/O failure
    #[error("cache storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry file exists but cannot be decoded
    #[error("corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// File-per-fingerprint persistent store
///
/// Append-only within a method version: entries are only ever replaced
/// wholesale by an identical recomputation, never mutated in place.
#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
}

// Process-wide so stores sharing a directory never reuse a staging name.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

impl DiskStore {
    /// Open (creating if needed) a store rooted at `dir`
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Root directory of the store
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }

    /// Look up an entry by fingerprint
    ///
    /// Returns `Ok(None)` when no entry exists.
    ///
    /// # Errors
    /// Returns error if the entry exists but cannot be read or decoded
    pub async fn lookup<V>(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CacheEntry<V>>, CacheError>
    where
        V: DeserializeOwned,
    {
        let path = self.entry_path(fingerprint);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry = serde_json::from_slice(&bytes)?;
        Ok(Some(entry))
    }

    /// Store an entry, replacing any existing one atomically
    ///
    /// Concurrent writers to the same fingerprint race benignly: whichever
    /// rename lands last wins, and both wrote equivalent results.
    ///
    /// # Errors
    /// Returns error if the entry cannot be serialized or written
    pub async fn store<V>(
        &self,
        fingerprint: &Fingerprint,
        entry: &CacheEntry<V>,
    ) -> Result<(), CacheError>
    where
        V: Serialize,
    {
        let json = serde_json::to_vec_pretty(entry)?;
        let path = self.entry_path(fingerprint);
        // Unique tmp name per write, across every store in the process, so
        // concurrent writers never clobber each other's staging file.
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .dir
            .join(format!(".{}.{}.{}.tmp", fingerprint.short(), std::process::id(), seq));
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Number of entries currently on disk
    ///
    /// # Errors
    /// Returns error if the directory cannot be listed
    pub async fn entry_count(&self) -> Result<usize, CacheError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}
