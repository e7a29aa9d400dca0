//! Content-addressed analysis cache using moka
//!
//! A bounded in-memory layer in front of an optional durable [`DiskStore`].
//! Lookups check memory first, then disk (repopulating memory on a hit);
//! stores are write-through. Storage failures degrade to a miss with a
//! warning rather than failing the caller.

use crate::fingerprint::Fingerprint;
use crate::store::{CacheEntry, DiskStore};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Entries resident in the memory layer
    pub memory_entries: u64,
    /// Entries on disk, if a disk store is attached
    pub disk_entries: Option<u64>,
}

/// Content-addressed analysis result cache
///
/// Keyed by [`Fingerprint`], so identical page content under an identical
/// analysis method never pays for a second provider call. There is no
/// single-flight de-duplication: two concurrent misses on the same key may
/// both compute, and the last store wins. That is acceptable because a
/// result is deterministic given its fingerprint.
#[derive(Debug, Clone)]
pub struct AnalysisCache<V: Send + Sync + 'static> {
    memory: Cache<Fingerprint, Arc<CacheEntry<V>>>,
    disk: Option<Arc<DiskStore>>,
}

impl<V> AnalysisCache<V>
where
    V: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a memory-only cache with the given capacity
    #[inline]
    #[must_use]
    pub fn in_memory(max_capacity: u64) -> Self {
        Self {
            memory: Cache::new(max_capacity),
            disk: None,
        }
    }

    /// Create a cache backed by a disk store at `dir`
    ///
    /// If the directory cannot be opened the cache runs memory-only, with a
    /// warning: persistence is an optimization, never a requirement.
    #[must_use]
    pub fn persistent(max_capacity: u64, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let disk = match DiskStore::open(&dir) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cache store unavailable, running memory-only");
                None
            }
        };
        Self {
            memory: Cache::new(max_capacity),
            disk,
        }
    }

    /// Whether a disk store is attached
    #[inline]
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.disk.is_some()
    }

    /// Look up a cached result by fingerprint
    ///
    /// Never blocks on a pending computation for the same key; a miss is
    /// simply `None`.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<CacheEntry<V>>> {
        if let Some(entry) = self.memory.get(fingerprint).await {
            return Some(entry);
        }

        let disk = self.disk.as_ref()?;
        match disk.lookup::<V>(fingerprint).await {
            Ok(Some(entry)) => {
                let entry = Arc::new(entry);
                self.memory.insert(*fingerprint, Arc::clone(&entry)).await;
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(fingerprint = %fingerprint.short(), error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Store a result under its fingerprint
    ///
    /// Replaces any existing entry; from the caller's perspective the
    /// replacement is atomic.
    pub async fn store(&self, fingerprint: Fingerprint, result: V) {
        let entry = Arc::new(CacheEntry::new(result));
        self.memory.insert(fingerprint, Arc::clone(&entry)).await;

        if let Some(disk) = &self.disk {
            if let Err(e) = disk.store(&fingerprint, &entry).await {
                tracing::warn!(fingerprint = %fingerprint.short(), error = %e, "cache write failed, entry not persisted");
            }
        }
    }

    /// Check whether an entry exists for the fingerprint
    #[inline]
    #[must_use]
    pub async fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.lookup(fingerprint).await.is_some()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.memory.run_pending_tasks().await;
        let disk_entries = match &self.disk {
            Some(disk) => disk.entry_count().await.ok().map(|n| n as u64),
            None => None,
        };
        CacheStats {
            memory_entries: self.memory.entry_count(),
            disk_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::MethodVersion;

    fn fp(content: &[u8]) -> Fingerprint {
        Fingerprint::compute(content, &MethodVersion::new("test", "v1"))
    }

    #[test]
    fn cache_handle_is_debuggable_and_cloneable() {
        let cache: AnalysisCache<String> = AnalysisCache::in_memory(8);
        let clone = cache.clone();
        assert!(format!("{clone:?}").contains("AnalysisCache"));
    }

    #[tokio::test]
    async fn memory_cache_store_and_lookup() {
        let cache: AnalysisCache<String> = AnalysisCache::in_memory(100);
        let key = fp(b"page");

        assert!(cache.lookup(&key).await.is_none());
        cache.store(key, "result".to_string()).await;

        let entry = cache.lookup(&key).await.unwrap();
        assert_eq!(entry.result, "result");
    }

    #[tokio::test]
    async fn persistent_cache_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let key = fp(b"page");

        {
            let cache: AnalysisCache<String> = AnalysisCache::persistent(100, dir.path());
            cache.store(key, "durable".to_string()).await;
        }

        // Fresh instance, cold memory layer: must come from disk.
        let cache: AnalysisCache<String> = AnalysisCache::persistent(100, dir.path());
        let entry = cache.lookup(&key).await.unwrap();
        assert_eq!(entry.result, "durable");
    }

    #[tokio::test]
    async fn corrupt_disk_entry_degrades_to_miss() {
        let dir = tempfile::tempdir().unwrap();
        let key = fp(b"page");
        tokio::fs::write(dir.path().join(format!("{key}.json")), b"garbage")
            .await
            .unwrap();

        let cache: AnalysisCache<String> = AnalysisCache::persistent(100, dir.path());
        assert!(cache.lookup(&key).await.is_none());
    }

    #[tokio::test]
    async fn store_overwrites() {
        let cache: AnalysisCache<u32> = AnalysisCache::in_memory(100);
        let key = fp(b"page");

        cache.store(key, 1).await;
        cache.store(key, 2).await;

        assert_eq!(cache.lookup(&key).await.unwrap().result, 2);
    }

    #[tokio::test]
    async fn stats_reflect_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache: AnalysisCache<u32> = AnalysisCache::persistent(100, dir.path());

        for i in 0..3u32 {
            cache.store(fp(format!("page {i}").as_bytes()), i).await;
        }

        let stats = cache.stats().await;
        assert_eq!(stats.memory_entries, 3);
        assert_eq!(stats.disk_entries, Some(3));
    }
}
