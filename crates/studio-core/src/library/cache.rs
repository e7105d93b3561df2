//! ============================================================================
//! Library Cache - Discovery results with a time-to-live
//! ============================================================================
//! In-memory map keyed by target group, mirrored into redb when a database
//! is attached so a restart inside the TTL still avoids the fan-out.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::db::StudioDb;
use crate::types::LibraryAsset;

/// Maximum number of in-memory entries before the oldest is evicted
const MAX_CACHE_SIZE: usize = 256;

/// Payload plus capture time (unix millis)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub captured_at: i64,
}

impl<T> CacheEntry<T> {
    /// Entry captured now
    pub fn new(payload: T) -> Self {
        Self::captured_at(payload, chrono::Utc::now().timestamp_millis())
    }

    pub fn captured_at(payload: T, captured_at: i64) -> Self {
        Self { payload, captured_at }
    }

    /// Valid while `now - captured_at < ttl`
    pub fn is_fresh_at(&self, now_ms: i64, ttl_secs: i64) -> bool {
        now_ms - self.captured_at < ttl_secs.saturating_mul(1000)
    }

    pub fn is_fresh(&self, ttl_secs: i64) -> bool {
        self.is_fresh_at(chrono::Utc::now().timestamp_millis(), ttl_secs)
    }

    fn age_secs(&self) -> i64 {
        (chrono::Utc::now().timestamp_millis() - self.captured_at) / 1000
    }
}

pub type LibraryEntry = CacheEntry<Vec<LibraryAsset>>;

/// TTL cache of discovery results
pub struct LibraryCache {
    entries: RwLock<HashMap<String, LibraryEntry>>,
    ttl_secs: i64,
    db: Option<Arc<StudioDb>>,
}

impl LibraryCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_secs,
            db: None,
        }
    }

    /// Mirror entries into (and read misses from) the database
    pub fn with_db(mut self, db: Arc<StudioDb>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Fresh entry for `key`, from memory first, then the database
    pub async fn get_fresh(&self, key: &str) -> Option<LibraryEntry> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.is_fresh(self.ttl_secs) {
                    debug!("Cache hit for library {} (age: {}s)", key, entry.age_secs());
                    return Some(entry.clone());
                }
            }
        }

        let db = self.db.as_ref()?;
        let stored = match db.get_library(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read cached library {}: {}", key, e);
                return None;
            }
        };

        if !stored.is_fresh(self.ttl_secs) {
            debug!("Stored library {} expired (age: {}s)", key, stored.age_secs());
            return None;
        }

        debug!("Cache hit for library {} from database", key);
        self.insert_memory(key, stored.clone()).await;
        Some(stored)
    }

    /// Cache `assets` under `key`, captured now
    pub async fn store(&self, key: &str, assets: Vec<LibraryAsset>) -> LibraryEntry {
        let entry = CacheEntry::new(assets);
        self.insert(key, entry.clone()).await;
        entry
    }

    pub async fn insert(&self, key: &str, entry: LibraryEntry) {
        if let Some(db) = &self.db {
            if let Err(e) = db.store_library(key, &entry) {
                warn!("Failed to persist library {}: {}", key, e);
            }
        }
        self.insert_memory(key, entry).await;
    }

    async fn insert_memory(&self, key: &str, entry: LibraryEntry) {
        let mut entries = self.entries.write().await;
        if entries.len() >= MAX_CACHE_SIZE && !entries.contains_key(key) {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, v)| v.captured_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest_key);
            }
        }
        entries.insert(key.to_string(), entry);
    }

    /// Drop the entry for `key` and its `key|...` variants
    pub async fn invalidate(&self, key: &str) {
        let variants = format!("{}|", key);
        let removed = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|k, _| k != key && !k.starts_with(&variants));
            before - entries.len()
        };
        let removed_stored = match &self.db {
            Some(db) => db.delete_library_family(key).unwrap_or_else(|e| {
                warn!("Failed to delete cached library {}: {}", key, e);
                0
            }),
            None => 0,
        };
        if removed > 0 || removed_stored > 0 {
            info!("Invalidated library cache for {}", key);
        }
    }

    /// Drop every entry, returning how many were held in memory
    pub async fn invalidate_all(&self) -> usize {
        let count = {
            let mut entries = self.entries.write().await;
            let count = entries.len();
            entries.clear();
            count
        };
        if let Some(db) = &self.db {
            if let Err(e) = db.clear_library_cache() {
                warn!("Failed to clear stored library cache: {}", e);
            }
        }
        info!("Cleared {} cached libraries", count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::temp_db_path;
    use crate::types::SourceKind;

    fn asset(id: &str) -> LibraryAsset {
        LibraryAsset {
            asset_id: id.to_string(),
            display_name: id.to_string(),
            preview_image_url: None,
            is_stock: false,
            is_priority_target: false,
            group_id: None,
            source: SourceKind::Asset,
        }
    }

    #[test]
    fn test_freshness_boundary() {
        let entry = CacheEntry::captured_at((), 1_000_000);
        assert!(entry.is_fresh_at(1_000_000, 1800));
        assert!(entry.is_fresh_at(1_000_000 + 1_799_999, 1800));
        assert!(!entry.is_fresh_at(1_000_000 + 1_800_000, 1800));
    }

    #[tokio::test]
    async fn test_store_and_expire() {
        let cache = LibraryCache::new(1800);
        cache.store("g1", vec![asset("a")]).await;
        assert_eq!(cache.get_fresh("g1").await.unwrap().payload[0].asset_id, "a");

        let stale = CacheEntry::captured_at(vec![asset("b")], 0);
        cache.insert("g2", stale).await;
        assert!(cache.get_fresh("g2").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = LibraryCache::new(1800);
        cache.store("g1", vec![asset("a")]).await;
        cache.store("g1|all-groups", vec![asset("a")]).await;
        cache.store("g2", vec![asset("b")]).await;

        cache.invalidate("g1").await;
        assert!(cache.get_fresh("g1").await.is_none());
        assert!(cache.get_fresh("g1|all-groups").await.is_none());
        assert!(cache.get_fresh("g2").await.is_some());
        assert_eq!(cache.invalidate_all().await, 1);
        assert!(cache.get_fresh("g2").await.is_none());
    }

    #[tokio::test]
    async fn test_database_mirror_survives_new_cache() {
        let path = temp_db_path();
        let db = Arc::new(StudioDb::open(Some(&path)).unwrap());

        LibraryCache::new(1800)
            .with_db(db.clone())
            .store("g1", vec![asset("a"), asset("b")])
            .await;

        let fresh = LibraryCache::new(1800).with_db(db.clone());
        let entry = fresh.get_fresh("g1").await.unwrap();
        assert_eq!(entry.payload.len(), 2);

        fresh.invalidate("g1").await;
        assert!(db.get_library("g1").unwrap().is_none());

        drop(fresh);
        drop(db);
        let _ = std::fs::remove_file(path);
    }
}
