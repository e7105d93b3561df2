//! ============================================================================
//! Database Types - Serializable records for redb storage
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::library::CacheEntry;
use crate::types::LibraryAsset;

/// Stored form of a cached discovery result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub captured_at: i64,
    pub assets: Vec<LibraryAsset>,
}

impl From<&CacheEntry<Vec<LibraryAsset>>> for CacheRecord {
    fn from(entry: &CacheEntry<Vec<LibraryAsset>>) -> Self {
        Self {
            captured_at: entry.captured_at,
            assets: entry.payload.clone(),
        }
    }
}

impl From<CacheRecord> for CacheEntry<Vec<LibraryAsset>> {
    fn from(record: CacheRecord) -> Self {
        CacheEntry::captured_at(record.assets, record.captured_at)
    }
}

/// Summary of local state, for `heygen-studio whoami`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub has_api_key: bool,
    pub cached_libraries: usize,
}
