// ============================================================================
// StudioDb - Embedded Database (redb)
// ============================================================================
// Local durable state for the studio: the remembered API key and the
// discovery cache. Default path: ~/.heygen-studio/studio.redb
// (override via HEYGEN_STUDIO_DB_PATH or StudioConfig::db_path).
// ============================================================================

pub mod types;

pub use types::{CacheRecord, DbStats};

use anyhow::{anyhow, Result};
use redb::{Database, ReadableTableMetadata, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::library::CacheEntry;
use crate::types::LibraryAsset;
use crate::vault::CredentialSlot;

// Table definitions
const CREDENTIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("credentials");
const LIBRARY_CACHE: TableDefinition<&str, &[u8]> = TableDefinition::new("library_cache");

const API_KEY_SLOT: &str = "credential:api_key";

/// Embedded database for the studio
pub struct StudioDb {
    db: Database,
    path: PathBuf,
}

impl StudioDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses HEYGEN_STUDIO_DB_PATH or ~/.heygen-studio/studio.redb
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_db_path()?,
        };

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow!("Failed to create database directory: {}", e))?;
        }

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(CREDENTIALS)
                .map_err(|e| anyhow!("Failed to create credentials table: {}", e))?;
            let _ = write_txn
                .open_table(LIBRARY_CACHE)
                .map_err(|e| anyhow!("Failed to create library cache table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        debug!("Database ready");

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Credential Slot
    // ========================================================================

    pub fn load_api_key(&self) -> Result<Option<String>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(CREDENTIALS)
            .map_err(|e| anyhow!("Failed to open credentials table: {}", e))?;

        match table.get(API_KEY_SLOT).map_err(|e| anyhow!("Failed to read credential: {}", e))? {
            Some(value) => {
                let key = String::from_utf8(value.value().to_vec())
                    .map_err(|e| anyhow!("Stored credential is not UTF-8: {}", e))?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }

    pub fn store_api_key(&self, key: &str) -> Result<()> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(CREDENTIALS)
                .map_err(|e| anyhow!("Failed to open credentials table: {}", e))?;
            table.insert(API_KEY_SLOT, key.as_bytes())
                .map_err(|e| anyhow!("Failed to store credential: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored remembered API key");
        Ok(())
    }

    pub fn delete_api_key(&self) -> Result<bool> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn.open_table(CREDENTIALS)
                .map_err(|e| anyhow!("Failed to open credentials table: {}", e))?;
            removed = table.remove(API_KEY_SLOT)
                .map_err(|e| anyhow!("Failed to remove credential: {}", e))?
                .is_some();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            debug!("Removed remembered API key");
        }
        Ok(removed)
    }

    // ========================================================================
    // Library Cache
    // ========================================================================

    pub fn store_library(&self, key: &str, entry: &CacheEntry<Vec<LibraryAsset>>) -> Result<()> {
        let record = CacheRecord::from(entry);
        let value = bincode::serialize(&record)
            .map_err(|e| anyhow!("Failed to serialize cache entry: {}", e))?;
        let db_key = format!("library:{}", key);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(LIBRARY_CACHE)
                .map_err(|e| anyhow!("Failed to open library cache table: {}", e))?;
            table.insert(db_key.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert cache entry: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored library cache for {} ({} assets)", key, entry.payload.len());
        Ok(())
    }

    pub fn get_library(&self, key: &str) -> Result<Option<CacheEntry<Vec<LibraryAsset>>>> {
        let db_key = format!("library:{}", key);

        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(LIBRARY_CACHE)
            .map_err(|e| anyhow!("Failed to open library cache table: {}", e))?;

        match table.get(db_key.as_str()).map_err(|e| anyhow!("Failed to get cache entry: {}", e))? {
            Some(value) => {
                let record: CacheRecord = bincode::deserialize(value.value())
                    .map_err(|e| anyhow!("Failed to deserialize cache entry: {}", e))?;
                Ok(Some(record.into()))
            }
            None => Ok(None),
        }
    }

    /// Drop every cached library. Returns the number of entries removed.
    pub fn clear_library_cache(&self) -> Result<usize> {
        let removed = self.remove_libraries_where(|_: &str| true)?;
        if removed > 0 {
            info!("Cleared {} cached libraries", removed);
        }
        Ok(removed)
    }

    /// Drop `key` and every variant stored as `key|...`
    pub fn delete_library_family(&self, key: &str) -> Result<usize> {
        let exact = format!("library:{}", key);
        let variants = format!("{}|", exact);
        self.remove_libraries_where(|k: &str| k == exact || k.starts_with(&variants))
    }

    fn remove_libraries_where<F>(&self, matches: F) -> Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        let keys: Vec<String> = {
            let read_txn = self.db.begin_read()
                .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
            let table = read_txn.open_table(LIBRARY_CACHE)
                .map_err(|e| anyhow!("Failed to open library cache table: {}", e))?;
            let iter = table.range::<&str>(..)
                .map_err(|e| anyhow!("Failed to iterate cache: {}", e))?;
            let mut keys = Vec::new();
            for entry in iter {
                let (key, _value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
                if matches(key.value()) {
                    keys.push(key.value().to_string());
                }
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(LIBRARY_CACHE)
                .map_err(|e| anyhow!("Failed to open library cache table: {}", e))?;
            for key in &keys {
                table.remove(key.as_str())
                    .map_err(|e| anyhow!("Failed to remove cache entry: {}", e))?;
            }
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        Ok(keys.len())
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> Result<DbStats> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let credentials = read_txn.open_table(CREDENTIALS)
            .map_err(|e| anyhow!("Failed to open credentials table: {}", e))?;
        let cache = read_txn.open_table(LIBRARY_CACHE)
            .map_err(|e| anyhow!("Failed to open library cache table: {}", e))?;

        let has_api_key = credentials
            .get(API_KEY_SLOT)
            .map_err(|e| anyhow!("Failed to read credential: {}", e))?
            .is_some();
        let cached_libraries = cache
            .len()
            .map_err(|e| anyhow!("Failed to count cache entries: {}", e))? as usize;

        Ok(DbStats {
            has_api_key,
            cached_libraries,
        })
    }
}

impl CredentialSlot for StudioDb {
    fn load(&self) -> Result<Option<String>> {
        self.load_api_key()
    }

    fn save(&self, value: &str) -> Result<()> {
        self.store_api_key(value)
    }

    fn remove(&self) -> Result<()> {
        self.delete_api_key().map(|_| ())
    }
}

fn default_db_path() -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var("HEYGEN_STUDIO_DB_PATH") {
        return Ok(PathBuf::from(env_path));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".heygen-studio").join("studio.redb"))
}
