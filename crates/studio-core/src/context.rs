//! ============================================================================
//! Studio Context - Process-scoped services
//! ============================================================================
//! Opens the database and wires vault -> client -> aggregator. Everything
//! downstream receives explicit handles; nothing lives in a global.
//! ============================================================================

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::activity_log::ActivityLog;
use crate::client::HeyGenClient;
use crate::config::StudioConfig;
use crate::db::StudioDb;
use crate::library::{DiscoveryOptions, LibraryAggregator, LibraryCache};
use crate::vault::CredentialStore;

pub struct StudioContext {
    pub config: StudioConfig,
    pub db: Arc<StudioDb>,
    pub vault: Arc<CredentialStore>,
    pub log: ActivityLog,
    pub client: Arc<HeyGenClient>,
    pub library: LibraryAggregator,
}

impl StudioContext {
    pub fn init(config: StudioConfig) -> Result<Self> {
        let db = Arc::new(StudioDb::open(config.db_path.as_deref())?);
        let vault = Arc::new(CredentialStore::open(db.clone())?);
        if let Some(key) = &config.session_api_key {
            vault.set_session(key.expose())?;
        }
        let log = ActivityLog::new();
        let client = Arc::new(HeyGenClient::new(&config, vault.clone(), log.clone()));
        let cache = LibraryCache::new(config.cache_ttl_secs).with_db(db.clone());
        let library = LibraryAggregator::new(client.clone(), cache);

        info!(
            "Studio ready (api: {}, unlocked: {})",
            config.api_base_url,
            vault.is_unlocked()
        );

        Ok(Self {
            config,
            db,
            vault,
            log,
            client,
            library,
        })
    }

    /// Discovery options seeded from the configuration
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions::from_config(&self.config)
    }

    /// Target group from the configuration unless one is given
    pub fn target_group<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit.or(self.config.default_target_group.as_deref())
    }

    /// Tear down the services. The database closes when the last handle drops.
    pub fn shutdown(self) {
        info!(
            "Studio shutting down ({} activity entries, remembered key: {})",
            self.log.len(),
            self.vault.is_persisted()
        );
    }
}
