//! ============================================================================
//! Library Aggregator - Discovery of usable visual assets
//! ============================================================================
//! CHECK_CACHE -> FETCHING -> NORMALIZING -> DEDUPING -> PRIORITIZING -> CACHING
//!
//! The listing calls run concurrently and all of them settle before merging;
//! a failed source contributes nothing. Only a failed detail fetch for the
//! requested target group degrades the whole discovery.
//! ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use futures_util::future::join5;

use super::cache::LibraryCache;
use super::fields::{
    group_ids, normalize_records, SourceShape, ASSET_SHAPE, AVATAR_SHAPE, GROUP_LOOK_SHAPE,
    TALKING_PHOTO_SHAPE,
};
use crate::client::HeyGenClient;
use crate::config::{StudioConfig, DEFAULT_MAX_ASSETS};
use crate::types::{ClientError, LibraryAsset};

/// Cache key for discoveries without a target group
pub const UNTARGETED_KEY: &str = "*";

/// Knobs for one discovery
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Specific asset the operator expects to find
    pub target_asset_id: Option<String>,
    /// Enumerate every avatar group and fetch each group's looks
    pub enumerate_groups: bool,
    /// Skip the cache lookup
    pub force_refresh: bool,
    pub priority_keywords: Vec<String>,
    pub max_assets: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            target_asset_id: None,
            enumerate_groups: false,
            force_refresh: false,
            priority_keywords: Vec::new(),
            max_assets: DEFAULT_MAX_ASSETS,
        }
    }
}

impl DiscoveryOptions {
    pub fn from_config(config: &StudioConfig) -> Self {
        Self {
            priority_keywords: config.priority_keywords.clone(),
            max_assets: config.max_library_assets,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DiscoveryStatus {
    Complete,
    /// Some sources failed and contributed nothing
    Partial { failed_sources: Vec<String> },
    /// The target group's looks could not be loaded
    TargetGroupUnavailable { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryOutcome {
    pub assets: Vec<LibraryAsset>,
    pub status: DiscoveryStatus,
    pub from_cache: bool,
}

/// One listing source's result after the fan-out settles
struct SourceResult {
    name: &'static str,
    assets: Result<Vec<LibraryAsset>, ClientError>,
}

impl SourceResult {
    fn from_body(name: &'static str, shape: &SourceShape, body: Result<Value, ClientError>) -> Self {
        Self {
            name,
            assets: body.map(|b| normalize_records(shape, &b, None)),
        }
    }
}

pub struct LibraryAggregator {
    client: Arc<HeyGenClient>,
    cache: LibraryCache,
}

impl LibraryAggregator {
    pub fn new(client: Arc<HeyGenClient>, cache: LibraryCache) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &LibraryCache {
        &self.cache
    }

    /// Discover assets for `target_group`, served from cache while fresh
    pub async fn discover(
        &self,
        target_group: Option<&str>,
        options: &DiscoveryOptions,
    ) -> Result<DiscoveryOutcome, ClientError> {
        let key = cache_key(target_group, options);

        if !options.force_refresh {
            if let Some(entry) = self.cache.get_fresh(&key).await {
                info!("Library {} served from cache ({} assets)", key, entry.payload.len());
                return Ok(DiscoveryOutcome {
                    assets: entry.payload,
                    status: DiscoveryStatus::Complete,
                    from_cache: true,
                });
            }
        }

        if !self.client.vault().is_unlocked() {
            return Err(ClientError::AuthenticationMissing);
        }

        info!("Discovering library {} (all groups: {})", key, options.enumerate_groups);

        let client = &self.client;
        let (avatars, photos, assets, target, groups) = join5(
            async { SourceResult::from_body("avatars", &AVATAR_SHAPE, client.list_avatars().await) },
            async {
                SourceResult::from_body(
                    "talking_photos",
                    &TALKING_PHOTO_SHAPE,
                    client.list_legacy_talking_photos().await,
                )
            },
            async { SourceResult::from_body("assets", &ASSET_SHAPE, client.list_assets().await) },
            async {
                match target_group {
                    Some(group) => Some(self.group_looks(group).await),
                    None => None,
                }
            },
            async {
                if options.enumerate_groups {
                    Some(SourceResult {
                        name: "groups",
                        assets: self.enumerate_groups(target_group).await,
                    })
                } else {
                    None
                }
            },
        )
        .await;

        // A 401 during the fan-out locks the vault
        if !self.client.vault().is_unlocked() {
            return Err(ClientError::AuthenticationMissing);
        }

        let mut target_looks = Vec::new();
        if let Some(result) = target {
            match result {
                Ok(looks) => target_looks = looks,
                Err(e) => {
                    let group = target_group.unwrap_or(UNTARGETED_KEY);
                    warn!("Target group {} unavailable: {}", group, e);
                    return Ok(DiscoveryOutcome {
                        assets: Vec::new(),
                        status: DiscoveryStatus::TargetGroupUnavailable {
                            message: format!("Could not load looks for group {}: {}", group, e),
                        },
                        from_cache: false,
                    });
                }
            }
        }

        // Combination order decides which duplicate survives
        let mut combined = target_looks;
        let mut failed_sources = Vec::new();
        for source in groups.into_iter().chain([avatars, photos, assets]) {
            match source.assets {
                Ok(found) => {
                    debug!("Source {} contributed {} records", source.name, found.len());
                    combined.extend(found);
                }
                Err(e) => {
                    warn!("Source {} failed: {}", source.name, e);
                    failed_sources.push(source.name.to_string());
                }
            }
        }

        let mut targets: Vec<&str> = Vec::new();
        targets.extend(target_group);
        targets.extend(options.target_asset_id.as_deref());

        let merged = prioritize(
            dedupe(combined),
            &targets,
            &options.priority_keywords,
            options.max_assets,
        );

        // Only complete results are cached; a partial one is retried next time
        let status = if failed_sources.is_empty() {
            self.cache.store(&key, merged.clone()).await;
            DiscoveryStatus::Complete
        } else {
            DiscoveryStatus::Partial { failed_sources }
        };
        info!("Discovered {} assets for {} ({:?})", merged.len(), key, status);

        Ok(DiscoveryOutcome {
            assets: merged,
            status,
            from_cache: false,
        })
    }

    /// Looks of one group, tagged with its id
    async fn group_looks(&self, group_id: &str) -> Result<Vec<LibraryAsset>, ClientError> {
        let body = self.client.get_group_detail(group_id).await?;
        Ok(normalize_records(&GROUP_LOOK_SHAPE, &body, Some(group_id)))
    }

    /// Every group's looks, one detail call at a time. Only the group list
    /// itself can fail; a failed detail call is skipped.
    async fn enumerate_groups(&self, skip: Option<&str>) -> Result<Vec<LibraryAsset>, ClientError> {
        let list = self.client.list_avatar_groups().await?;
        let ids = group_ids(&list);
        debug!("Enumerating {} avatar groups", ids.len());

        let mut looks = Vec::new();
        for id in ids.iter().filter(|id| Some(id.as_str()) != skip) {
            match self.group_looks(id).await {
                Ok(found) => looks.extend(found),
                Err(e) => debug!("Skipping group {}: {}", id, e),
            }
        }
        Ok(looks)
    }

    pub async fn invalidate(&self, target_group: Option<&str>) {
        self.cache.invalidate(target_group.unwrap_or(UNTARGETED_KEY)).await;
    }

    pub async fn invalidate_all(&self) -> usize {
        self.cache.invalidate_all().await
    }
}

/// Cache key: the target group (or `*`), plus a `|...` suffix for each
/// option that changes the result set
fn cache_key(target_group: Option<&str>, options: &DiscoveryOptions) -> String {
    let mut key = target_group.unwrap_or(UNTARGETED_KEY).to_string();
    if options.enumerate_groups {
        key.push_str("|all-groups");
    }
    if let Some(asset) = &options.target_asset_id {
        key.push_str("|target=");
        key.push_str(asset);
    }
    key
}

/// Keep the first occurrence of each asset id
pub fn dedupe(assets: Vec<LibraryAsset>) -> Vec<LibraryAsset> {
    let mut seen = HashSet::new();
    assets
        .into_iter()
        .filter(|a| seen.insert(a.asset_id.clone()))
        .collect()
}

/// Tag priority targets, then stable-sort priority, non-stock, stock and
/// truncate to `max`.
pub fn prioritize(
    assets: Vec<LibraryAsset>,
    targets: &[&str],
    keywords: &[String],
    max: usize,
) -> Vec<LibraryAsset> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let mut tagged: Vec<LibraryAsset> = assets
        .into_iter()
        .map(|mut asset| {
            let name = asset.display_name.to_lowercase();
            asset.is_priority_target = asset.is_priority_target
                || targets.iter().any(|t| {
                    asset.asset_id == *t || asset.group_id.as_deref() == Some(*t)
                })
                || keywords.iter().any(|k| name.contains(k.as_str()));
            asset
        })
        .collect();

    tagged.sort_by_key(|a| match (a.is_priority_target, a.is_stock) {
        (true, _) => 0u8,
        (false, false) => 1,
        (false, true) => 2,
    });
    tagged.truncate(max);
    tagged
}
