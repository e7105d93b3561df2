//! ============================================================================
//! Studio Configuration
//! ============================================================================
//! Endpoint and discovery settings, read from the environment (the binary
//! loads `.env` through dotenvy first). Every value has a working default.
//! ============================================================================

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::Credential;

pub const DEFAULT_API_BASE: &str = "https://api.heygen.com";
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.heygen.com/v1/asset";

/// Discovery cache lifetime (30 minutes)
pub const DEFAULT_CACHE_TTL_SECS: i64 = 30 * 60;

/// Maximum assets returned by a discovery
pub const DEFAULT_MAX_ASSETS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Base URL of the JSON API
    pub api_base_url: String,
    /// Binary upload endpoint
    pub upload_url: String,
    /// redb file; None means the default location
    pub db_path: Option<PathBuf>,
    pub cache_ttl_secs: i64,
    pub max_library_assets: usize,
    /// Case-insensitive name fragments that mark a priority target
    pub priority_keywords: Vec<String>,
    /// Group discovered when none is given explicitly
    pub default_target_group: Option<String>,
    /// Key for this process only (HEYGEN_API_KEY); never stored
    #[serde(skip)]
    pub session_api_key: Option<Credential>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            db_path: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_library_assets: DEFAULT_MAX_ASSETS,
            priority_keywords: Vec::new(),
            default_target_group: None,
            session_api_key: None,
        }
    }
}

impl StudioConfig {
    /// Build from HEYGEN_STUDIO_* environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(base) = get("HEYGEN_STUDIO_API_BASE") {
            config.api_base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(url) = get("HEYGEN_STUDIO_UPLOAD_URL") {
            config.upload_url = url;
        }
        if let Some(path) = get("HEYGEN_STUDIO_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(ttl) = get("HEYGEN_STUDIO_CACHE_TTL_SECS") {
            config.cache_ttl_secs = ttl
                .parse::<i64>()
                .ok()
                .filter(|v| *v >= 0)
                .ok_or_else(|| anyhow!("Invalid HEYGEN_STUDIO_CACHE_TTL_SECS: {}", ttl))?;
        }
        if let Some(max) = get("HEYGEN_STUDIO_MAX_ASSETS") {
            config.max_library_assets = max
                .parse::<usize>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| anyhow!("Invalid HEYGEN_STUDIO_MAX_ASSETS: {}", max))?;
        }
        if let Some(keywords) = get("HEYGEN_STUDIO_PRIORITY_KEYWORDS") {
            config.priority_keywords = keywords
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }
        config.default_target_group = get("HEYGEN_STUDIO_TARGET_GROUP");
        config.session_api_key = get("HEYGEN_API_KEY").map(Credential::new);

        Ok(config)
    }

    /// Full URL for an API path such as `/v2/voices`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StudioConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE);
        assert_eq!(config.upload_url, DEFAULT_UPLOAD_URL);
        assert_eq!(config.cache_ttl_secs, 1800);
        assert_eq!(config.max_library_assets, 50);
        assert!(config.priority_keywords.is_empty());
        assert!(config.default_target_group.is_none());
        assert!(config.session_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = StudioConfig::from_lookup(lookup(&[
            ("HEYGEN_STUDIO_API_BASE", "http://localhost:8080/"),
            ("HEYGEN_STUDIO_PRIORITY_KEYWORDS", "Julian, podcast ,,"),
            ("HEYGEN_STUDIO_MAX_ASSETS", "10"),
            ("HEYGEN_STUDIO_TARGET_GROUP", "grp_1"),
            ("HEYGEN_API_KEY", " sk-session "),
        ]))
        .unwrap();

        assert_eq!(config.api_url("/v2/voices"), "http://localhost:8080/v2/voices");
        assert_eq!(config.priority_keywords, vec!["Julian", "podcast"]);
        assert_eq!(config.max_library_assets, 10);
        assert_eq!(config.default_target_group.as_deref(), Some("grp_1"));
        assert_eq!(config.session_api_key.as_ref().map(|k| k.expose()), Some("sk-session"));
        assert!(!format!("{:?}", config).contains("sk-session"));
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(StudioConfig::from_lookup(lookup(&[("HEYGEN_STUDIO_MAX_ASSETS", "zero")])).is_err());
        assert!(StudioConfig::from_lookup(lookup(&[("HEYGEN_STUDIO_CACHE_TTL_SECS", "-5")])).is_err());
    }
}
