//! ============================================================================
//! Credential Vault - In-memory API key with optional durable mirror
//! ============================================================================
//! - The key always lives in memory while the studio is unlocked
//! - `remember = true` mirrors it into the durable slot (redb)
//! - `clear()` wipes both, unconditionally
//! - The key value is never logged or traced
//!
//! This is plain local persistence, not a security boundary.
//! ============================================================================

use anyhow::{anyhow, Result};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::types::Credential;

/// Durable storage for a single remembered credential
pub trait CredentialSlot: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, value: &str) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

#[derive(Default)]
struct VaultState {
    credential: Option<Credential>,
    persisted: bool,
}

/// Holder of the session's API key
pub struct CredentialStore {
    state: RwLock<VaultState>,
    slot: Option<Arc<dyn CredentialSlot>>,
}

impl CredentialStore {
    /// Memory-only store; nothing survives the process
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(VaultState::default()),
            slot: None,
        }
    }

    /// Open a store backed by a durable slot, loading any remembered key
    pub fn open(slot: Arc<dyn CredentialSlot>) -> Result<Self> {
        let mut state = VaultState::default();
        if let Some(saved) = slot.load()? {
            if !saved.is_empty() {
                state.credential = Some(Credential::new(saved));
                state.persisted = true;
                info!("Loaded remembered API key");
            }
        }

        Ok(Self {
            state: RwLock::new(state),
            slot: Some(slot),
        })
    }

    pub fn get(&self) -> Option<Credential> {
        self.read().credential.clone()
    }

    pub fn is_unlocked(&self) -> bool {
        self.read().credential.is_some()
    }

    /// Store a key. `persist = false` also drops any durable copy.
    pub fn set(&self, credential: &str, persist: bool) -> Result<()> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(anyhow!("API key must not be empty"));
        }

        if let Some(slot) = &self.slot {
            if persist {
                slot.save(credential)?;
            } else {
                slot.remove()?;
            }
        } else if persist {
            warn!("No durable storage attached; API key kept in memory only");
        }

        let mut state = self.write();
        state.credential = Some(Credential::new(credential));
        state.persisted = persist && self.slot.is_some();
        info!("Vault unlocked (remembered: {})", state.persisted);
        Ok(())
    }

    /// Hold a key for this process only. The durable slot is left as is, so
    /// a remembered key is still there on the next start.
    pub fn set_session(&self, credential: &str) -> Result<()> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(anyhow!("API key must not be empty"));
        }

        let mut state = self.write();
        state.credential = Some(Credential::new(credential));
        state.persisted = false;
        info!("Vault unlocked for this session");
        Ok(())
    }

    /// Forget the key everywhere. Memory is cleared even if storage fails.
    pub fn clear(&self) -> Result<()> {
        {
            let mut state = self.write();
            state.credential = None;
            state.persisted = false;
        }
        info!("Vault locked");

        match &self.slot {
            Some(slot) => slot.remove(),
            None => Ok(()),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.read().persisted
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, VaultState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, VaultState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
