//! ============================================================================
//! STUDIO-CORE: HeyGen Studio Engine
//! ============================================================================
//! Backend logic for the HeyGen avatar-video studio:
//! - Credential vault with optional redb-backed "remember me"
//! - Activity log: bounded transparency log with observers
//! - HeyGen API client (voices, library listings, upload, generation, status)
//! - Upload content-type sniffing
//! - Library discovery with fan-out, dedupe, prioritization and a TTL cache
//! ============================================================================

pub mod activity_log;
pub mod client;
pub mod config;
pub mod content_type;
pub mod context;
pub mod db;
pub mod library;
pub mod types;
pub mod vault;
pub mod voices;

// Re-export main types for convenience
pub use types::*;
pub use activity_log::{ActivityLog, ActivityLogEntry, EntryKind, EntryStatus, Subscription};
pub use client::HeyGenClient;
pub use config::StudioConfig;
pub use context::StudioContext;
pub use db::StudioDb;
pub use library::{DiscoveryOptions, DiscoveryOutcome, DiscoveryStatus, LibraryAggregator};
pub use vault::CredentialStore;
