//! Library discovery: field table, TTL cache and the aggregator.

mod aggregator;
mod cache;
pub mod fields;

pub use aggregator::{
    dedupe, prioritize, DiscoveryOptions, DiscoveryOutcome, DiscoveryStatus, LibraryAggregator,
    UNTARGETED_KEY,
};
pub use cache::{CacheEntry, LibraryCache, LibraryEntry};
