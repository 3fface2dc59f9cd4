//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
///
/// The default is unbounded with no expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries; `None` keeps every entry.
    pub max_capacity: Option<u64>,

    /// Time-to-live for cache entries.
    /// After this duration, entries are automatically evicted.
    pub ttl: Option<Duration>,

    /// Time-to-idle for cache entries.
    /// Entries are evicted if not accessed within this duration.
    pub tti: Option<Duration>,
}

impl CacheConfig {
    /// Config for mirrors of authoritative state.
    ///
    /// Nothing is evicted by size or time.
    pub fn pinned() -> Self {
        Self::default()
    }
}
