//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type - deterministic string built from a normalized context
pub type CacheKey = String;

/// Cache value type - payload serialized by the caller, opaque to the engine
pub type CacheValue = String;

/// Statistics and metrics for a single store
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses
    pub misses: u64,

    /// Number of entries currently in the store
    pub entries: usize,

    /// Number of LRU evictions due to the capacity limit
    pub evictions_capacity: u64,

    /// Number of entries dropped because their TTL elapsed
    pub evictions_ttl: u64,

    /// Number of manual removals and clears
    pub invalidations: u64,

    /// Persisted entries skipped because they failed to decode
    pub malformed_skipped: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Calculate total evictions
    pub fn total_evictions(&self) -> u64 {
        self.evictions_capacity + self.evictions_ttl
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, evictions: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.total_evictions()
        )
    }
}

/// Identity of one concrete store owned by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreId {
    /// Exact repeats of activity requests
    ActivityExact,

    /// Near variants of activity requests
    ActivitySimilar,

    /// Forecasts keyed by location and date
    Weather,

    /// Event and festival listings keyed by location and interval
    Events,
}

impl StoreId {
    pub const ALL: [StoreId; 4] = [
        StoreId::ActivityExact,
        StoreId::ActivitySimilar,
        StoreId::Weather,
        StoreId::Events,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreId::ActivityExact => "activity_exact",
            StoreId::ActivitySimilar => "activity_similar",
            StoreId::Weather => "weather",
            StoreId::Events => "events",
        }
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
