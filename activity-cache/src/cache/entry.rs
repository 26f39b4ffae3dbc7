//! Cache entry management

use crate::cache::types::{CacheKey, CacheValue, StoreId};
use crate::context::ContextSummary;
use crate::features::FeatureVector;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A cached result with the context it was computed for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: Uuid,

    /// The cache key
    pub key: CacheKey,

    /// Store that owns the entry
    pub store: StoreId,

    /// Location and date(s) the payload was computed for
    pub summary: ContextSummary,

    /// Only set for similarity entries
    pub features: Option<FeatureVector>,

    /// The cached payload
    pub value: CacheValue,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Create a new entry stamped with the current time
    pub fn new(store: StoreId, key: CacheKey, summary: ContextSummary, value: CacheValue) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            key,
            store,
            summary,
            features: None,
            value,
            metadata: CacheMetadata {
                created_at: now,
                last_accessed: now,
                expires_at: None,
                access_count: 0,
            },
        }
    }

    /// Attach the feature vector used by similarity lookups
    pub fn with_features(mut self, features: FeatureVector) -> Self {
        self.features = Some(features);
        self
    }

    /// Expire the entry `ttl` after creation; a TTL past the end of the
    /// representable calendar never expires
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        let created_at = self.metadata.created_at;
        self.metadata.expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| created_at.checked_add_signed(ttl));
        self
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.metadata
            .expires_at
            .map(|expires_at| Utc::now() > expires_at)
            .unwrap_or(false)
    }

    /// Mark the entry as accessed (updates access time and count)
    pub fn mark_accessed(&mut self) {
        self.metadata.last_accessed = Utc::now();
        self.metadata.access_count += 1;
    }

    /// Inclusive interval covered by a range entry
    pub fn interval(&self) -> (NaiveDate, NaiveDate) {
        let start = self.summary.date;
        (start, self.summary.end_date.unwrap_or(start))
    }

    /// Whether `date` lies inside the entry's interval
    pub fn covers(&self, date: NaiveDate) -> bool {
        let (start, end) = self.interval();
        start <= date && date <= end
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last access time (for LRU tracking)
    pub last_accessed: DateTime<Utc>,

    /// When the entry expires, if a TTL is configured
    pub expires_at: Option<DateTime<Utc>>,

    /// Number of times this entry has been served
    pub access_count: u64,
}
