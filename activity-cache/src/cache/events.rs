//! Observable cache events
//!
//! Every resolve outcome, write and removal is published on a broadcast
//! channel for external logging or metrics. Publishing is fire-and-forget:
//! with no subscriber the event is simply dropped.

use crate::cache::types::{CacheKey, StoreId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an entry left a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Evicted by the capacity limit
    LeastRecentlyUsed,

    /// TTL elapsed
    Expired,

    /// Removed by key
    Manual,

    /// Whole store cleared
    Cleared,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::LeastRecentlyUsed => write!(f, "LRU eviction"),
            RemovalReason::Expired => write!(f, "TTL expired"),
            RemovalReason::Manual => write!(f, "manual removal"),
            RemovalReason::Cleared => write!(f, "store cleared"),
        }
    }
}

/// Logical cache a lookup was made against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Activities,
    Weather,
    Events,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::Activities => write!(f, "activities"),
            LookupKind::Weather => write!(f, "weather"),
            LookupKind::Events => write!(f, "events"),
        }
    }
}

/// Result of one resolve call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    Hit { store: StoreId, similarity: f64 },
    Miss,
    /// The request could not be keyed
    Rejected { reason: String },
}

/// One resolve, as published to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveEvent {
    pub kind: LookupKind,
    pub key: Option<CacheKey>,
    #[serde(flatten)]
    pub outcome: ResolveOutcome,
    pub elapsed_us: u64,
    pub timestamp: DateTime<Utc>,
}

impl ResolveEvent {
    pub fn new(kind: LookupKind, key: Option<CacheKey>, outcome: ResolveOutcome, elapsed_us: u64) -> Self {
        Self {
            kind,
            key,
            outcome,
            elapsed_us,
            timestamp: Utc::now(),
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self.outcome, ResolveOutcome::Hit { .. })
    }
}

/// Anything a subscriber can observe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CacheEvent {
    Resolved(ResolveEvent),
    Recorded { store: StoreId, key: CacheKey },
    Removed { store: StoreId, key: CacheKey, reason: RemovalReason },
    /// A persisted entry failed to decode and was skipped
    MalformedSkipped { store: StoreId, key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_reason_display() {
        assert_eq!(RemovalReason::LeastRecentlyUsed.to_string(), "LRU eviction");
        assert_eq!(RemovalReason::Expired.to_string(), "TTL expired");
    }

    #[test]
    fn test_resolve_event_serializes_outcome_tag() {
        let event = ResolveEvent::new(
            LookupKind::Activities,
            Some("activities:madrid".to_string()),
            ResolveOutcome::Hit {
                store: StoreId::ActivitySimilar,
                similarity: 0.95,
            },
            120,
        );
        assert!(event.is_hit());

        let json = serde_json::to_value(CacheEvent::Resolved(event)).unwrap();
        assert_eq!(json["event"], "resolved");
        assert_eq!(json["outcome"], "hit");
        assert_eq!(json["store"], "activity_similar");
    }
}
