//! Interval store
//!
//! Holds results that stay valid across a span of days, such as event
//! listings. A lookup hits when the requested date falls inside a cached
//! interval for the same location.

use crate::cache::store::{StoreCore, StoreHit, TierStore};
use crate::cache::types::{CacheKey, StoreId};
use crate::context::normalize_location;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Location and day to look up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    /// Normalized location
    pub location: String,
    pub date: NaiveDate,
}

impl RangeQuery {
    pub fn new(location: &str, date: NaiveDate) -> Self {
        Self {
            location: normalize_location(location),
            date,
        }
    }
}

pub struct RangeStore {
    core: StoreCore,
}

impl RangeStore {
    pub fn new(id: StoreId, capacity: usize) -> Result<Self> {
        Ok(Self {
            core: StoreCore::new(id, capacity)?,
        })
    }

    /// Key of the covering entry, without touching it or counting a lookup.
    ///
    /// Overlapping intervals: the most recently recorded one wins.
    pub async fn find(&self, query: &RangeQuery) -> Option<CacheKey> {
        let table = self.core.read().await;
        let key = table
            .iter()
            .filter(|(entry, _)| {
                entry.covers(query.date)
                    && normalize_location(&entry.summary.location) == query.location
            })
            .max_by_key(|(_, inserted)| *inserted)
            .map(|(entry, _)| entry.key.clone());
        key
    }
}

#[async_trait]
impl TierStore for RangeStore {
    type Query = RangeQuery;

    fn core(&self) -> &StoreCore {
        &self.core
    }

    async fn lookup(&self, query: &RangeQuery) -> Option<StoreHit> {
        match self.find(query).await {
            Some(key) => self.core.hit(&key, 1.0, None).await,
            None => self.core.miss(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheEntry;
    use crate::cache::key::events_key;
    use crate::context::ContextSummary;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    fn listing(location: &str, start: NaiveDate, end: NaiveDate, payload: &str) -> CacheEntry {
        CacheEntry::new(
            StoreId::Events,
            events_key(location, start, end),
            ContextSummary {
                location: location.to_string(),
                date: start,
                end_date: Some(end),
            },
            payload.to_string(),
        )
    }

    #[tokio::test]
    async fn test_containment() {
        let store = RangeStore::new(StoreId::Events, 50).unwrap();
        store
            .insert(listing("Madrid, Spain", day(19), day(23), "fiestas"))
            .await
            .unwrap();

        for d in [19, 21, 23] {
            let hit = store.lookup(&RangeQuery::new("madrid, spain", day(d))).await;
            assert_eq!(hit.unwrap().entry.value, "fiestas", "day {}", d);
        }
        assert!(store
            .lookup(&RangeQuery::new("Madrid, Spain", day(25)))
            .await
            .is_none());
        assert!(store
            .lookup(&RangeQuery::new("Barcelona, Spain", day(21)))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_overlap_prefers_latest_record() {
        let store = RangeStore::new(StoreId::Events, 50).unwrap();
        store
            .insert(listing("Madrid", day(18), day(22), "older"))
            .await
            .unwrap();
        store
            .insert(listing("Madrid", day(20), day(24), "newer"))
            .await
            .unwrap();

        let hit = store.lookup(&RangeQuery::new("madrid", day(21))).await.unwrap();
        assert_eq!(hit.entry.value, "newer");
        assert_eq!(hit.similarity, 1.0);

        let hit = store.lookup(&RangeQuery::new("madrid", day(18))).await.unwrap();
        assert_eq!(hit.entry.value, "older");
    }
}
