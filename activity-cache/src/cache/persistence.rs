//! Persistence collaborator
//!
//! The cache treats durable storage as an opaque document store keyed by
//! `(store, key)`. Documents are plain `serde_json::Value`s; decoding and
//! numeric cleanup happen in [`sanitize`](crate::cache::sanitize).

use crate::cache::entry::CacheEntry;
use crate::cache::sanitize::{encode_entry, numeric_f64};
use crate::cache::types::{CacheKey, StoreId};
use crate::context::normalize_location;
use crate::error::Result;
use crate::features::{FeatureVector, GeoPoint, Season};
use crate::similarity::haversine_km;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A document addressed to one store
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    pub store: StoreId,
    pub key: CacheKey,
    pub document: Value,
}

impl PersistedRecord {
    pub fn from_entry(entry: &CacheEntry) -> Result<Self> {
        Ok(Self {
            store: entry.store,
            key: entry.key.clone(),
            document: encode_entry(entry)?,
        })
    }
}

/// Coarse prefilter for backend scans.
///
/// A document passes when it matches every criterion that is set and that
/// it carries data for; undecidable documents are returned so the caller
/// can decode (and report) them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFilter {
    /// Normalized location name
    pub location: Option<String>,
    pub season: Option<Season>,
    /// Whether `season` was derived on the southern calendar
    pub southern: bool,
    pub near: Option<GeoPoint>,
    pub radius_km: Option<f64>,
}

impl CandidateFilter {
    /// Matches everything
    pub fn all() -> Self {
        Self::default()
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(normalize_location(location));
        self
    }

    pub fn season(mut self, season: Season) -> Self {
        self.season = Some(season);
        self
    }

    pub fn within(mut self, point: GeoPoint, radius_km: f64) -> Self {
        self.near = Some(point);
        self.radius_km = Some(radius_km);
        self
    }

    /// Radius and season prefilter for a similarity lookup
    pub fn for_vector(features: &FeatureVector, radius_km: f64) -> Self {
        let mut filter = Self::all();
        if let Some(point) = features.location.coordinates {
            filter = filter.within(point, radius_km);
            filter.southern = point.is_southern();
        }
        if let Some(season) = features.temporal.season {
            filter = filter.season(season);
        }
        filter
    }

    pub fn matches(&self, document: &Value) -> bool {
        if let Some(location) = &self.location {
            if let Some(stored) = document.pointer("/summary/location").and_then(Value::as_str) {
                if normalize_location(stored) != *location {
                    return false;
                }
            }
        }

        let lat = document.pointer("/features/location/coordinates/lat").and_then(numeric_f64);
        let lon = document.pointer("/features/location/coordinates/lon").and_then(numeric_f64);

        // Opposite seasons only imply distant dates on the same calendar.
        // Neighbouring seasons stay in: a 14-day window can straddle a boundary.
        if let Some(season) = self.season {
            let stored = document
                .pointer("/features/temporal/season")
                .and_then(|v| serde_json::from_value::<Season>(v.clone()).ok());
            let stored_southern = lat.map(|lat| lat < 0.0).unwrap_or(false);
            if let Some(stored) = stored {
                if stored_southern == self.southern && stored == season.opposite() {
                    return false;
                }
            }
        }

        if let (Some(near), Some(radius)) = (self.near, self.radius_km) {
            if let (Some(lat), Some(lon)) = (lat, lon) {
                if haversine_km(near, GeoPoint::new(lat, lon)) > radius {
                    return false;
                }
            }
        }

        true
    }
}

/// Durable storage behind the in-memory stores
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Insert or replace a document
    async fn put(&self, record: PersistedRecord) -> Result<()>;

    async fn get(&self, store: StoreId, key: &str) -> Result<Option<Value>>;

    /// Documents of `store` passing `filter`
    async fn scan(&self, store: StoreId, filter: &CandidateFilter) -> Result<Vec<Value>>;

    /// Returns whether a document was removed
    async fn remove(&self, store: StoreId, key: &str) -> Result<bool>;

    /// Returns the number of documents removed
    async fn clear(&self, store: StoreId) -> Result<usize>;

    fn name(&self) -> &str {
        "persistence"
    }
}

/// Process-local backend, mainly for tests and demos
#[derive(Default)]
pub struct InMemoryBackend {
    documents: RwLock<HashMap<StoreId, HashMap<CacheKey, Value>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an arbitrary document, bypassing encoding
    pub async fn insert_raw(&self, store: StoreId, key: impl Into<CacheKey>, document: Value) {
        self.documents
            .write()
            .await
            .entry(store)
            .or_default()
            .insert(key.into(), document);
    }

    pub async fn len(&self, store: StoreId) -> usize {
        self.documents
            .read()
            .await
            .get(&store)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    pub async fn contains(&self, store: StoreId, key: &str) -> bool {
        self.documents
            .read()
            .await
            .get(&store)
            .map(|docs| docs.contains_key(key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn put(&self, record: PersistedRecord) -> Result<()> {
        self.insert_raw(record.store, record.key, record.document).await;
        Ok(())
    }

    async fn get(&self, store: StoreId, key: &str) -> Result<Option<Value>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&store)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn scan(&self, store: StoreId, filter: &CandidateFilter) -> Result<Vec<Value>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&store)
            .map(|docs| docs.values().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default())
    }

    async fn remove(&self, store: StoreId, key: &str) -> Result<bool> {
        Ok(self
            .documents
            .write()
            .await
            .get_mut(&store)
            .map(|docs| docs.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn clear(&self, store: StoreId) -> Result<usize> {
        Ok(self
            .documents
            .write()
            .await
            .remove(&store)
            .map(|docs| docs.len())
            .unwrap_or(0))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SearchContext;
    use crate::features::FeatureVectorBuilder;
    use chrono::NaiveDate;
    use serde_json::json;

    fn record(location: &str, lat: f64, lon: f64, month: u32) -> PersistedRecord {
        let ctx = SearchContext::new(location, NaiveDate::from_ymd_opt(2025, month, 15).unwrap())
            .with_coordinates(lat, lon);
        let entry = CacheEntry::new(
            StoreId::ActivitySimilar,
            format!("activities:{}:{}", location, month),
            ctx.summary().unwrap(),
            "payload".to_string(),
        )
        .with_features(FeatureVectorBuilder::default().build(&ctx));
        PersistedRecord::from_entry(&entry).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let backend = InMemoryBackend::new();
        let rec = record("Madrid", 40.4168, -3.7038, 9);
        let key = rec.key.clone();
        backend.put(rec).await.unwrap();

        assert!(backend.get(StoreId::ActivitySimilar, &key).await.unwrap().is_some());
        assert!(backend.get(StoreId::Weather, &key).await.unwrap().is_none());
        assert!(backend.remove(StoreId::ActivitySimilar, &key).await.unwrap());
        assert!(!backend.remove(StoreId::ActivitySimilar, &key).await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_filters() {
        let backend = InMemoryBackend::new();
        backend.put(record("Madrid", 40.4168, -3.7038, 9)).await.unwrap();
        backend.put(record("Getafe", 40.3083, -3.7327, 9)).await.unwrap();
        backend.put(record("Seville", 37.3891, -5.9845, 9)).await.unwrap();
        backend.put(record("Madrid", 40.4168, -3.7038, 3)).await.unwrap();

        let madrid = GeoPoint::new(40.4168, -3.7038);
        let near = CandidateFilter::all().within(madrid, 20.0);
        assert_eq!(backend.scan(StoreId::ActivitySimilar, &near).await.unwrap().len(), 3);

        // March (spring) is the opposite of September (autumn)
        let autumn_near = near.clone().season(Season::Autumn);
        assert_eq!(
            backend.scan(StoreId::ActivitySimilar, &autumn_near).await.unwrap().len(),
            2
        );

        let by_name = CandidateFilter::all().location("  MADRID ");
        assert_eq!(backend.scan(StoreId::ActivitySimilar, &by_name).await.unwrap().len(), 2);

        assert_eq!(backend.clear(StoreId::ActivitySimilar).await.unwrap(), 4);
        assert_eq!(backend.len(StoreId::ActivitySimilar).await, 0);
    }

    #[tokio::test]
    async fn test_season_filter_respects_hemisphere() {
        let backend = InMemoryBackend::new();
        // Northern winter and southern winter, a couple of km either side of the equator
        backend.put(record("Equator north", 0.01, 30.0, 1)).await.unwrap();
        backend.put(record("Equator south", -0.02, 30.0, 7)).await.unwrap();

        let requested = SearchContext::new("Equator south", NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
            .with_coordinates(-0.01, 30.0);
        let features = FeatureVectorBuilder::default().build(&requested);
        assert_eq!(features.temporal.season, Some(Season::Summer));

        let filter = CandidateFilter::for_vector(&features, 20.0);
        assert!(filter.southern);
        let found = backend.scan(StoreId::ActivitySimilar, &filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["summary"]["location"], "Equator north");
    }

    #[test]
    fn test_undecidable_documents_pass() {
        let filter = CandidateFilter::all()
            .location("madrid")
            .season(Season::Autumn)
            .within(GeoPoint::new(40.4, -3.7), 20.0);
        assert!(filter.matches(&json!({"key": "broken"})));
        assert!(!filter.matches(&json!({"summary": {"location": "Paris"}})));
    }
}
