//! Similarity store
//!
//! Lookups run in two stages under the read lock: a cheap hard-cutoff
//! prefilter (distance and day-of-year window), then full scoring of the
//! survivors. The best candidate wins when it clears the acceptance
//! threshold; equal scores go to the most recently recorded entry.

use crate::cache::entry::CacheEntry;
use crate::cache::store::{StoreCore, StoreHit, TierStore};
use crate::cache::types::StoreId;
use crate::error::{CacheError, Result};
use crate::features::FeatureVector;
use crate::similarity::{ScoreBreakdown, SimilarityScorer};
use async_trait::async_trait;
use tracing::debug;

/// Best scored candidate, whether or not it cleared the threshold
#[derive(Debug, Clone)]
pub struct Candidate {
    pub entry: CacheEntry,
    pub breakdown: ScoreBreakdown,
}

pub struct SimilarityStore {
    core: StoreCore,
    scorer: SimilarityScorer,
    threshold: f64,
}

impl SimilarityStore {
    pub fn new(id: StoreId, capacity: usize, scorer: SimilarityScorer, threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CacheError::Configuration(format!(
                "acceptance threshold {} outside 0.0-1.0",
                threshold
            )));
        }

        Ok(Self {
            core: StoreCore::new(id, capacity)?,
            scorer,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Highest scoring entry without touching it or counting a lookup
    pub async fn nearest(&self, requested: &FeatureVector) -> Option<Candidate> {
        self.best(requested)
            .await
            .map(|(entry, breakdown)| Candidate { entry, breakdown })
    }

    async fn best(&self, requested: &FeatureVector) -> Option<(CacheEntry, ScoreBreakdown)> {
        let table = self.core.read().await;

        let mut considered = 0usize;
        let best = table
            .iter()
            .filter_map(|(entry, inserted)| {
                let cached = entry.features.as_ref()?;
                considered += 1;
                if self.scorer.disqualify(cached, requested).is_some() {
                    return None;
                }
                Some((entry, inserted, self.scorer.score_cached(cached, requested)))
            })
            .max_by(|(_, seq_a, a), (_, seq_b, b)| {
                a.combined
                    .total_cmp(&b.combined)
                    .then(seq_a.cmp(seq_b))
            })
            .map(|(entry, _, breakdown)| (entry.clone(), breakdown));

        debug!(
            "Similarity scan in {}: {} of {} entries scored",
            self.core.id(),
            considered,
            table.len()
        );
        best
    }
}

#[async_trait]
impl TierStore for SimilarityStore {
    type Query = FeatureVector;

    fn core(&self) -> &StoreCore {
        &self.core
    }

    async fn lookup(&self, requested: &FeatureVector) -> Option<StoreHit> {
        match self.best(requested).await {
            Some((entry, breakdown)) if breakdown.combined >= self.threshold => {
                self.core
                    .hit_scored(&entry, breakdown.combined, Some(breakdown))
                    .await
            }
            Some((entry, breakdown)) => {
                debug!(
                    "Best similarity candidate {} scored {:.3}, below {:.2}",
                    entry.key, breakdown.combined, self.threshold
                );
                self.core.miss()
            }
            None => self.core.miss(),
        }
    }

    fn accepts(&self, entry: &CacheEntry) -> Result<()> {
        if entry.store != self.core.id() {
            return Err(CacheError::Other(format!(
                "entry for {} offered to {}",
                entry.store,
                self.core.id()
            )));
        }
        if entry.features.is_none() {
            return Err(CacheError::Other(format!(
                "similarity entry {} has no feature vector",
                entry.key
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SearchContext, WeatherSummary};
    use crate::features::FeatureVectorBuilder;
    use crate::similarity::ScoringParams;
    use chrono::NaiveDate;

    fn context(lat: f64, lon: f64, day: u32, max_temp: f64) -> SearchContext {
        SearchContext::new("Madrid, Spain", NaiveDate::from_ymd_opt(2025, 9, day).unwrap())
            .with_coordinates(lat, lon)
            .with_ages([6, 8])
            .with_duration(4.0)
            .with_weather(WeatherSummary {
                min_temp_c: Some(16.0),
                max_temp_c: Some(max_temp),
                precipitation_probability: Some(10.0),
                wind_speed_kmh: Some(12.0),
            })
    }

    fn entry_for(key: &str, ctx: &SearchContext, payload: &str) -> CacheEntry {
        CacheEntry::new(
            StoreId::ActivitySimilar,
            key.to_string(),
            ctx.summary().unwrap(),
            payload.to_string(),
        )
        .with_features(FeatureVectorBuilder::default().build(ctx))
    }

    fn store() -> SimilarityStore {
        SimilarityStore::new(
            StoreId::ActivitySimilar,
            30,
            SimilarityScorer::new(ScoringParams::default()),
            0.90,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_near_variant_hits() {
        let store = store();
        let cached = context(40.4168, -3.7038, 20, 34.0);
        store.insert(entry_for("a", &cached, "plan-a")).await.unwrap();

        let requested = FeatureVectorBuilder::default().build(&context(40.42, -3.70, 21, 33.0));
        let hit = store.lookup(&requested).await.unwrap();
        assert_eq!(hit.entry.value, "plan-a");
        assert!(hit.similarity >= 0.90 && hit.similarity < 1.0);
        assert!(hit.breakdown.is_some());
    }

    #[tokio::test]
    async fn test_far_variant_is_prefiltered() {
        let store = store();
        store
            .insert(entry_for("a", &context(40.4168, -3.7038, 20, 34.0), "plan-a"))
            .await
            .unwrap();

        // Toledo, about 70 km away
        let requested = FeatureVectorBuilder::default().build(&context(39.8628, -4.0273, 20, 34.0));
        assert!(store.lookup(&requested).await.is_none());
        assert!(store.nearest(&requested).await.is_none());
        assert_eq!(store.core().stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_ties_go_to_latest_record() {
        let store = store();
        let ctx = context(40.4168, -3.7038, 20, 34.0);
        store.insert(entry_for("first", &ctx, "old")).await.unwrap();
        store.insert(entry_for("second", &ctx, "new")).await.unwrap();

        let requested = FeatureVectorBuilder::default().build(&ctx);
        let hit = store.lookup(&requested).await.unwrap();
        assert_eq!(hit.entry.value, "new");
        assert_eq!(hit.similarity, 1.0);
    }

    #[tokio::test]
    async fn test_below_threshold_is_miss() {
        let store = SimilarityStore::new(
            StoreId::ActivitySimilar,
            30,
            SimilarityScorer::default(),
            0.999,
        )
        .unwrap();
        store
            .insert(entry_for("a", &context(40.4168, -3.7038, 20, 34.0), "plan-a"))
            .await
            .unwrap();

        let requested = FeatureVectorBuilder::default().build(&context(40.42, -3.70, 27, 24.0));
        assert!(store.lookup(&requested).await.is_none());

        let nearest = store.nearest(&requested).await.unwrap();
        assert!(nearest.breakdown.combined < 0.999);
    }

    #[tokio::test]
    async fn test_requires_feature_vector() {
        let store = store();
        let ctx = context(40.4168, -3.7038, 20, 34.0);
        let bare = CacheEntry::new(
            StoreId::ActivitySimilar,
            "bare".to_string(),
            ctx.summary().unwrap(),
            "x".to_string(),
        );
        assert!(store.insert(bare).await.is_err());
    }

    #[test]
    fn test_threshold_validated() {
        assert!(matches!(
            SimilarityStore::new(StoreId::ActivitySimilar, 30, SimilarityScorer::default(), 1.5),
            Err(CacheError::Configuration(_))
        ));
    }
}
