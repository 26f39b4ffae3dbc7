//! Cache coordinator
//!
//! Owns the four stores and routes each logical cache to its tier:
//!
//! | Cache      | Stores                                   |
//! |------------|------------------------------------------|
//! | activities | `activity_exact` then `activity_similar` |
//! | weather    | `weather` (exact key only)               |
//! | events     | `events` (interval containment)          |
//!
//! The coordinator is cheap to clone; clones share the same stores.

use crate::cache::config::CacheConfig;
use crate::cache::entry::CacheEntry;
use crate::cache::events::{CacheEvent, LookupKind, RemovalReason, ResolveEvent, ResolveOutcome};
use crate::cache::key::{activity_key, events_key, weather_key};
use crate::cache::persistence::{CandidateFilter, PersistedRecord, PersistenceBackend};
use crate::cache::range::{RangeQuery, RangeStore};
use crate::cache::sanitize::decode_entry;
use crate::cache::similarity::{Candidate, SimilarityStore};
use crate::cache::store::{Removal, StoreCore, StoreHit, TierStore};
use crate::cache::strict::StrictStore;
use crate::cache::types::{CacheKey, CacheStats, CacheValue, StoreId};
use crate::context::{normalize_location, ContextSummary, SearchContext};
use crate::error::{CacheError, Result};
use crate::features::{FeatureVector, FeatureVectorBuilder};
use crate::similarity::{ScoreBreakdown, SimilarityScorer};
use chrono::{Duration as DateSpan, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why a cached payload was served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub store: StoreId,

    /// 1.0 for strict and range hits
    pub similarity: f64,

    pub entry_id: Uuid,

    /// Context the payload was originally computed for
    pub original: ContextSummary,

    /// Per-dimension scores, similarity hits only
    pub breakdown: Option<ScoreBreakdown>,
}

impl From<&StoreHit> for MatchInfo {
    fn from(hit: &StoreHit) -> Self {
        Self {
            store: hit.entry.store,
            similarity: hit.similarity,
            entry_id: hit.entry.id,
            original: hit.entry.summary.clone(),
            breakdown: hit.breakdown.clone(),
        }
    }
}

/// Outcome of a resolve call
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Hit { payload: CacheValue, info: MatchInfo },
    Miss,
}

impl Resolution {
    pub fn is_hit(&self) -> bool {
        matches!(self, Resolution::Hit { .. })
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Resolution::Hit { payload, .. } => Some(payload),
            Resolution::Miss => None,
        }
    }

    pub fn info(&self) -> Option<&MatchInfo> {
        match self {
            Resolution::Hit { info, .. } => Some(info),
            Resolution::Miss => None,
        }
    }
}

impl From<StoreHit> for Resolution {
    fn from(hit: StoreHit) -> Self {
        let info = MatchInfo::from(&hit);
        Resolution::Hit {
            payload: hit.entry.value,
            info,
        }
    }
}

/// Payload returned by [`CacheCoordinator::resolve_or_compute`]
#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub payload: CacheValue,

    /// Set when the payload came from the cache
    pub info: Option<MatchInfo>,
}

impl Served {
    pub fn from_cache(&self) -> bool {
        self.info.is_some()
    }
}

/// Result of [`CacheCoordinator::hydrate`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydrationReport {
    pub loaded: HashMap<StoreId, usize>,
    pub skipped: HashMap<StoreId, usize>,
}

impl HydrationReport {
    pub fn total_loaded(&self) -> usize {
        self.loaded.values().sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

struct Stores {
    activity_exact: StrictStore,
    activity_similar: SimilarityStore,
    weather: StrictStore,
    events: RangeStore,
}

impl Stores {
    fn new(config: &CacheConfig) -> Result<Self> {
        let caps = &config.capacities;
        Ok(Self {
            activity_exact: StrictStore::new(StoreId::ActivityExact, caps.activity_exact)?,
            activity_similar: SimilarityStore::new(
                StoreId::ActivitySimilar,
                caps.activity_similar,
                SimilarityScorer::new(config.scoring_params()),
                config.acceptance_threshold,
            )?,
            weather: StrictStore::new(StoreId::Weather, caps.weather)?,
            events: RangeStore::new(StoreId::Events, caps.events)?,
        })
    }

    fn core(&self, id: StoreId) -> &StoreCore {
        match id {
            StoreId::ActivityExact => self.activity_exact.core(),
            StoreId::ActivitySimilar => self.activity_similar.core(),
            StoreId::Weather => self.weather.core(),
            StoreId::Events => self.events.core(),
        }
    }

    async fn insert(&self, entry: CacheEntry) -> Result<Vec<Removal>> {
        match entry.store {
            StoreId::ActivityExact => self.activity_exact.insert(entry).await,
            StoreId::ActivitySimilar => self.activity_similar.insert(entry).await,
            StoreId::Weather => self.weather.insert(entry).await,
            StoreId::Events => self.events.insert(entry).await,
        }
    }
}

struct Inner {
    config: CacheConfig,
    builder: FeatureVectorBuilder,
    stores: Stores,
    backend: Option<Arc<dyn PersistenceBackend>>,
    events: broadcast::Sender<CacheEvent>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

/// Entry point of the cache engine
#[derive(Clone)]
pub struct CacheCoordinator {
    inner: Arc<Inner>,
}

impl CacheCoordinator {
    /// Memory-only coordinator
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Coordinator backed by durable storage
    pub fn with_persistence(config: CacheConfig, backend: Arc<dyn PersistenceBackend>) -> Result<Self> {
        Self::build(config, Some(backend))
    }

    fn build(config: CacheConfig, backend: Option<Arc<dyn PersistenceBackend>>) -> Result<Self> {
        config.validate()?;

        let stores = Stores::new(&config)?;
        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        info!(
            "Cache coordinator ready: threshold {:.2}, capacities {:?}, persistence {}",
            config.acceptance_threshold,
            config.capacities,
            backend.as_ref().map(|b| b.name()).unwrap_or("none")
        );

        Ok(Self {
            inner: Arc::new(Inner {
                builder: FeatureVectorBuilder::new(config.holiday_window_days),
                config,
                stores,
                backend,
                events,
                pending: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Feature vector the coordinator would compute for `context`
    pub fn features(&self, context: &SearchContext) -> FeatureVector {
        self.inner.builder.build(context)
    }

    /// Receive every subsequent [`CacheEvent`]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    // ---- activities ----

    /// Look up activities: exact repeat first, then the best similar context
    pub async fn resolve(&self, context: &SearchContext) -> Result<Resolution> {
        let started = Instant::now();
        let inner = &self.inner;

        let key = match activity_key(context) {
            Ok(key) => key,
            Err(e) => {
                inner.publish_resolve(LookupKind::Activities, None, None, started, Some(&e));
                return Err(e);
            }
        };

        let mut hit = inner.stores.activity_exact.lookup(&key).await;
        if hit.is_none() {
            hit = inner.read_through_exact(StoreId::ActivityExact, &key).await;
        }

        if hit.is_none() {
            let features = inner.builder.build(context);
            hit = inner.stores.activity_similar.lookup(&features).await;
            if hit.is_none() {
                hit = inner.read_through_similar(&features).await;
            }
        }

        inner.publish_resolve(LookupKind::Activities, Some(key), hit.as_ref(), started, None);
        Ok(hit.map(Resolution::from).unwrap_or(Resolution::Miss))
    }

    /// Store activities under the exact key and the context's feature vector.
    ///
    /// The write runs on its own task and completes even if the returned
    /// future is dropped.
    pub async fn record(&self, context: &SearchContext, payload: impl Into<CacheValue>) -> Result<()> {
        let key = activity_key(context)?;
        let summary = context.summary()?;
        let features = self.inner.builder.build(context);
        let payload = payload.into();
        let ttl = self.inner.config.ttl_with_jitter();

        let exact = CacheEntry::new(StoreId::ActivityExact, key.clone(), summary.clone(), payload.clone())
            .with_ttl(ttl);
        let similar = CacheEntry::new(StoreId::ActivitySimilar, key, summary, payload)
            .with_features(features)
            .with_ttl(ttl);

        self.commit(vec![exact, similar]).await
    }

    /// Best similarity candidate for `context`, scored but not served
    pub async fn closest_match(&self, context: &SearchContext) -> Result<Option<Candidate>> {
        context.identity()?;
        let features = self.inner.builder.build(context);
        Ok(self.inner.stores.activity_similar.nearest(&features).await)
    }

    /// Resolve, or compute, record and return a fresh payload.
    ///
    /// Cache failures never fail the request: only an unkeyable context or
    /// an error from `compute` is returned.
    pub async fn resolve_or_compute<F, Fut>(&self, context: &SearchContext, compute: F) -> Result<Served>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue>>,
    {
        match self.resolve(context).await {
            Ok(Resolution::Hit { payload, info }) => {
                return Ok(Served {
                    payload,
                    info: Some(info),
                })
            }
            Ok(Resolution::Miss) => {}
            Err(e) if e.is_request_fatal() => return Err(e),
            Err(e) => warn!("Cache lookup failed, computing: {}", e),
        }

        let payload = compute().await?;
        if let Err(e) = self.record(context, payload.clone()).await {
            warn!("Failed to record computed payload: {}", e);
        }

        Ok(Served { payload, info: None })
    }

    // ---- weather ----

    /// Weather for exactly this location and date; a different date is a miss
    pub async fn resolve_weather(&self, context: &SearchContext) -> Result<Resolution> {
        let started = Instant::now();
        let inner = &self.inner;

        let key = match weather_key(context) {
            Ok(key) => key,
            Err(e) => {
                inner.publish_resolve(LookupKind::Weather, None, None, started, Some(&e));
                return Err(e);
            }
        };

        let mut hit = inner.stores.weather.lookup(&key).await;
        if hit.is_none() {
            hit = inner.read_through_exact(StoreId::Weather, &key).await;
        }

        inner.publish_resolve(LookupKind::Weather, Some(key), hit.as_ref(), started, None);
        Ok(hit.map(Resolution::from).unwrap_or(Resolution::Miss))
    }

    pub async fn record_weather(&self, context: &SearchContext, payload: impl Into<CacheValue>) -> Result<()> {
        let key = weather_key(context)?;
        let entry = CacheEntry::new(StoreId::Weather, key, context.summary()?, payload.into())
            .with_ttl(self.inner.config.ttl_with_jitter());
        self.commit(vec![entry]).await
    }

    // ---- events ----

    /// Event listing whose recorded interval contains `date`
    pub async fn resolve_events(&self, location: &str, date: NaiveDate) -> Result<Resolution> {
        let started = Instant::now();
        let inner = &self.inner;

        let query = RangeQuery::new(location, date);
        if query.location.is_empty() {
            let e = CacheError::IncompleteContext { field: "location" };
            inner.publish_resolve(LookupKind::Events, None, None, started, Some(&e));
            return Err(e);
        }

        let mut hit = inner.stores.events.lookup(&query).await;
        if hit.is_none() {
            hit = inner.read_through_range(&query).await;
        }

        let key = hit.as_ref().map(|h| h.entry.key.clone());
        inner.publish_resolve(LookupKind::Events, key, hit.as_ref(), started, None);
        Ok(hit.map(Resolution::from).unwrap_or(Resolution::Miss))
    }

    /// Record a listing valid for the holiday window around the context date
    pub async fn record_events(&self, context: &SearchContext, payload: impl Into<CacheValue>) -> Result<()> {
        let (_, date) = context.identity()?;
        let window = DateSpan::days(i64::from(self.inner.config.holiday_window_days));
        self.record_range(&context.location, date - window, date + window, payload)
            .await
    }

    /// Record a listing valid on every day of `[start, end]`
    pub async fn record_range(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
        payload: impl Into<CacheValue>,
    ) -> Result<()> {
        if normalize_location(location).is_empty() {
            return Err(CacheError::IncompleteContext { field: "location" });
        }
        if start > end {
            return Err(CacheError::InvalidInterval { start, end });
        }

        let summary = ContextSummary {
            location: location.trim().to_string(),
            date: start,
            end_date: Some(end),
        };
        let entry = CacheEntry::new(StoreId::Events, events_key(location, start, end), summary, payload.into())
            .with_ttl(self.inner.config.ttl_with_jitter());
        self.commit(vec![entry]).await
    }

    // ---- persistence ----

    /// Load persisted entries into memory.
    ///
    /// Malformed documents are logged and skipped. When a store holds more
    /// documents than its capacity, the most recently accessed ones are kept.
    pub async fn hydrate(&self) -> Result<HydrationReport> {
        let mut report = HydrationReport::default();
        let Some(backend) = self.inner.backend.clone() else {
            return Ok(report);
        };

        for store in StoreId::ALL {
            let documents = backend.scan(store, &CandidateFilter::all()).await?;
            let mut entries = self.inner.decode_all(store, &documents).await;
            let skipped = documents.len() - entries.len();

            entries.retain(|entry| !entry.is_expired());
            entries.sort_by_key(|entry| entry.metadata.last_accessed);

            let capacity = self.inner.stores.core(store).capacity().await;
            let excess = entries.len().saturating_sub(capacity);

            let mut loaded = 0;
            for entry in entries.into_iter().skip(excess) {
                self.inner.stores.insert(entry).await?;
                loaded += 1;
            }

            info!(
                "Hydrated {}: {} loaded, {} skipped, {} over capacity",
                store, loaded, skipped, excess
            );
            report.loaded.insert(store, loaded);
            report.skipped.insert(store, skipped);
        }

        Ok(report)
    }

    /// Wait for background persistence writes issued so far
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.pending.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Background persistence task failed: {}", e);
            }
        }
    }

    // ---- maintenance ----

    /// Empty every store; returns the number of entries dropped
    pub async fn clear_all(&self) -> usize {
        let mut total = 0;
        for store in StoreId::ALL {
            total += self.clear(store).await;
        }
        total
    }

    /// Empty one store, here and in the backend
    pub async fn clear(&self, store: StoreId) -> usize {
        let drained = self.inner.stores.core(store).clear().await;
        let count = drained.len();
        info!("Cleared {} entries from {}", count, store);

        let removals = drained
            .into_iter()
            .map(|entry| Removal {
                entry,
                reason: RemovalReason::Cleared,
            })
            .collect();
        self.inner.apply_removals(removals).await;

        if let Some(backend) = self.inner.backend.clone() {
            self.inner
                .spawn_background(async move {
                    if let Err(e) = backend.clear(store).await {
                        warn!("Failed to clear {} in {}: {}", store, backend.name(), e);
                    }
                })
                .await;
        }
        count
    }

    /// Remove one entry by key
    pub async fn remove(&self, store: StoreId, key: &str) -> bool {
        let Some(entry) = self.inner.stores.core(store).remove(key).await else {
            return false;
        };
        self.inner
            .apply_removals(vec![Removal {
                entry,
                reason: RemovalReason::Manual,
            }])
            .await;
        true
    }

    /// Drop entries whose TTL elapsed; returns the number removed
    pub async fn purge_expired(&self) -> usize {
        let mut removed = Vec::new();
        for store in StoreId::ALL {
            removed.extend(self.inner.stores.core(store).purge_expired().await);
        }
        let count = removed.len();
        if count > 0 {
            debug!("Purged {} expired entries", count);
        }
        self.inner.apply_removals(removed).await;
        count
    }

    pub async fn stats(&self) -> HashMap<StoreId, CacheStats> {
        let mut stats = HashMap::new();
        for store in StoreId::ALL {
            stats.insert(store, self.inner.stores.core(store).stats().await);
        }
        stats
    }

    pub async fn store_stats(&self, store: StoreId) -> CacheStats {
        self.inner.stores.core(store).stats().await
    }

    /// Snapshot of one store, oldest first
    pub async fn entries(&self, store: StoreId) -> Vec<CacheEntry> {
        self.inner.stores.core(store).entries().await
    }

    async fn commit(&self, entries: Vec<CacheEntry>) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.write_entries(entries).await })
            .await
            .map_err(|e| CacheError::Background(e.to_string()))?
    }
}

impl Inner {
    fn publish(&self, event: CacheEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn publish_resolve(
        &self,
        kind: LookupKind,
        key: Option<CacheKey>,
        hit: Option<&StoreHit>,
        started: Instant,
        rejected: Option<&CacheError>,
    ) {
        let outcome = match (hit, rejected) {
            (_, Some(e)) => ResolveOutcome::Rejected {
                reason: e.to_string(),
            },
            (Some(hit), None) => ResolveOutcome::Hit {
                store: hit.entry.store,
                similarity: hit.similarity,
            },
            (None, None) => ResolveOutcome::Miss,
        };

        let elapsed_us = started.elapsed().as_micros() as u64;
        match &outcome {
            ResolveOutcome::Hit { store, similarity } => {
                debug!("{} hit in {} ({:.3}) after {}us", kind, store, similarity, elapsed_us)
            }
            ResolveOutcome::Miss => debug!("{} miss after {}us", kind, elapsed_us),
            ResolveOutcome::Rejected { reason } => debug!("{} lookup rejected: {}", kind, reason),
        }

        self.publish(CacheEvent::Resolved(ResolveEvent::new(kind, key, outcome, elapsed_us)));
    }

    async fn write_entries(&self, entries: Vec<CacheEntry>) -> Result<()> {
        let mut records = Vec::with_capacity(entries.len());
        let mut removals = Vec::new();

        for entry in entries {
            if self.backend.is_some() {
                match PersistedRecord::from_entry(&entry) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Failed to encode {} for persistence: {}", entry.key, e),
                }
            }

            let (store, key) = (entry.store, entry.key.clone());
            removals.extend(self.stores.insert(entry).await?);
            self.publish(CacheEvent::Recorded { store, key });
        }

        self.apply_removals(removals).await;

        if let Some(backend) = self.backend.clone() {
            self.spawn_background(async move {
                for record in records {
                    let key = record.key.clone();
                    if let Err(e) = backend.put(record).await {
                        warn!("Failed to persist {} to {}: {}", key, backend.name(), e);
                    }
                }
            })
            .await;
        }

        Ok(())
    }

    /// Publish removals; manual and TTL removals also leave the backend
    async fn apply_removals(&self, removals: Vec<Removal>) {
        let mut forget = Vec::new();
        for removal in removals {
            let Removal { entry, reason } = removal;
            // LRU victims stay in the backend; cleared stores are wiped in one call
            if matches!(reason, RemovalReason::Expired | RemovalReason::Manual) {
                forget.push((entry.store, entry.key.clone()));
            }
            self.publish(CacheEvent::Removed {
                store: entry.store,
                key: entry.key,
                reason,
            });
        }

        if forget.is_empty() {
            return;
        }
        if let Some(backend) = self.backend.clone() {
            self.spawn_background(async move {
                for (store, key) in forget {
                    if let Err(e) = backend.remove(store, &key).await {
                        warn!("Failed to remove {} from {}: {}", key, backend.name(), e);
                    }
                }
            })
            .await;
        }
    }

    async fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut pending = self.pending.lock().await;
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Decode documents, skipping and reporting malformed ones
    async fn decode_all(&self, store: StoreId, documents: &[Value]) -> Vec<CacheEntry> {
        let mut entries = Vec::with_capacity(documents.len());
        let mut malformed = 0;

        for document in documents {
            match decode_entry(store, document) {
                Ok(entry) => entries.push(entry),
                Err(CacheError::MalformedStoredEntry { key, reason }) => {
                    warn!("Skipping malformed entry {} in {}: {}", key, store, reason);
                    self.publish(CacheEvent::MalformedSkipped { store, key, reason });
                    malformed += 1;
                }
                Err(e) => {
                    warn!("Skipping undecodable entry in {}: {}", store, e);
                    malformed += 1;
                }
            }
        }

        if malformed > 0 {
            self.stores.core(store).note_malformed(malformed).await;
        }
        entries
    }

    fn read_through_enabled(&self) -> Option<Arc<dyn PersistenceBackend>> {
        if self.config.read_through {
            self.backend.clone()
        } else {
            None
        }
    }

    /// Bound a backend read by the persistence timeout; failures degrade to `None`
    async fn bounded<T, F>(&self, what: &str, read: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.persistence_timeout, read).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("Persistence read for {} failed: {}", what, e);
                None
            }
            Err(_) => {
                warn!(
                    "Persistence read for {} timed out after {:?}",
                    what, self.config.persistence_timeout
                );
                None
            }
        }
    }

    /// Adopt a persisted entry into memory and serve it
    async fn adopt(&self, entry: CacheEntry, similarity: f64, breakdown: Option<ScoreBreakdown>) -> Option<StoreHit> {
        let adopted = entry.clone();
        let (store, key) = (entry.store, entry.key.clone());
        match self.stores.insert(entry).await {
            Ok(removals) => self.apply_removals(removals).await,
            Err(e) => {
                warn!("Could not adopt persisted entry {}: {}", key, e);
                return None;
            }
        }
        debug!("Read-through hit for {} in {}", key, store);
        self.stores
            .core(store)
            .hit_scored(&adopted, similarity, breakdown)
            .await
    }

    async fn read_through_exact(&self, store: StoreId, key: &str) -> Option<StoreHit> {
        let backend = self.read_through_enabled()?;
        let document = self.bounded(key, backend.get(store, key)).await??;

        let entry = self.decode_all(store, std::slice::from_ref(&document)).await.pop()?;
        if entry.is_expired() || entry.key != key {
            return None;
        }
        self.adopt(entry, 1.0, None).await
    }

    async fn read_through_similar(&self, requested: &FeatureVector) -> Option<StoreHit> {
        let backend = self.read_through_enabled()?;
        let store = StoreId::ActivitySimilar;
        let filter = CandidateFilter::for_vector(requested, self.config.max_distance_km);
        let documents = self
            .bounded("similarity candidates", backend.scan(store, &filter))
            .await?;

        let similarity = &self.stores.activity_similar;
        let scorer = similarity.scorer();
        let best = self
            .decode_all(store, &documents)
            .await
            .into_iter()
            .filter(|entry| !entry.is_expired())
            .filter_map(|entry| {
                let cached = entry.features.as_ref()?;
                if scorer.disqualify(cached, requested).is_some() {
                    return None;
                }
                let breakdown = scorer.score_cached(cached, requested);
                Some((entry, breakdown))
            })
            .max_by(|(ea, a), (eb, b)| {
                a.combined
                    .total_cmp(&b.combined)
                    .then(ea.metadata.created_at.cmp(&eb.metadata.created_at))
            })?;

        let (entry, breakdown) = best;
        if breakdown.combined < similarity.threshold() {
            return None;
        }
        self.adopt(entry, breakdown.combined, Some(breakdown)).await
    }

    async fn read_through_range(&self, query: &RangeQuery) -> Option<StoreHit> {
        let backend = self.read_through_enabled()?;
        let store = StoreId::Events;
        let filter = CandidateFilter::all().location(&query.location);
        let documents = self.bounded(&query.location, backend.scan(store, &filter)).await?;

        let entry = self
            .decode_all(store, &documents)
            .await
            .into_iter()
            .filter(|entry| {
                !entry.is_expired()
                    && entry.covers(query.date)
                    && normalize_location(&entry.summary.location) == query.location
            })
            .max_by_key(|entry| entry.metadata.created_at)?;
        self.adopt(entry, 1.0, None).await
    }
}
