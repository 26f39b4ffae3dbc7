//! Integration tests for the cache module
//!
//! These tests verify the complete cache functionality including:
//! - Tier routing and LRU eviction
//! - TTL expiration
//! - Persistence: hydration, sanitization, read-through, timeouts
//! - Concurrency and cancellation of writes
//! - Event publishing and statistics

use activity_cache::cache::{
    encode_entry, CacheConfig, CacheCoordinator, CacheEntry, CacheEvent, CandidateFilter,
    InMemoryBackend, PersistedRecord, PersistenceBackend, RemovalReason, ResolveOutcome, StoreId,
};
use activity_cache::{CacheError, Result, SearchContext, WeatherSummary};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::FutureExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
}

fn weather(min: f64, max: f64, rain: f64) -> WeatherSummary {
    WeatherSummary {
        min_temp_c: Some(min),
        max_temp_c: Some(max),
        precipitation_probability: Some(rain),
        wind_speed_kmh: Some(10.0),
    }
}

fn city(name: &str, lat: f64, lon: f64, d: u32) -> SearchContext {
    SearchContext::new(name, day(d))
        .with_coordinates(lat, lon)
        .with_ages([6, 8])
        .with_weather(weather(18.0, 28.0, 10.0))
}

fn madrid(d: u32) -> SearchContext {
    city("Madrid, Spain", 40.4168, -3.7038, d)
}

fn lisbon(d: u32) -> SearchContext {
    city("Lisbon, Portugal", 38.7223, -9.1393, d)
}

fn paris(d: u32) -> SearchContext {
    city("Paris, France", 48.8566, 2.3522, d)
}

#[tokio::test]
async fn test_basic_record_and_resolve() {
    let cache = CacheCoordinator::new(CacheConfig::default()).unwrap();

    assert!(!cache.resolve(&madrid(20)).await.unwrap().is_hit());
    cache.record(&madrid(20), "madrid-plan").await.unwrap();

    let resolution = cache.resolve(&madrid(20)).await.unwrap();
    assert_eq!(resolution.payload(), Some("madrid-plan"));

    let stats = cache.stats().await;
    assert_eq!(stats[&StoreId::ActivityExact].entries, 1);
    assert_eq!(stats[&StoreId::ActivitySimilar].entries, 1);
    assert_eq!(stats[&StoreId::ActivityExact].hits, 1);
    assert_eq!(stats[&StoreId::ActivityExact].misses, 1);
}

#[tokio::test]
async fn test_lru_eviction_is_per_store() {
    let config = CacheConfig::builder()
        .capacity(StoreId::ActivityExact, 2)
        .capacity(StoreId::ActivitySimilar, 2)
        .build();
    let cache = CacheCoordinator::new(config).unwrap();
    let mut events = cache.subscribe();

    cache.record(&madrid(20), "madrid").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    cache.record(&lisbon(20), "lisbon").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;

    // An exact repeat touches Madrid in the strict store only
    assert!(cache.resolve(&madrid(20)).await.unwrap().is_hit());
    tokio::time::sleep(Duration::from_millis(2)).await;

    cache.record(&paris(20), "paris").await.unwrap();

    let locations = |entries: Vec<CacheEntry>| -> Vec<String> {
        entries.into_iter().map(|e| e.summary.location).collect()
    };
    assert_eq!(
        locations(cache.entries(StoreId::ActivityExact).await),
        vec!["Madrid, Spain", "Paris, France"]
    );
    assert_eq!(
        locations(cache.entries(StoreId::ActivitySimilar).await),
        vec!["Lisbon, Portugal", "Paris, France"]
    );

    let mut evicted = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CacheEvent::Removed { store, key, reason } = event {
            assert_eq!(reason, RemovalReason::LeastRecentlyUsed);
            evicted.push((store, key));
        }
    }
    assert_eq!(evicted.len(), 2);
    assert!(evicted
        .iter()
        .any(|(store, key)| *store == StoreId::ActivityExact && key.contains("lisbon")));
    assert!(evicted
        .iter()
        .any(|(store, key)| *store == StoreId::ActivitySimilar && key.contains("madrid")));

    let stats = cache.store_stats(StoreId::ActivityExact).await;
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.evictions_capacity, 1);
}

#[tokio::test]
async fn test_ttl_expiration() {
    let config = CacheConfig::builder()
        .entry_ttl(Duration::from_millis(100))
        .ttl_jitter(0.0) // No jitter for predictable tests
        .build();
    let cache = CacheCoordinator::new(config).unwrap();

    let london = SearchContext::new("London, UK", day(22));
    cache.record_weather(&london, "drizzle").await.unwrap();
    assert!(cache.resolve_weather(&london).await.unwrap().is_hit());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!cache.resolve_weather(&london).await.unwrap().is_hit());

    assert_eq!(cache.purge_expired().await, 1);
    let stats = cache.store_stats(StoreId::Weather).await;
    assert_eq!(stats.evictions_ttl, 1);
    assert_eq!(stats.entries, 0);
}

#[tokio::test]
async fn test_clear_and_remove() {
    let cache = CacheCoordinator::new(CacheConfig::default()).unwrap();
    cache.record(&madrid(20), "madrid").await.unwrap();
    cache.record(&lisbon(20), "lisbon").await.unwrap();
    cache
        .record_weather(&SearchContext::new("London, UK", day(22)), "sunny")
        .await
        .unwrap();

    let exact = cache.entries(StoreId::ActivityExact).await;
    assert_eq!(exact.len(), 2);
    assert!(cache.remove(StoreId::ActivityExact, &exact[0].key).await);
    assert_eq!(cache.entries(StoreId::ActivityExact).await.len(), 1);

    assert_eq!(cache.clear(StoreId::Weather).await, 1);
    assert_eq!(cache.clear_all().await, 3);
    for (_, stats) in cache.stats().await {
        assert_eq!(stats.entries, 0);
    }
}

#[tokio::test]
async fn test_events_are_published() {
    let cache = CacheCoordinator::new(CacheConfig::default()).unwrap();
    let mut events = cache.subscribe();

    cache.record(&madrid(20), "plan").await.unwrap();
    cache.resolve(&madrid(21)).await.unwrap();

    let recorded: Vec<StoreId> = (0..2)
        .map(|_| match events.try_recv().unwrap() {
            CacheEvent::Recorded { store, .. } => store,
            other => panic!("expected Recorded, got {:?}", other),
        })
        .collect();
    assert_eq!(recorded, vec![StoreId::ActivityExact, StoreId::ActivitySimilar]);

    match events.try_recv().unwrap() {
        CacheEvent::Resolved(event) => {
            assert!(event.is_hit());
            match event.outcome {
                ResolveOutcome::Hit { store, similarity } => {
                    assert_eq!(store, StoreId::ActivitySimilar);
                    assert!(similarity >= 0.90 && similarity < 1.0);
                }
                other => panic!("expected hit, got {:?}", other),
            }
        }
        other => panic!("expected Resolved, got {:?}", other),
    }
}

#[tokio::test]
async fn test_record_completes_when_caller_is_cancelled() {
    let cache = CacheCoordinator::new(CacheConfig::default()).unwrap();

    // Poll once, then drop the future before the write task has run
    let finished = cache.record(&madrid(20), "plan").now_or_never();
    assert!(finished.is_none());

    tokio::time::sleep(Duration::from_millis(20)).await;
    let resolution = cache.resolve(&madrid(20)).await.unwrap();
    assert_eq!(resolution.payload(), Some("plan"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access() {
    let cache = CacheCoordinator::new(CacheConfig::default()).unwrap();
    let mut handles = Vec::new();

    for i in 0..16u32 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            // Cities spread 1 degree apart so none fall within 20 km
            let ctx = city(&format!("City {}", i), 10.0 + i as f64, 20.0, 20);
            cache.record(&ctx, format!("plan-{}", i)).await.unwrap();
            for _ in 0..10 {
                let resolution = cache.resolve(&ctx).await.unwrap();
                assert_eq!(resolution.payload(), Some(format!("plan-{}", i).as_str()));
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let stats = cache.store_stats(StoreId::ActivityExact).await;
    assert_eq!(stats.entries, 16);
    assert_eq!(stats.hits, 160);
}

#[tokio::test]
async fn test_racing_records_last_write_wins() {
    let cache = CacheCoordinator::new(CacheConfig::default()).unwrap();
    cache.record(&madrid(20), "first").await.unwrap();
    cache.record(&madrid(20), "second").await.unwrap();

    assert_eq!(cache.entries(StoreId::ActivityExact).await.len(), 1);
    assert_eq!(
        cache.resolve(&madrid(20)).await.unwrap().payload(),
        Some("second")
    );
}

// ---- persistence ----

#[tokio::test]
async fn test_background_writes_reach_backend() {
    let backend = Arc::new(InMemoryBackend::new());
    let cache = CacheCoordinator::with_persistence(CacheConfig::default(), backend.clone()).unwrap();

    cache.record(&madrid(20), "plan").await.unwrap();
    cache.record_range("Madrid, Spain", day(19), day(23), "[]").await.unwrap();
    cache.flush().await;

    assert_eq!(backend.len(StoreId::ActivityExact).await, 1);
    assert_eq!(backend.len(StoreId::ActivitySimilar).await, 1);
    assert_eq!(backend.len(StoreId::Events).await, 1);

    cache.clear_all().await;
    cache.flush().await;
    assert_eq!(backend.len(StoreId::ActivitySimilar).await, 0);
}

#[tokio::test]
async fn test_hydrate_skips_malformed_entries() {
    let backend = Arc::new(InMemoryBackend::new());
    let writer = CacheCoordinator::with_persistence(CacheConfig::default(), backend.clone()).unwrap();
    writer.record(&madrid(20), "madrid").await.unwrap();
    writer.record(&lisbon(20), "lisbon").await.unwrap();
    writer.flush().await;

    // Not an entry at all
    backend
        .insert_raw(StoreId::ActivitySimilar, "garbage", json!({"key": "garbage", "value": 3}))
        .await;

    // Structurally valid, but latitude out of range
    let mut bad = encode_entry(
        &CacheEntry::new(
            StoreId::ActivitySimilar,
            "activities:paris".to_string(),
            paris(20).summary().unwrap(),
            "paris".to_string(),
        )
        .with_features(writer.features(&paris(20))),
    )
    .unwrap();
    bad["features"]["location"]["coordinates"]["lat"] = json!(148.8);
    backend
        .insert_raw(StoreId::ActivitySimilar, "activities:paris", bad)
        .await;

    let reader = CacheCoordinator::with_persistence(CacheConfig::default(), backend).unwrap();
    let mut events = reader.subscribe();
    let report = reader.hydrate().await.unwrap();

    assert_eq!(report.loaded[&StoreId::ActivitySimilar], 2);
    assert_eq!(report.skipped[&StoreId::ActivitySimilar], 2);
    assert_eq!(report.loaded[&StoreId::ActivityExact], 2);
    assert_eq!(report.total_skipped(), 2);

    let stats = reader.store_stats(StoreId::ActivitySimilar).await;
    assert_eq!(stats.malformed_skipped, 2);
    assert_eq!(stats.entries, 2);

    let mut skipped_keys = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CacheEvent::MalformedSkipped { key, .. } = event {
            skipped_keys.push(key);
        }
    }
    skipped_keys.sort();
    assert_eq!(skipped_keys, vec!["activities:paris", "garbage"]);

    // Hydrated entries serve near variants
    assert!(reader.resolve(&madrid(21)).await.unwrap().is_hit());
}

#[tokio::test]
async fn test_hydrate_sanitizes_wrapped_numbers() {
    let backend = Arc::new(InMemoryBackend::new());
    let builder = CacheCoordinator::new(CacheConfig::default()).unwrap();

    let entry = CacheEntry::new(
        StoreId::ActivitySimilar,
        "activities:madrid, spain?date=2025-09-20".to_string(),
        madrid(20).summary().unwrap(),
        "from-document-store".to_string(),
    )
    .with_features(builder.features(&madrid(20)));

    let mut document = encode_entry(&entry).unwrap();
    document["features"]["temporal"]["day_of_year"] = json!({"$numberLong": "263"});
    document["features"]["location"]["coordinates"]["lat"] = json!({"$numberDouble": "40.4168"});
    document["features"]["location"]["coordinates"]["lon"] = json!("-3.7038");
    document["metadata"]["access_count"] = json!({"__bigint__": "12"});
    backend
        .put(PersistedRecord {
            store: StoreId::ActivitySimilar,
            key: entry.key.clone(),
            document,
        })
        .await
        .unwrap();

    let cache = CacheCoordinator::with_persistence(CacheConfig::default(), backend).unwrap();
    let report = cache.hydrate().await.unwrap();
    assert_eq!(report.total_loaded(), 1);
    assert_eq!(report.total_skipped(), 0);

    let hydrated = &cache.entries(StoreId::ActivitySimilar).await[0];
    assert_eq!(hydrated.features, entry.features);
    assert_eq!(hydrated.metadata.access_count, 12);

    let resolution = cache.resolve(&madrid(21)).await.unwrap();
    assert_eq!(resolution.payload(), Some("from-document-store"));
}

#[tokio::test]
async fn test_hydrate_respects_capacity() {
    let backend = Arc::new(InMemoryBackend::new());
    let writer = CacheCoordinator::with_persistence(CacheConfig::default(), backend.clone()).unwrap();
    for d in 1..=5 {
        writer
            .record_weather(&SearchContext::new("London, UK", day(d)), format!("day {}", d))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    writer.flush().await;

    let config = CacheConfig::builder().capacity(StoreId::Weather, 3).build();
    let reader = CacheCoordinator::with_persistence(config, backend).unwrap();
    let report = reader.hydrate().await.unwrap();
    assert_eq!(report.loaded[&StoreId::Weather], 3);

    // The most recently used documents are kept
    let kept: Vec<NaiveDate> = reader
        .entries(StoreId::Weather)
        .await
        .iter()
        .map(|entry| entry.summary.date)
        .collect();
    assert_eq!(kept, vec![day(3), day(4), day(5)]);
}

#[tokio::test]
async fn test_read_through_similarity() {
    let backend = Arc::new(InMemoryBackend::new());
    let writer = CacheCoordinator::with_persistence(CacheConfig::default(), backend.clone()).unwrap();
    writer.record(&madrid(20), "shared-plan").await.unwrap();
    writer.flush().await;

    let reader = CacheCoordinator::with_persistence(CacheConfig::default(), backend).unwrap();
    let resolution = reader.resolve(&madrid(21)).await.unwrap();

    let info = resolution.info().unwrap();
    assert_eq!(info.store, StoreId::ActivitySimilar);
    assert!(info.similarity >= 0.90);
    assert_eq!(info.original.date, day(20));
    assert_eq!(reader.store_stats(StoreId::ActivitySimilar).await.entries, 1);

    // Lisbon has no candidates within range
    assert!(!reader.resolve(&lisbon(21)).await.unwrap().is_hit());
}

#[tokio::test]
async fn test_read_through_across_the_equator() {
    // About 2 km apart; September is autumn to the north and spring to the south
    let north = city("Equator camp north", 0.01, 30.0, 20);
    let south = city("Equator camp south", -0.01, 30.0, 20);

    let backend = Arc::new(InMemoryBackend::new());
    let writer = CacheCoordinator::with_persistence(CacheConfig::default(), backend.clone()).unwrap();
    writer.record(&north, "equator-plan").await.unwrap();
    writer.flush().await;

    let in_memory = writer.resolve(&south).await.unwrap();
    assert_eq!(in_memory.info().unwrap().store, StoreId::ActivitySimilar);

    let reader = CacheCoordinator::with_persistence(CacheConfig::default(), backend).unwrap();
    let resolution = reader.resolve(&south).await.unwrap();
    assert_eq!(resolution.payload(), Some("equator-plan"));
    assert_eq!(resolution.info().unwrap().similarity, in_memory.info().unwrap().similarity);
}

#[tokio::test]
async fn test_clear_publishes_removals_and_wipes_backend() {
    let backend = Arc::new(InMemoryBackend::new());
    let cache = CacheCoordinator::with_persistence(CacheConfig::default(), backend.clone()).unwrap();
    cache
        .record_weather(&SearchContext::new("London, UK", day(22)), "sunny")
        .await
        .unwrap();
    cache.flush().await;
    assert_eq!(backend.len(StoreId::Weather).await, 1);

    let mut events = cache.subscribe();
    assert_eq!(cache.clear(StoreId::Weather).await, 1);

    match events.try_recv().unwrap() {
        CacheEvent::Removed { store, reason, .. } => {
            assert_eq!(store, StoreId::Weather);
            assert_eq!(reason, RemovalReason::Cleared);
        }
        other => panic!("expected Removed, got {:?}", other),
    }

    cache.flush().await;
    assert_eq!(backend.len(StoreId::Weather).await, 0);
}

/// Backend that never answers in time
struct StalledBackend;

#[async_trait]
impl PersistenceBackend for StalledBackend {
    async fn put(&self, _record: PersistedRecord) -> Result<()> {
        Ok(())
    }

    async fn get(&self, _store: StoreId, _key: &str) -> Result<Option<Value>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }

    async fn scan(&self, _store: StoreId, _filter: &CandidateFilter) -> Result<Vec<Value>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Vec::new())
    }

    async fn remove(&self, _store: StoreId, _key: &str) -> Result<bool> {
        Err(CacheError::Persistence("read only".to_string()))
    }

    async fn clear(&self, _store: StoreId) -> Result<usize> {
        Err(CacheError::Persistence("read only".to_string()))
    }
}

#[tokio::test]
async fn test_slow_backend_degrades_to_miss() {
    let config = CacheConfig::builder()
        .persistence_timeout(Duration::from_millis(50))
        .build();
    let cache = CacheCoordinator::with_persistence(config, Arc::new(StalledBackend)).unwrap();

    let started = Instant::now();
    assert!(!cache.resolve(&madrid(20)).await.unwrap().is_hit());
    assert!(!cache.resolve_events("Madrid, Spain", day(20)).await.unwrap().is_hit());
    assert!(started.elapsed() < Duration::from_secs(2));

    // Backend failures on writes never reach the caller
    cache.record(&madrid(20), "plan").await.unwrap();
    cache.clear_all().await;
    cache.flush().await;
}
