//! Cache Demo Application
//!
//! Records one activity plan and shows which requests are served from cache.
//!
//! Usage:
//!   cargo run --example cache_demo
//!
//! Environment variables (a `.env` file is honoured):
//!   RUST_LOG                         - log filter (default: info)
//!   ACTIVITY_CACHE_THRESHOLD         - similarity acceptance threshold (default: 0.90)
//!   ACTIVITY_CACHE_MAX_DISTANCE_KM   - hard distance cutoff (default: 20)
//!   ACTIVITY_CACHE_MAX_DAY_DISTANCE  - hard day-of-year cutoff (default: 14)

use activity_cache::cache::{CacheEvent, InMemoryBackend};
use activity_cache::{
    CacheConfig, CacheCoordinator, CacheError, CacheResolver, FnResolver, ResolverChain,
    SearchContext, StoreId, WeatherSummary,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn madrid(date: NaiveDate, max_temp: f64) -> SearchContext {
    SearchContext::new("Madrid, Spain", date)
        .with_coordinates(40.4168, -3.7038)
        .with_ages([6, 8])
        .with_duration(4.0)
        .with_weather(WeatherSummary {
            min_temp_c: Some(16.0),
            max_temp_c: Some(max_temp),
            precipitation_probability: Some(10.0),
            wind_speed_kmh: Some(12.0),
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("=== Activity Cache Demo ===");

    let config = CacheConfig::from_env()?;
    let backend = Arc::new(InMemoryBackend::new());
    let cache = CacheCoordinator::with_persistence(config, backend.clone())?;

    let mut events = cache.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let CacheEvent::Resolved(resolved) = event {
                info!("event: {}", serde_json::to_string(&resolved).unwrap_or_default());
            }
        }
    });

    let day = |m, d| NaiveDate::from_ymd_opt(2025, m, d).unwrap_or_default();

    info!("\n--- Recording a Saturday plan ---");
    let saturday = madrid(day(9, 20), 34.0);
    cache.record(&saturday, r#"{"activities": ["Retiro boat ride"]}"#).await?;

    let requests = [
        ("exact repeat", saturday.clone()),
        ("next day, a little cooler", madrid(day(9, 21), 32.0)),
        ("six months later", madrid(day(3, 20), 20.0)),
    ];

    for (label, request) in &requests {
        let resolution = cache.resolve(request).await?;
        match resolution.info() {
            Some(info) => info!(
                "✓ {}: hit in {} (similarity {:.3}, recorded for {})",
                label, info.store, info.similarity, info.original.date
            ),
            None => {
                let nearest = cache.closest_match(request).await?;
                info!(
                    "✗ {}: miss (best candidate {})",
                    label,
                    nearest
                        .map(|c| format!("{:.3}", c.breakdown.combined))
                        .unwrap_or_else(|| "disqualified".to_string())
                );
            }
        }
    }

    info!("\n--- Event listings ---");
    cache
        .record_range("Madrid, Spain", day(9, 19), day(9, 23), r#"["San Mateo fair"]"#)
        .await?;
    for d in [21, 25] {
        let hit = cache.resolve_events("Madrid, Spain", day(9, d)).await?.is_hit();
        info!("Events on 2025-09-{}: {}", d, if hit { "cached" } else { "not cached" });
    }

    info!("\n--- Resolver chain ---");
    let chain = ResolverChain::new()
        .with(CacheResolver::new(cache.clone()))
        .with(FnResolver::new("planner", |ctx: SearchContext| async move {
            Ok::<_, CacheError>(format!(
                r#"{{"activities": ["fresh plan for {}"]}}"#,
                ctx.location
            ))
        }));
    let lisbon = SearchContext::new("Lisbon, Portugal", day(9, 20)).with_coordinates(38.7223, -9.1393);
    if let Some(resolved) = chain.resolve(&lisbon).await? {
        info!("Lisbon resolved by {} after skipping {:?}", resolved.resolver, resolved.skipped);
    }

    cache.flush().await;
    info!("\n--- Statistics ---");
    for store in StoreId::ALL {
        info!(
            "{}: {} (persisted: {})",
            store,
            cache.store_stats(store).await,
            backend.len(store).await
        );
    }

    Ok(())
}
