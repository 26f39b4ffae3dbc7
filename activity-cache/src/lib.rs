//! # Activity Cache (activity-cache)
//!
//! A similarity-aware cache for family activity recommendations. Generating
//! a plan is slow and costly, so results are reused when a new request is
//! close enough to one already answered: same city, similar weather, nearby
//! date, compatible group.
//!
//! ## Features
//!
//! - Exact-repeat, date-range and similarity tiers behind one coordinator
//! - Four-dimension similarity (location, weather, temporal, demographic)
//!   with hard distance and date cutoffs
//! - Partial data handled by renormalizing weights over present dimensions
//! - Bounded LRU stores, one lock per store
//! - Optional persistence with hydration, read-through and background writes
//! - Resolve events on a broadcast channel and per-store statistics
//!
//! ## Resolving Activities
//!
//! ```no_run
//! use activity_cache::{CacheConfig, CacheCoordinator, SearchContext, WeatherSummary};
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheCoordinator::new(CacheConfig::from_env()?)?;
//!
//!     let saturday = NaiveDate::from_ymd_opt(2025, 9, 20).unwrap();
//!     let request = SearchContext::new("Madrid, Spain", saturday)
//!         .with_coordinates(40.4168, -3.7038)
//!         .with_ages([6, 8])
//!         .with_weather(WeatherSummary {
//!             min_temp_c: Some(16.0),
//!             max_temp_c: Some(34.0),
//!             precipitation_probability: Some(10.0),
//!             wind_speed_kmh: Some(12.0),
//!         });
//!
//!     let served = cache
//!         .resolve_or_compute(&request, || async { Ok(r#"{"activities": []}"#.to_string()) })
//!         .await?;
//!     println!("From cache: {}", served.from_cache());
//!     Ok(())
//! }
//! ```
//!
//! ## Event Listings
//!
//! Listings are recorded for an interval and served for any date inside it.
//!
//! ```no_run
//! use activity_cache::{CacheConfig, CacheCoordinator};
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheCoordinator::new(CacheConfig::default())?;
//!     let day = |d| NaiveDate::from_ymd_opt(2025, 9, d).unwrap();
//!
//!     cache.record_range("Madrid, Spain", day(19), day(23), "[]").await?;
//!     assert!(cache.resolve_events("Madrid, Spain", day(21)).await?.is_hit());
//!     assert!(!cache.resolve_events("Madrid, Spain", day(25)).await?.is_hit());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod error;
pub mod features;
pub mod resolver;
pub mod similarity;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheCoordinator, CacheEntry, CacheEvent, CacheKey,
    CacheStats, CacheValue, InMemoryBackend, MatchInfo, PersistenceBackend, Resolution,
    ResolveEvent, Served, StoreId,
};
pub use context::{ContextSummary, Holiday, SearchContext, WeatherSummary};
pub use error::{CacheError, Result};
pub use features::{FeatureVector, FeatureVectorBuilder};
pub use resolver::{CacheResolver, FnResolver, Outcome, Resolved, Resolver, ResolverChain};
pub use similarity::{DimensionWeights, ScoreBreakdown, SimilarityScorer};
