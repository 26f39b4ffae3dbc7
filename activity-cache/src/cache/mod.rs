//! # Tiered Activity Cache
//!
//! Three store tiers behind one coordinator:
//!
//! - **Strict**: exact normalized key, for repeats and for weather
//! - **Range**: date-in-interval lookups, for event listings
//! - **Similarity**: feature-vector scoring with hard cutoffs and an
//!   acceptance threshold, for "close enough" activity plans
//!
//! Every store is bounded and evicts the least recently used entry. Each
//! store has its own lock; no operation holds two store locks at once.
//!
//! ## Example
//!
//! ```rust
//! use activity_cache::cache::{CacheConfig, CacheCoordinator};
//! use activity_cache::SearchContext;
//! use chrono::NaiveDate;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = CacheCoordinator::new(CacheConfig::default())?;
//!
//! let date = NaiveDate::from_ymd_opt(2025, 9, 20).unwrap();
//! let context = SearchContext::new("Madrid, Spain", date).with_coordinates(40.4168, -3.7038);
//!
//! cache.record(&context, r#"{"activities": []}"#).await?;
//!
//! if let Some(info) = cache.resolve(&context).await?.info() {
//!     println!("Served from {} ({:.2})", info.store, info.similarity);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod entry;
pub mod events;
pub mod key;
pub mod persistence;
pub mod range;
pub mod sanitize;
pub mod similarity;
pub mod store;
pub mod strict;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder, StoreCapacities, ENV_PREFIX, MAX_ENTRY_TTL};
pub use coordinator::{CacheCoordinator, HydrationReport, MatchInfo, Resolution, Served};
pub use entry::{CacheEntry, CacheMetadata};
pub use events::{CacheEvent, LookupKind, RemovalReason, ResolveEvent, ResolveOutcome};
pub use key::{activity_key, events_key, weather_key, CacheKeyBuilder};
pub use persistence::{CandidateFilter, InMemoryBackend, PersistedRecord, PersistenceBackend};
pub use range::{RangeQuery, RangeStore};
pub use sanitize::{decode_entry, encode_entry, numeric_f64, numeric_u64, sanitize};
pub use similarity::{Candidate, SimilarityStore};
pub use store::{Removal, StoreCore, StoreHit, TierStore};
pub use strict::StrictStore;
pub use types::{CacheKey, CacheStats, CacheValue, StoreId};
