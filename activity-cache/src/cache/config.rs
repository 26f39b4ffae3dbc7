//! Configuration for the cache system
//!
//! Read-only once a coordinator is built; shared across all readers.

use crate::cache::types::StoreId;
use crate::error::{CacheError, Result};
use crate::similarity::{DimensionWeights, ScoringParams};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Prefix of environment variables read by [`CacheConfig::from_env`]
pub const ENV_PREFIX: &str = "ACTIVITY_CACHE_";

/// Longest accepted entry TTL (one year)
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Maximum entry count per store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCapacities {
    pub activity_exact: usize,
    pub activity_similar: usize,
    pub weather: usize,
    pub events: usize,
}

impl Default for StoreCapacities {
    fn default() -> Self {
        Self {
            activity_exact: 100,
            activity_similar: 30,
            weather: 75,
            events: 50,
        }
    }
}

impl StoreCapacities {
    pub fn get(&self, store: StoreId) -> usize {
        match store {
            StoreId::ActivityExact => self.activity_exact,
            StoreId::ActivitySimilar => self.activity_similar,
            StoreId::Weather => self.weather,
            StoreId::Events => self.events,
        }
    }
}

/// Configuration for the cache coordinator and its stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Minimum combined score for a similarity hit (0.0 - 1.0)
    pub acceptance_threshold: f64,

    /// Hard cutoff on great-circle distance
    pub max_distance_km: f64,

    /// Hard cutoff on circular day-of-year distance, also the temporal decay window
    pub max_day_distance: u32,

    /// Standard deviation of the temperature bell curve
    pub temperature_tolerance_c: f64,

    /// Cap of the temporal bonus for shared holiday proximity
    pub holiday_bonus: f64,

    /// Days around a holiday over which proximity decays; also the
    /// half-width of the interval recorded for event listings
    pub holiday_window_days: u32,

    pub weights: DimensionWeights,

    pub capacities: StoreCapacities,

    /// Optional lifetime of entries; `None` keeps entries until evicted
    pub entry_ttl: Option<Duration>,

    /// TTL jitter factor (0.0 - 1.0), spreads expiry of entries recorded together
    pub ttl_jitter: f64,

    /// Consult the persistence backend when memory misses
    pub read_through: bool,

    /// Upper bound on any persistence read issued from the lookup path
    pub persistence_timeout: Duration,

    /// Buffer of the resolve event broadcast channel
    pub event_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let scoring = ScoringParams::default();
        Self {
            acceptance_threshold: 0.90,
            max_distance_km: scoring.max_distance_km,
            max_day_distance: scoring.max_day_distance,
            temperature_tolerance_c: scoring.temperature_tolerance_c,
            holiday_bonus: scoring.holiday_bonus,
            holiday_window_days: 3,
            weights: scoring.weights,
            capacities: StoreCapacities::default(),
            entry_ttl: None,
            ttl_jitter: 0.125,
            read_through: true,
            persistence_timeout: Duration::from_millis(250),
            event_buffer: 256,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Parameters handed to the similarity scorer
    pub fn scoring_params(&self) -> ScoringParams {
        ScoringParams {
            max_distance_km: self.max_distance_km,
            max_day_distance: self.max_day_distance,
            temperature_tolerance_c: self.temperature_tolerance_c,
            holiday_bonus: self.holiday_bonus,
            weights: self.weights,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(CacheError::Configuration(msg));

        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return fail("acceptance_threshold must be between 0.0 and 1.0".to_string());
        }

        if !self.max_distance_km.is_finite() || self.max_distance_km <= 0.0 {
            return fail("max_distance_km must be greater than 0".to_string());
        }

        if self.max_day_distance == 0 {
            return fail("max_day_distance must be greater than 0".to_string());
        }

        if !self.temperature_tolerance_c.is_finite() || self.temperature_tolerance_c <= 0.0 {
            return fail("temperature_tolerance_c must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.holiday_bonus) {
            return fail("holiday_bonus must be between 0.0 and 1.0".to_string());
        }

        self.weights.validate().map_err(CacheError::Configuration)?;

        for store in StoreId::ALL {
            if self.capacities.get(store) == 0 {
                return fail(format!("capacity of {} must be greater than 0", store));
            }
        }

        if !(0.0..1.0).contains(&self.ttl_jitter) {
            return fail("ttl_jitter must be at least 0.0 and below 1.0".to_string());
        }

        if let Some(ttl) = self.entry_ttl {
            if ttl.is_zero() {
                return fail("entry_ttl must be greater than 0 when set".to_string());
            }
            if ttl > MAX_ENTRY_TTL {
                return fail(format!(
                    "entry_ttl must not exceed {} seconds",
                    MAX_ENTRY_TTL.as_secs()
                ));
            }
        }

        if self.event_buffer == 0 {
            return fail("event_buffer must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Calculate the TTL for a new entry with jitter applied.
    ///
    /// The result stays within `ttl * (1 ± ttl_jitter)`, so sub-second TTLs
    /// keep their scale.
    pub fn ttl_with_jitter(&self) -> Option<Duration> {
        let ttl = self.entry_ttl?;
        if self.ttl_jitter == 0.0 {
            return Some(ttl);
        }

        let base_secs = ttl.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        Some(Duration::from_secs_f64(base_secs + jitter))
    }

    /// Defaults overridden by `ACTIVITY_CACHE_*` variables (a `.env` file is honoured)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "THRESHOLD")? {
            config.acceptance_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_DISTANCE_KM")? {
            config.max_distance_km = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_DAY_DISTANCE")? {
            config.max_day_distance = v;
        }
        if let Some(v) = parse_var(&lookup, "TEMPERATURE_TOLERANCE_C")? {
            config.temperature_tolerance_c = v;
        }
        if let Some(v) = parse_var(&lookup, "HOLIDAY_WINDOW_DAYS")? {
            config.holiday_window_days = v;
        }
        if let Some(v) = parse_var(&lookup, "CAPACITY_ACTIVITY_EXACT")? {
            config.capacities.activity_exact = v;
        }
        if let Some(v) = parse_var(&lookup, "CAPACITY_ACTIVITY_SIMILAR")? {
            config.capacities.activity_similar = v;
        }
        if let Some(v) = parse_var(&lookup, "CAPACITY_WEATHER")? {
            config.capacities.weather = v;
        }
        if let Some(v) = parse_var(&lookup, "CAPACITY_EVENTS")? {
            config.capacities.events = v;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "TTL_SECS")? {
            config.entry_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(ms) = parse_var(&lookup, "PERSISTENCE_TIMEOUT_MS")? {
            config.persistence_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = parse_var(&lookup, "READ_THROUGH")? {
            config.read_through = v;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, suffix: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let name = format!("{}{}", ENV_PREFIX, suffix);
    match lookup(&name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CacheError::Configuration(format!("{}: {}", name, e))),
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    acceptance_threshold: Option<f64>,
    max_distance_km: Option<f64>,
    max_day_distance: Option<u32>,
    temperature_tolerance_c: Option<f64>,
    holiday_bonus: Option<f64>,
    holiday_window_days: Option<u32>,
    weights: Option<DimensionWeights>,
    capacities: Option<StoreCapacities>,
    entry_ttl: Option<Duration>,
    ttl_jitter: Option<f64>,
    read_through: Option<bool>,
    persistence_timeout: Option<Duration>,
    event_buffer: Option<usize>,
}

impl CacheConfigBuilder {
    /// Set the similarity acceptance threshold
    pub fn acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = Some(threshold);
        self
    }

    pub fn max_distance_km(mut self, km: f64) -> Self {
        self.max_distance_km = Some(km);
        self
    }

    pub fn max_day_distance(mut self, days: u32) -> Self {
        self.max_day_distance = Some(days);
        self
    }

    pub fn temperature_tolerance_c(mut self, tolerance: f64) -> Self {
        self.temperature_tolerance_c = Some(tolerance);
        self
    }

    pub fn holiday_bonus(mut self, bonus: f64) -> Self {
        self.holiday_bonus = Some(bonus);
        self
    }

    pub fn holiday_window_days(mut self, days: u32) -> Self {
        self.holiday_window_days = Some(days);
        self
    }

    pub fn weights(mut self, weights: DimensionWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn capacities(mut self, capacities: StoreCapacities) -> Self {
        self.capacities = Some(capacities);
        self
    }

    /// Set the capacity of a single store
    pub fn capacity(mut self, store: StoreId, max: usize) -> Self {
        let mut capacities = self.capacities.unwrap_or_default();
        match store {
            StoreId::ActivityExact => capacities.activity_exact = max,
            StoreId::ActivitySimilar => capacities.activity_similar = max,
            StoreId::Weather => capacities.weather = max,
            StoreId::Events => capacities.events = max,
        }
        self.capacities = Some(capacities);
        self
    }

    /// Expire entries after `ttl`
    pub fn entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = Some(ttl);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    pub fn read_through(mut self, enable: bool) -> Self {
        self.read_through = Some(enable);
        self
    }

    pub fn persistence_timeout(mut self, timeout: Duration) -> Self {
        self.persistence_timeout = Some(timeout);
        self
    }

    pub fn event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = Some(size);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            acceptance_threshold: self
                .acceptance_threshold
                .unwrap_or(defaults.acceptance_threshold),
            max_distance_km: self.max_distance_km.unwrap_or(defaults.max_distance_km),
            max_day_distance: self.max_day_distance.unwrap_or(defaults.max_day_distance),
            temperature_tolerance_c: self
                .temperature_tolerance_c
                .unwrap_or(defaults.temperature_tolerance_c),
            holiday_bonus: self.holiday_bonus.unwrap_or(defaults.holiday_bonus),
            holiday_window_days: self
                .holiday_window_days
                .unwrap_or(defaults.holiday_window_days),
            weights: self.weights.unwrap_or(defaults.weights),
            capacities: self.capacities.unwrap_or(defaults.capacities),
            entry_ttl: self.entry_ttl.or(defaults.entry_ttl),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            read_through: self.read_through.unwrap_or(defaults.read_through),
            persistence_timeout: self
                .persistence_timeout
                .unwrap_or(defaults.persistence_timeout),
            event_buffer: self.event_buffer.unwrap_or(defaults.event_buffer),
        }
    }
}

/// Preset configurations
impl CacheConfig {
    /// Tight capacities for memory-constrained processes
    pub fn small() -> Self {
        Self {
            capacities: StoreCapacities {
                activity_exact: 25,
                activity_similar: 10,
                weather: 20,
                events: 15,
            },
            ..Default::default()
        }
    }

    /// Roomier stores for busy deployments
    pub fn large() -> Self {
        Self {
            capacities: StoreCapacities {
                activity_exact: 400,
                activity_similar: 120,
                weather: 300,
                events: 200,
            },
            ..Default::default()
        }
    }
}
