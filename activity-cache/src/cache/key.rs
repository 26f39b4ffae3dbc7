//! Deterministic cache keys
//!
//! Keys are built from normalized context fields so that two requests that
//! differ only in casing, whitespace or list order map to the same key.

use crate::cache::events::LookupKind;
use crate::cache::types::CacheKey;
use crate::context::{normalize_location, normalize_modifiers, SearchContext};
use crate::error::Result;
use chrono::NaiveDate;

/// Cache key builder
pub struct CacheKeyBuilder {
    kind: LookupKind,
    identifier: String,
    params: Vec<(&'static str, String)>,
}

impl CacheKeyBuilder {
    /// Create a new cache key builder
    pub fn new(kind: LookupKind) -> Self {
        Self {
            kind,
            identifier: String::new(),
            params: Vec::new(),
        }
    }

    /// Set the primary identifier
    pub fn identifier(mut self, id: impl Into<String>) -> Self {
        self.identifier = id.into();
        self
    }

    /// Add a parameter to the key
    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    /// Build the cache key
    pub fn build(self) -> CacheKey {
        let mut key = format!("{}:{}", self.kind, self.identifier);

        if !self.params.is_empty() {
            let params_str: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            key.push('?');
            key.push_str(&params_str.join("&"));
        }

        key
    }
}

/// Exact-repeat key: location, date, duration, ages and modifiers
pub fn activity_key(context: &SearchContext) -> Result<CacheKey> {
    let (location, date) = context.identity()?;

    let duration = context
        .duration_hours
        .filter(|h| h.is_finite())
        .map(|h| format!("{}", h))
        .unwrap_or_else(|| "-".to_string());

    let mut ages = context.ages.clone();
    ages.sort_unstable();
    let ages: Vec<String> = ages.iter().map(|a| a.to_string()).collect();

    Ok(CacheKeyBuilder::new(LookupKind::Activities)
        .identifier(location)
        .param("date", date.to_string())
        .param("duration", duration)
        .param("ages", ages.join(","))
        .param("mods", normalize_modifiers(&context.modifiers).join("|"))
        .build())
}

/// Weather key: location and date only
pub fn weather_key(context: &SearchContext) -> Result<CacheKey> {
    let (location, date) = context.identity()?;
    Ok(CacheKeyBuilder::new(LookupKind::Weather)
        .identifier(location)
        .param("date", date.to_string())
        .build())
}

/// Event listing key: location and covered interval
pub fn events_key(location: &str, start: NaiveDate, end: NaiveDate) -> CacheKey {
    CacheKeyBuilder::new(LookupKind::Events)
        .identifier(normalize_location(location))
        .param("start", start.to_string())
        .param("end", end.to_string())
        .build()
}
