//! Request context consumed by the cache engine
//!
//! A [`SearchContext`] is owned by the caller and never mutated here. All
//! weather and holiday data is optional; only the location name and the
//! target date are needed to key a request.

use crate::error::{CacheError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw search request as seen by the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchContext {
    /// Human readable place, e.g. "Madrid, Spain"
    pub location: String,

    /// Latitude in decimal degrees
    #[serde(default)]
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees
    #[serde(default)]
    pub longitude: Option<f64>,

    /// Day the activities are planned for
    #[serde(default)]
    pub date: Option<NaiveDate>,

    /// Requested duration in hours
    #[serde(default)]
    pub duration_hours: Option<f64>,

    /// Participant ages in years
    #[serde(default)]
    pub ages: Vec<u32>,

    #[serde(default)]
    pub weather: Option<WeatherSummary>,

    /// Known holidays and festivals around the date; `None` when not looked up
    #[serde(default)]
    pub holidays: Option<Vec<Holiday>>,

    /// Free-text modifiers such as "indoor" or "near the beach"
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// Forecast summary, every field nullable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WeatherSummary {
    pub min_temp_c: Option<f64>,
    pub max_temp_c: Option<f64>,
    /// Probability of precipitation, 0-100
    pub precipitation_probability: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
}

/// A holiday or festival spanning one or more days (inclusive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Holiday {
    /// Single-day holiday
    pub fn on(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start: date,
            end: date,
        }
    }

    /// Multi-day festival
    pub fn spanning(name: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Whole days between `date` and the closest day of this holiday (0 when inside)
    pub fn days_from(&self, date: NaiveDate) -> i64 {
        if date < self.start {
            (self.start - date).num_days()
        } else if date > self.end {
            (date - self.end).num_days()
        } else {
            0
        }
    }
}

impl SearchContext {
    /// Create a context with the two identity fields set
    pub fn new(location: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            location: location.into(),
            date: Some(date),
            ..Default::default()
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_duration(mut self, hours: f64) -> Self {
        self.duration_hours = Some(hours);
        self
    }

    pub fn with_ages(mut self, ages: impl IntoIterator<Item = u32>) -> Self {
        self.ages = ages.into_iter().collect();
        self
    }

    pub fn with_weather(mut self, weather: WeatherSummary) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_holidays(mut self, holidays: Vec<Holiday>) -> Self {
        self.holidays = Some(holidays);
        self
    }

    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifiers.push(modifier.into());
        self
    }

    /// Both coordinates, if present and finite
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    /// Check that the request can be keyed and return its normalized identity
    pub fn identity(&self) -> Result<(String, NaiveDate)> {
        let location = normalize_location(&self.location);
        if location.is_empty() {
            return Err(CacheError::IncompleteContext { field: "location" });
        }
        let date = self
            .date
            .ok_or(CacheError::IncompleteContext { field: "date" })?;
        Ok((location, date))
    }

    /// Summary kept alongside cached entries to explain a match
    pub fn summary(&self) -> Result<ContextSummary> {
        let (_, date) = self.identity()?;
        Ok(ContextSummary {
            location: self.location.trim().to_string(),
            date,
            end_date: None,
        })
    }
}

/// Enough of the original context to tell a user why an entry matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub location: String,
    pub date: NaiveDate,
    /// Set for range entries, the inclusive end of the covered interval
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// Lowercase, trim and collapse internal whitespace
pub fn normalize_location(location: &str) -> String {
    location
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize free-text modifiers into a sorted, de-duplicated list
pub fn normalize_modifiers(modifiers: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = modifiers
        .iter()
        .map(|m| normalize_location(m))
        .filter(|m| !m.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
