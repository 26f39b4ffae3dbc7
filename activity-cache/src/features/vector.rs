//! Feature vector types
//!
//! Every leaf is an `Option`: `None` means the source data was unavailable,
//! which is different from a zero reading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Seasons are flipped south of the equator
    pub fn is_southern(&self) -> bool {
        self.lat < 0.0
    }
}

/// Coarse place classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceClass {
    Coastal,
    Urban,
    Inland,
    Polar,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LocationFeatures {
    pub coordinates: Option<GeoPoint>,
    pub place_class: Option<PlaceClass>,
}

/// Precipitation probability bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecipitationBucket {
    /// Below 20%
    Dry,
    /// 20% to 60%
    Light,
    /// Above 60%
    Heavy,
}

impl PrecipitationBucket {
    pub fn from_probability(probability: f64) -> Self {
        if probability < 20.0 {
            PrecipitationBucket::Dry
        } else if probability <= 60.0 {
            PrecipitationBucket::Light
        } else {
            PrecipitationBucket::Heavy
        }
    }
}

impl fmt::Display for PrecipitationBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrecipitationBucket::Dry => write!(f, "dry"),
            PrecipitationBucket::Light => write!(f, "light"),
            PrecipitationBucket::Heavy => write!(f, "heavy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WeatherFeatures {
    /// Mean of min and max temperature, °C
    pub temp_midpoint: Option<f64>,
    /// Max minus min temperature, °C
    pub temp_spread: Option<f64>,
    pub precipitation: Option<PrecipitationBucket>,
    /// How pleasant the day is for outdoor plans, 0.0 - 1.0
    pub outdoor_suitability: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Meteorological season for a month (1-12); flipped south of the equator
    pub fn from_month(month: u32, southern_hemisphere: bool) -> Self {
        let northern = match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Autumn,
        };
        if southern_hemisphere {
            northern.opposite()
        } else {
            northern
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Season::Winter => Season::Summer,
            Season::Spring => Season::Autumn,
            Season::Summer => Season::Winter,
            Season::Autumn => Season::Spring,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TemporalFeatures {
    /// Day of year on a 365-day calendar (Feb 29 folds onto Feb 28)
    pub day_of_year: Option<u32>,
    pub season: Option<Season>,
    /// 1.0 on a holiday, decaying to 0.0 at the edge of the holiday window
    pub holiday_proximity: Option<f64>,
    pub is_weekend: Option<bool>,
}

/// Age bracket of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBracket {
    /// 0-2
    Toddler,
    /// 3-5
    Preschool,
    /// 6-12
    SchoolAge,
    /// 13-17
    Teen,
}

impl AgeBracket {
    pub fn from_age(age: u32) -> Option<Self> {
        match age {
            0..=2 => Some(AgeBracket::Toddler),
            3..=5 => Some(AgeBracket::Preschool),
            6..=12 => Some(AgeBracket::SchoolAge),
            13..=17 => Some(AgeBracket::Teen),
            _ => None,
        }
    }
}

/// Requested outing length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationBucket {
    /// Up to 5 hours
    HalfDay,
    /// Up to 12 hours
    FullDay,
    MultiDay,
}

impl DurationBucket {
    pub fn from_hours(hours: f64) -> Option<Self> {
        if !hours.is_finite() || hours <= 0.0 {
            None
        } else if hours <= 5.0 {
            Some(DurationBucket::HalfDay)
        } else if hours <= 12.0 {
            Some(DurationBucket::FullDay)
        } else {
            Some(DurationBucket::MultiDay)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DemographicFeatures {
    pub age_brackets: Option<BTreeSet<AgeBracket>>,
    pub duration: Option<DurationBucket>,
}

/// Normalized, comparable representation of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureVector {
    pub location: LocationFeatures,
    pub weather: WeatherFeatures,
    pub temporal: TemporalFeatures,
    pub demographic: DemographicFeatures,
}

impl FeatureVector {
    /// Reject values that would poison arithmetic (NaN, out-of-range degrees)
    pub fn validate(&self) -> Result<(), String> {
        if let Some(point) = self.location.coordinates {
            if !point.is_valid() {
                return Err(format!("coordinates out of range: {}, {}", point.lat, point.lon));
            }
        }

        let finite = [
            ("temp_midpoint", self.weather.temp_midpoint),
            ("temp_spread", self.weather.temp_spread),
        ];
        for (name, value) in finite {
            if matches!(value, Some(v) if !v.is_finite()) {
                return Err(format!("{} is not finite", name));
            }
        }

        let unit = [
            ("outdoor_suitability", self.weather.outdoor_suitability),
            ("holiday_proximity", self.temporal.holiday_proximity),
        ];
        for (name, value) in unit {
            if matches!(value, Some(v) if !(0.0..=1.0).contains(&v)) {
                return Err(format!("{} outside 0.0-1.0", name));
            }
        }

        if matches!(self.temporal.day_of_year, Some(d) if !(1..=365).contains(&d)) {
            return Err("day_of_year outside 1-365".to_string());
        }

        Ok(())
    }
}
