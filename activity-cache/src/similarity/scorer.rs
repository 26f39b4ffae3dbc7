//! Weighted multi-dimensional similarity between feature vectors
//!
//! Scoring runs in two steps. Hard checks (distance and day-of-year bounds)
//! short-circuit to a disqualified zero. Otherwise each dimension yields a
//! soft score in [0, 1] and the scores are combined with weights that are
//! renormalized over the dimensions both vectors actually carry.

use super::geo::{circular_day_distance, haversine_km};
use crate::features::{DurationBucket, FeatureVector, PrecipitationBucket};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal weights of the weather dimension
const WEATHER_TEMP_WEIGHT: f64 = 0.45;
const WEATHER_SPREAD_WEIGHT: f64 = 0.10;
const WEATHER_PRECIP_WEIGHT: f64 = 0.30;
const WEATHER_SUITABILITY_WEIGHT: f64 = 0.15;

/// Relative importance of each dimension in the combined score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub location: f64,
    pub weather: f64,
    pub temporal: f64,
    pub demographic: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            location: 0.2,
            weather: 0.4,
            temporal: 0.3,
            demographic: 0.1,
        }
    }
}

impl DimensionWeights {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Location => self.location,
            Dimension::Weather => self.weather,
            Dimension::Temporal => self.temporal,
            Dimension::Demographic => self.demographic,
        }
    }

    pub fn sum(&self) -> f64 {
        self.location + self.weather + self.temporal + self.demographic
    }

    /// Weights must be finite, non-negative and sum to 1.0 (±0.01)
    pub fn validate(&self) -> Result<(), String> {
        for dimension in Dimension::ALL {
            let w = self.get(dimension);
            if !w.is_finite() || w < 0.0 {
                return Err(format!("{} weight must be a non-negative number", dimension));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > 0.01 {
            return Err(format!("dimension weights must sum to 1.0, got {:.3}", sum));
        }
        Ok(())
    }
}

/// Scoring dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Location,
    Weather,
    Temporal,
    Demographic,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Location,
        Dimension::Weather,
        Dimension::Temporal,
        Dimension::Demographic,
    ];
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Location => write!(f, "location"),
            Dimension::Weather => write!(f, "weather"),
            Dimension::Temporal => write!(f, "temporal"),
            Dimension::Demographic => write!(f, "demographic"),
        }
    }
}

/// Why a pair was rejected before soft scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disqualification {
    TooFar { distance_km: f64, max_km: f64 },
    TooDistantInTime { days: u32, max_days: u32 },
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disqualification::TooFar {
                distance_km,
                max_km,
            } => write!(f, "{:.1} km apart (max {:.1} km)", distance_km, max_km),
            Disqualification::TooDistantInTime { days, max_days } => {
                write!(f, "{} days apart (max {} days)", days, max_days)
            }
        }
    }
}

/// Per-dimension scores and the combined result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub location: Option<f64>,
    pub weather: Option<f64>,
    pub temporal: Option<f64>,
    pub demographic: Option<f64>,
    pub combined: f64,
    pub disqualification: Option<Disqualification>,
}

impl ScoreBreakdown {
    fn disqualified(reason: Disqualification) -> Self {
        Self {
            location: None,
            weather: None,
            temporal: None,
            demographic: None,
            combined: 0.0,
            disqualification: Some(reason),
        }
    }

    pub fn is_disqualified(&self) -> bool {
        self.disqualification.is_some()
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Location => self.location,
            Dimension::Weather => self.weather,
            Dimension::Temporal => self.temporal,
            Dimension::Demographic => self.demographic,
        }
    }

    /// Share of `combined` contributed by one dimension after renormalization
    pub fn contribution(&self, dimension: Dimension, weights: &DimensionWeights) -> Option<f64> {
        let score = self.dimension(dimension)?;
        let present: f64 = Dimension::ALL
            .iter()
            .filter(|d| self.dimension(**d).is_some())
            .map(|d| weights.get(*d))
            .sum();
        if present <= 0.0 {
            return None;
        }
        Some(weights.get(dimension) * score / present)
    }
}

/// How precipitation buckets are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrecipitationMode {
    Symmetric,
    /// First argument is the cached entry, second the incoming request
    CachedForRequest,
}

/// Tunables for [`SimilarityScorer`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub max_distance_km: f64,
    pub max_day_distance: u32,
    pub temperature_tolerance_c: f64,
    /// Upper bound of the additive temporal bonus for shared holiday proximity
    pub holiday_bonus: f64,
    pub weights: DimensionWeights,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            max_distance_km: 20.0,
            max_day_distance: 14,
            temperature_tolerance_c: 10.0,
            holiday_bonus: 0.1,
            weights: DimensionWeights::default(),
        }
    }
}

/// Compares feature vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer {
    params: ScoringParams,
}

impl SimilarityScorer {
    pub fn new(params: ScoringParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    /// Symmetric similarity: `score(a, b) == score(b, a)`
    pub fn score(&self, a: &FeatureVector, b: &FeatureVector) -> ScoreBreakdown {
        self.score_with(a, b, PrecipitationMode::Symmetric)
    }

    /// Similarity of a cached vector as an answer to a requested one.
    ///
    /// Differs from [`score`](Self::score) only in precipitation: a dry cached
    /// plan serves a light-rain request better than the reverse.
    pub fn score_cached(&self, cached: &FeatureVector, requested: &FeatureVector) -> ScoreBreakdown {
        self.score_with(cached, requested, PrecipitationMode::CachedForRequest)
    }

    /// Hard checks only; skipped for dimensions missing on either side
    pub fn disqualify(&self, a: &FeatureVector, b: &FeatureVector) -> Option<Disqualification> {
        if let (Some(pa), Some(pb)) = (a.location.coordinates, b.location.coordinates) {
            let distance_km = haversine_km(pa, pb);
            if distance_km > self.params.max_distance_km {
                return Some(Disqualification::TooFar {
                    distance_km,
                    max_km: self.params.max_distance_km,
                });
            }
        }

        if let (Some(da), Some(db)) = (a.temporal.day_of_year, b.temporal.day_of_year) {
            let days = circular_day_distance(da, db);
            if days > self.params.max_day_distance {
                return Some(Disqualification::TooDistantInTime {
                    days,
                    max_days: self.params.max_day_distance,
                });
            }
        }

        None
    }

    fn score_with(&self, a: &FeatureVector, b: &FeatureVector, mode: PrecipitationMode) -> ScoreBreakdown {
        if let Some(reason) = self.disqualify(a, b) {
            return ScoreBreakdown::disqualified(reason);
        }

        let location = self.location_score(a, b);
        let weather = self.weather_score(a, b, mode);
        let temporal = self.temporal_score(a, b);
        let demographic = self.demographic_score(a, b);

        let w = &self.params.weights;
        let combined = weighted_mean(&[
            (w.location, location),
            (w.weather, weather),
            (w.temporal, temporal),
            (w.demographic, demographic),
        ])
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

        ScoreBreakdown {
            location,
            weather,
            temporal,
            demographic,
            combined,
            disqualification: None,
        }
    }

    /// `1 - distance / max_distance`, clamped
    pub fn location_score(&self, a: &FeatureVector, b: &FeatureVector) -> Option<f64> {
        let (pa, pb) = (a.location.coordinates?, b.location.coordinates?);
        let distance = haversine_km(pa, pb);
        Some((1.0 - distance / self.params.max_distance_km).clamp(0.0, 1.0))
    }

    fn weather_score(&self, a: &FeatureVector, b: &FeatureVector, mode: PrecipitationMode) -> Option<f64> {
        let (wa, wb) = (&a.weather, &b.weather);
        let tolerance = self.params.temperature_tolerance_c;

        let temp = both(wa.temp_midpoint, wb.temp_midpoint).map(|(x, y)| bell(x - y, tolerance));
        let spread = both(wa.temp_spread, wb.temp_spread).map(|(x, y)| bell(x - y, tolerance));
        let precip = both(wa.precipitation, wb.precipitation).map(|(x, y)| match mode {
            PrecipitationMode::Symmetric => {
                (precipitation_substitution(x, y) + precipitation_substitution(y, x)) / 2.0
            }
            PrecipitationMode::CachedForRequest => precipitation_substitution(x, y),
        });
        let suitability = both(wa.outdoor_suitability, wb.outdoor_suitability)
            .map(|(x, y)| (1.0 - (x - y).abs()).clamp(0.0, 1.0));

        weighted_mean(&[
            (WEATHER_TEMP_WEIGHT, temp),
            (WEATHER_SPREAD_WEIGHT, spread),
            (WEATHER_PRECIP_WEIGHT, precip),
            (WEATHER_SUITABILITY_WEIGHT, suitability),
        ])
    }

    fn temporal_score(&self, a: &FeatureVector, b: &FeatureVector) -> Option<f64> {
        let (da, db) = both(a.temporal.day_of_year, b.temporal.day_of_year)?;
        let days = circular_day_distance(da, db);
        let window = self.params.max_day_distance;

        let decay = if window == 0 {
            if days == 0 { 1.0 } else { 0.0 }
        } else {
            (1.0 - days as f64 / window as f64).max(0.0)
        };

        let bonus = match both(a.temporal.holiday_proximity, b.temporal.holiday_proximity) {
            Some((pa, pb)) if pa > 0.0 && pb > 0.0 => {
                self.params.holiday_bonus * (1.0 - (pa - pb).abs())
            }
            _ => 0.0,
        };

        Some((decay + bonus).min(1.0))
    }

    fn demographic_score(&self, a: &FeatureVector, b: &FeatureVector) -> Option<f64> {
        let (da, db) = (&a.demographic, &b.demographic);

        let overlap = match (&da.age_brackets, &db.age_brackets) {
            (Some(x), Some(y)) => {
                let union = x.union(y).count();
                let shared = x.intersection(y).count();
                Some(if union == 0 { 1.0 } else { shared as f64 / union as f64 })
            }
            _ => None,
        };
        let duration = both(da.duration, db.duration).map(|(x, y)| duration_compatibility(x, y));

        match (overlap, duration) {
            (Some(o), Some(d)) => Some(o * d),
            (Some(o), None) => Some(o),
            (None, Some(d)) => Some(d),
            (None, None) => None,
        }
    }
}

fn both<T>(a: Option<T>, b: Option<T>) -> Option<(T, T)> {
    Some((a?, b?))
}

/// Gaussian decay with the tolerance as standard deviation
fn bell(delta: f64, tolerance: f64) -> f64 {
    if tolerance <= 0.0 {
        return if delta == 0.0 { 1.0 } else { 0.0 };
    }
    (-(delta * delta) / (2.0 * tolerance * tolerance)).exp()
}

/// Mean over present scores, weights renormalized over the same set
fn weighted_mean(parts: &[(f64, Option<f64>)]) -> Option<f64> {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (weight, score) in parts {
        if let Some(score) = score {
            numerator += weight * score;
            denominator += weight;
        }
    }
    (denominator > 0.0).then(|| numerator / denominator)
}

/// How well a cached forecast bucket stands in for a requested one
fn precipitation_substitution(cached: PrecipitationBucket, requested: PrecipitationBucket) -> f64 {
    use PrecipitationBucket::*;
    match (cached, requested) {
        (Dry, Dry) | (Light, Light) | (Heavy, Heavy) => 1.0,
        (Dry, Light) => 0.85,
        (Light, Dry) => 0.6,
        (Light, Heavy) => 0.5,
        (Heavy, Light) => 0.4,
        (Dry, Heavy) => 0.2,
        (Heavy, Dry) => 0.1,
    }
}

fn duration_compatibility(a: DurationBucket, b: DurationBucket) -> f64 {
    use DurationBucket::*;
    match (a, b) {
        (HalfDay, HalfDay) | (FullDay, FullDay) | (MultiDay, MultiDay) => 1.0,
        (HalfDay, FullDay) | (FullDay, HalfDay) => 0.5,
        (FullDay, MultiDay) | (MultiDay, FullDay) => 0.6,
        (HalfDay, MultiDay) | (MultiDay, HalfDay) => 0.25,
    }
}
