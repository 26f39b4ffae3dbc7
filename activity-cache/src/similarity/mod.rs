//! Similarity scoring between feature vectors

pub mod geo;
pub mod scorer;

pub use geo::{circular_day_distance, haversine_km, EARTH_RADIUS_KM};
pub use scorer::{
    Dimension, DimensionWeights, Disqualification, ScoreBreakdown, ScoringParams,
    SimilarityScorer,
};
