//! Feature extraction
//!
//! Turns a [`SearchContext`](crate::context::SearchContext) into four
//! independent sub-vectors (location, weather, temporal, demographic) so that
//! weighting and partial data stay local to each dimension.

pub mod builder;
pub mod vector;

pub use builder::{classify_place, normalized_day_of_year, FeatureVectorBuilder};
pub use vector::{
    AgeBracket, DemographicFeatures, DurationBucket, FeatureVector, GeoPoint, LocationFeatures,
    PlaceClass, PrecipitationBucket, Season, TemporalFeatures, WeatherFeatures,
};
