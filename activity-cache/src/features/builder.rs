//! Derivation of feature vectors from search contexts
//!
//! Building never fails. Any input that is missing or unusable produces an
//! absent leaf.

use super::vector::{
    AgeBracket, DemographicFeatures, DurationBucket, FeatureVector, GeoPoint, LocationFeatures,
    PlaceClass, PrecipitationBucket, Season, TemporalFeatures, WeatherFeatures,
};
use crate::context::{Holiday, SearchContext, WeatherSummary};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// Latitude of the polar circles
const POLAR_CIRCLE_LAT: f64 = 66.5;

/// Temperatures (°C) considered comfortable for outdoor plans
const COMFORT_LOW_C: f64 = 15.0;
const COMFORT_HIGH_C: f64 = 26.0;

/// Wind speed (km/h) above which outdoor suitability starts to drop
const CALM_WIND_KMH: f64 = 20.0;

const PLACE_HINTS: &[(&str, PlaceClass)] = &[
    ("beach", PlaceClass::Coastal),
    ("coast", PlaceClass::Coastal),
    ("seaside", PlaceClass::Coastal),
    ("harbour", PlaceClass::Coastal),
    ("city", PlaceClass::Urban),
    ("downtown", PlaceClass::Urban),
    ("museum", PlaceClass::Urban),
    ("mountain", PlaceClass::Inland),
    ("hiking", PlaceClass::Inland),
    ("countryside", PlaceClass::Inland),
    ("lake", PlaceClass::Inland),
];

/// Builds [`FeatureVector`]s; holds the holiday window shared with the range store
#[derive(Debug, Clone, Copy)]
pub struct FeatureVectorBuilder {
    holiday_window_days: u32,
}

impl Default for FeatureVectorBuilder {
    fn default() -> Self {
        Self::new(3)
    }
}

impl FeatureVectorBuilder {
    pub fn new(holiday_window_days: u32) -> Self {
        Self {
            holiday_window_days,
        }
    }

    pub fn holiday_window_days(&self) -> u32 {
        self.holiday_window_days
    }

    pub fn build(&self, context: &SearchContext) -> FeatureVector {
        let location = Self::location(context);
        let temporal = self.temporal(context, location.coordinates);

        FeatureVector {
            location,
            weather: Self::weather(context.weather.as_ref()),
            temporal,
            demographic: Self::demographic(context),
        }
    }

    fn location(context: &SearchContext) -> LocationFeatures {
        let coordinates = context
            .coordinates()
            .map(|(lat, lon)| GeoPoint::new(lat, lon))
            .filter(GeoPoint::is_valid);

        LocationFeatures {
            coordinates,
            place_class: coordinates.map(|point| classify_place(point, &context.modifiers)),
        }
    }

    fn weather(summary: Option<&WeatherSummary>) -> WeatherFeatures {
        let Some(summary) = summary else {
            return WeatherFeatures::default();
        };

        let min = summary.min_temp_c.filter(|t| t.is_finite());
        let max = summary.max_temp_c.filter(|t| t.is_finite());
        let (temp_midpoint, temp_spread) = match (min, max) {
            (Some(lo), Some(hi)) => {
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                (Some((lo + hi) / 2.0), Some(hi - lo))
            }
            _ => (None, None),
        };

        let probability = summary
            .precipitation_probability
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0));

        let wind = summary.wind_speed_kmh.filter(|w| w.is_finite() && *w >= 0.0);

        // Any single temperature reading is enough for a comfort estimate
        let representative_temp = temp_midpoint.or(min).or(max);

        WeatherFeatures {
            temp_midpoint,
            temp_spread,
            precipitation: probability.map(PrecipitationBucket::from_probability),
            outdoor_suitability: outdoor_suitability(representative_temp, probability, wind),
        }
    }

    /// Seasons follow the validated coordinates; without them the northern
    /// calendar applies
    fn temporal(&self, context: &SearchContext, coordinates: Option<GeoPoint>) -> TemporalFeatures {
        let Some(date) = context.date else {
            return TemporalFeatures::default();
        };

        let southern = coordinates.map(|point| point.is_southern()).unwrap_or(false);

        TemporalFeatures {
            day_of_year: Some(normalized_day_of_year(date)),
            season: Some(Season::from_month(date.month(), southern)),
            holiday_proximity: context
                .holidays
                .as_ref()
                .map(|holidays| self.holiday_proximity(date, holidays)),
            is_weekend: Some(matches!(date.weekday(), Weekday::Sat | Weekday::Sun)),
        }
    }

    fn demographic(context: &SearchContext) -> DemographicFeatures {
        let brackets: BTreeSet<AgeBracket> = context
            .ages
            .iter()
            .filter_map(|age| AgeBracket::from_age(*age))
            .collect();

        DemographicFeatures {
            age_brackets: (!brackets.is_empty()).then_some(brackets),
            duration: context.duration_hours.and_then(DurationBucket::from_hours),
        }
    }

    /// 1.0 inside a holiday, linear decay to 0.0 at `holiday_window_days` away
    pub fn holiday_proximity(&self, date: NaiveDate, holidays: &[Holiday]) -> f64 {
        let window = self.holiday_window_days as f64;
        holidays
            .iter()
            .map(|holiday| {
                let days = holiday.days_from(date) as f64;
                if days == 0.0 {
                    1.0
                } else if window == 0.0 || days >= window {
                    0.0
                } else {
                    1.0 - days / window
                }
            })
            .fold(0.0, f64::max)
    }
}

/// Ordinal day on a 365-day calendar; in leap years every day after Feb 28 shifts back one
pub fn normalized_day_of_year(date: NaiveDate) -> u32 {
    let ordinal = date.ordinal();
    let leap = NaiveDate::from_ymd_opt(date.year(), 2, 29).is_some();
    if leap && ordinal > 59 {
        ordinal - 1
    } else {
        ordinal
    }
}

/// Deterministic place classifier: polar by latitude, otherwise keyword hints
pub fn classify_place(point: GeoPoint, modifiers: &[String]) -> PlaceClass {
    if point.lat.abs() >= POLAR_CIRCLE_LAT {
        return PlaceClass::Polar;
    }

    modifiers
        .iter()
        .map(|m| m.to_lowercase())
        .find_map(|m| {
            PLACE_HINTS
                .iter()
                .find(|(hint, _)| m.contains(hint))
                .map(|(_, class)| *class)
        })
        .unwrap_or(PlaceClass::Unknown)
}

fn outdoor_suitability(temp: Option<f64>, precipitation: Option<f64>, wind: Option<f64>) -> Option<f64> {
    let components: Vec<f64> = [
        temp.map(temperature_comfort),
        precipitation.map(|p| 1.0 - p / 100.0),
        wind.map(|w| {
            if w <= CALM_WIND_KMH {
                1.0
            } else {
                (1.0 - (w - CALM_WIND_KMH) / 40.0).max(0.0)
            }
        }),
    ]
    .into_iter()
    .flatten()
    .collect();

    if components.is_empty() {
        None
    } else {
        let mean = components.iter().sum::<f64>() / components.len() as f64;
        Some(mean.clamp(0.0, 1.0))
    }
}

fn temperature_comfort(temp: f64) -> f64 {
    if temp < COMFORT_LOW_C {
        (1.0 - (COMFORT_LOW_C - temp) / 15.0).max(0.0)
    } else if temp > COMFORT_HIGH_C {
        (1.0 - (temp - COMFORT_HIGH_C) / 12.0).max(0.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn madrid() -> SearchContext {
        SearchContext::new("Madrid, Spain", date(2025, 9, 20))
            .with_coordinates(40.4168, -3.7038)
            .with_ages([6, 8])
            .with_duration(4.0)
            .with_weather(WeatherSummary {
                min_temp_c: Some(20.0),
                max_temp_c: Some(30.0),
                precipitation_probability: Some(10.0),
                wind_speed_kmh: Some(12.0),
            })
    }

    #[test]
    fn test_build_full_context() {
        let vector = FeatureVectorBuilder::default().build(&madrid());

        assert_eq!(vector.location.place_class, Some(PlaceClass::Unknown));
        assert_eq!(vector.weather.temp_midpoint, Some(25.0));
        assert_eq!(vector.weather.temp_spread, Some(10.0));
        assert_eq!(vector.weather.precipitation, Some(PrecipitationBucket::Dry));
        assert!(vector.weather.outdoor_suitability.unwrap() > 0.9);
        assert_eq!(vector.temporal.season, Some(Season::Autumn));
        assert_eq!(vector.temporal.is_weekend, Some(true));
        assert_eq!(vector.temporal.holiday_proximity, None);
        assert_eq!(
            vector.demographic.age_brackets,
            Some(BTreeSet::from([AgeBracket::SchoolAge]))
        );
        assert_eq!(vector.demographic.duration, Some(DurationBucket::HalfDay));
        assert!(vector.validate().is_ok());
    }

    #[test]
    fn test_missing_inputs_are_absent() {
        let ctx = SearchContext::new("Somewhere", date(2025, 9, 20)).with_weather(WeatherSummary {
            min_temp_c: Some(12.0),
            ..Default::default()
        });
        let vector = FeatureVectorBuilder::default().build(&ctx);

        assert_eq!(vector.location.coordinates, None);
        assert_eq!(vector.location.place_class, None);
        assert_eq!(vector.weather.temp_midpoint, None);
        assert_eq!(vector.weather.temp_spread, None);
        assert_eq!(vector.weather.precipitation, None);
        // a lone reading still feeds the comfort estimate
        assert!(vector.weather.outdoor_suitability.is_some());
        assert_eq!(vector.demographic.age_brackets, None);
        assert_eq!(vector.demographic.duration, None);
    }

    #[test]
    fn test_holiday_proximity_decay() {
        let builder = FeatureVectorBuilder::new(3);
        let holidays = vec![Holiday::on("Fiesta", date(2025, 9, 20))];

        assert_eq!(builder.holiday_proximity(date(2025, 9, 20), &holidays), 1.0);
        let one_day = builder.holiday_proximity(date(2025, 9, 21), &holidays);
        assert!((one_day - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(builder.holiday_proximity(date(2025, 9, 23), &holidays), 0.0);
        assert_eq!(builder.holiday_proximity(date(2025, 9, 20), &[]), 0.0);
    }

    #[test]
    fn test_known_empty_holidays_differs_from_unknown() {
        let known = madrid().with_holidays(Vec::new());
        let vector = FeatureVectorBuilder::default().build(&known);
        assert_eq!(vector.temporal.holiday_proximity, Some(0.0));
    }

    #[test]
    fn test_place_classification() {
        let coast = GeoPoint::new(41.38, 2.17);
        assert_eq!(
            classify_place(coast, &["Near the Beach".to_string()]),
            PlaceClass::Coastal
        );
        assert_eq!(classify_place(GeoPoint::new(69.6, 18.9), &[]), PlaceClass::Polar);
        assert_eq!(classify_place(coast, &[]), PlaceClass::Unknown);
    }

    #[test]
    fn test_leap_year_day_of_year() {
        assert_eq!(normalized_day_of_year(date(2024, 12, 31)), 365);
        assert_eq!(normalized_day_of_year(date(2025, 12, 31)), 365);
        assert_eq!(normalized_day_of_year(date(2024, 2, 29)), 59);
        assert_eq!(normalized_day_of_year(date(2024, 1, 1)), 1);
    }

    #[test]
    fn test_southern_hemisphere_season() {
        let sydney = SearchContext::new("Sydney", date(2025, 7, 10)).with_coordinates(-33.87, 151.21);
        let vector = FeatureVectorBuilder::default().build(&sydney);
        assert_eq!(vector.temporal.season, Some(Season::Winter));
    }

    #[test]
    fn test_invalid_coordinates_do_not_flip_season() {
        let bogus = SearchContext::new("Nowhere", date(2025, 7, 10)).with_coordinates(-120.0, 10.0);
        let vector = FeatureVectorBuilder::default().build(&bogus);
        assert!(vector.location.coordinates.is_none());
        assert_eq!(vector.temporal.season, Some(Season::Summer));
    }
}
