//! Distance helpers for the hard cutoffs

use crate::features::GeoPoint;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Days on the normalized calendar used for day-of-year features
pub const DAYS_PER_YEAR: u32 = 365;

/// Great-circle distance using the haversine formula
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Distance between two days of year, wrapping at the year boundary
pub fn circular_day_distance(a: u32, b: u32) -> u32 {
    let direct = a.abs_diff(b) % DAYS_PER_YEAR;
    direct.min(DAYS_PER_YEAR - direct)
}
