//! Persisted document decoding
//!
//! Document stores hand numbers back in several shapes: plain JSON numbers,
//! numeric strings, or wrapper objects such as `{"$numberLong": "42"}` and
//! `{"__bigint__": "42"}`. Everything read from a backend goes through
//! [`sanitize`] once, before deserialization, so the scorer only ever sees
//! plain finite numbers.

use crate::cache::entry::CacheEntry;
use crate::cache::types::StoreId;
use crate::error::{CacheError, Result};
use chrono::DateTime;
use serde_json::{Map, Number, Value};

const NUMBER_WRAPPERS: [&str; 4] = ["$numberLong", "$numberInt", "$numberDouble", "__bigint__"];

/// Fields that must be floats
const FLOAT_PATHS: [&str; 6] = [
    "/features/location/coordinates/lat",
    "/features/location/coordinates/lon",
    "/features/weather/temp_midpoint",
    "/features/weather/temp_spread",
    "/features/weather/outdoor_suitability",
    "/features/temporal/holiday_proximity",
];

/// Fields that must be unsigned integers
const UNSIGNED_PATHS: [&str; 2] = ["/features/temporal/day_of_year", "/metadata/access_count"];

/// Timestamps, accepted as RFC 3339 strings or epoch milliseconds
const TIMESTAMP_PATHS: [&str; 3] = [
    "/metadata/created_at",
    "/metadata/last_accessed",
    "/metadata/expires_at",
];

/// Read a finite float from any supported numeric encoding
pub fn numeric_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => unwrap_number(map).and_then(|inner| numeric_f64(inner)),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Read a non-negative integer from any supported numeric encoding
pub fn numeric_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Object(map) => unwrap_number(map).and_then(|inner| numeric_u64(inner)),
        _ => None,
    }
}

fn unwrap_number(map: &Map<String, Value>) -> Option<&Value> {
    if map.len() != 1 {
        return None;
    }
    NUMBER_WRAPPERS.iter().find_map(|wrapper| map.get(*wrapper))
}

/// Normalize numeric encodings in a persisted document
pub fn sanitize(mut document: Value) -> Value {
    unwrap_recursive(&mut document);

    for path in FLOAT_PATHS {
        if let Some(slot) = document.pointer_mut(path) {
            if let Some(n) = numeric_f64(slot).and_then(Number::from_f64) {
                *slot = Value::Number(n);
            }
        }
    }

    for path in UNSIGNED_PATHS {
        if let Some(slot) = document.pointer_mut(path) {
            if let Some(n) = numeric_u64(slot) {
                *slot = Value::from(n);
            }
        }
    }

    for path in TIMESTAMP_PATHS {
        if let Some(slot) = document.pointer_mut(path) {
            if let Some(millis) = slot.as_i64().or_else(|| numeric_u64(slot).map(|n| n as i64)) {
                if let Some(ts) = DateTime::from_timestamp_millis(millis) {
                    *slot = Value::String(ts.to_rfc3339());
                }
            }
        }
    }

    document
}

/// Replace wrapper objects (`{"$numberLong": ..}`, `{"$date": ..}`) with their content
fn unwrap_recursive(value: &mut Value) {
    if let Some(replacement) = unwrapped(value) {
        *value = replacement;
        return;
    }
    match value {
        Value::Array(items) => items.iter_mut().for_each(unwrap_recursive),
        Value::Object(map) => map.values_mut().for_each(unwrap_recursive),
        _ => {}
    }
}

fn unwrapped(value: &Value) -> Option<Value> {
    let Value::Object(map) = value else {
        return None;
    };
    if map.len() != 1 {
        return None;
    }
    if let Some(inner) = map.get("$date") {
        let mut inner = inner.clone();
        unwrap_recursive(&mut inner);
        return Some(inner);
    }
    unwrap_number(map)?;
    numeric_u64(value)
        .map(Value::from)
        .or_else(|| map_i64(value).map(Value::from))
        .or_else(|| numeric_f64(value).and_then(Number::from_f64).map(Value::Number))
}

fn map_i64(value: &Value) -> Option<i64> {
    let Value::Object(map) = value else {
        return None;
    };
    match unwrap_number(map)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Serialize an entry for a persistence backend
pub fn encode_entry(entry: &CacheEntry) -> Result<Value> {
    Ok(serde_json::to_value(entry)?)
}

/// Sanitize and decode a persisted document into an entry of `store`
pub fn decode_entry(store: StoreId, document: &Value) -> Result<CacheEntry> {
    let key = document
        .get("key")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();

    let malformed = |reason: String| CacheError::MalformedStoredEntry {
        key: key.clone(),
        reason,
    };

    if !document.is_object() {
        return Err(malformed("document is not an object".to_string()));
    }

    let entry: CacheEntry =
        serde_json::from_value(sanitize(document.clone())).map_err(|e| malformed(e.to_string()))?;

    if entry.store != store {
        return Err(malformed(format!(
            "belongs to {}, found in {}",
            entry.store, store
        )));
    }

    if let Some(features) = &entry.features {
        features.validate().map_err(malformed)?;
    }

    if store == StoreId::ActivitySimilar && entry.features.is_none() {
        return Err(malformed("missing feature vector".to_string()));
    }

    Ok(entry)
}
