//! Field-alias pickers for provider payloads.
//!
//! Providers name the same concept many ways (`maxPeople`, `max_occupancy`,
//! `maxGuests`...) and are loose about types (numbers as strings, `0`/`1`
//! booleans). Each picker tries the aliases in order and returns the first
//! value it can interpret.

use chrono::NaiveDate;
use serde_json::Value;
use staysync_core::sync_error::SyncResult;
use staysync_core::types::Day;
use tracing::warn;

pub const OCCUPANCY_ALIASES: &[&str] = &[
    "maxOccupancy",
    "max_occupancy",
    "maxPeople",
    "max_people",
    "maxGuests",
    "max_guests",
    "occupancy",
    "capacity",
    "maxAdults",
];

pub const BED_ALIASES: &[&str] = &[
    "bedConfiguration",
    "bed_configuration",
    "beds",
    "bedTypes",
    "bed_types",
    "bedding",
];

const LATITUDE_ALIASES: &[&str] = &["latitude", "lat"];
const LONGITUDE_ALIASES: &[&str] = &["longitude", "lng", "lon", "long"];
const GEO_CONTAINERS: &[&str] = &["coordinates", "geo", "location", "geolocation"];

/// First non-null value among `aliases`.
pub fn pick<'a>(value: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| value.get(*key))
        .find(|v| !v.is_null())
}

/// String field; numbers are rendered (external ids are often numeric).
pub fn pick_str(value: &Value, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn pick_i32(value: &Value, aliases: &[&str]) -> Option<i32> {
    aliases.iter().find_map(|key| as_i32(value.get(*key)?))
}

pub fn pick_f64(value: &Value, aliases: &[&str]) -> Option<f64> {
    aliases.iter().find_map(|key| as_f64(value.get(*key)?))
}

pub fn pick_bool(value: &Value, aliases: &[&str]) -> Option<bool> {
    aliases.iter().find_map(|key| as_bool(value.get(*key)?))
}

pub fn pick_date(value: &Value, aliases: &[&str]) -> Option<Day> {
    aliases.iter().find_map(|key| as_date(value.get(*key)?))
}

pub fn as_i32(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .and_then(|i| i32::try_from(i).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "open" | "available" => Some(true),
            "false" | "no" | "n" | "0" | "closed" | "unavailable" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, `YYYYMMDD`, and date-time strings (date part used).
pub fn as_date(v: &Value) -> Option<Day> {
    let s = v.as_str()?.trim();
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .ok()
}

/// Latitude/longitude, flat or nested under a geo container.
pub fn coordinates(value: &Value) -> (Option<f64>, Option<f64>) {
    let flat = (
        pick_f64(value, LATITUDE_ALIASES),
        pick_f64(value, LONGITUDE_ALIASES),
    );
    if flat.0.is_some() || flat.1.is_some() {
        return flat;
    }
    GEO_CONTAINERS
        .iter()
        .filter_map(|key| value.get(*key))
        .map(|geo| {
            (
                pick_f64(geo, LATITUDE_ALIASES),
                pick_f64(geo, LONGITUDE_ALIASES),
            )
        })
        .find(|(lat, lng)| lat.is_some() || lng.is_some())
        .unwrap_or((None, None))
}

pub fn occupancy(value: &Value) -> Option<i32> {
    pick_i32(value, OCCUPANCY_ALIASES)
}

/// Bed configuration as a JSON array.
///
/// A bare string (`"1 double, 2 single"`) becomes a one-element array; an
/// object of `{type: count}` becomes `[{"type", "count"}]` entries.
pub fn bed_configuration(value: &Value) -> Option<Value> {
    match pick(value, BED_ALIASES)? {
        Value::Array(items) if !items.is_empty() => Some(Value::Array(items.clone())),
        Value::String(s) if !s.trim().is_empty() => {
            Some(Value::Array(vec![Value::String(s.trim().to_string())]))
        }
        Value::Object(map) if !map.is_empty() => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries = keys
                .into_iter()
                .map(|k| serde_json::json!({ "type": k, "count": map[k].clone() }))
                .collect();
            Some(Value::Array(entries))
        }
        _ => None,
    }
}

/// Items of a list response, wherever the provider put them.
pub fn list_items<'a>(body: &'a Value, containers: &[&str]) -> &'a [Value] {
    if let Value::Array(items) = body {
        return items;
    }
    containers
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Parse every item of a list, logging and dropping the ones that fail.
///
/// One malformed record never fails the batch it arrived in.
pub fn parse_each<T>(
    items: &[Value],
    scope: &str,
    mut parse: impl FnMut(&Value) -> SyncResult<T>,
) -> Vec<T> {
    let mut skipped = 0usize;
    let parsed: Vec<T> = items
        .iter()
        .filter_map(|item| match parse(item) {
            Ok(value) => Some(value),
            Err(err) => {
                skipped += 1;
                warn!(scope, error = %err.message, "Skipping malformed provider record");
                None
            }
        })
        .collect();
    if skipped > 0 {
        warn!(scope, skipped, total = items.len(), "Dropped malformed records from batch");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn occupancy_aliases() {
        assert_eq!(occupancy(&json!({"maxPeople": 4})), Some(4));
        assert_eq!(occupancy(&json!({"max_guests": "6"})), Some(6));
        assert_eq!(occupancy(&json!({"maxOccupancy": null, "capacity": 2})), Some(2));
        assert_eq!(occupancy(&json!({"name": "x"})), None);
    }

    #[test]
    fn coordinates_flat_and_nested() {
        assert_eq!(
            coordinates(&json!({"lat": "43.5", "lng": 16.4})),
            (Some(43.5), Some(16.4))
        );
        assert_eq!(
            coordinates(&json!({"geo": {"latitude": 1.0, "longitude": 2.0}})),
            (Some(1.0), Some(2.0))
        );
        assert_eq!(coordinates(&json!({})), (None, None));
    }

    #[test]
    fn bed_configuration_shapes() {
        assert_eq!(
            bed_configuration(&json!({"beds": "1 double"})),
            Some(json!(["1 double"]))
        );
        assert_eq!(
            bed_configuration(&json!({"bedTypes": {"single": 2, "double": 1}})),
            Some(json!([{"type": "double", "count": 1}, {"type": "single", "count": 2}]))
        );
        assert_eq!(bed_configuration(&json!({"beds": []})), None);
    }

    #[test]
    fn loose_scalars() {
        assert_eq!(pick_str(&json!({"roomId": 10919}), &["roomId"]), Some("10919".into()));
        assert_eq!(pick_bool(&json!({"open": "1"}), &["open"]), Some(true));
        assert_eq!(pick_bool(&json!({"open": 0}), &["open"]), Some(false));
        assert_eq!(pick_f64(&json!({"price": "99.5"}), &["price"]), Some(99.5));
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 12, 30);
        assert_eq!(as_date(&json!("2025-12-30")), expected);
        assert_eq!(as_date(&json!("20251230")), expected);
        assert_eq!(as_date(&json!("2025-12-30T14:00:00Z")), expected);
        assert_eq!(as_date(&json!("30/12/2025")), None);
    }

    #[test]
    fn parse_each_keeps_the_good_records() {
        use staysync_core::sync_error::SyncError;

        let items = [json!({"id": "P1"}), json!({"name": "no id"}), json!({"id": "P3"})];
        let ids = parse_each(&items, "property", |v| {
            pick_str(v, &["id"]).ok_or_else(|| SyncError::validation("without id"))
        });
        assert_eq!(ids, vec!["P1".to_string(), "P3".to_string()]);
    }

    #[test]
    fn list_items_finds_container() {
        let body = json!({"data": [{"id": 1}, {"id": 2}]});
        assert_eq!(list_items(&body, &["results", "data"]).len(), 2);
        assert_eq!(list_items(&json!([1]), &["data"]).len(), 1);
        assert!(list_items(&json!({"x": 1}), &["data"]).is_empty());
    }
}
