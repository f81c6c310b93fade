//! Date normalization — converts date-valued traits to whole-second epoch
//! integers. Creation timestamps round to the nearest second; every other
//! date floors to the second.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use ramen_core::types::TraitBag;

/// Numeric creation values below this are seconds, at or above it millis.
const SECONDS_CUTOFF: f64 = 31_557_600_000.0;

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 date or date-time string. Offsetless values are UTC.
pub fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    // Cheap reject for ordinary strings: every accepted form starts YYYY-.
    let bytes = raw.as_bytes();
    if bytes.len() < 10 || !bytes[..4].iter().all(u8::is_ascii_digit) || bytes[4] != b'-' {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A trait value that represents a date. Only strings qualify; bare numbers
/// are ambiguous and pass through normalization untouched.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_iso)
}

/// A creation timestamp: an ISO string, or a number (or digit string) in
/// seconds or milliseconds since the epoch.
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse::<f64>().ok()
        }
        Value::String(s) => return parse_iso(s),
        _ => None,
    }?;

    let millis = if number.abs() < SECONDS_CUTOFF {
        number * 1000.0
    } else {
        number
    };
    if !millis.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

/// Epoch seconds rounded half-up, for creation timestamps.
pub fn round_seconds(instant: DateTime<Utc>) -> i64 {
    (instant.timestamp_millis() + 500).div_euclid(1000)
}

/// Epoch seconds floored, for every other date.
pub fn floor_seconds(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis().div_euclid(1000)
}

/// Replace each top-level date value with its floored epoch seconds.
/// Nested objects are copied as-is.
pub fn normalize_bag(bag: &TraitBag) -> TraitBag {
    bag.iter()
        .map(|(key, value)| {
            let normalized = match parse_date(value) {
                Some(instant) => Value::from(floor_seconds(instant)),
                None => value.clone(),
            };
            (key.clone(), normalized)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_iso_string_to_epoch() {
        let instant = parse_iso("2009-02-13T23:31:30.000Z").unwrap();
        assert_eq!(floor_seconds(instant), 1_234_567_890);
        assert_eq!(round_seconds(instant), 1_234_567_890);
    }

    #[test]
    fn test_round_vs_floor() {
        let instant = parse_iso("2009-02-13T23:31:30.600Z").unwrap();
        assert_eq!(round_seconds(instant), 1_234_567_891);
        assert_eq!(floor_seconds(instant), 1_234_567_890);
    }

    #[test]
    fn test_parse_iso_variants() {
        let expected = 1_234_567_890;
        for raw in [
            "2009-02-13T23:31:30Z",
            "2009-02-13T23:31:30+00:00",
            "2009-02-14T00:31:30+0100",
            "2009-02-13T23:31:30",
            "2009-02-13 23:31:30",
        ] {
            assert_eq!(parse_iso(raw).unwrap().timestamp(), expected, "{raw}");
        }
        assert_eq!(parse_iso("2009-02-13").unwrap().timestamp(), 1_234_483_200);
    }

    #[test]
    fn test_parse_iso_rejects_plain_strings() {
        for raw in ["green", "11", "user 11", "2009", "13/02/2009", ""] {
            assert!(parse_iso(raw).is_none(), "{raw}");
        }
    }

    #[test]
    fn test_parse_instant_numbers() {
        assert_eq!(
            parse_instant(&json!(1_234_567_890)).unwrap().timestamp(),
            1_234_567_890
        );
        assert_eq!(
            parse_instant(&json!(1_234_567_890_600_i64)).unwrap().timestamp_millis(),
            1_234_567_890_600
        );
        assert_eq!(
            parse_instant(&json!("1234567890")).unwrap().timestamp(),
            1_234_567_890
        );
        assert!(parse_instant(&json!(true)).is_none());
        assert!(parse_instant(&json!("yesterday")).is_none());
    }

    #[test]
    fn test_normalize_bag_is_shallow() {
        let bag = json!({
            "age": 32,
            "score": 43.1,
            "color": "green",
            "is_friend": true,
            "became_maven_at": 1234567890,
            "first_purchase_at": "2009-02-13T23:31:31.000Z",
            "lastPurchaseAt": "2009-02-13T23:31:32.999Z",
            "nested": {"at": "2009-02-13T23:31:30.000Z"}
        });
        let normalized = normalize_bag(bag.as_object().unwrap());

        assert_eq!(normalized["age"], 32);
        assert_eq!(normalized["score"], 43.1);
        assert_eq!(normalized["color"], "green");
        assert_eq!(normalized["is_friend"], true);
        assert_eq!(normalized["became_maven_at"], 1_234_567_890);
        assert_eq!(normalized["first_purchase_at"], 1_234_567_891);
        assert_eq!(normalized["lastPurchaseAt"], 1_234_567_892);
        assert_eq!(normalized["nested"]["at"], "2009-02-13T23:31:30.000Z");

        let keys: Vec<_> = normalized.keys().cloned().collect();
        let original: Vec<_> = bag.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, original);
    }
}
