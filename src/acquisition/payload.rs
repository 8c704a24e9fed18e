//! Charge-point Payload Extractor
//!
//! Turns one raw API record into a [`CanonicalSample`]. Records come from
//! the CMS "time lapsed" feed and mirror OCPP `MeterValues` messages that
//! have been flattened into key/value lists:
//!
//! ```text
//! record
//! ├── ts | createdat | date            timestamp (epoch seconds or ISO-8601)
//! └── payload: [ {Key, Value} ... ]
//!     └── {Key: "meterValue", Value: [ [ {Key, Value} ... ], ... ]}
//!         └── first meter value
//!             └── {Key: "sampledValue", Value: [ [ {Key, Value} ... ], ... ]}
//!                 └── one sampled value: {Key: "measurand"} + {Key: "value"}
//! ```
//!
//! Any level may be missing, empty, or hold entries of the wrong shape.
//! Each step below names the shape it expects and skips anything else, so a
//! malformed branch only loses that branch. A structurally valid record with
//! no readable current or temperature gets the defaults (0 A, 50 °C).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{CanonicalSample, DEFAULT_CURRENT, DEFAULT_TEMPERATURE};

/// Epoch-seconds timestamp field, checked first.
pub const EPOCH_FIELD: &str = "ts";

/// ISO-8601 timestamp fields, in lookup order.
pub const ISO_FIELDS: &[&str] = &["createdat", "date"];

/// Measurand substring identifying charging current.
pub const CURRENT_MEASURAND: &str = "Current.Import";

/// Measurand substring identifying temperature.
pub const TEMPERATURE_MEASURAND: &str = "Temperature";

/// Reasons a record yields no sample. Callers drop the record and continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no timestamp field (ts, createdat, date)")]
    MissingTimestamp,

    #[error("timestamp field '{field}' could not be parsed: {value}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("timestamp {0} is outside the representable calendar range")]
    TimestampOutOfRange(i64),
}

/// Outcome of looking for one measurand in the payload tree.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Reading {
    /// No sampled value carried this measurand.
    #[default]
    Absent,
    /// The first matching sampled value held a non-numeric value.
    Unparsable,
    Value(f64),
}

impl Reading {
    fn is_resolved(&self) -> bool {
        !matches!(self, Reading::Absent)
    }

    fn or_default(self, default: f64) -> f64 {
        match self {
            Reading::Value(v) => v,
            Reading::Absent | Reading::Unparsable => default,
        }
    }
}

/// Current and temperature found in one record's payload.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurements {
    pub current: Reading,
    pub temperature: Reading,
}

/// Extract a canonical sample from one raw record.
///
/// Negative current is passed through unchanged; clipping happens per batch
/// in the feature builder.
pub fn extract(record: &Value) -> Result<CanonicalSample, ExtractionFailure> {
    let object = record.as_object().ok_or(ExtractionFailure::NotAnObject)?;
    let timestamp = resolve_timestamp(object)?;
    let readings = measurements(object);

    Ok(CanonicalSample::new(
        timestamp,
        readings.current.or_default(DEFAULT_CURRENT),
        readings.temperature.or_default(DEFAULT_TEMPERATURE),
    ))
}

// ============================================================================
// Timestamp
// ============================================================================

/// Resolve the record timestamp to epoch seconds.
///
/// The first field present decides: a present-but-unparseable field fails the
/// record rather than falling through to the next candidate.
fn resolve_timestamp(object: &Map<String, Value>) -> Result<i64, ExtractionFailure> {
    let seconds = if let Some(raw) = object.get(EPOCH_FIELD) {
        epoch_seconds(raw).ok_or_else(|| ExtractionFailure::InvalidTimestamp {
            field: EPOCH_FIELD,
            value: raw.to_string(),
        })?
    } else {
        let (field, raw) = ISO_FIELDS
            .iter()
            .find_map(|field| object.get(*field).map(|raw| (*field, raw)))
            .ok_or(ExtractionFailure::MissingTimestamp)?;
        raw.as_str()
            .and_then(parse_iso8601)
            .ok_or_else(|| ExtractionFailure::InvalidTimestamp {
                field,
                value: raw.to_string(),
            })?
    };

    if DateTime::from_timestamp(seconds, 0).is_none() {
        return Err(ExtractionFailure::TimestampOutOfRange(seconds));
    }
    Ok(seconds)
}

/// Epoch seconds from a JSON number or numeric string. Fractions are floored.
fn epoch_seconds(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_seconds)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_seconds))
        }
        _ => None,
    }
}

fn float_seconds(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up, so compare against the exclusive bound
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let floored = value.floor();
    (floored.is_finite() && floored >= -LIMIT && floored < LIMIT).then(|| floored as i64)
}

/// Parse an ISO-8601 date or date-time to epoch seconds.
///
/// A trailing `Z` means UTC. Values without an offset are taken as UTC.
pub fn parse_iso8601(raw: &str) -> Option<i64> {
    let text = raw.trim();
    let text = match text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
        Some(stripped) => format!("{stripped}+00:00"),
        None => text.to_string(),
    };

    const OFFSET_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M%:z",
    ];
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];

    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&text, fmt).ok())
        .map(|dt| dt.timestamp())
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
                .map(|naive| naive.and_utc().timestamp())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc().timestamp())
        })
}

// ============================================================================
// Measurements
// ============================================================================

/// Walk `payload → meterValue → sampledValue → (measurand, value)`.
///
/// The first sampled value matching a measurand decides that field, even if
/// its value turns out not to be numeric.
pub fn measurements(object: &Map<String, Value>) -> Measurements {
    let mut found = Measurements::default();

    // payload: list of {Key, Value} entries
    let Some(entries) = object.get("payload").and_then(Value::as_array) else {
        return found;
    };

    for meter_values in entries.iter().filter_map(|entry| keyed_value(entry, "meterValue")) {
        // meterValue: list of meter values, only the first is read
        let Some(first) = meter_values.as_array().and_then(|list| list.first()) else {
            continue;
        };
        // a meter value: list of {Key, Value} fields
        let Some(fields) = first.as_array() else {
            continue;
        };
        for sampled in fields.iter().filter_map(|field| keyed_value(field, "sampledValue")) {
            // sampledValue: list of sampled values, each a list of {Key, Value} fields
            let Some(samples) = sampled.as_array() else {
                continue;
            };
            for (measurand, raw) in samples.iter().filter_map(sampled_value) {
                record_reading(&mut found, measurand, raw);
            }
        }
    }

    found
}

/// `Value` of a `{Key: key, Value: ...}` object, if `entry` has that shape.
fn keyed_value<'a>(entry: &'a Value, key: &str) -> Option<&'a Value> {
    let object = entry.as_object()?;
    (object.get("Key").and_then(Value::as_str) == Some(key)).then(|| object.get("Value"))?
}

/// `(measurand, value)` of one sampled value. Both must be present and non-empty.
fn sampled_value(sample: &Value) -> Option<(&str, &Value)> {
    let fields = sample.as_array()?;
    let mut measurand = None;
    let mut value = None;
    for field in fields.iter().filter_map(Value::as_object) {
        match field.get("Key").and_then(Value::as_str) {
            Some("measurand") => measurand = field.get("Value"),
            Some("value") => value = field.get("Value"),
            _ => {}
        }
    }

    let measurand = measurand?.as_str().filter(|m| !m.is_empty())?;
    let value = value.filter(|v| match v {
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        _ => true,
    })?;
    Some((measurand, value))
}

fn record_reading(found: &mut Measurements, measurand: &str, raw: &Value) {
    let slot = if measurand.contains(CURRENT_MEASURAND) {
        &mut found.current
    } else if measurand.contains(TEMPERATURE_MEASURAND) {
        &mut found.temperature
    } else {
        return;
    };
    if slot.is_resolved() {
        return;
    }
    *slot = match parse_number(raw) {
        Some(v) => Reading::Value(v),
        None => Reading::Unparsable,
    };
}

/// Numeric value from a string (surrounding whitespace allowed) or a JSON number.
fn parse_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sampled(measurand: &str, value: Value) -> Value {
        json!([
            {"Key": "measurand", "Value": measurand},
            {"Key": "value", "Value": value},
            {"Key": "unit", "Value": "A"}
        ])
    }

    fn meter_record(ts_field: (&str, Value), samples: Vec<Value>) -> Value {
        let mut record = json!({
            "eventtype": "MeterValues",
            "payload": [
                {"Key": "connectorId", "Value": 1},
                {"Key": "meterValue", "Value": [[
                    {"Key": "timestamp", "Value": "2026-02-11T12:00:00Z"},
                    {"Key": "sampledValue", "Value": samples}
                ]]}
            ]
        });
        record[ts_field.0] = ts_field.1;
        record
    }

    #[test]
    fn test_full_record_extracts_both_measurements() {
        let record = meter_record(
            ("createdat", json!("2026-02-11T12:05:00Z")),
            vec![
                sampled("Current.Import", json!(" 13.25 ")),
                sampled("Temperature", json!("48.5")),
            ],
        );
        let sample = extract(&record).unwrap();
        assert_eq!(sample.timestamp, 1_770_811_500);
        assert_eq!(sample.current, 13.25);
        assert_eq!(sample.temperature, 48.5);
    }

    #[test]
    fn test_epoch_field_takes_precedence() {
        let mut record = meter_record(("ts", json!(1_700_000_000)), vec![]);
        record["createdat"] = json!("2026-02-11T12:05:00Z");
        assert_eq!(extract(&record).unwrap().timestamp, 1_700_000_000);

        let record = meter_record(("ts", json!("1700000000.9")), vec![]);
        assert_eq!(extract(&record).unwrap().timestamp, 1_700_000_000);
    }

    #[test]
    fn test_missing_timestamp_fails_regardless_of_measurements() {
        let record = json!({
            "payload": [{"Key": "meterValue", "Value": [[
                {"Key": "sampledValue", "Value": [
                    [{"Key": "measurand", "Value": "Current.Import"}, {"Key": "value", "Value": "10"}]
                ]}
            ]]}]
        });
        assert_eq!(extract(&record), Err(ExtractionFailure::MissingTimestamp));
        assert_eq!(extract(&json!({})), Err(ExtractionFailure::MissingTimestamp));
    }

    #[test]
    fn test_unparseable_timestamp_fails() {
        let record = meter_record(("createdat", json!("yesterday")), vec![]);
        assert!(matches!(
            extract(&record),
            Err(ExtractionFailure::InvalidTimestamp { field: "createdat", .. })
        ));
        let record = meter_record(("ts", json!(true)), vec![]);
        assert!(matches!(
            extract(&record),
            Err(ExtractionFailure::InvalidTimestamp { field: "ts", .. })
        ));
    }

    #[test]
    fn test_non_object_record_fails() {
        assert_eq!(extract(&json!([1, 2, 3])), Err(ExtractionFailure::NotAnObject));
        assert_eq!(extract(&json!("MeterValues")), Err(ExtractionFailure::NotAnObject));
    }

    #[test]
    fn test_absent_payload_uses_defaults() {
        let sample = extract(&json!({"date": "2026-02-11"})).unwrap();
        assert_eq!(sample.timestamp, 1_770_768_000);
        assert_eq!(sample.current, DEFAULT_CURRENT);
        assert_eq!(sample.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_malformed_branches_are_skipped() {
        let record = json!({
            "ts": 1_700_000_000,
            "payload": [
                "garbage",
                {"Key": "meterValue", "Value": []},
                {"Key": "meterValue", "Value": [{"not": "a list"}]},
                {"Key": "meterValue", "Value": [[
                    42,
                    {"Key": "sampledValue", "Value": "not a list"},
                    {"Key": "sampledValue", "Value": [
                        "bad sample",
                        [{"Key": "measurand", "Value": "Temperature"}],
                        [{"Key": "measurand", "Value": "Temperature.Body"}, {"Key": "value", "Value": "61.0"}]
                    ]}
                ]]}
            ]
        });
        let sample = extract(&record).unwrap();
        assert_eq!(sample.current, DEFAULT_CURRENT);
        assert_eq!(sample.temperature, 61.0);
    }

    #[test]
    fn test_first_match_wins() {
        let record = meter_record(
            ("ts", json!(1_700_000_000)),
            vec![
                sampled("Current.Import", json!("12.0")),
                sampled("Current.Import.L2", json!("99.0")),
            ],
        );
        assert_eq!(extract(&record).unwrap().current, 12.0);
    }

    #[test]
    fn test_unparsable_value_falls_back_to_default() {
        let record = meter_record(
            ("ts", json!(1_700_000_000)),
            vec![
                sampled("Temperature", json!("hot")),
                sampled("Temperature", json!("40.0")),
                sampled("Current.Import", json!(7.5)),
            ],
        );
        let sample = extract(&record).unwrap();
        assert_eq!(sample.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(sample.current, 7.5);
    }

    #[test]
    fn test_negative_current_is_not_clamped() {
        let record = meter_record(
            ("ts", json!(1_700_000_000)),
            vec![sampled("Current.Import", json!("-3.5"))],
        );
        assert_eq!(extract(&record).unwrap().current, -3.5);
    }

    #[test]
    fn test_iso_variants() {
        assert_eq!(parse_iso8601("2026-02-11T12:00:00Z"), Some(1_770_811_200));
        assert_eq!(parse_iso8601("2026-02-11T12:00:00.250Z"), Some(1_770_811_200));
        assert_eq!(parse_iso8601("2026-02-11T17:30:00+05:30"), Some(1_770_811_200));
        assert_eq!(parse_iso8601("2026-02-11 12:00:00"), Some(1_770_811_200));
        assert_eq!(parse_iso8601("2026-02-11"), Some(1_770_768_000));
        assert_eq!(parse_iso8601("11/02/2026"), None);
    }
}
