//! Sensor record model
//!
//! A record is keyed by the device timestamp (epoch seconds), which is unique
//! within its partition. Besides the key and the server ingest time every
//! field is a device metric addressed by its code (`WAU`, `DR`, `V`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire name of the record key (epoch seconds)
pub const KEY_FIELD: &str = "id";
/// Legacy wire name of the record key, accepted on input
pub const LEGACY_KEY_FIELD: &str = "_id";
/// Wire name of the server ingest time (epoch milliseconds)
pub const INGEST_FIELD: &str = "c";

/// Field names that never take part in metric iteration
pub const RESERVED_FIELDS: &[&str] = &[KEY_FIELD, LEGACY_KEY_FIELD, INGEST_FIELD];

/// Metric codes used by the derived-metric calculator
pub mod codes {
    /// Water level
    pub const LEVEL: &str = "WAU";
    /// Discharge opening
    pub const DISCHARGE: &str = "DR";
    /// Volume, interpolated from the level
    pub const VOLUME: &str = "V";
    /// Flow rate
    pub const FLOW: &str = "Q";
    /// Overflow discharge
    pub const OVERFLOW: &str = "Q_of";
}

pub fn is_reserved(field: &str) -> bool {
    RESERVED_FIELDS.contains(&field)
}

/// Value of a single record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value; only finite numbers qualify
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One time-stamped sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "id", alias = "_id")]
    pub key: i64,

    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub ingest_ms: Option<i64>,

    #[serde(flatten)]
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(key: i64) -> Self {
        Self {
            key,
            ingest_ms: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style numeric field setter
    pub fn with_metric(mut self, code: &str, value: f64) -> Self {
        self.set(code, FieldValue::Number(value));
        self
    }

    pub fn with_ingest_ms(mut self, ingest_ms: i64) -> Self {
        self.ingest_ms = Some(ingest_ms);
        self
    }

    /// Set a field. Reserved names are routed to their dedicated slots.
    pub fn set(&mut self, code: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        match code {
            KEY_FIELD | LEGACY_KEY_FIELD => {
                if let Some(v) = value.as_f64() {
                    self.key = v as i64;
                }
            }
            INGEST_FIELD => self.ingest_ms = value.as_f64().map(|v| v as i64),
            _ => {
                self.fields.insert(code.to_string(), value);
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&FieldValue> {
        self.fields.get(code)
    }

    /// Numeric value of a metric, `None` when absent or not a number
    pub fn metric(&self, code: &str) -> Option<f64> {
        self.fields.get(code).and_then(FieldValue::as_f64)
    }

    pub fn remove(&mut self, code: &str) -> Option<FieldValue> {
        self.fields.remove(code)
    }

    /// Iterate metric fields in name order, reserved fields excluded
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate the numeric metric fields only
    pub fn numeric_fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields().filter_map(|(k, v)| v.as_f64().map(|n| (k, n)))
    }

    pub fn field_count(&self) -> usize {
        self.fields().count()
    }

    /// Device timestamp as UTC
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.key, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_shape() {
        let record = Record::new(1_700_000_000)
            .with_ingest_ms(1_700_000_000_123)
            .with_metric("WAU", 1.5);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 1_700_000_000i64);
        assert_eq!(json["c"], 1_700_000_000_123i64);
        assert_eq!(json["WAU"], 1.5);
    }

    #[test]
    fn test_record_accepts_legacy_key() {
        let record: Record =
            serde_json::from_str(r#"{"_id": 1700000000, "WAU": 2, "note": "ok"}"#).unwrap();
        assert_eq!(record.key, 1_700_000_000);
        assert_eq!(record.ingest_ms, None);
        assert_eq!(record.metric("WAU"), Some(2.0));
        assert_eq!(record.metric("note"), None);
        assert_eq!(record.field_count(), 2);
    }

    #[test]
    fn test_reserved_names_do_not_become_metrics() {
        let mut record = Record::new(10);
        record.set(INGEST_FIELD, 99.0);
        record.set("DR", 0.4);

        assert_eq!(record.ingest_ms, Some(99));
        let names: Vec<&str> = record.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["DR"]);
    }

    #[test]
    fn test_non_finite_is_not_numeric() {
        assert_eq!(FieldValue::Number(f64::NAN).as_f64(), None);
        assert_eq!(FieldValue::Text("1".into()).as_f64(), None);
        assert_eq!(FieldValue::Number(3.0).as_f64(), Some(3.0));
    }
}
