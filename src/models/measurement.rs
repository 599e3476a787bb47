use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw measurement value as it arrives from an intake form.
///
/// Integers and decimals are kept apart: `1` reads as a categorical "yes"
/// while `1.0` is a number, and the flagger depends on that distinction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Missing,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl MeasurementValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Literal string form used for categorical matching.
    /// Decimals keep their fractional part (`1.0`, not `1`).
    pub fn literal(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Boolean(true) => "True".into(),
            Self::Boolean(false) => "False".into(),
            Self::Integer(i) => i.to_string(),
            Self::Decimal(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Self::Text(s) => s.clone(),
        }
    }

    /// Numeric reading, if the value is or parses as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Boolean(_) | Self::Missing => None,
        }
    }
}

/// Table-cell rendering: `-` for missing, whole decimals without a fraction.
impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("-"),
            Self::Decimal(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.0}")
            }
            other => f.write_str(&other.literal()),
        }
    }
}

impl From<serde_json::Value> for MeasurementValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Missing,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Missing, Self::Decimal),
            },
            Value::String(s) => Self::Text(s),
            // Nested structures have no place in a flat form; keep them auditable as text.
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<i64> for MeasurementValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for MeasurementValue {
    fn from(v: f64) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for MeasurementValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<bool> for MeasurementValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// Ordered key/value record. Insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, MeasurementValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat JSON object. Key order in the source is kept.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        Ok(map
            .into_iter()
            .map(|(k, v)| (k, MeasurementValue::from(v)))
            .collect())
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MeasurementValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MeasurementValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MeasurementValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Serializes as a JSON object in insertion order.
impl Serialize for RawRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, MeasurementValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, MeasurementValue)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}
