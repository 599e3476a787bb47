use serde::{Deserialize, Serialize};

use super::vocabulary::Vocabulary;
use crate::models::measurement::{MeasurementValue, RawRecord};

/// A measurement under its canonical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalParameter {
    pub name: String,
    pub value: MeasurementValue,
}

/// Intake record after renaming. Keeps first-seen key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalRecord(RawRecord);

impl CanonicalRecord {
    pub fn get(&self, name: &str) -> Option<&MeasurementValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MeasurementValue)> {
        self.0.iter()
    }

    pub fn parameters(&self) -> impl Iterator<Item = CanonicalParameter> + '_ {
        self.0.iter().map(|(name, value)| CanonicalParameter {
            name: name.to_string(),
            value: value.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rename every key to its canonical name.
///
/// When two raw keys map to the same name the later value replaces the
/// earlier one in place.
pub fn canonicalize(vocabulary: &Vocabulary, record: &RawRecord) -> CanonicalRecord {
    let mut out = RawRecord::new();
    for (raw_key, value) in record.iter() {
        let name = vocabulary.canonical_name(raw_key);
        if out.get(name).is_some() {
            tracing::debug!(raw_key, canonical = name, "Duplicate parameter, later value wins");
        }
        out.insert(name, value.clone());
    }
    CanonicalRecord(out)
}
