use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ReportError;
use crate::models::enums::FlagStatus;
use crate::models::measurement::MeasurementValue;

static UPPER_BOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<\s*(\S+)$").expect("valid upper-bound regex"));

static INTERVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9][0-9.]*)\s*-\s*([0-9][0-9.]*)$").expect("valid interval regex")
});

/// Strings read as "abnormal" regardless of any numeric range.
const POSITIVE_WORDS: [&str; 6] = ["yes", "poor", "abnormal", "high", "true", "1"];
/// Strings read as "normal" regardless of any numeric range.
const NEGATIVE_WORDS: [&str; 5] = ["no", "good", "normal", "false", "0"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeRule {
    /// `< X`
    UpperBound { limit: f64 },
    /// `low - high`, inclusive.
    Interval { low: f64, high: f64 },
    /// Expected text such as `No` or `Normal`; no numeric check.
    Categorical,
}

/// Reference range as printed, plus the rule parsed from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    text: String,
    rule: RangeRule,
}

impl RangeSpec {
    /// Parse reference-range text.
    ///
    /// Text with digits that fits neither `< X` nor `low - high` is rejected;
    /// anything else without digits (`No`, `Normal`, `-`) is categorical.
    pub fn parse(parameter: &str, text: &str) -> Result<Self, ReportError> {
        let trimmed = text.trim();
        let invalid = || ReportError::InvalidRange {
            parameter: parameter.to_string(),
            text: text.to_string(),
        };

        let rule = if let Some(caps) = UPPER_BOUND.captures(trimmed) {
            let limit = caps[1].parse::<f64>().map_err(|_| invalid())?;
            RangeRule::UpperBound { limit }
        } else if let Some(caps) = INTERVAL.captures(trimmed) {
            let low = caps[1].parse::<f64>().map_err(|_| invalid())?;
            let high = caps[2].parse::<f64>().map_err(|_| invalid())?;
            if low > high {
                return Err(invalid());
            }
            RangeRule::Interval { low, high }
        } else if trimmed.chars().any(|c| c.is_ascii_digit()) {
            return Err(invalid());
        } else {
            RangeRule::Categorical
        };

        Ok(Self {
            text: trimmed.to_string(),
            rule,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rule(&self) -> RangeRule {
        self.rule
    }
}

impl std::fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Which rule decided a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagBasis {
    Blank,
    CategoricalPositive,
    CategoricalNegative,
    UpperBound,
    Interval,
    /// A numeric rule applied but the value did not parse. Reported as normal.
    ValueNotNumeric,
    NoRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub status: FlagStatus,
    pub basis: FlagBasis,
}

impl Flag {
    fn new(status: FlagStatus, basis: FlagBasis) -> Self {
        Self { status, basis }
    }
}

/// Flag one value against an optional reference range.
///
/// Order: blank, categorical words, upper bound, interval, no rule. The
/// categorical words win even when a numeric range exists.
pub fn flag_value(range: Option<&RangeSpec>, value: &MeasurementValue) -> Flag {
    if value.is_blank() {
        return Flag::new(FlagStatus::Normal, FlagBasis::Blank);
    }

    let word = value.literal().trim().to_lowercase();
    if POSITIVE_WORDS.contains(&word.as_str()) {
        return Flag::new(FlagStatus::High, FlagBasis::CategoricalPositive);
    }
    if NEGATIVE_WORDS.contains(&word.as_str()) {
        return Flag::new(FlagStatus::Normal, FlagBasis::CategoricalNegative);
    }

    let Some(range) = range else {
        return Flag::new(FlagStatus::Normal, FlagBasis::NoRule);
    };

    match range.rule {
        RangeRule::Categorical => Flag::new(FlagStatus::Normal, FlagBasis::NoRule),
        RangeRule::UpperBound { limit } => match value.as_number() {
            Some(v) if v > limit => Flag::new(FlagStatus::High, FlagBasis::UpperBound),
            Some(_) => Flag::new(FlagStatus::Normal, FlagBasis::UpperBound),
            None => not_numeric(range, value),
        },
        RangeRule::Interval { low, high } => match value.as_number() {
            Some(v) if v < low => Flag::new(FlagStatus::Low, FlagBasis::Interval),
            Some(v) if v > high => Flag::new(FlagStatus::High, FlagBasis::Interval),
            Some(_) => Flag::new(FlagStatus::Normal, FlagBasis::Interval),
            None => not_numeric(range, value),
        },
    }
}

fn not_numeric(range: &RangeSpec, value: &MeasurementValue) -> Flag {
    tracing::debug!(range = %range, value = %value, "Range check skipped for non-numeric value");
    Flag::new(FlagStatus::Normal, FlagBasis::ValueNotNumeric)
}
