//! Clinical parameter vocabulary: display names, intake aliases and
//! reference ranges, keyed by a closed `Parameter` enumeration.
//!
//! The compiled-in table can be adjusted from a JSON override file. The
//! override addresses entries by their `Parameter` name, so a typo is a load
//! error rather than a silently ignored row.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::range::{flag_value, Flag, RangeSpec};
use super::ReportError;
use crate::models::measurement::MeasurementValue;

pub const DEFAULT_VOCABULARY_VERSION: &str = "2025.1";

macro_rules! parameters {
    ($($variant:ident => $display:literal, $range:literal, [$($alias:literal),* $(,)?];)+) => {
        /// Every clinical parameter the report can flag, in table order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Parameter {
            $($variant),+
        }

        impl Parameter {
            pub const ALL: &'static [Parameter] = &[$(Parameter::$variant),+];

            /// Name printed on reports; also the canonical key.
            pub fn display_name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $display),+
                }
            }

            fn default_range(&self) -> &'static str {
                match self {
                    $(Self::$variant => $range),+
                }
            }

            fn default_aliases(&self) -> &'static [&'static str] {
                match self {
                    $(Self::$variant => &[$($alias),*]),+
                }
            }
        }
    };
}

parameters! {
    // Heart
    ChestPainType => "Chest Pain Type", "0 - 3", ["cp"];
    RestingBloodPressure => "Resting Blood Pressure", "90 - 120", ["restbps", "trestbps"];
    Cholesterol => "Cholesterol", "< 200", ["chol"];
    FastingBloodSugar => "Fasting Blood Sugar", "< 100", ["fbs"];
    RestingEcg => "Resting ECG", "0 - 2", ["restecg"];
    MaxHeartRate => "Max Heart Rate", "60 - 100", ["thalach"];
    ExerciseInducedAngina => "Exercise Induced Angina", "No", ["exang"];
    StDepression => "ST Depression", "0 - 1", ["oldpeak"];
    StSlope => "ST Slope", "0 - 2", ["slope"];
    MajorVesselsColored => "Major Vessels Colored", "0 - 1", ["ca"];
    Thalassemia => "Thalassemia", "0 - 1", ["thal"];
    // Diabetes
    Bmi => "BMI", "18.5 - 24.9", ["bmi"];
    BloodGlucose => "Blood Glucose", "70 - 99", ["glucose", "Glucose"];
    Hba1c => "HbA1c", "4 - 5.6", ["hba", "hba1c"];
    Hypertension => "Hypertension", "No", ["hyt", "htn", "hypertension"];
    // Kidney
    BloodPressure => "Blood Pressure", "90 - 120", ["bp", "blood_pressure"];
    SpecificGravity => "Specific Gravity", "1.005 - 1.030", ["sg", "specific_gravity"];
    Albumin => "Albumin", "0 - 1", ["al", "albumin"];
    Sugar => "Sugar", "0 - 1", ["su", "sugar"];
    RedBloodCells => "Red Blood Cells", "Normal", ["rbc", "red_blood_cells"];
    PusCell => "Pus Cell", "Normal", ["pc", "pus_cell"];
    PusCellClumps => "Pus Cell Clumps", "No", ["pcc", "pus_cell_clumps"];
    Bacteria => "Bacteria", "No", ["ba", "bacteria"];
    BloodGlucoseRandom => "Blood Glucose Random", "70 - 140", ["bgr", "blood_glucose_random"];
    BloodUrea => "Blood Urea", "7 - 20", ["bu", "blood_urea"];
    SerumCreatinine => "Serum Creatinine", "0.6 - 1.2", ["sc", "serum_creatinine"];
    Sodium => "Sodium", "135 - 145", ["sod", "sodium"];
    Potassium => "Potassium", "3.5 - 5.0", ["pot", "potassium"];
    Haemoglobin => "Haemoglobin", "12 - 17", ["hemo", "haemoglobin"];
    PackedCellVolume => "Packed Cell Volume", "38 - 52", ["pcv", "packed_cell_volume", "Packed Blood Volume"];
    WhiteBloodCellCount => "White Blood Cell Count", "4000 - 11000", ["wc", "white_blood_cell_count"];
    RedBloodCellCount => "Red Blood Cell Count", "4.5 - 6.0", ["rc", "red_blood_cell_count"];
    DiabetesMellitus => "Diabetes Mellitus", "-", ["dm", "diabetes_mellitus"];
    CoronaryArteryDisease => "Coronary Artery Disease", "-", ["cad", "coronary_artery_disease"];
    Appetite => "Appetite", "-", ["appet", "appetite"];
    PedaEdema => "Peda Edema", "-", ["pe", "peda_edema"];
    Anaemia => "Anaemia", "-", ["ane", "anemia", "aanemia"];
}

#[derive(Debug, Clone, Serialize)]
pub struct VocabularyEntry {
    pub parameter: Parameter,
    pub aliases: Vec<String>,
    pub range: RangeSpec,
}

impl VocabularyEntry {
    pub fn display_name(&self) -> &'static str {
        self.parameter.display_name()
    }
}

/// Per-entry adjustments in an override file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryOverride {
    /// Replaces the reference range text.
    #[serde(default)]
    pub range: Option<String>,
    /// Added to the built-in aliases.
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VocabularyOverride {
    pub version: String,
    #[serde(default)]
    pub entries: BTreeMap<Parameter, EntryOverride>,
}

/// Immutable lookup table shared by the canonicalizer, flagger and compiler.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    version: String,
    entries: Vec<VocabularyEntry>,
    by_key: HashMap<String, Parameter>,
}

impl Vocabulary {
    /// The compiled-in table.
    pub fn builtin() -> Self {
        let entries = Parameter::ALL
            .iter()
            .map(|p| VocabularyEntry {
                parameter: *p,
                aliases: p.default_aliases().iter().map(|a| a.to_string()).collect(),
                range: builtin_range(*p),
            })
            .collect();
        // The `parameters!` table has no alias claimed twice; checked by
        // `builtin_table_is_well_formed`.
        Self::assemble(DEFAULT_VOCABULARY_VERSION.to_string(), entries)
            .expect("built-in aliases are unique")
    }

    /// Built-in table with an override file applied.
    pub fn load_with_override(path: &Path) -> Result<Self, ReportError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ReportError::VocabularyLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let overrides: VocabularyOverride =
            serde_json::from_str(&raw).map_err(|e| ReportError::VocabularyParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let vocabulary = Self::builtin().apply(overrides).map_err(|e| match e {
            ReportError::VocabularyParse { reason, .. } => ReportError::VocabularyParse {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        tracing::info!(
            path = %path.display(),
            version = %vocabulary.version,
            "Vocabulary override loaded"
        );
        Ok(vocabulary)
    }

    /// Override file if one is given, otherwise the built-in table.
    pub fn load(override_path: Option<&Path>) -> Result<Self, ReportError> {
        match override_path {
            Some(path) => Self::load_with_override(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn apply(self, overrides: VocabularyOverride) -> Result<Self, ReportError> {
        let mut entries = self.entries;
        for (parameter, change) in overrides.entries {
            let Some(entry) = entries.iter_mut().find(|e| e.parameter == parameter) else {
                continue;
            };
            if let Some(text) = change.range {
                entry.range = RangeSpec::parse(parameter.display_name(), &text)?;
            }
            for alias in change.aliases {
                if !entry.aliases.contains(&alias) {
                    entry.aliases.push(alias);
                }
            }
        }
        Self::assemble(overrides.version, entries)
    }

    fn assemble(version: String, entries: Vec<VocabularyEntry>) -> Result<Self, ReportError> {
        let mut by_key: HashMap<String, Parameter> = HashMap::new();
        for entry in &entries {
            by_key.insert(entry.display_name().to_string(), entry.parameter);
        }
        for entry in &entries {
            for alias in &entry.aliases {
                match by_key.get(alias) {
                    Some(existing) if *existing != entry.parameter => {
                        return Err(ReportError::VocabularyParse {
                            path: Default::default(),
                            reason: format!(
                                "alias {alias:?} claimed by both {} and {}",
                                existing.display_name(),
                                entry.display_name()
                            ),
                        });
                    }
                    _ => {
                        by_key.insert(alias.clone(), entry.parameter);
                    }
                }
            }
        }
        Ok(Self {
            version,
            entries,
            by_key,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    /// Parameter for a raw key or display name. Exact match only.
    pub fn resolve(&self, key: &str) -> Option<Parameter> {
        self.by_key.get(key).copied()
    }

    /// Canonical name for a raw key. Unknown keys come back unchanged.
    pub fn canonical_name<'a>(&self, raw_key: &'a str) -> &'a str {
        match self.resolve(raw_key) {
            Some(parameter) => parameter.display_name(),
            None => raw_key,
        }
    }

    /// Reference range for a canonical name, if it names a parameter.
    pub fn range_for(&self, name: &str) -> Option<&RangeSpec> {
        let parameter = self.resolve(name)?;
        if parameter.display_name() != name {
            return None;
        }
        self.entry(parameter).map(|e| &e.range)
    }

    pub fn entry(&self, parameter: Parameter) -> Option<&VocabularyEntry> {
        self.entries.iter().find(|e| e.parameter == parameter)
    }

    /// Flag a canonical measurement against its reference range.
    pub fn flag(&self, name: &str, value: &MeasurementValue) -> Flag {
        flag_value(self.range_for(name), value)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Every default range in the `parameters!` table parses; checked by
/// `builtin_table_is_well_formed`.
fn builtin_range(parameter: Parameter) -> RangeSpec {
    RangeSpec::parse(parameter.display_name(), parameter.default_range())
        .expect("built-in ranges parse")
}
