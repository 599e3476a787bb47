use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::InvalidEnum;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Condition {
    Heart => "heart",
    Diabetes => "diabetes",
    Kidney => "kidney",
});

str_enum!(FlagStatus {
    Normal => "normal",
    Low => "low",
    High => "high",
});

str_enum!(Capability {
    Predict => "predict",
    PredictProba => "predict_proba",
    DecisionFunction => "decision_function",
});

str_enum!(ArtifactFormat {
    Bincode => "bincode",
    MessagePack => "msgpack",
});

impl Condition {
    pub const ALL: [Condition; 3] = [Condition::Heart, Condition::Diabetes, Condition::Kidney];

    /// Test-type label printed on the report.
    pub fn report_label(&self) -> &'static str {
        match self {
            Self::Heart => "Heart Disease",
            Self::Diabetes => "Diabetes",
            Self::Kidney => "Kidney",
        }
    }

    /// Artifact location relative to the models directory.
    pub fn default_artifact_path(&self) -> PathBuf {
        match self {
            Self::Heart => PathBuf::from("heart/heart_model.bin"),
            Self::Diabetes => PathBuf::from("diabetes/diabetes_model.bin"),
            Self::Kidney => PathBuf::from("kidney/kidney_model.bin"),
        }
    }

    /// Verdict wording for a positive (`1`) or negative prediction label.
    pub fn verdict(&self, positive: bool) -> &'static str {
        match (self, positive) {
            (Self::Heart, true) => "High Risk",
            (Self::Heart, false) => "Safe",
            (Self::Diabetes, true) => "Diabetes Risk",
            (Self::Diabetes, false) => "Normal",
            (Self::Kidney, true) => "CKD Risk Detected",
            (Self::Kidney, false) => "Kidneys Healthy",
        }
    }
}

impl FlagStatus {
    /// Capitalised form used in rendered tables.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Low => "Low",
            Self::High => "High",
        }
    }
}
