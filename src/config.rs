use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::Condition;

/// Application-level constants
pub const APP_NAME: &str = "MedGuardian";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overrides the application data directory (default `~/MedGuardian`).
pub const HOME_ENV: &str = "MEDGUARDIAN_HOME";
/// Points at an explicit `config.json` instead of the one in the data directory.
pub const CONFIG_ENV: &str = "MEDGUARDIAN_CONFIG";

/// Artifacts below this size are treated as placeholder or failed downloads.
pub const DEFAULT_MIN_ARTIFACT_BYTES: u64 = 100;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Whether this is a debug build.
pub fn is_dev() -> bool {
    cfg!(debug_assertions)
}

/// Tracing filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if is_dev() {
        "info,medguardian_lib=debug,medguardian=debug"
    } else {
        "warn,medguardian_lib=info,medguardian=info"
    }
}

/// Get the application data directory.
/// `$MEDGUARDIAN_HOME` if set, otherwise ~/MedGuardian/.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Get the models directory (serialized risk-model artifacts)
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

/// Get the directory rendered reports are exported to
pub fn reports_dir() -> PathBuf {
    app_data_dir().join("reports")
}

/// Resolve the config file location.
pub fn config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => PathBuf::from(path),
        Err(_) => app_data_dir().join(CONFIG_FILE_NAME),
    }
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Artifact path per condition. Relative paths resolve against `models_dir()`.
    pub artifacts: BTreeMap<Condition, PathBuf>,
    /// Minimum plausible artifact size in bytes.
    pub min_artifact_bytes: u64,
    /// Optional JSON file overriding the built-in parameter vocabulary.
    pub vocabulary_path: Option<PathBuf>,
    /// Shown as "Report Generated By" when the intake does not name one.
    pub report_generator: String,
    /// Clinic name printed in the report header.
    pub clinic_name: String,
    /// Secondary header line (location, email).
    pub clinic_contact: String,
    /// Name printed above the signature line.
    pub signatory: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let artifacts = [Condition::Heart, Condition::Diabetes, Condition::Kidney]
            .into_iter()
            .map(|c| (c, c.default_artifact_path()))
            .collect();
        Self {
            artifacts,
            min_artifact_bytes: DEFAULT_MIN_ARTIFACT_BYTES,
            vocabulary_path: None,
            report_generator: "MedGuardian AI Lab System".into(),
            clinic_name: APP_NAME.into(),
            clinic_contact: "Chennai, Tamil Nadu | info@medguardian.com".into(),
            signatory: "MedGuardian Reporting".into(),
        }
    }
}

impl AppConfig {
    /// Load from `config_path()`, falling back to defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit JSON file. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Absolute artifact path for a condition, if one is configured.
    pub fn artifact_path(&self, condition: &Condition) -> Option<PathBuf> {
        self.artifacts.get(condition).map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                models_dir().join(p)
            }
        })
    }
}
