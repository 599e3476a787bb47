use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::{ArtifactFormat, Capability};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("Expected {expected} features, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("Estimator is degenerate: {0}")]
    Degenerate(String),
}

/// Hard-label prediction. Every loaded model has this.
pub trait Predictor: Send + Sync {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<i64>, PredictError>;
}

/// Per-class probabilities, one row per sample, one column per class.
pub trait ProbabilityPredictor: Predictor {
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, PredictError>;
}

/// Signed distance from the decision boundary; positive favours class 1.
pub trait MarginPredictor: Predictor {
    fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, PredictError>;
}

/// One assessment's worth of encoded features, in model order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    features: Vec<f64>,
}

impl PredictionRequest {
    pub fn new(features: Vec<f64>) -> Self {
        Self { features }
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    /// A `1 x n` view over the features.
    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        ArrayView1::from(self.features.as_slice()).insert_axis(Axis(0))
    }
}

/// The operations a decoded estimator actually supports.
pub struct ModelCapabilities {
    pub predictor: Arc<dyn Predictor>,
    pub probability: Option<Arc<dyn ProbabilityPredictor>>,
    pub margin: Option<Arc<dyn MarginPredictor>>,
}

/// Provenance of a loaded artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub checksum: String,
    pub format: ArtifactFormat,
    pub name: String,
    pub schema_version: u16,
    pub feature_names: Vec<String>,
    pub estimator: String,
    pub loaded_at: DateTime<Utc>,
}

/// A model that passed sniffing, decoding, and capability checks.
///
/// The predict capability is guaranteed by construction; probability and
/// margin support are fixed at load time and never re-probed.
pub struct LoadedModel {
    predictor: Arc<dyn Predictor>,
    probability: Option<Arc<dyn ProbabilityPredictor>>,
    margin: Option<Arc<dyn MarginPredictor>>,
    info: ArtifactInfo,
}

impl LoadedModel {
    pub fn new(capabilities: ModelCapabilities, info: ArtifactInfo) -> Self {
        Self {
            predictor: capabilities.predictor,
            probability: capabilities.probability,
            margin: capabilities.margin,
            info,
        }
    }

    pub fn info(&self) -> &ArtifactInfo {
        &self.info
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<Array1<i64>, PredictError> {
        self.predictor.predict(request.matrix())
    }

    /// Label of the single request row, or `None` when the estimator returned no rows.
    pub fn predict_label(&self, request: &PredictionRequest) -> Result<Option<i64>, PredictError> {
        Ok(self.predict(request)?.first().copied())
    }

    pub fn probability(&self) -> Option<&dyn ProbabilityPredictor> {
        self.probability.as_deref()
    }

    pub fn margin(&self) -> Option<&dyn MarginPredictor> {
        self.margin.as_deref()
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Predict => true,
            Capability::PredictProba => self.probability.is_some(),
            Capability::DecisionFunction => self.margin.is_some(),
        }
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        [
            Capability::Predict,
            Capability::PredictProba,
            Capability::DecisionFunction,
        ]
        .into_iter()
        .filter(|c| self.supports(*c))
        .collect()
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("info", &self.info)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
