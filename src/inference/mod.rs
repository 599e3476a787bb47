pub mod codec;
pub mod estimators;
pub mod hash;
pub mod loader;
pub mod normalize;
pub mod predictor;
pub mod registry;
pub mod sniff;

pub use codec::{ArtifactEnvelope, DecodeError, SCHEMA_VERSION};
pub use estimators::Estimator;
pub use loader::ArtifactLoader;
pub use normalize::{
    positive_probability, positive_probability_for, ProbabilityOutcome, ProbabilitySource,
    UnavailableReason,
};
pub use predictor::{
    ArtifactInfo, LoadedModel, MarginPredictor, ModelCapabilities, PredictError, PredictionRequest,
    Predictor, ProbabilityPredictor,
};
pub use registry::{ModelRegistry, ModelStatus};
pub use sniff::{sniff, sniff_bytes, ArtifactCandidate, Implausibility, SniffVerdict};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Model artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("Model artifact {path} rejected: {reason}")]
    Implausible {
        path: PathBuf,
        reason: Implausibility,
    },

    #[error("Model artifact {path} could not be decoded (bincode: {primary}; msgpack: {secondary})")]
    DeserializationFailed {
        path: PathBuf,
        primary: DecodeError,
        secondary: DecodeError,
    },

    #[error("Model artifact {path} holds a {estimator} with no predict operation")]
    CapabilityMissing { path: PathBuf, estimator: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
