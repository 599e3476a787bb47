use std::path::Path;

use chrono::Utc;

use super::codec::{self, ArtifactEnvelope};
use super::hash::compute_content_hash;
use super::predictor::{ArtifactInfo, LoadedModel};
use super::sniff::{sniff, ArtifactCandidate, SniffVerdict};
use super::ArtifactError;
use crate::config::DEFAULT_MIN_ARTIFACT_BYTES;
use crate::models::enums::ArtifactFormat;

/// Sniffs, decodes, and validates model artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    min_bytes: u64,
}

impl Default for ArtifactLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ARTIFACT_BYTES)
    }
}

impl ArtifactLoader {
    pub fn new(min_bytes: u64) -> Self {
        Self { min_bytes }
    }

    pub fn min_bytes(&self) -> u64 {
        self.min_bytes
    }

    /// Load one artifact.
    ///
    /// The sniffer runs first and its rejection is final. Decoding tries
    /// bincode, then MessagePack; both failures are reported together.
    pub fn load(&self, path: &Path) -> Result<LoadedModel, ArtifactError> {
        let candidate = ArtifactCandidate::inspect(path)?;

        if let SniffVerdict::Implausible(reason) = sniff(&candidate, self.min_bytes)? {
            tracing::warn!(path = %path.display(), %reason, "Artifact rejected before decoding");
            return Err(ArtifactError::Implausible {
                path: path.to_path_buf(),
                reason,
            });
        }

        let bytes = std::fs::read(path)?;
        let (envelope, format) = decode_either(path, &bytes)?;

        let estimator_kind = envelope.estimator.kind();
        let info = ArtifactInfo {
            path: path.to_path_buf(),
            size_bytes: bytes.len() as u64,
            checksum: compute_content_hash(&bytes),
            format,
            name: envelope.name,
            schema_version: envelope.schema_version,
            feature_names: envelope.feature_names,
            estimator: estimator_kind.to_string(),
            loaded_at: Utc::now(),
        };

        let Some(capabilities) = envelope.estimator.into_capabilities() else {
            tracing::warn!(
                path = %path.display(),
                estimator = estimator_kind,
                "Artifact decoded but cannot predict"
            );
            return Err(ArtifactError::CapabilityMissing {
                path: path.to_path_buf(),
                estimator: estimator_kind.to_string(),
            });
        };

        let model = LoadedModel::new(capabilities, info);
        tracing::info!(
            path = %path.display(),
            model = %model.info().name,
            format = %format,
            estimator = estimator_kind,
            size_bytes = model.info().size_bytes,
            "Model artifact loaded"
        );
        Ok(model)
    }
}

fn decode_either(
    path: &Path,
    bytes: &[u8],
) -> Result<(ArtifactEnvelope, ArtifactFormat), ArtifactError> {
    let primary = match codec::decode(bytes, ArtifactFormat::Bincode) {
        Ok(envelope) => return Ok((envelope, ArtifactFormat::Bincode)),
        Err(e) => e,
    };
    tracing::debug!(path = %path.display(), error = %primary, "bincode decode failed, trying msgpack");

    match codec::decode(bytes, ArtifactFormat::MessagePack) {
        Ok(envelope) => Ok((envelope, ArtifactFormat::MessagePack)),
        Err(secondary) => {
            tracing::warn!(
                path = %path.display(),
                primary = %primary,
                secondary = %secondary,
                "Artifact could not be decoded in either format"
            );
            Err(ArtifactError::DeserializationFailed {
                path: path.to_path_buf(),
                primary,
                secondary,
            })
        }
    }
}
