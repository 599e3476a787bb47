use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::estimators::Estimator;
use crate::models::enums::ArtifactFormat;

/// Envelope layout version written by `encode`.
pub const SCHEMA_VERSION: u16 = 1;

/// Upper bound for bincode allocations while decoding untrusted bytes.
pub const MAX_ARTIFACT_BYTES: u64 = 64 * 1024 * 1024;

/// On-disk artifact: the estimator plus what it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    pub schema_version: u16,
    pub name: String,
    pub feature_names: Vec<String>,
    pub estimator: Estimator,
}

impl ArtifactEnvelope {
    pub fn new(name: impl Into<String>, feature_names: Vec<String>, estimator: Estimator) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: name.into(),
            feature_names,
            estimator,
        }
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("{0}")]
    Bincode(#[from] bincode::Error),

    #[error("{0}")]
    MessagePack(#[from] rmp_serde::decode::Error),

    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedSchema { found: u16, expected: u16 },
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("bincode encoding failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("msgpack encoding failed: {0}")]
    MessagePack(#[from] rmp_serde::encode::Error),
}

fn bincode_options() -> impl Options {
    // Fixed-width ints, bounded allocations, trailing bytes rejected.
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_ARTIFACT_BYTES)
}

/// Decode an envelope in the given format.
pub fn decode(bytes: &[u8], format: ArtifactFormat) -> Result<ArtifactEnvelope, DecodeError> {
    let envelope: ArtifactEnvelope = match format {
        ArtifactFormat::Bincode => bincode_options().deserialize(bytes)?,
        ArtifactFormat::MessagePack => rmp_serde::from_slice(bytes)?,
    };
    if envelope.schema_version != SCHEMA_VERSION {
        return Err(DecodeError::UnsupportedSchema {
            found: envelope.schema_version,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(envelope)
}

/// Encode an envelope. MessagePack output uses named fields.
pub fn encode(envelope: &ArtifactEnvelope, format: ArtifactFormat) -> Result<Vec<u8>, EncodeError> {
    match format {
        ArtifactFormat::Bincode => Ok(bincode_options().serialize(envelope)?),
        ArtifactFormat::MessagePack => Ok(rmp_serde::to_vec_named(envelope)?),
    }
}
