use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ArtifactError;

/// Bytes read from the start of a candidate for signature checks.
pub const HEADER_LEN: usize = 16;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A file about to be loaded: where it is and how big it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactCandidate {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl ArtifactCandidate {
    /// Stat the file. A missing path is `NotFound`, not an I/O error.
    pub fn inspect(path: &Path) -> Result<Self, ArtifactError> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ArtifactError::Io(e)),
        };
        if !metadata.is_file() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
        })
    }
}

/// Why a candidate was turned away before deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Implausibility {
    /// Empty or placeholder download.
    TooSmall { size_bytes: u64, min_bytes: u64 },
    /// HTML/XML error page saved in place of the binary.
    MarkupSignature,
    /// JSON body (typically an API error) saved in place of the binary.
    JsonSignature,
}

impl std::fmt::Display for Implausibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooSmall { size_bytes, min_bytes } => {
                write!(f, "file is {size_bytes} bytes, below the {min_bytes}-byte minimum")
            }
            Self::MarkupSignature => f.write_str("content looks like HTML/XML, not a model binary"),
            Self::JsonSignature => f.write_str("content looks like JSON, not a model binary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SniffVerdict {
    Plausible,
    Implausible(Implausibility),
}

impl SniffVerdict {
    pub fn is_plausible(&self) -> bool {
        matches!(self, Self::Plausible)
    }
}

/// Sniff a candidate from its header bytes and size.
///
/// Only known-bad signatures are rejected; anything else is plausible and the
/// loader has the final word.
pub fn sniff(candidate: &ArtifactCandidate, min_bytes: u64) -> Result<SniffVerdict, ArtifactError> {
    if candidate.size_bytes < min_bytes {
        return Ok(sniff_bytes(&[], candidate.size_bytes, min_bytes));
    }

    let mut file = std::fs::File::open(&candidate.path)?;
    let mut header = [0u8; HEADER_LEN];
    let bytes_read = file.read(&mut header)?;

    Ok(sniff_bytes(&header[..bytes_read], candidate.size_bytes, min_bytes))
}

/// Pure verdict over a header slice and the total size.
pub fn sniff_bytes(header: &[u8], size_bytes: u64, min_bytes: u64) -> SniffVerdict {
    if size_bytes < min_bytes {
        return SniffVerdict::Implausible(Implausibility::TooSmall {
            size_bytes,
            min_bytes,
        });
    }

    let body = header.strip_prefix(UTF8_BOM).unwrap_or(header);
    let first = body.iter().copied().find(|b| !b.is_ascii_whitespace());

    match first {
        // <!DOCTYPE, <html, <?xml
        Some(b'<') => SniffVerdict::Implausible(Implausibility::MarkupSignature),
        Some(b'{') => SniffVerdict::Implausible(Implausibility::JsonSignature),
        _ => SniffVerdict::Plausible,
    }
}
