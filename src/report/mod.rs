pub mod canonical;
pub mod compiler;
pub mod identity;
pub mod range;
pub mod render;
pub mod vocabulary;

pub use canonical::{canonicalize, CanonicalParameter, CanonicalRecord};
pub use compiler::{compile, ReportDocument, ResultRow};
pub use identity::PatientIdentity;
pub use range::{flag_value, Flag, FlagBasis, RangeRule, RangeSpec};
pub use render::{export_to_file, JsonRenderer, PdfRenderer, ReportRenderer};
pub use vocabulary::{Parameter, Vocabulary};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("Cannot read vocabulary {path}: {source}")]
    VocabularyLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid vocabulary {path}: {reason}")]
    VocabularyParse { path: PathBuf, reason: String },

    #[error("Invalid reference range for {parameter}: {text:?}")]
    InvalidRange { parameter: String, text: String },
}
