pub mod enums;
pub mod measurement;

pub use enums::*;
pub use measurement::*;

use thiserror::Error;

/// A string did not name any variant of a closed enumeration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid enum value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}
