//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Genrun.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Caller input outside the allowed range.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// A string did not name any known variant of an enum.
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    /// A `data:` URL could not be parsed or decoded.
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),
}
