//! Error types for DOM data decoding
//!
//! Simple, flat error hierarchy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Missing field in CDP payload: {0}")]
    MissingField(&'static str),

    #[error("Malformed quad: expected 8 coordinates, got {0}")]
    MalformedQuad(usize),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}
