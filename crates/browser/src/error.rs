//! Error types of the browser crate
//!
//! Only configuration and connection problems surface as errors. Runtime
//! failures during a navigation are captured into the
//! [`NavigationOutcome`](crate::navigation::NavigationOutcome), and content
//! accessors recover to `None`, so batch workflows keep moving when a single
//! page misbehaves.

use thiserror::Error;

use crate::cdp::client::CDPError;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser connection failed at {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Invalid debugger endpoint {url}: {reason}")]
    Endpoint { url: String, reason: String },

    #[error(transparent)]
    Cdp(#[from] CDPError),

    #[error("Invalid CDP payload: {0}")]
    InvalidPayload(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("No Chromium binary found in well-known locations")]
    NoBrowserBinary,

    #[error("Browser process error: {0}")]
    Process(#[from] std::io::Error),
}

impl BrowserError {
    /// Short type name used when a failure is folded into an outcome.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "Connection",
            Self::Endpoint { .. } => "Endpoint",
            Self::Cdp(CDPError::Timeout { .. }) => "CommandTimeout",
            Self::Cdp(_) => "Cdp",
            Self::InvalidPayload(_) => "InvalidPayload",
            Self::Capture(_) => "Capture",
            Self::Image(_) => "Image",
            Self::NoBrowserBinary => "NoBrowserBinary",
            Self::Process(_) => "Process",
        }
    }
}
