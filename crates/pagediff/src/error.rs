use thiserror::Error;

use crate::compare::DiffError;
use crate::compare::buffer::BufferError;

/// Everything that can abort a comparison. There are no partial results:
/// any variant means the whole request or run failed.
#[derive(Debug, Error)]
pub enum ComparisonError {
    /// Bad input, detected before any browser is launched.
    #[error("{0}")]
    Validation(String),

    /// Navigation, timeout or network failure while taking a screenshot.
    #[error("failed to capture {url}: {message}")]
    Capture { url: String, message: String },

    /// Captured bytes are not a usable PNG.
    #[error("failed to decode screenshot {image}: {source}")]
    Decode {
        image: u8,
        #[source]
        source: BufferError,
    },

    /// The diff image could not be written as PNG.
    #[error("failed to encode diff image: {0}")]
    Encode(#[source] BufferError),

    /// Browser could not be launched or connected to.
    #[error("browser unavailable: {0}")]
    Resource(String),

    #[error("comparison failed: {0}")]
    Compare(#[from] DiffError),

    /// The blocking comparison task panicked or was cancelled.
    #[error("comparison task failed: {0}")]
    Task(String),
}

impl ComparisonError {
    /// True for errors caused by the caller's input rather than the pipeline.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
