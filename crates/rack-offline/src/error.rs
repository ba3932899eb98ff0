//! Error types for offline rendering

use thiserror::Error;

/// Offline render errors
#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Failed to read audio file: {0}")]
    ReadError(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Failed to write output file: {0}")]
    WriteError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OfflineError {
    /// True for failures that happened while loading a source, as opposed
    /// to rendering or writing the export
    pub fn is_load_failure(&self) -> bool {
        matches!(self, OfflineError::InputNotFound(_) | OfflineError::ReadError(_))
    }
}

/// Result type for offline operations
pub type OfflineResult<T> = Result<T, OfflineError>;
