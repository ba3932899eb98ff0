//! Error types for the rack crates

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum RackError {
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    #[error("Unknown parameter '{param}' on effect '{effect}'")]
    UnknownParameter { effect: String, param: String },

    #[error("Effect '{0}' appears more than once in the chain")]
    DuplicateEffect(String),

    #[error("Chain position {position} out of range (len {len})")]
    InvalidPosition { position: usize, len: usize },

    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias
pub type RackResult<T> = Result<T, RackError>;
