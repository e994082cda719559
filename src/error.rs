//! Error types for stitching operations

use thiserror::Error;

/// Main error type for virtual stitching operations
#[derive(Error, Debug)]
pub enum StitchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid layout: {0}")]
    Layout(String),

    #[error("assembly failed: {0}")]
    Assembly(String),

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("invalid raw container: {0}")]
    InvalidFormat(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Specialized Result type for stitching operations
pub type Result<T> = std::result::Result<T, StitchError>;

impl From<bincode::Error> for StitchError {
    fn from(err: bincode::Error) -> Self {
        StitchError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StitchError {
    fn from(err: serde_json::Error) -> Self {
        StitchError::Serialization(err.to_string())
    }
}
