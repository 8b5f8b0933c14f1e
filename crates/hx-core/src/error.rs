//! Error types for the exciter engine
//!
//! Nothing on the audio path returns these; they cover configuration
//! loading and strict construction only.

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum HxError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type HxResult<T> = Result<T, HxError>;
