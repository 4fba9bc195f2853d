//! Error types for model parsing, scoring and the external learner

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SvmPerfError {
    #[error("Model format error: {0}")]
    FormatError(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Learner failed: {0}")]
    LearnerFailed(String),

    #[error("{command} did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, SvmPerfError>;
