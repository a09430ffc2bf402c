//! CLI-specific error types

use std::path::PathBuf;
use thiserror::Error;

use crate::error::QuackError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Pipeline(#[from] QuackError),
}
