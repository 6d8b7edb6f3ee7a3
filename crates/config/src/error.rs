//! Error types for configuration loading and persistence.
//!
//! Responsibilities:
//! - Define error variants for all configuration failures.
//!
//! Invariants:
//! - Error messages never include secret values.
//! - `ProfileNotFound` is recoverable in prompting flows (treated as an
//!   empty starting configuration) and fatal everywhere else.

use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving or persisting configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Profile '{0}' not found in config file")]
    ProfileNotFound(String),

    #[error("Unable to determine config directory: {0}")]
    ConfigDirUnavailable(String),

    #[error("Failed to parse config file at {path}, line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the `.env` file due to invalid syntax.
    ///
    /// Only the byte index of the parse failure is included, NOT the
    /// offending line content, to prevent leaking secrets.
    #[error(
        "Failed to parse .env file at position {error_index}. Hint: set DOTENV_DISABLED=1 to skip .env loading"
    )]
    DotenvParse { error_index: usize },

    /// Failed to read the `.env` file due to an I/O error.
    #[error("Failed to read .env file: {kind}")]
    DotenvIo { kind: ErrorKind },

    /// Unknown dotenv error (future variants from the dotenvy crate).
    #[error("Failed to load .env file. Hint: set DOTENV_DISABLED=1 to skip .env loading")]
    DotenvUnknown,
}
