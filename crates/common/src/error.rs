//! Error types for loancheck-common

use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving locators, formats and configuration
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
