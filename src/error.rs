//! memolog error types

use thiserror::Error;

/// memolog error type
///
/// Absence of a record is never an error: lookups and mutations report it
/// through `Option`/`bool` results. Errors are reserved for caller misuse
/// and for the I/O layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Operation is not valid for the record's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::de::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for an invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

/// Result type alias for memolog operations
pub type Result<T> = std::result::Result<T, Error>;
