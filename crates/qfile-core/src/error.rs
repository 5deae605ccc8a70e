//! Error types for QFile core operations.
//!
//! Every precondition failure has its own variant so front ends can report
//! the exact reason. The CLI layer maps these to exit codes.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for QFile operations.
pub type Result<T> = std::result::Result<T, QfeError>;

/// Core error type for QFile operations.
#[derive(Debug, Error)]
pub enum QfeError {
    /// Malformed or empty caller input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Identity already has a key pair
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// File, record or blob does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Identity has no key pair
    #[error("No key pair for identity: {0}")]
    NoKeyPair(String),

    /// Recipient cannot be resolved to a public key
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),

    /// Passphrase does not unlock the private key
    #[error("Incorrect passphrase")]
    BadPassphrase,

    /// Key pair generation failed
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Content encryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Container is malformed, tampered with, or not addressed to the key
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Key store uniqueness violation (username or recipient id)
    #[error("Duplicate key pair: {0}")]
    DuplicateKey(String),

    /// File registry uniqueness violation
    #[error("Duplicate filename: {0}")]
    DuplicateFilename(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Operation stopped through its cancel flag
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation exceeded the worker pool deadline
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid service configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error (fallback)
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for QfeError {
    fn from(err: std::io::Error) -> Self {
        QfeError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for QfeError {
    fn from(err: rusqlite::Error) -> Self {
        QfeError::Storage(format!("SQLite error: {}", err))
    }
}
