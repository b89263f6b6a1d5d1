//! Error types for the devca library.
//!
//! Every fallible operation returns [`DevCaError`]. Nothing in the library
//! retries, logs-and-continues, or terminates the process: errors propagate
//! to the immediate caller and the call yields no partial result.

use thiserror::Error;

/// The main error type for devca operations.
#[derive(Error, Debug)]
pub enum DevCaError {
    /// The secure random source failed while drawing bytes
    #[error("Random source error: {0}")]
    RandomSourceError(String),

    /// RSA key generation failed or the requested bit size is invalid
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// X.509 encoding or signing failed
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// PEM encoding or decoding failed
    #[error("PEM error: {0}")]
    PemError(String),

    /// A certificate did not verify against its claimed issuer
    #[error("Verification error: {0}")]
    VerificationError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input data
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// A specialized Result type for devca operations.
pub type Result<T> = std::result::Result<T, DevCaError>;
