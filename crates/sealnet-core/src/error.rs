//! Error types for SealNet

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// SealNet error types
#[derive(Debug, Error)]
pub enum Error {
    /// Signature verification failed
    #[error("signature verification failed")]
    Integrity,

    /// Authenticated decryption failed. Never says why.
    #[error("decryption failed")]
    Decryption,

    /// AEAD encryption failed
    #[error("encryption failed")]
    Encryption,

    /// Structural decode failure of a capability
    #[error("malformed capability: {0}")]
    MalformedCapability(String),

    /// Structural decode failure of serialized credentials
    #[error("malformed identity: {0}")]
    MalformedIdentity(String),

    /// A declared field length exceeds its ceiling
    #[error("{field} exceeds size limit: {actual} > {limit}")]
    SizeLimitExceeded {
        field: &'static str,
        limit: usize,
        actual: usize,
    },

    /// Invalid key material
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Password-based key derivation failed
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Limits configuration rejected at startup
    #[error("invalid limits: {0}")]
    InvalidLimits(String),
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedCapability(reason.into())
    }
}
