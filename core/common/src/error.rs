//! Common error types for QuillVault.

use thiserror::Error;

/// Top-level error type for QuillVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// AEAD tag verification failed: wrong key, wrong associated data,
    /// corruption, or active tampering. Never downgraded to a warning.
    #[error("Authentication failure: ciphertext integrity check failed")]
    AuthenticationFailure,

    /// KDF parameters fall below the configured safety floor.
    #[error("KDF parameters too weak: {memory_kib} KiB memory < {floor_kib} KiB floor")]
    WeakParameters { memory_kib: u32, floor_kib: u32 },

    /// An encrypted index failed to decrypt or parse. Fatal for the
    /// vault session; no partial recovery is attempted.
    #[error("Corrupted index: {0}")]
    CorruptedIndex(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A share was presented to an identity it was not wrapped for.
    #[error("Share recipient mismatch")]
    WrongRecipient,

    /// The share has been revoked and is permanently unusable.
    #[error("Share has been revoked")]
    RevokedShare,

    /// The share expired and is permanently unusable.
    #[error("Share has expired")]
    ExpiredShare,

    /// The session or workspace is locked; key material has been cleared.
    #[error("Session is locked")]
    Locked,

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
