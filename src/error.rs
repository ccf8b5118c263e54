//! Error taxonomy for the memory pipeline.
//!
//! Every failure the orchestrator can report maps to exactly one
//! [`ErrorKind`], whose [`ErrorKind::as_str`] code is stable so transports can
//! choose their own retry policy. The core never retries.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::store::StoreError;

/// Stable error category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Embedding,
    Encryption,
    Authentication,
    Format,
    Storage,
    StorageUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Embedding => "embedding_error",
            Self::Encryption => "encryption_error",
            Self::Authentication => "authentication_error",
            Self::Format => "format_error",
            Self::Storage => "storage_error",
            Self::StorageUnavailable => "storage_unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by [`crate::memory::MemoryOrchestrator`].
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Malformed input; raised before any side effect.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Provider unavailable, timed out, or returned an unusable vector.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Key unavailable or the cipher refused to encrypt.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Tag verification or content integrity check failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Stored ciphertext is structurally malformed.
    #[error("malformed encrypted blob: {0}")]
    Format(String),

    /// The vector index rejected the operation or timed out.
    #[error("storage error: {0}")]
    Storage(String),

    /// The vector index is unreachable or corrupt.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl MemoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Embedding(_) => ErrorKind::Embedding,
            Self::Encryption(_) => ErrorKind::Encryption,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Format(_) => ErrorKind::Format,
            Self::Storage(_) => ErrorKind::Storage,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<CryptoError> for MemoryError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Authentication => Self::Authentication(err.to_string()),
            CryptoError::Format(msg) => Self::Format(msg),
            CryptoError::MissingSecret | CryptoError::Encryption(_) => {
                Self::Encryption(err.to_string())
            }
        }
    }
}

impl From<StoreError> for MemoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) | StoreError::Corrupt(_) => {
                Self::StorageUnavailable(err.to_string())
            }
            StoreError::Rejected(_) | StoreError::Timeout(_) => Self::Storage(err.to_string()),
        }
    }
}

/// Result alias used throughout the pipeline.
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;
