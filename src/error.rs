//! # Error Types
//!
//! Structured errors for the cache layer. Codec and store failures keep their
//! own enums so callers can tell a corrupt entry from an unreachable backend;
//! `CacheError` wraps both for the manager surface.

use thiserror::Error;

/// Errors raised while encoding or decoding cached values
#[derive(Debug, Error)]
pub enum CodecError {
    /// A tagged envelope names a tag the decoder's registry does not know.
    /// Usually a vocabulary mismatch between the writer and the reader.
    #[error("Unknown value tag '{0}' in tagged envelope")]
    UnknownTag(String),

    /// A value carries a kind tag the encoder's registry cannot format
    #[error("Value tag '{0}' is not registered with this coder")]
    UnregisteredTag(String),

    /// An object carrying `_spec_type` without a usable `val`
    #[error("Malformed tagged envelope: {0}")]
    MalformedEnvelope(String),

    /// A registered tag failed to parse its canonical string
    #[error("Invalid '{tag}' value '{repr}': {reason}")]
    InvalidScalar {
        tag: String,
        repr: String,
        reason: String,
    },

    /// The value cannot be represented by this coder
    #[error("Unsupported value for {coder} coder: {reason}")]
    Unsupported { coder: &'static str, reason: String },

    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary codec error: {0}")]
    Binary(#[from] bincode::Error),

    /// Binary frame decoded but its structure is inconsistent
    #[error("Corrupt cache frame: {0}")]
    Corrupt(String),

    /// Decoded value does not fit the requested target type
    #[error("Decoded value does not match requested shape: {0}")]
    Shape(String),
}

impl CodecError {
    pub(crate) fn invalid_scalar(
        tag: impl Into<String>,
        repr: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidScalar {
            tag: tag.into(),
            repr: repr.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a store client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Failed to connect to the store backend
    #[error("Store connection error: {0}")]
    ConnectionError(String),

    /// The backend rejected or failed a command
    #[error("Store backend error: {0}")]
    BackendError(String),
}

/// Top-level error for cache manager operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type Result<T> = std::result::Result<T, CacheError>;
