//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Client-facing failure taxonomy.
///
/// Every variant is deterministic and caused by the caller (bad input, missing
/// privilege, uniqueness clash). Store and crypto failures never end up here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input or a policy violation the caller can fix.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing, invalid or expired credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No record with the requested identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::InvalidId(m) => m,
        }
    }
}
