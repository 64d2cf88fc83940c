use thiserror::Error;

use usersvc_core::DomainError;

/// Token and credential failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Bad signature, malformed token, or a broken time window.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has expired")]
    ExpiredToken,

    /// The token carries a status other than `ACTIVE`.
    #[error("account is not active")]
    InactiveAccount,

    /// Issuing was requested from a verify-only key set.
    #[error("no signing key configured")]
    SigningKeyUnavailable,

    /// Key material or hash primitive failure. Never the caller's fault.
    #[error("crypto failure: {0}")]
    Crypto(String),
}

impl AuthError {
    /// Whether this failure should be reported to the caller as 401.
    pub fn is_credential_problem(&self) -> bool {
        matches!(self, AuthError::InvalidToken(_) | AuthError::ExpiredToken | AuthError::InactiveAccount)
    }
}

impl TryFrom<AuthError> for DomainError {
    type Error = AuthError;

    /// Credential problems become `Unauthorized`; system failures are handed back.
    fn try_from(err: AuthError) -> Result<Self, Self::Error> {
        if err.is_credential_problem() {
            Ok(DomainError::unauthorized(err.to_string()))
        } else {
            Err(err)
        }
    }
}
