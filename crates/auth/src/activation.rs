//! Single-use activation tokens.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use usersvc_core::DomainError;

use crate::{User, UserStatus};

/// How long an activation link stays usable.
pub const ACTIVATION_TTL_HOURS: i64 = 24;

/// The one message every activation failure reports, so callers cannot tell
/// an unknown token from an expired one.
pub const INVALID_ACTIVATION: &str = "invalid or expired activation link";

/// A freshly issued activation token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationTicket {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue an unguessable token (UUIDv4) valid for [`ACTIVATION_TTL_HOURS`].
pub fn issue_activation(now: DateTime<Utc>) -> ActivationTicket {
    ActivationTicket {
        token: Uuid::new_v4().to_string(),
        expires_at: now + Duration::hours(ACTIVATION_TTL_HOURS),
    }
}

/// Decide whether the user found by an activation token may activate now.
///
/// - No IO
/// - Unknown, consumed and expired tokens all fail the same way
pub fn check_activation(found: Option<User>, now: DateTime<Utc>) -> Result<User, DomainError> {
    let Some(user) = found else {
        return Err(DomainError::unauthorized(INVALID_ACTIVATION));
    };
    if user.status != UserStatus::PendingPassword {
        return Err(DomainError::unauthorized(INVALID_ACTIVATION));
    }
    match user.token_expires_at {
        Some(expires_at) if now <= expires_at => Ok(user),
        _ => Err(DomainError::unauthorized(INVALID_ACTIVATION)),
    }
}
