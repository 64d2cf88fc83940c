use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use usersvc_core::{Secretary, UserId};

use crate::{Role, User, UserStatus};

/// Claims carried by bearer tokens.
///
/// Tokens minted here always carry `role`, `status` and `secretary`. Tokens from
/// other issuers may carry only a `scope` list; see [`JwtClaims::effective_role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the user id.
    pub sub: UserId,

    #[serde(default)]
    pub email: String,

    #[serde(default, deserialize_with = "lenient_role", skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secretary: Option<Secretary>,

    /// Issued-at, seconds since the epoch.
    #[serde(default)]
    pub iat: i64,

    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl JwtClaims {
    /// Claims for a login token that lives `ttl`.
    pub fn for_user(user: &User, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user.id,
            email: user.email.clone(),
            role: Some(user.role),
            scope: Vec::new(),
            status: Some(user.status),
            secretary: user.secretary.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    /// `role` when present, otherwise the highest role named in `scope`.
    pub fn effective_role(&self) -> Option<Role> {
        self.role.or_else(|| Role::highest_in(self.scope.iter().map(String::as_str)))
    }
}

fn lenient_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Role>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| s.parse().map_err(serde::de::Error::custom))
        .transpose()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of decoded claims.
///
/// Note: this validates the *claims* only. Signature verification happens in
/// [`crate::token`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
