//! Login, internal credential checks, and bearer token resolution.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use usersvc_auth::{JwtClaims, JwtStrategy, Principal, Role};
use usersvc_core::{DomainError, UserId};

use crate::accounts::AccountService;
use crate::error::AccountError;

/// How bearer tokens are turned into principals.
///
/// `Revalidate` re-reads the user on every request: inactivation takes effect
/// at once, at the cost of one lookup. `Embedded` trusts the claims until the
/// token expires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenValidationMode {
    #[default]
    Revalidate,
    Embedded,
}

impl FromStr for TokenValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "revalidate" => Ok(Self::Revalidate),
            "embedded" => Ok(Self::Embedded),
            other => Err(format!("expected revalidate or embedded, got {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Answer of the internal credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCheck {
    pub valid: bool,
    pub user_id: Option<UserId>,
    pub roles: Vec<Role>,
}

impl CredentialCheck {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            user_id: None,
            roles: Vec::new(),
        }
    }
}

pub struct AuthenticationService {
    accounts: Arc<AccountService>,
    jwt: Arc<dyn JwtStrategy>,
    ttl: Duration,
    mode: TokenValidationMode,
}

impl AuthenticationService {
    pub fn new(
        accounts: Arc<AccountService>,
        jwt: Arc<dyn JwtStrategy>,
        ttl_secs: i64,
        mode: TokenValidationMode,
    ) -> Self {
        Self {
            accounts,
            jwt,
            ttl: Duration::seconds(ttl_secs),
            mode,
        }
    }

    pub fn mode(&self) -> TokenValidationMode {
        self.mode
    }

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AccountError> {
        let user = match self.accounts.authenticate(email, password).await {
            Ok(user) => user,
            Err(e) => {
                if e.domain().is_some() {
                    info!("login rejected");
                }
                return Err(e);
            }
        };

        let claims = JwtClaims::for_user(&user, Utc::now(), self.ttl);
        let access_token = self.jwt.issue(&claims)?;

        info!(user_id = %user.id, role = %user.role, "login succeeded");
        Ok(IssuedToken {
            access_token,
            token_type: "Bearer",
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Service-to-service credential check.
    ///
    /// Credential problems answer `valid: false`; only system failures are
    /// errors.
    pub async fn validate_credentials(&self, email: &str, password: &str) -> Result<CredentialCheck, AccountError> {
        match self.accounts.authenticate(email, password).await {
            Ok(user) => Ok(CredentialCheck {
                valid: true,
                user_id: Some(user.id),
                roles: vec![user.role],
            }),
            Err(AccountError::Domain(DomainError::Unauthorized(_))) => Ok(CredentialCheck::invalid()),
            Err(e) => Err(e),
        }
    }

    /// Turn a bearer token into the acting principal.
    pub async fn resolve_principal(&self, token: &str) -> Result<Principal, AccountError> {
        let claims = self.jwt.validate(token, Utc::now())?;

        match self.mode {
            TokenValidationMode::Embedded => {
                let role = claims
                    .effective_role()
                    .ok_or_else(|| DomainError::unauthorized("token carries no recognised role"))?;
                Ok(Principal {
                    id: claims.sub,
                    email: claims.email,
                    role,
                    secretary: claims.secretary,
                })
            }
            TokenValidationMode::Revalidate => {
                let user = self
                    .accounts
                    .find_active(claims.sub)
                    .await?
                    .ok_or_else(|| DomainError::unauthorized("account is not active"))?;
                Ok(Principal::from(&user))
            }
        }
    }
}
