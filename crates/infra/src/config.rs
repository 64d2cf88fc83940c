//! Process configuration, read once at startup.
//!
//! Values come from the environment, after loading a `.env` file when one is
//! present. Anything malformed is a startup error.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use usersvc_auth::{AuthError, DEFAULT_BCRYPT_COST, Hs256Jwt, JwtStrategy, Rs256Jwt};

use crate::authn::TokenValidationMode;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is required: {reason}")]
    Missing { var: &'static str, reason: &'static str },

    #[error("{var} has an invalid value: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("failed to load signing keys: {0}")]
    Keys(#[from] AuthError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtAlgorithm {
    Hs256,
    Rs256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtConfig {
    pub algorithm: JwtAlgorithm,
    pub secret: Option<String>,
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub ttl_secs: i64,
}

/// First administrator, created at startup when the email is not registered.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
    pub cpf: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub token_validation: TokenValidationMode,
    pub bcrypt_cost: u32,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub log_activation_tokens: bool,
}

impl AppConfig {
    /// Load `.env` (if any), then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let algorithm = match get("JWT_ALGORITHM").as_deref().map(str::to_ascii_uppercase).as_deref() {
            None | Some("HS256") => JwtAlgorithm::Hs256,
            Some("RS256") => JwtAlgorithm::Rs256,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "JWT_ALGORITHM",
                    reason: format!("expected HS256 or RS256, got {other}"),
                });
            }
        };

        let ttl_secs = parse_number("JWT_TTL_SECS", get("JWT_TTL_SECS"), 3600i64)?;
        if ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "JWT_TTL_SECS",
                reason: "must be positive".to_string(),
            });
        }

        let jwt = JwtConfig {
            algorithm,
            secret: get("JWT_SECRET"),
            private_key: get("JWT_PRIVATE_KEY").map(unescape_pem),
            public_key: get("JWT_PUBLIC_KEY").map(unescape_pem),
            ttl_secs,
        };
        if algorithm == JwtAlgorithm::Rs256 && jwt.public_key.is_none() {
            return Err(ConfigError::Missing {
                var: "JWT_PUBLIC_KEY",
                reason: "RS256 verifies with the public key",
            });
        }

        let token_validation = match get("TOKEN_VALIDATION") {
            None => TokenValidationMode::Revalidate,
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: "TOKEN_VALIDATION",
                reason,
            })?,
        };

        let bcrypt_cost = parse_number("BCRYPT_COST", get("BCRYPT_COST"), DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: "BCRYPT_COST",
                reason: "must be between 4 and 31".to_string(),
            });
        }

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (None, None) => None,
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email: email.to_lowercase(),
                password,
                name: get("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| "Administrador".to_string()),
                cpf: get("BOOTSTRAP_ADMIN_CPF").ok_or(ConfigError::Missing {
                    var: "BOOTSTRAP_ADMIN_CPF",
                    reason: "every user needs a CPF",
                })?,
            }),
            _ => {
                return Err(ConfigError::Missing {
                    var: "BOOTSTRAP_ADMIN_EMAIL",
                    reason: "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD go together",
                });
            }
        };

        let log_activation_tokens = match get("ACTIVATION_LOG_TOKENS").as_deref() {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "ACTIVATION_LOG_TOKENS",
                    reason: format!("expected true or false, got {other}"),
                });
            }
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            jwt,
            token_validation,
            bcrypt_cost,
            bootstrap_admin,
            log_activation_tokens,
        })
    }

    /// Token strategy for the configured algorithm.
    ///
    /// HS256 without `JWT_SECRET` falls back to a development secret and warns.
    /// RS256 without a private key yields a verify-only strategy.
    pub fn jwt_strategy(&self) -> Result<Arc<dyn JwtStrategy>, ConfigError> {
        match self.jwt.algorithm {
            JwtAlgorithm::Hs256 => {
                let secret = match &self.jwt.secret {
                    Some(s) => s.clone(),
                    None => {
                        tracing::warn!("JWT_SECRET not set; using an insecure development secret");
                        DEV_JWT_SECRET.to_string()
                    }
                };
                Ok(Arc::new(Hs256Jwt::new(secret.into_bytes())))
            }
            JwtAlgorithm::Rs256 => {
                let public = self.jwt.public_key.as_deref().ok_or(ConfigError::Missing {
                    var: "JWT_PUBLIC_KEY",
                    reason: "RS256 verifies with the public key",
                })?;
                let strategy = match self.jwt.private_key.as_deref() {
                    Some(private) => Rs256Jwt::new(private, public)?,
                    None => {
                        tracing::warn!("JWT_PRIVATE_KEY not set; this instance can verify tokens but not issue them");
                        Rs256Jwt::verifier(public)?
                    }
                };
                Ok(Arc::new(strategy))
            }
        }
    }
}

fn parse_number<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

/// PEM values in `.env` files often carry literal `\n` sequences.
fn unescape_pem(raw: String) -> String {
    raw.replace("\\n", "\n")
}
