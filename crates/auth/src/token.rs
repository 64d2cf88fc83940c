//! Token signing strategies.
//!
//! HS256 uses one shared secret for both directions. RS256 signs with a
//! private key and verifies with the public key; services that only verify
//! are built with [`Rs256Jwt::verifier`] and refuse to issue.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::{AuthError, JwtClaims, TokenValidationError, UserStatus, validate_claims};

/// Signs claims into a compact token.
pub trait JwtIssuer: Send + Sync {
    fn issue(&self, claims: &JwtClaims) -> Result<String, AuthError>;
}

/// Verifies a compact token and returns its claims.
///
/// Checks the signature, the `iat`/`exp` window against `now`, and an embedded
/// `status` when one is present.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError>;
}

/// Both halves, for services that log users in and check their tokens.
pub trait JwtStrategy: JwtIssuer + JwtValidator {
    fn algorithm(&self) -> Algorithm;
}

// ─────────────────────────────────────────────────────────────────────────────
// HS256
// ─────────────────────────────────────────────────────────────────────────────

pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256Jwt {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl JwtIssuer for Hs256Jwt {
    fn issue(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        sign(Algorithm::HS256, &self.encoding, claims)
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
        verify(Algorithm::HS256, &self.decoding, token, now)
    }
}

impl JwtStrategy for Hs256Jwt {
    fn algorithm(&self) -> Algorithm {
        Algorithm::HS256
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RS256
// ─────────────────────────────────────────────────────────────────────────────

pub struct Rs256Jwt {
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
}

impl Rs256Jwt {
    /// Key pair from PEM text (PKCS#8 or PKCS#1 private key, SPKI public key).
    pub fn new(private_pem: &str, public_pem: &str) -> Result<Self, AuthError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| AuthError::Crypto(format!("private key: {e}")))?;
        Ok(Self {
            encoding: Some(encoding),
            ..Self::verifier(public_pem)?
        })
    }

    /// Verify-only instance.
    pub fn verifier(public_pem: &str) -> Result<Self, AuthError> {
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| AuthError::Crypto(format!("public key: {e}")))?;
        Ok(Self { encoding: None, decoding })
    }
}

impl JwtIssuer for Rs256Jwt {
    fn issue(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        let key = self.encoding.as_ref().ok_or(AuthError::SigningKeyUnavailable)?;
        sign(Algorithm::RS256, key, claims)
    }
}

impl JwtValidator for Rs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
        verify(Algorithm::RS256, &self.decoding, token, now)
    }
}

impl JwtStrategy for Rs256Jwt {
    fn algorithm(&self) -> Algorithm {
        Algorithm::RS256
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared encode / decode
// ─────────────────────────────────────────────────────────────────────────────

fn sign(alg: Algorithm, key: &EncodingKey, claims: &JwtClaims) -> Result<String, AuthError> {
    encode(&Header::new(alg), claims, key).map_err(|e| AuthError::Crypto(e.to_string()))
}

fn verify(alg: Algorithm, key: &DecodingKey, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
    // The time window is checked against the caller's clock below.
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp"]);

    let claims = decode::<JwtClaims>(token, key, &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?
        .claims;

    validate_claims(&claims, now).map_err(|e| match e {
        TokenValidationError::Expired => AuthError::ExpiredToken,
        other => AuthError::InvalidToken(other.to_string()),
    })?;

    match claims.status {
        Some(status) if status != UserStatus::Active => Err(AuthError::InactiveAccount),
        _ => Ok(claims),
    }
}
