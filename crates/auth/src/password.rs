//! bcrypt hashing and timing-safe verification.
//!
//! Both operations are CPU-bound and synchronous; async callers run them on
//! a blocking thread.

use crate::AuthError;

/// Work factor used when nothing else is configured.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Hashes new passwords and verifies presented ones.
///
/// Verification always runs one bcrypt comparison, even when there is no
/// stored hash, so "no such user" and "wrong password" take the same time.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    cost: u32,
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(cost: u32) -> Result<Self, AuthError> {
        let dummy_hash = bcrypt::hash("usersvc-dummy-credential", cost)
            .map_err(|e| AuthError::Crypto(e.to_string()))?;
        Ok(Self { cost, dummy_hash })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| AuthError::Crypto(e.to_string()))
    }

    /// `Ok(false)` on mismatch or when `stored` is `None`.
    ///
    /// A stored hash that bcrypt cannot parse is an error, not a mismatch.
    pub fn verify(&self, plaintext: &str, stored: Option<&str>) -> Result<bool, AuthError> {
        match stored {
            Some(hash) => bcrypt::verify(plaintext, hash).map_err(|e| AuthError::Crypto(e.to_string())),
            None => {
                bcrypt::verify(plaintext, &self.dummy_hash)
                    .map_err(|e| AuthError::Crypto(e.to_string()))?;
                Ok(false)
            }
        }
    }
}
