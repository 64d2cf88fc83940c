//! `usersvc-auth` — credentials, tokens and the authorization rules.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod activation;
pub mod authorize;
pub mod claims;
pub mod error;
pub mod password;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod token;
pub mod user;

pub use activation::{ActivationTicket, INVALID_ACTIVATION, check_activation, issue_activation};
pub use authorize::{
    VisibilityScope, authorize_create, authorize_delete, authorize_inactivate, authorize_update,
    check_access, gestor_count_needed, last_gestor_guard, reject_identity_change, visibility,
};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use password::{CredentialVerifier, DEFAULT_BCRYPT_COST};
pub use policy::{PasswordViolation, check_password};
pub use principal::Principal;
pub use roles::Role;
pub use token::{Hs256Jwt, JwtIssuer, JwtStrategy, JwtValidator, Rs256Jwt};
pub use user::{NewUser, User, UserDraft, UserPatch, UserStatus};
