//! `usersvc-core` — domain primitives shared by every layer.
//!
//! This crate contains **pure domain** values (no infrastructure concerns).

pub mod cpf;
pub mod error;
pub mod id;
pub mod secretary;

pub use cpf::{Cpf, is_valid_cpf};
pub use error::{DomainError, DomainResult};
pub use id::UserId;
pub use secretary::Secretary;
