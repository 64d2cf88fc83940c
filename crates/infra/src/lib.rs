//! Infrastructure layer: user directory, account services, config.

pub mod accounts;
pub mod authn;
pub mod config;
pub mod directory;
pub mod error;
pub mod notifier;

pub use accounts::{AccountService, normalize_email};
pub use authn::{AuthenticationService, CredentialCheck, IssuedToken, TokenValidationMode};
pub use config::{AppConfig, BootstrapAdmin, ConfigError};
pub use directory::{InMemoryUserDirectory, Page, PageRequest, PostgresUserDirectory, StoreError, UserDirectory};
pub use error::AccountError;
pub use notifier::{ActivationMessage, ActivationNotifier, LogNotifier, OutboxNotifier};
