use thiserror::Error;

use usersvc_auth::AuthError;
use usersvc_core::DomainError;

use crate::directory::StoreError;

/// Failure of an account or authentication operation.
///
/// `Domain` is the caller's fault and maps onto a client status. Everything
/// else is a system failure.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Auth(AuthError),

    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_) => DomainError::conflict("e-mail or CPF already registered").into(),
            StoreError::Missing(id) => DomainError::not_found(format!("user {id} not found")).into(),
            StoreError::Stale(id) => {
                DomainError::conflict(format!("user {id} was changed by another request; reload and retry")).into()
            }
            other => AccountError::Store(other),
        }
    }
}

impl From<AuthError> for AccountError {
    /// Token problems are the caller's; key and hash failures are not.
    fn from(err: AuthError) -> Self {
        match DomainError::try_from(err) {
            Ok(domain) => AccountError::Domain(domain),
            Err(system) => AccountError::Auth(system),
        }
    }
}

impl AccountError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            AccountError::Domain(d) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use usersvc_core::UserId;

    #[test]
    fn unique_violation_is_conflict() {
        let err: AccountError = StoreError::UniqueViolation("users_email_key".to_string()).into();
        assert!(matches!(err.domain(), Some(DomainError::Conflict(_))));
    }

    #[test]
    fn lost_write_race_is_conflict() {
        let err: AccountError = StoreError::Stale(UserId::new()).into();
        assert!(matches!(err.domain(), Some(DomainError::Conflict(_))));
    }

    #[test]
    fn database_failure_stays_a_system_error() {
        let err: AccountError = StoreError::Database("connection reset".to_string()).into();
        assert!(err.domain().is_none());
    }

    #[test]
    fn expired_token_is_unauthorized_but_crypto_is_not() {
        let expired: AccountError = AuthError::ExpiredToken.into();
        assert!(matches!(expired.domain(), Some(DomainError::Unauthorized(_))));

        let crypto: AccountError = AuthError::Crypto("bad key".to_string()).into();
        assert!(matches!(crypto, AccountError::Auth(_)));
    }
}
