use std::sync::Arc;

use anyhow::Context;

use usersvc_auth::{CredentialVerifier, JwtStrategy};
use usersvc_infra::{
    AccountError, AccountService, ActivationNotifier, AppConfig, AuthenticationService, ConfigError,
    InMemoryUserDirectory, LogNotifier, PostgresUserDirectory, UserDirectory,
};

/// Services shared by every handler.
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub authn: Arc<AuthenticationService>,
}

impl AppServices {
    /// Wire services over an already chosen directory, notifier and token strategy.
    pub fn assemble(
        config: &AppConfig,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn ActivationNotifier>,
        jwt: Arc<dyn JwtStrategy>,
    ) -> Result<Self, ConfigError> {
        let verifier = CredentialVerifier::new(config.bcrypt_cost)?;
        let accounts = Arc::new(AccountService::new(directory, notifier, verifier));
        let authn = Arc::new(AuthenticationService::new(
            Arc::clone(&accounts),
            jwt,
            config.jwt.ttl_secs,
            config.token_validation,
        ));
        Ok(Self { accounts, authn })
    }

    /// Create the configured first administrator, if any.
    pub async fn bootstrap(&self, config: &AppConfig) -> Result<(), AccountError> {
        if let Some(admin) = &config.bootstrap_admin {
            self.accounts.bootstrap_admin(admin).await?;
        }
        Ok(())
    }
}

/// Build production services from configuration.
///
/// `DATABASE_URL` selects Postgres; without it users live in memory and are
/// lost on restart.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let directory: Arc<dyn UserDirectory> = match &config.database_url {
        Some(url) => {
            let pg = PostgresUserDirectory::connect(url)
                .await
                .context("failed to connect to postgres")?;
            pg.ensure_schema().await.context("failed to prepare the users table")?;
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; users are kept in memory");
            Arc::new(InMemoryUserDirectory::new())
        }
    };

    let notifier = Arc::new(LogNotifier::new(config.log_activation_tokens));
    let jwt = config.jwt_strategy()?;

    let services = AppServices::assemble(config, directory, notifier, jwt)?;
    services
        .bootstrap(config)
        .await
        .context("failed to create the bootstrap administrator")?;
    Ok(services)
}
