use anyhow::Context;

use usersvc_api::app::Application;
use usersvc_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    usersvc_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        token_validation = ?config.token_validation,
        persistent = config.database_url.is_some(),
        "configuration loaded"
    );

    Application::new(config).serve().await
}
