//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: directory, notifier and token strategy selection
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and their shape checks
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tokio::sync::OnceCell;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use usersvc_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router over ready services.
///
/// The gatekeeper is a route layer, so it only runs for matched routes and
/// sees the route template through `MatchedPath`.
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        authn: Arc::clone(&services.authn),
    };

    routes::router()
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::gatekeeper,
        ))
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Process-wide application: configuration plus a router built on first use.
///
/// Serverless hosts call [`Application::router`] per invocation; only the
/// first call connects to storage and wires services.
pub struct Application {
    config: AppConfig,
    router: OnceCell<Router>,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            router: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn router(&self) -> anyhow::Result<Router> {
        let router = self
            .router
            .get_or_try_init(|| async move {
                let services = services::build_services(&self.config).await?;
                Ok::<_, anyhow::Error>(build_app(Arc::new(services)))
            })
            .await?;
        Ok(router.clone())
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn serve(&self) -> anyhow::Result<()> {
        let app = self.router().await?;

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            service = usersvc_observability::SERVICE_NAME,
            "listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown requested");
            })
            .await?;
        Ok(())
    }
}
