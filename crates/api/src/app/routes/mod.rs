use axum::Router;

pub mod auth;
pub mod internal;
pub mod system;
pub mod users;

/// Every endpoint the service exposes, before the gatekeeper is layered on.
pub fn router() -> Router {
    Router::new()
        .merge(system::router())
        .merge(auth::router())
        .merge(internal::router())
        .merge(users::router())
}
