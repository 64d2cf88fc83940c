use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/activate", post(activate))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    match services.authn.login(&body.email, &body.password).await {
        Ok(token) => Json(token).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn activate(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ActivateRequest>,
) -> axum::response::Response {
    match services.accounts.activate(&body.token, &body.password).await {
        Ok(_) => Json(dto::MessageResponse {
            message: "account activated; you can now log in",
        })
        .into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}
