use axum::{response::IntoResponse, routing::get, Json, Router};

use usersvc_observability::SERVICE_NAME;

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
    }))
}
