use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

/// Endpoints called by sibling services, not by browsers.
pub fn router() -> Router {
    Router::new().route("/internal/auth/validate", post(validate_credentials))
}

/// Always answers 200 for credential problems; only system failures are errors.
pub async fn validate_credentials(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ValidateCredentialsRequest>,
) -> axum::response::Response {
    match services
        .authn
        .validate_credentials(&body.email, &body.password)
        .await
    {
        Ok(check) => Json(check).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}
