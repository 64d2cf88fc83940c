use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};

use usersvc_core::UserId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/:id", get(get_user).patch(update_user).delete(delete_user))
        .route("/users/:id/inactivate", patch(inactivate_user))
}

fn parse_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateUserRequest>,
) -> axum::response::Response {
    match services
        .accounts
        .create_pending(principal.principal(), body.into())
        .await
    {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ListQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text());
        }
    };

    match services.accounts.list(principal.principal(), query.into()).await {
        Ok(page) => Json(dto::UserPageResponse::from(page)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.accounts.find_one(principal.principal(), id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateUserRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .accounts
        .update(principal.principal(), id, body.into())
        .await
    {
        Ok(user) => Json(user).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

/// Soft delete: the record stays, inactivated and stamped with the actor.
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.accounts.remove(principal.principal(), id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn inactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.accounts.inactivate(principal.principal(), id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}
