use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use usersvc_core::DomainError;
use usersvc_infra::AccountError;

pub fn account_error_to_response(err: AccountError) -> axum::response::Response {
    match err {
        AccountError::Domain(e) => domain_error_to_response(e),
        other => {
            tracing::error!(error = %other, "request failed with a system error");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let (status, code) = match &err {
        DomainError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        DomainError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
        DomainError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
    };
    json_error(status, code, err.message())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
