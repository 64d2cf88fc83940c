use std::sync::Arc;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use usersvc_infra::AuthenticationService;

use crate::app::errors;
use crate::authz::{self, Access};
use crate::context::PrincipalContext;

/// Request bodies for guarded routes are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AuthState {
    pub authn: Arc<AuthenticationService>,
}

/// Single guard in front of every route.
///
/// Looks up the route's rule, authenticates the bearer token unless the
/// route is public, checks the caller's role, then validates the body.
pub async fn gatekeeper(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let matched = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_owned());
    let Some(rule) = matched
        .as_deref()
        .and_then(|path| authz::rule_for(req.method(), path))
    else {
        tracing::error!(method = %req.method(), path = ?matched, "route has no access rule");
        return errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal server error",
        );
    };

    if rule.access != Access::Public {
        let token = match extract_bearer(req.headers()) {
            Ok(token) => token.to_owned(),
            Err(status) => return errors::json_error(status, "unauthorized", "missing or malformed bearer token"),
        };

        let principal = match state.authn.resolve_principal(&token).await {
            Ok(principal) => principal,
            Err(e) => return errors::account_error_to_response(e),
        };

        if !rule.access.admits(principal.role) {
            return errors::json_error(StatusCode::FORBIDDEN, "forbidden", "insufficient role for this route");
        }

        req.extensions_mut().insert(PrincipalContext::new(principal));
    }

    if let Some(check) = rule.body {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "bad_request", "request body could not be read");
            }
        };
        if let Err(e) = check(&bytes) {
            return errors::domain_error_to_response(e);
        }
        req = Request::from_parts(parts, Body::from(bytes));
    }

    next.run(req).await
}

pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
