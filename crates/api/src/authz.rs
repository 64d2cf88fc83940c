//! API-side route access table.
//!
//! Every route the router serves has exactly one rule here. The gatekeeper
//! middleware looks the rule up by method and matched path, so a route that
//! was registered without a rule is refused instead of silently left open.

use axum::http::Method;
use serde::de::DeserializeOwned;

use usersvc_auth::Role;
use usersvc_core::DomainError;

use crate::app::dto::{
    ActivateRequest, CreateUserRequest, LoginRequest, UpdateUserRequest, ValidateCredentialsRequest, Validate,
};

/// Parses and checks a raw request body.
pub type BodyCheck = fn(&[u8]) -> Result<(), DomainError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Roles(&'static [Role]),
}

impl Access {
    /// Whether an authenticated caller with `role` may pass.
    pub fn admits(&self, role: Role) -> bool {
        match self {
            Access::Public | Access::Authenticated => true,
            Access::Roles(allowed) => allowed.contains(&role),
        }
    }
}

#[derive(Debug)]
pub struct RouteRule {
    pub method: Method,
    pub path: &'static str,
    pub access: Access,
    pub body: Option<BodyCheck>,
}

const MANAGERS: &[Role] = &[Role::Admin, Role::Gestor];
const ADMINS: &[Role] = &[Role::Admin];

fn json_body<T: DeserializeOwned + Validate>(bytes: &[u8]) -> Result<(), DomainError> {
    let body: T = serde_json::from_slice(bytes)
        .map_err(|e| DomainError::bad_request(format!("invalid request body: {e}")))?;
    body.validate()
}

static ROUTES: [RouteRule; 10] = [
    RouteRule {
        method: Method::GET,
        path: "/health",
        access: Access::Public,
        body: None,
    },
    RouteRule {
        method: Method::POST,
        path: "/auth/login",
        access: Access::Public,
        body: Some(json_body::<LoginRequest>),
    },
    RouteRule {
        method: Method::POST,
        path: "/auth/activate",
        access: Access::Public,
        body: Some(json_body::<ActivateRequest>),
    },
    RouteRule {
        method: Method::POST,
        path: "/internal/auth/validate",
        access: Access::Public,
        body: Some(json_body::<ValidateCredentialsRequest>),
    },
    RouteRule {
        method: Method::POST,
        path: "/users",
        access: Access::Roles(MANAGERS),
        body: Some(json_body::<CreateUserRequest>),
    },
    RouteRule {
        method: Method::GET,
        path: "/users",
        access: Access::Authenticated,
        body: None,
    },
    RouteRule {
        method: Method::GET,
        path: "/users/:id",
        access: Access::Authenticated,
        body: None,
    },
    RouteRule {
        method: Method::PATCH,
        path: "/users/:id",
        access: Access::Authenticated,
        body: Some(json_body::<UpdateUserRequest>),
    },
    RouteRule {
        method: Method::DELETE,
        path: "/users/:id",
        access: Access::Roles(ADMINS),
        body: None,
    },
    RouteRule {
        method: Method::PATCH,
        path: "/users/:id/inactivate",
        access: Access::Roles(MANAGERS),
        body: None,
    },
];

pub fn routes() -> &'static [RouteRule] {
    &ROUTES
}

/// Rule for a method and a matched route template (e.g. `/users/:id`).
pub fn rule_for(method: &Method, path: &str) -> Option<&'static RouteRule> {
    ROUTES.iter().find(|r| r.method == *method && r.path == path)
}
