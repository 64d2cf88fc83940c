use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use usersvc_auth::{NewUser, Role, User, UserPatch};
use usersvc_core::{DomainError, Secretary};
use usersvc_infra::{Page, PageRequest};

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\d{2}\) 9\d{4}-\d{4}$").expect("phone pattern compiles"));

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Shape checks that run before a handler sees the body.
pub trait Validate {
    fn validate(&self) -> Result<(), DomainError>;
}

fn require(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

fn check_email(value: &str) -> Result<(), DomainError> {
    if !EMAIL.is_match(value.trim()) {
        return Err(DomainError::bad_request("email is invalid"));
    }
    Ok(())
}

fn check_phone(value: &str) -> Result<(), DomainError> {
    if !PHONE.is_match(value) {
        return Err(DomainError::bad_request("phone must follow the format (XX) 9XXXX-XXXX"));
    }
    Ok(())
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), DomainError> {
        require("email", &self.email)?;
        require("password", &self.password)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateRequest {
    pub token: String,
    pub password: String,
}

impl Validate for ActivateRequest {
    fn validate(&self) -> Result<(), DomainError> {
        require("activation token", &self.token)?;
        if self.password.chars().count() < 6 {
            return Err(DomainError::bad_request("password must be at least 6 characters"));
        }
        Ok(())
    }
}

/// Body of the service-to-service credential check.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidateCredentialsRequest {
    pub email: String,
    pub password: String,
}

impl Validate for ValidateCredentialsRequest {
    fn validate(&self) -> Result<(), DomainError> {
        require("email", &self.email)?;
        require("password", &self.password)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub cpf: String,
    pub phone: String,
    pub role: Role,
    #[serde(default)]
    pub secretary: Option<Secretary>,
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), DomainError> {
        require("name", &self.name)?;
        require("email", &self.email)?;
        check_email(&self.email)?;
        require("cpf", &self.cpf)?;
        require("phone", &self.phone)?;
        check_phone(&self.phone)
    }
}

impl From<CreateUserRequest> for NewUser {
    fn from(req: CreateUserRequest) -> Self {
        NewUser {
            name: req.name.trim().to_string(),
            email: req.email,
            cpf: req.cpf,
            phone: req.phone,
            role: req.role,
            secretary: req.secretary,
        }
    }
}

/// Every field optional; present fields follow the create rules.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub secretary: Option<Secretary>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.name {
            require("name", name)?;
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        if let Some(cpf) = &self.cpf {
            require("cpf", cpf)?;
        }
        if let Some(phone) = &self.phone {
            check_phone(phone)?;
        }
        Ok(())
    }
}

impl From<UpdateUserRequest> for UserPatch {
    fn from(req: UpdateUserRequest) -> Self {
        UserPatch {
            name: req.name.map(|n| n.trim().to_string()),
            cpf: req.cpf,
            email: req.email,
            phone: req.phone,
            role: req.role,
            secretary: req.secretary,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<ListQuery> for PageRequest {
    fn from(q: ListQuery) -> Self {
        PageRequest::new(q.page, q.limit)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub last_page: u64,
}

#[derive(Debug, Serialize)]
pub struct UserPageResponse {
    pub data: Vec<User>,
    pub meta: PageMeta,
}

impl From<Page<User>> for UserPageResponse {
    fn from(page: Page<User>) -> Self {
        Self {
            meta: PageMeta {
                total: page.total,
                page: page.page,
                last_page: page.last_page,
            },
            data: page.data,
        }
    }
}
