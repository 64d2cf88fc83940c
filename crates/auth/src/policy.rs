//! Password strength policy applied when an account is activated.

use thiserror::Error;

use usersvc_core::DomainError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Common passwords, compared case-insensitively.
const DENYLIST: &[&str] = &[
    "12345",
    "123456",
    "senha123",
    "admin",
    "admin123",
    "password",
    "password1",
    "qwerty123",
    "trocar123",
    "mudar123",
];

/// The first rule a password breaks. Checked in declaration order.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PasswordViolation {
    #[error("password must be at least 8 characters long")]
    TooShort,

    #[error("password is too common")]
    Common,

    #[error("password must contain at least one digit")]
    MissingDigit,

    #[error("password cannot be only digits")]
    OnlyDigits,

    #[error("password must contain at least one letter")]
    MissingLetter,

    #[error("password cannot contain parts of your name or e-mail")]
    ContainsPersonalData,
}

impl From<PasswordViolation> for DomainError {
    fn from(v: PasswordViolation) -> Self {
        DomainError::bad_request(v.to_string())
    }
}

/// Check `password` for the owner identified by `name` and `email`.
///
/// Deterministic: the same bad password always reports the same violation.
pub fn check_password(password: &str, name: &str, email: &str) -> Result<(), PasswordViolation> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordViolation::TooShort);
    }

    let lower = password.to_lowercase();
    if DENYLIST.contains(&lower.as_str()) {
        return Err(PasswordViolation::Common);
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordViolation::MissingDigit);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(PasswordViolation::OnlyDigits);
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err(PasswordViolation::MissingLetter);
    }

    let first_name = name.split_whitespace().next().unwrap_or("").to_lowercase();
    let local_part = email.split('@').next().unwrap_or("").to_lowercase();
    for part in [first_name, local_part] {
        if part.chars().count() > 2 && lower.contains(&part) {
            return Err(PasswordViolation::ContainsPersonalData);
        }
    }

    Ok(())
}
