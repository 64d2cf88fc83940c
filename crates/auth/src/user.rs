//! User record and its lifecycle transitions.
//!
//! Transitions are pure: they take the clock as an argument and never touch
//! storage. Authorization happens before any of them is called.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use usersvc_core::{Cpf, DomainError, Secretary, UserId};

use crate::Role;
use crate::activation::{ActivationTicket, INVALID_ACTIVATION};

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

/// Account lifecycle state.
///
/// `PendingPassword -> Active -> Inactive`; `Inactive` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// Created, waiting for the owner to set a password through activation.
    PendingPassword,
    /// Can authenticate.
    Active,
    /// Inactivated or soft-deleted. Cannot authenticate.
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::PendingPassword => "PENDING_PASSWORD",
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
        }
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for UserStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PASSWORD" => Ok(UserStatus::PendingPassword),
            "ACTIVE" => Ok(UserStatus::Active),
            "INACTIVE" => Ok(UserStatus::Inactive),
            other => Err(DomainError::bad_request(format!("unknown status '{other}'"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A user record.
///
/// # Invariants
/// - `status == Active` implies `password` is set.
/// - `activation_token` and `token_expires_at` are set only while
///   `status == PendingPassword`.
/// - `role != Admin` implies `secretary` is set.
///
/// Secrets are never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub cpf: Cpf,
    pub phone: String,
    pub role: Role,
    pub secretary: Option<Secretary>,
    pub status: UserStatus,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing)]
    pub activation_token: Option<String>,
    #[serde(skip_serializing)]
    pub token_expires_at: Option<DateTime<Utc>>,
    pub inactivated_at: Option<DateTime<Utc>>,
    pub inactivated_by_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A create request as received, before any rule has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub cpf: String,
    pub phone: String,
    pub role: Role,
    pub secretary: Option<Secretary>,
}

/// Input for a new account that passed the create rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub cpf: Cpf,
    pub phone: String,
    pub role: Role,
    pub secretary: Option<Secretary>,
}

/// Changes requested on an existing account. `None` means "leave as is".
///
/// `name` and `cpf` are carried only so the caller can reject them; they are
/// immutable after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub secretary: Option<Secretary>,
}

impl UserPatch {
    pub fn touches_identity(&self) -> bool {
        self.name.is_some() || self.cpf.is_some()
    }

    /// Role the target ends up with once applied.
    pub fn resulting_role(&self, target: &User) -> Role {
        self.role.unwrap_or(target.role)
    }

    /// Secretary the target ends up with once applied.
    pub fn resulting_secretary<'a>(&'a self, target: &'a User) -> Option<&'a Secretary> {
        self.secretary.as_ref().or(target.secretary.as_ref())
    }
}

impl User {
    /// A fresh account waiting for activation.
    pub fn pending(draft: UserDraft, ticket: ActivationTicket, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            name: draft.name,
            email: draft.email,
            cpf: draft.cpf,
            phone: draft.phone,
            role: draft.role,
            secretary: draft.secretary,
            status: UserStatus::PendingPassword,
            password: None,
            activation_token: Some(ticket.token),
            token_expires_at: Some(ticket.expires_at),
            inactivated_at: None,
            inactivated_by_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// An account created directly in the active state (bootstrap admin).
    pub fn active(draft: UserDraft, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            name: draft.name,
            email: draft.email,
            cpf: draft.cpf,
            phone: draft.phone,
            role: draft.role,
            secretary: draft.secretary,
            status: UserStatus::Active,
            password: Some(password_hash),
            activation_token: None,
            token_expires_at: None,
            inactivated_at: None,
            inactivated_by_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// First whitespace-separated token of the name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance `updated_at`, strictly.
    ///
    /// The directory uses it as the write guard, so two writes never share a
    /// stamp even when the clock has not moved.
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.updated_at + Duration::microseconds(1));
    }

    /// Set the password and consume the activation token.
    pub fn activate(&mut self, password_hash: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != UserStatus::PendingPassword {
            return Err(DomainError::unauthorized(INVALID_ACTIVATION));
        }
        self.password = Some(password_hash);
        self.status = UserStatus::Active;
        self.activation_token = None;
        self.token_expires_at = None;
        self.touch(now);
        Ok(())
    }

    /// Move to `Inactive`, stamping the audit fields.
    ///
    /// Already inactive accounts keep their first stamp.
    pub fn inactivate(&mut self, by: UserId, now: DateTime<Utc>) {
        if self.status == UserStatus::Inactive {
            return;
        }
        self.status = UserStatus::Inactive;
        self.activation_token = None;
        self.token_expires_at = None;
        self.inactivated_at = Some(now);
        self.inactivated_by_id = Some(by);
        self.touch(now);
    }

    /// Apply an already authorized patch.
    pub fn apply(&mut self, patch: UserPatch, now: DateTime<Utc>) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(secretary) = patch.secretary {
            self.secretary = Some(secretary);
        }
        self.touch(now);
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::activation::issue_activation;

    #[test]
    fn pending_user_holds_ticket_and_no_password() {
        let now = Utc::now();
        let user = User::pending(draft("Ana", "ana@example.com", Role::Operador, Some("Saude")), issue_activation(now), now);

        assert_eq!(user.status, UserStatus::PendingPassword);
        assert!(user.password.is_none());
        assert!(user.activation_token.is_some());
        assert_eq!(user.token_expires_at, Some(now + chrono::Duration::hours(24)));
    }

    #[test]
    fn activation_clears_ticket() {
        let now = Utc::now();
        let mut user = User::pending(draft("Ana", "ana@example.com", Role::Operador, Some("Saude")), issue_activation(now), now);
        user.activate("hash".to_string(), now).unwrap();

        assert!(user.is_active());
        assert_eq!(user.password.as_deref(), Some("hash"));
        assert!(user.activation_token.is_none());
        assert!(user.token_expires_at.is_none());
    }

    #[test]
    fn every_transition_advances_the_write_stamp() {
        let mut user = active_user(Role::Operador, Some("Saude"));
        let before = user.updated_at;

        // Same clock reading as the last write.
        user.apply(UserPatch::default(), before);
        assert!(user.updated_at > before);

        let patched = user.updated_at;
        user.inactivate(UserId::new(), patched - chrono::Duration::seconds(5));
        assert!(user.updated_at > patched);
    }

    #[test]
    fn active_user_cannot_activate_twice() {
        let mut user = active_user(Role::Operador, Some("Saude"));
        assert!(matches!(user.activate("other".to_string(), Utc::now()), Err(DomainError::Unauthorized(_))));
    }

    #[test]
    fn inactivation_stamps_audit_fields_once() {
        let mut user = active_user(Role::Gestor, Some("Saude"));
        let admin = UserId::new();
        let first = Utc::now();
        user.inactivate(admin, first);
        user.inactivate(UserId::new(), first + chrono::Duration::minutes(5));

        assert_eq!(user.status, UserStatus::Inactive);
        assert_eq!(user.inactivated_by_id, Some(admin));
        assert_eq!(user.inactivated_at, Some(first));
    }

    #[test]
    fn serialization_hides_secrets() {
        let now = Utc::now();
        let user = User::pending(draft("Ana", "ana@example.com", Role::Operador, Some("Saude")), issue_activation(now), now);
        let json = serde_json::to_value(&user).unwrap();

        assert!(json.get("password").is_none());
        assert!(json.get("activationToken").is_none());
        assert!(json.get("tokenExpiresAt").is_none());
        assert_eq!(json["status"], "PENDING_PASSWORD");
        assert_eq!(json["cpf"], "52998224725");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn first_name_is_first_token() {
        let user = active_user(Role::Operador, Some("Saude"));
        assert_eq!(user.first_name(), "Maria");
    }
}
