//! Account lifecycle: create, activate, update, inactivate, soft delete.
//!
//! Every operation loads what it needs, runs the pure rules from
//! `usersvc_auth`, then writes through the directory. bcrypt work runs on the
//! blocking pool.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use usersvc_auth::{
    CredentialVerifier, INVALID_ACTIVATION, NewUser, Principal, Role, User, UserDraft, UserPatch, authorize_create,
    authorize_delete, authorize_inactivate, authorize_update, check_access, check_activation, check_password,
    gestor_count_needed, issue_activation, last_gestor_guard, reject_identity_change, visibility,
};
use usersvc_core::{Cpf, DomainError, UserId};

use crate::config::BootstrapAdmin;
use crate::directory::{Page, PageRequest, StoreError, UserDirectory};
use crate::error::AccountError;
use crate::notifier::{ActivationMessage, ActivationNotifier};

pub struct AccountService {
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn ActivationNotifier>,
    verifier: Arc<CredentialVerifier>,
}

/// Emails are compared case-insensitively by storing them lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AccountService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn ActivationNotifier>,
        verifier: CredentialVerifier,
    ) -> Self {
        Self {
            directory,
            notifier,
            verifier: Arc::new(verifier),
        }
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    async fn load(&self, id: UserId) -> Result<User, AccountError> {
        self.directory
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user {id} not found")).into())
    }

    async fn hash_blocking(&self, plaintext: String) -> Result<String, AccountError> {
        let verifier = Arc::clone(&self.verifier);
        tokio::task::spawn_blocking(move || verifier.hash(&plaintext))
            .await
            .map_err(|e| AccountError::Task(e.to_string()))?
            .map_err(AccountError::from)
    }

    async fn verify_blocking(&self, plaintext: String, stored: Option<String>) -> Result<bool, AccountError> {
        let verifier = Arc::clone(&self.verifier);
        tokio::task::spawn_blocking(move || verifier.verify(&plaintext, stored.as_deref()))
            .await
            .map_err(|e| AccountError::Task(e.to_string()))?
            .map_err(AccountError::from)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an account in `PENDING_PASSWORD` and send its activation link.
    ///
    /// A failed delivery is logged; the account stays created.
    #[instrument(skip_all, fields(actor_id = %actor.id))]
    pub async fn create_pending(&self, actor: &Principal, mut request: NewUser) -> Result<User, AccountError> {
        request.email = normalize_email(&request.email);
        let draft = authorize_create(actor, request)?;

        let now = Utc::now();
        let ticket = issue_activation(now);
        let (token, expires_at) = (ticket.token.clone(), ticket.expires_at);
        let user = self.directory.insert(User::pending(draft, ticket, now)).await?;

        info!(
            user_id = %user.id,
            role = %user.role,
            secretary = user.secretary.as_ref().map(|s| s.as_str()),
            "user created"
        );

        let message = ActivationMessage::for_user(&user, &token, expires_at);
        if let Err(e) = self.notifier.send_activation(message).await {
            warn!(user_id = %user.id, error = %e, "activation link delivery failed");
        }
        Ok(user)
    }

    /// Consume an activation token and set the first password.
    #[instrument(skip_all)]
    pub async fn activate(&self, token: &str, password: &str) -> Result<User, AccountError> {
        let now = Utc::now();
        let found = self.directory.find_by_activation_token(token).await?;
        let mut user = check_activation(found, now)?;
        let seen = user.updated_at;

        check_password(password, &user.name, &user.email).map_err(DomainError::from)?;

        let hash = self.hash_blocking(password.to_string()).await?;
        user.activate(hash, now)?;
        let user = match self.directory.update(user, seen).await {
            Ok(user) => user,
            // Another request consumed the token first.
            Err(StoreError::Stale(_)) => return Err(DomainError::unauthorized(INVALID_ACTIVATION).into()),
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, "account activated");
        Ok(user)
    }

    #[instrument(skip_all, fields(actor_id = %actor.id, user_id = %id))]
    pub async fn inactivate(&self, actor: &Principal, id: UserId) -> Result<User, AccountError> {
        let mut target = self.load(id).await?;
        authorize_inactivate(actor, &target)?;

        let seen = target.updated_at;
        target.inactivate(actor.id, Utc::now());
        let user = self.directory.update(target, seen).await?;

        info!(role = %user.role, "user inactivated");
        Ok(user)
    }

    /// Soft delete: the record stays, marked `INACTIVE` with audit fields.
    #[instrument(skip_all, fields(actor_id = %actor.id, user_id = %id))]
    pub async fn remove(&self, actor: &Principal, id: UserId) -> Result<User, AccountError> {
        let mut target = self.load(id).await?;
        authorize_delete(actor, &target)?;

        let seen = target.updated_at;
        target.inactivate(actor.id, Utc::now());
        let user = self.directory.update(target, seen).await?;

        info!(role = %user.role, "user deleted");
        Ok(user)
    }

    #[instrument(skip_all, fields(actor_id = %actor.id, user_id = %id))]
    pub async fn update(&self, actor: &Principal, id: UserId, mut patch: UserPatch) -> Result<User, AccountError> {
        patch.email = patch.email.as_deref().map(normalize_email);
        reject_identity_change(&patch)?;

        let mut target = self.load(id).await?;

        let email_taken = match &patch.email {
            Some(email) if *email != target.email => self
                .directory
                .find_by_email(email)
                .await?
                .is_some_and(|other| other.id != target.id),
            _ => false,
        };
        authorize_update(actor, &target, &patch, email_taken)?;

        if let Some(secretary) = gestor_count_needed(&target, &patch) {
            let active = self.directory.count_active_gestors(secretary).await?;
            last_gestor_guard(&target, &patch, active)?;
        }

        let role_change = patch.role.filter(|r| *r != target.role);
        let seen = target.updated_at;
        target.apply(patch, Utc::now());
        let user = self.directory.update(target, seen).await?;

        info!(
            role = %user.role,
            role_changed = role_change.is_some(),
            secretary = user.secretary.as_ref().map(|s| s.as_str()),
            "user updated"
        );
        Ok(user)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn find_one(&self, actor: &Principal, id: UserId) -> Result<User, AccountError> {
        let user = self.load(id).await?;
        check_access(actor, &user)?;
        Ok(user)
    }

    pub async fn list(&self, actor: &Principal, page: PageRequest) -> Result<Page<User>, AccountError> {
        Ok(self.directory.list(&visibility(actor), page).await?)
    }

    /// Live record of an `ACTIVE` user, if there is one.
    pub async fn find_active(&self, id: UserId) -> Result<Option<User>, AccountError> {
        Ok(self.directory.find_by_id(id).await?.filter(User::is_active))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    /// Check email and password.
    ///
    /// Unknown email and wrong password fail identically and take the same
    /// time. A correct password on a non-active account is also `Unauthorized`.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let email = normalize_email(email);
        let found = self.directory.find_by_email(&email).await?;
        let stored = found.as_ref().and_then(|u| u.password.clone());
        let matches = self.verify_blocking(password.to_string(), stored).await?;

        let Some(user) = found.filter(|_| matches) else {
            return Err(DomainError::unauthorized("invalid credentials").into());
        };
        if !user.is_active() {
            return Err(DomainError::unauthorized("account is inactive or pending activation").into());
        }
        Ok(user)
    }

    /// Create the configured administrator unless its email is registered.
    ///
    /// Returns the created user, or `None` when nothing was done.
    #[instrument(skip_all, fields(email = %admin.email))]
    pub async fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> Result<Option<User>, AccountError> {
        let email = normalize_email(&admin.email);
        if self.directory.find_by_email(&email).await?.is_some() {
            info!("bootstrap administrator already present");
            return Ok(None);
        }

        let draft = UserDraft {
            name: admin.name.clone(),
            email: email.clone(),
            cpf: Cpf::parse(&admin.cpf)?,
            phone: String::new(),
            role: Role::Admin,
            secretary: None,
        };
        let hash = self.hash_blocking(admin.password.clone()).await?;

        match self.directory.insert(User::active(draft, hash, Utc::now())).await {
            Ok(user) => {
                info!(user_id = %user.id, "bootstrap administrator created");
                Ok(Some(user))
            }
            Err(StoreError::UniqueViolation(field)) => {
                // Another instance may have won the race on the same email.
                if self.directory.find_by_email(&email).await?.is_some() {
                    return Ok(None);
                }
                Err(StoreError::UniqueViolation(field).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
