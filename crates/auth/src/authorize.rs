//! Authorization rules for user records.
//!
//! Every function here is a pure predicate over the acting [`Principal`] and
//! the records involved:
//!
//! - No IO
//! - No panics
//! - Facts that need the store (email taken, active gestor count) are passed in

use usersvc_core::{Cpf, DomainError, Secretary};

use crate::{NewUser, Principal, Role, User, UserDraft, UserPatch, UserStatus};

/// Which records a principal may list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityScope {
    /// Every record.
    All,
    /// Non-admin records of one secretary.
    Secretary(Secretary),
    /// No records (non-admin without a secretary).
    Nothing,
}

impl VisibilityScope {
    pub fn admits(&self, user: &User) -> bool {
        match self {
            VisibilityScope::All => true,
            VisibilityScope::Secretary(s) => !user.role.is_admin() && user.secretary.as_ref() == Some(s),
            VisibilityScope::Nothing => false,
        }
    }
}

pub fn visibility(actor: &Principal) -> VisibilityScope {
    if actor.is_admin() {
        return VisibilityScope::All;
    }
    match &actor.secretary {
        Some(s) => VisibilityScope::Secretary(s.clone()),
        None => VisibilityScope::Nothing,
    }
}

/// Single-record access: may `actor` see or touch `target` at all?
///
/// The caller maps a missing record to `NotFound` before getting here.
pub fn check_access(actor: &Principal, target: &User) -> Result<(), DomainError> {
    if actor.is_admin() {
        return Ok(());
    }
    if target.role.is_admin() {
        return Err(DomainError::forbidden("only administrators can access administrator accounts"));
    }
    match &actor.secretary {
        Some(own) if target.secretary.as_ref() == Some(own) => Ok(()),
        _ => Err(DomainError::forbidden("user belongs to another secretary")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Create
// ─────────────────────────────────────────────────────────────────────────────

/// Check a create request and turn it into a draft.
///
/// Rules, first failure wins:
/// 1. actor is ADMIN or GESTOR
/// 2. cpf check digits
/// 3. GESTOR cannot create ADMIN
/// 4. GESTOR creates only in its own secretary
/// 5. non-ADMIN target needs a secretary
///
/// Uniqueness is left to the store.
pub fn authorize_create(actor: &Principal, request: NewUser) -> Result<UserDraft, DomainError> {
    if actor.role < Role::Gestor {
        return Err(DomainError::forbidden("only administrators and managers can create users"));
    }

    let cpf = Cpf::parse(&request.cpf)?;

    if !actor.is_admin() {
        if request.role.is_admin() {
            return Err(DomainError::forbidden("managers cannot create administrators"));
        }
        if request.secretary != actor.secretary {
            return Err(DomainError::forbidden("you can only create users for your own secretary"));
        }
    }

    if !request.role.is_admin() && request.secretary.is_none() {
        return Err(DomainError::bad_request("managers and operators must belong to a secretary"));
    }

    Ok(UserDraft {
        name: request.name,
        email: request.email,
        cpf,
        phone: request.phone,
        role: request.role,
        secretary: request.secretary,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Update
// ─────────────────────────────────────────────────────────────────────────────

/// Check a patch against the target record.
///
/// Rules, first failure wins:
/// 1. name and cpf are immutable
/// 2. single-record access
/// 3. new email must be free (`email_taken` comes from the store)
/// 4. non-ADMIN cannot grant a role above its own
/// 5. non-ADMIN cannot move the target to another secretary
/// 6. a non-ADMIN result needs a secretary
///
/// The last-gestor guard runs separately; see [`last_gestor_guard`].
pub fn authorize_update(
    actor: &Principal,
    target: &User,
    patch: &UserPatch,
    email_taken: bool,
) -> Result<(), DomainError> {
    reject_identity_change(patch)?;

    check_access(actor, target)?;

    if email_taken {
        return Err(DomainError::conflict("e-mail already registered"));
    }

    if !actor.is_admin() {
        if let Some(role) = patch.role {
            if role > actor.role {
                return Err(DomainError::forbidden("you cannot grant a role above your own"));
            }
        }
        if let Some(secretary) = &patch.secretary {
            if target.secretary.as_ref() != Some(secretary) {
                return Err(DomainError::forbidden("only administrators can change a user's secretary"));
            }
        }
    }

    if !patch.resulting_role(target).is_admin() && patch.resulting_secretary(target).is_none() {
        return Err(DomainError::bad_request("managers and operators must belong to a secretary"));
    }

    Ok(())
}

/// Name and cpf never change after creation.
///
/// Needs no record, so callers can run it before loading the target.
pub fn reject_identity_change(patch: &UserPatch) -> Result<(), DomainError> {
    if patch.touches_identity() {
        return Err(DomainError::bad_request("name and CPF cannot be changed"));
    }
    Ok(())
}

/// Secretary whose active gestors must be counted before applying `patch`.
///
/// `Some` when the target is an active GESTOR that the patch demotes or moves
/// out of its secretary.
pub fn gestor_count_needed<'a>(target: &'a User, patch: &UserPatch) -> Option<&'a Secretary> {
    if target.role != Role::Gestor || target.status != UserStatus::Active {
        return None;
    }
    let secretary = target.secretary.as_ref()?;
    let demoted = patch.resulting_role(target) != Role::Gestor;
    let moved = patch.secretary.as_ref().is_some_and(|s| s != secretary);
    (demoted || moved).then_some(secretary)
}

/// A secretary with active gestors keeps at least one.
///
/// `active_gestors` is the count for the secretary returned by
/// [`gestor_count_needed`], target included.
pub fn last_gestor_guard(target: &User, patch: &UserPatch, active_gestors: u64) -> Result<(), DomainError> {
    if gestor_count_needed(target, patch).is_some() && active_gestors <= 1 {
        return Err(DomainError::forbidden("a secretary must keep at least one active manager"));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Inactivate / delete
// ─────────────────────────────────────────────────────────────────────────────

pub fn authorize_inactivate(actor: &Principal, target: &User) -> Result<(), DomainError> {
    check_access(actor, target)?;
    if actor.role < Role::Gestor {
        return Err(DomainError::forbidden("only administrators and managers can inactivate users"));
    }
    if actor.id == target.id {
        return Err(DomainError::forbidden("you cannot inactivate your own account"));
    }
    Ok(())
}

/// Soft delete: ADMIN only, never oneself.
pub fn authorize_delete(actor: &Principal, target: &User) -> Result<(), DomainError> {
    if !actor.is_admin() {
        return Err(DomainError::forbidden("only administrators can delete users"));
    }
    if actor.id == target.id {
        return Err(DomainError::forbidden("you cannot delete your own account"));
    }
    Ok(())
}
