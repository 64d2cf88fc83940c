use usersvc_auth::{Principal, Role};
use usersvc_core::{Secretary, UserId};

/// Principal context for a request (authenticated identity + role).
///
/// Inserted by the gatekeeper for every route that is not public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn id(&self) -> UserId {
        self.principal.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn secretary(&self) -> Option<&Secretary> {
        self.principal.secretary.as_ref()
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
