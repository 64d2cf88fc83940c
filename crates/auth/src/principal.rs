use serde::{Deserialize, Serialize};

use usersvc_core::{Secretary, UserId};

use crate::{Role, User};

/// An authenticated caller, as seen by the authorization rules.
///
/// Built either from live user data (re-validated tokens) or straight from
/// token claims (embedded mode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub secretary: Option<Secretary>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            secretary: user.secretary.clone(),
        }
    }
}
