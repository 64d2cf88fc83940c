use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Privilege tier of a user.
///
/// Variants are declared lowest first so the derived `Ord` gives
/// `Admin > Gestor > Operador`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Operador,
    Gestor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Gestor, Role::Operador];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Gestor => "GESTOR",
            Role::Operador => "OPERADOR",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Highest role recognised in a `scope` claim (`"GESTOR"`, `"ROLE_ADMIN"`, ...).
    pub fn highest_in<'a>(scope: impl IntoIterator<Item = &'a str>) -> Option<Role> {
        scope.into_iter().filter_map(|s| s.parse().ok()).max()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        match name {
            "ADMIN" => Ok(Role::Admin),
            "GESTOR" => Ok(Role::Gestor),
            "OPERADOR" => Ok(Role::Operador),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}
