//! Secretary: the tenant tag that partitions non-admin users.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DomainError;

/// Name of a secretary (tenant). Trimmed, never empty.
///
/// Comparison is exact after trimming; two secretaries that differ only in
/// case are distinct tenants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Secretary(String);

impl Secretary {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DomainError::bad_request("secretary must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Secretary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Secretary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Secretary::parse(raw).map_err(|e| serde::de::Error::custom(e.message().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        let s = Secretary::parse("  Saude ").unwrap();
        assert_eq!(s.as_str(), "Saude");
    }

    #[test]
    fn blank_is_rejected() {
        assert!(matches!(Secretary::parse("   "), Err(DomainError::BadRequest(_))));
    }

    #[test]
    fn deserialize_goes_through_parse() {
        let s: Secretary = serde_json::from_str("\" Educacao\"").unwrap();
        assert_eq!(s.as_str(), "Educacao");
        assert!(serde_json::from_str::<Secretary>("\"\"").is_err());
    }
}
