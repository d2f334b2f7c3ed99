//! Profile identity types.
//!
//! A profile is identified by an opaque string id supplied by the
//! persistence collaborator. The orchestrator never interprets the id
//! beyond non-emptiness; filesystem safety is handled by the sandbox.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque profile identifier.
///
/// Newly created profiles get a UUIDv4 id; imported profiles keep
/// whatever id their source assigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    /// Generate a fresh random profile id.
    pub fn generate() -> Self {
        ProfileId(uuid::Uuid::new_v4().to_string())
    }

    /// Whether the id is usable (non-empty after trimming).
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(s: &str) -> Self {
        ProfileId(s.to_string())
    }
}

impl From<String> for ProfileId {
    fn from(s: String) -> Self {
        ProfileId(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_valid() {
        let a = ProfileId::generate();
        let b = ProfileId::generate();
        assert_ne!(a, b);
        assert!(a.is_valid());
    }

    #[test]
    fn blank_id_is_invalid() {
        assert!(!ProfileId::from("").is_valid());
        assert!(!ProfileId::from("   ").is_valid());
        assert!(ProfileId::from("alpha").is_valid());
    }

    #[test]
    fn serde_transparent() {
        let id = ProfileId::from("alpha");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"alpha\"");
        let back: ProfileId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
