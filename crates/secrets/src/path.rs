//! Secret collections and store path construction

use crate::SecretError;
use serde::{Deserialize, Serialize};

/// Category a secret belongs to.
///
/// Each collection owns a distinct top-level path segment, so the same id in
/// two collections never addresses the same store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Per-user key material, stored under `user_keys/`
    UserKeys,
    /// System-wide secrets, stored under `system_secrets/`
    System,
}

impl Collection {
    /// Path segment all secrets of this collection live under.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::UserKeys => "user_keys",
            Self::System => "system_secrets",
        }
    }

    /// Stable identifier used in logs and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserKeys => "user_keys",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store path of a secret, derived from `(collection, id)`.
///
/// The path is relative to the store's mount; a store integration may nest it
/// under an operator-chosen prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretPath {
    collection: Collection,
    id: String,
    path: String,
}

impl SecretPath {
    /// Build the path for `id` in `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidRequest`] if `id` is empty.
    pub fn new(collection: Collection, id: impl Into<String>) -> Result<Self, SecretError> {
        let id = id.into();
        if id.is_empty() {
            return Err(SecretError::InvalidRequest {
                reason: format!("secret id in collection '{collection}' must not be empty"),
            });
        }

        let path = format!("{}/{id}", collection.path_segment());
        Ok(Self {
            collection,
            id,
            path,
        })
    }

    /// Collection this path belongs to.
    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Secret id within the collection.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Full relative path, e.g. `user_keys/u1`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Display for SecretPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_keys_path() {
        let path = SecretPath::new(Collection::UserKeys, "u1").unwrap();
        assert_eq!(path.as_str(), "user_keys/u1");
        assert_eq!(path.id(), "u1");
        assert_eq!(path.collection(), Collection::UserKeys);
    }

    #[test]
    fn test_system_path() {
        let path = SecretPath::new(Collection::System, "db_password").unwrap();
        assert_eq!(path.to_string(), "system_secrets/db_password");
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = SecretPath::new(Collection::System, "").unwrap_err();
        assert!(matches!(err, SecretError::InvalidRequest { .. }));
    }

    #[test]
    fn test_collections_do_not_collide() {
        let ids = ["a", "a/b", "system_secrets/a", "user_keys", "..", " "];
        let mut seen = std::collections::HashSet::new();
        for collection in [Collection::UserKeys, Collection::System] {
            for id in ids {
                let path = SecretPath::new(collection, id).unwrap();
                assert!(seen.insert(path.as_str().to_string()), "collision on {path}");
            }
        }
    }

    #[test]
    fn test_collection_serde_snake_case() {
        let json = serde_json::to_string(&Collection::UserKeys).unwrap();
        assert_eq!(json, "\"user_keys\"");
        let parsed: Collection = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(parsed, Collection::System);
    }
}
