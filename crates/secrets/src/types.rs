//! Secret payload types
//!
//! - [`SecureSecret`]: a single secret value that zeroes itself on drop
//! - [`SecretFields`]: the field map stored under one secret path
//! - [`VersionId`]: the version number the store assigns to each write

use secrecy::zeroize::Zeroize;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A secret value with automatic memory zeroing on drop.
///
/// This type wraps `secrecy::SecretString` to ensure:
/// - Secret values are zeroed from memory when dropped
/// - Debug output shows `[REDACTED]` instead of the actual value
/// - Explicit `.expose()` call required to access the value
#[derive(Clone)]
pub struct SecureSecret {
    inner: SecretString,
}

impl SecureSecret {
    /// Create a new secure secret from a string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: SecretString::from(value.into()),
        }
    }

    /// Expose the secret value for use.
    ///
    /// The caller must ensure the exposed value is not logged or persisted.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }

    /// Get the length of the secret value without exposing it.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Check if the secret value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for SecureSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl std::fmt::Display for SecureSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Field map stored under a single secret path.
///
/// Values are opaque strings; no schema is applied to them. Field names are
/// kept in sorted order so serialized payloads are deterministic. Values are
/// zeroed when the map is dropped and never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretFields {
    fields: BTreeMap<String, String>,
}

impl SecretFields {
    /// Create an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a field map holding a single field.
    #[must_use]
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut fields = Self::new();
        fields.insert(name, value);
        fields
    }

    /// Insert or replace a field, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if let Some(mut previous) = self.fields.insert(name.into(), value.into()) {
            previous.zeroize();
        }
    }

    /// Get a field value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Get a field value wrapped as a [`SecureSecret`].
    #[must_use]
    pub fn secret(&self, name: &str) -> Option<SecureSecret> {
        self.fields.get(name).map(SecureSecret::new)
    }

    /// Check if the map contains a field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the map has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over field names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs in sorted order.
    ///
    /// This exposes every value; do not log the output.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for SecretFields {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Drop for SecretFields {
    fn drop(&mut self) {
        for value in self.fields.values_mut() {
            value.zeroize();
        }
    }
}

impl std::fmt::Debug for SecretFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretFields")
            .field("names", &self.fields.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Version number assigned by the store to a write.
///
/// Versions start at 1 and increase with every write to the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(u64);

impl VersionId {
    /// Wrap a raw store version number.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// The raw version number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for VersionId {
    fn from(version: u64) -> Self {
        Self(version)
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_secret_debug_is_redacted() {
        let secret = SecureSecret::new("my-super-secret-password");
        let debug_output = format!("{secret:?}");
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("password"));
    }

    #[test]
    fn secure_secret_display_is_redacted() {
        let secret = SecureSecret::new("my-super-secret-password");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn secure_secret_expose_returns_value() {
        let secret = SecureSecret::new("test-value");
        assert_eq!(secret.expose(), "test-value");
        assert_eq!(secret.len(), 10);
        assert!(!secret.is_empty());
    }

    #[test]
    fn fields_debug_hides_values() {
        let fields = SecretFields::single("key", "enc123");
        let debug = format!("{fields:?}");
        assert!(debug.contains("key"));
        assert!(!debug.contains("enc123"));
    }

    #[test]
    fn fields_insert_replaces_value() {
        let mut fields = SecretFields::single("value", "old");
        fields.insert("value", "new");
        assert_eq!(fields.get("value"), Some("new"));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn fields_collect_from_pairs() {
        let fields: SecretFields = vec![("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(fields, SecretFields::from([("a", "1"), ("b", "2")]));
    }

    #[test]
    fn fields_serialize_as_plain_map() {
        let fields = SecretFields::new().with("user", "app").with("password", "pw");
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"password":"pw","user":"app"}"#);

        let parsed: SecretFields = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, fields);
    }

    #[test]
    fn fields_secret_wraps_value() {
        let fields = SecretFields::single("value", "s3cr3t");
        assert_eq!(fields.secret("value").unwrap().expose(), "s3cr3t");
        assert!(fields.secret("missing").is_none());
    }

    #[test]
    fn version_id_display_and_order() {
        assert_eq!(VersionId::new(1).to_string(), "v1");
        assert!(VersionId::new(2) > VersionId::from(1));
        assert_eq!(VersionId::new(7).get(), 7);
    }
}
