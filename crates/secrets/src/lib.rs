//! Secret access for strongbox
//!
//! Provides a typed interface for storing and reading versioned secrets in a
//! remote KV store. The store is reached through the [`SecretBackend`] trait,
//! so the client never depends on a particular store's wire protocol.
//!
//! Secrets live in one of two [`Collection`]s:
//!
//! - [`Collection::UserKeys`] at `user_keys/{id}`
//! - [`Collection::System`] at `system_secrets/{id}`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use strongbox_secrets::{Collection, EnvironmentMirror, SecretClient, SecretFields};
//!
//! let mirror = Arc::new(EnvironmentMirror::new());
//! let client = SecretClient::connect(backend, mirror.clone()).await?;
//!
//! client
//!     .put(Collection::System, "db_password", SecretFields::single("value", "s3cr3t"), None)
//!     .await?;
//! let password = client.sync_to_environment("db_password", None).await?;
//! assert_eq!(mirror.get("db_password").unwrap().expose(), password.expose());
//! ```
//!
//! Store integrations live in separate crates:
//! - strongbox-vault: `VaultBackend` for HashiCorp Vault KV v2

mod client;
mod environment;
mod error;
mod memory;
mod path;
mod types;

pub use client::SecretClient;
pub use environment::{EnvironmentMirror, EnvironmentSink, ProcessEnvironment};
pub use error::{ErrorKind, SecretError, StoreError};
pub use memory::{Capability, MemoryBackend};
pub use path::{Collection, SecretPath};
pub use types::{SecretFields, SecureSecret, VersionId};

use async_trait::async_trait;
use std::sync::Arc;

/// Field holding the value of a system secret.
pub const SYSTEM_VALUE_FIELD: &str = "value";

/// Field holding the encrypted key of a user.
pub const USER_KEY_FIELD: &str = "key";

/// Versioned key/value store that secrets are persisted in.
///
/// Implementors translate their client library's errors into [`StoreError`];
/// [`SecretClient`] turns those into the caller-facing [`SecretError`].
///
/// Every method is a single round trip. Implementations must not retry and
/// must not swallow failures.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Get the backend name, used in logs.
    ///
    /// Examples: `"memory"`, `"vault"`
    fn backend_name(&self) -> &'static str;

    /// Check that the current session is accepted by the store.
    async fn validate_session(&self) -> Result<(), StoreError>;

    /// Write `fields` as the new live version at `path`.
    async fn write(&self, path: &SecretPath, fields: &SecretFields)
    -> Result<VersionId, StoreError>;

    /// Read the live version at `path`.
    ///
    /// Returns [`StoreError::NotFound`] when nothing was ever written there.
    async fn read_latest(&self, path: &SecretPath) -> Result<SecretFields, StoreError>;

    /// Read a specific retained version at `path`.
    ///
    /// Returns [`StoreError::NotFound`] when the version does not exist or is
    /// no longer retained.
    async fn read_version(
        &self,
        path: &SecretPath,
        version: VersionId,
    ) -> Result<SecretFields, StoreError>;
}

#[async_trait]
impl<T: SecretBackend + ?Sized> SecretBackend for Arc<T> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    async fn validate_session(&self) -> Result<(), StoreError> {
        (**self).validate_session().await
    }

    async fn write(
        &self,
        path: &SecretPath,
        fields: &SecretFields,
    ) -> Result<VersionId, StoreError> {
        (**self).write(path, fields).await
    }

    async fn read_latest(&self, path: &SecretPath) -> Result<SecretFields, StoreError> {
        (**self).read_latest(path).await
    }

    async fn read_version(
        &self,
        path: &SecretPath,
        version: VersionId,
    ) -> Result<SecretFields, StoreError> {
        (**self).read_version(path, version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_arc_backend_delegates() {
        let backend = Arc::new(MemoryBackend::new());
        let shared: Arc<dyn SecretBackend> = backend.clone();
        let path = SecretPath::new(Collection::UserKeys, "u1").unwrap();

        let version = shared
            .write(&path, &SecretFields::single(USER_KEY_FIELD, "enc123"))
            .await
            .unwrap();

        assert_eq!(version, VersionId::new(1));
        assert_eq!(shared.backend_name(), "memory");
        assert_eq!(
            backend.read_latest(&path).await.unwrap().get(USER_KEY_FIELD),
            Some("enc123")
        );
    }

    #[test]
    fn test_field_constants() {
        assert_eq!(SYSTEM_VALUE_FIELD, "value");
        assert_eq!(USER_KEY_FIELD, "key");
    }
}
