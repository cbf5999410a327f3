//! Typed secret client over a [`SecretBackend`]

use crate::{
    Collection, EnvironmentSink, SYSTEM_VALUE_FIELD, SecretBackend, SecretError, SecretFields,
    SecretPath, SecureSecret, StoreError, USER_KEY_FIELD, VersionId,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Client for reading and writing secrets.
///
/// The session is validated when the client is created and held for its
/// lifetime. The client is `Send + Sync`; share it behind an `Arc` to use it
/// from many tasks at once.
///
/// Every call performs exactly one store round trip. Nothing is cached,
/// batched or retried. Each call takes an optional timeout; when `None`, the
/// client's default timeout (if any) applies.
pub struct SecretClient<B> {
    backend: B,
    environment: Arc<dyn EnvironmentSink>,
    default_timeout: Option<Duration>,
}

impl<B: SecretBackend> SecretClient<B> {
    /// Create a client, validating the backend session immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Auth`] if the store rejects the session and
    /// [`SecretError::Unavailable`] if the store cannot be reached.
    #[instrument(name = "secret_client_connect", skip_all, fields(backend = backend.backend_name()))]
    pub async fn connect(
        backend: B,
        environment: Arc<dyn EnvironmentSink>,
    ) -> Result<Self, SecretError> {
        match backend.validate_session().await {
            Ok(()) => {}
            Err(StoreError::Unauthorized(message) | StoreError::Forbidden(message)) => {
                return Err(SecretError::Auth { message });
            }
            Err(StoreError::Unavailable(message)) => {
                return Err(SecretError::Unavailable {
                    path: String::new(),
                    message,
                });
            }
            Err(StoreError::Malformed(message)) => {
                return Err(SecretError::Store {
                    path: String::new(),
                    message,
                });
            }
            Err(other @ (StoreError::NotFound | StoreError::Conflict(_))) => {
                return Err(SecretError::Auth {
                    message: other.to_string(),
                });
            }
        }

        tracing::debug!("Secret store session validated");
        Ok(Self {
            backend,
            environment,
            default_timeout: None,
        })
    }

    /// Apply `timeout` to every call that does not pass its own.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// The default timeout, if one is set.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// The backend this client talks to.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Write `fields` as the new live version of `(collection, id)`.
    ///
    /// Prior versions stay in the store according to its retention policy.
    ///
    /// # Errors
    ///
    /// - [`SecretError::InvalidRequest`] if `id` or `fields` is empty
    /// - [`SecretError::PermissionDenied`] if the session cannot write the path
    /// - [`SecretError::Conflict`] if the store rejects the write as a version race
    /// - [`SecretError::Unavailable`] or [`SecretError::DeadlineExceeded`] on
    ///   transient failure; a timed-out write may still have been committed
    #[instrument(skip(self, fields), fields(collection = %collection, field_count = fields.len()))]
    pub async fn put(
        &self,
        collection: Collection,
        id: &str,
        fields: SecretFields,
        timeout: Option<Duration>,
    ) -> Result<VersionId, SecretError> {
        let path = SecretPath::new(collection, id)?;
        if fields.is_empty() {
            return Err(SecretError::InvalidRequest {
                reason: format!("secret at '{path}' must have at least one field"),
            });
        }

        let version = self
            .bounded(&path, timeout, self.backend.write(&path, &fields))
            .await?
            .map_err(|e| classify(&path, "write", e))?;

        tracing::debug!(path = %path, version = %version, "Secret written");
        Ok(version)
    }

    /// Read the live version of `(collection, id)`.
    ///
    /// Returns `Ok(None)` when nothing was ever written there.
    ///
    /// # Errors
    ///
    /// - [`SecretError::InvalidRequest`] if `id` is empty
    /// - [`SecretError::PermissionDenied`] if the session cannot read the path
    /// - [`SecretError::Unavailable`] or [`SecretError::DeadlineExceeded`] on
    ///   transient failure
    #[instrument(skip(self), fields(collection = %collection))]
    pub async fn get(
        &self,
        collection: Collection,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<SecretFields>, SecretError> {
        let path = SecretPath::new(collection, id)?;

        match self
            .bounded(&path, timeout, self.backend.read_latest(&path))
            .await?
        {
            Ok(fields) => {
                tracing::debug!(path = %path, field_count = fields.len(), "Secret read");
                Ok(Some(fields))
            }
            Err(StoreError::NotFound) => {
                tracing::debug!(path = %path, "Secret absent");
                Ok(None)
            }
            Err(e) => Err(classify(&path, "read", e)),
        }
    }

    /// Read a specific retained version of `(collection, id)`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus [`SecretError::NotFound`] if the
    /// version does not exist or is no longer retained.
    #[instrument(skip(self), fields(collection = %collection, version = %version))]
    pub async fn get_version(
        &self,
        collection: Collection,
        id: &str,
        version: VersionId,
        timeout: Option<Duration>,
    ) -> Result<SecretFields, SecretError> {
        let path = SecretPath::new(collection, id)?;

        self.bounded(&path, timeout, self.backend.read_version(&path, version))
            .await?
            .map_err(|e| classify(&path, "read", e))
    }

    /// Read the system secret `id` and bind its `value` field in the
    /// environment sink under `id`.
    ///
    /// The sink is shared state: every holder of it observes the binding, and
    /// it is not invalidated when the secret later rotates.
    ///
    /// # Errors
    ///
    /// - [`SecretError::NotFound`] if the secret is absent or has no `value`
    ///   field; the sink is left untouched
    /// - any error [`get`](Self::get) returns
    /// - [`SecretError::InvalidRequest`] if the sink cannot hold the binding
    #[instrument(skip(self))]
    pub async fn sync_to_environment(
        &self,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<SecureSecret, SecretError> {
        let path = SecretPath::new(Collection::System, id)?;
        let value = self
            .get(Collection::System, id, timeout)
            .await?
            .and_then(|fields| fields.secret(SYSTEM_VALUE_FIELD))
            .ok_or_else(|| SecretError::NotFound {
                name: id.to_string(),
                path: path.to_string(),
            })?;

        self.environment.set(id, value.expose())?;
        tracing::debug!(name = id, "Secret synced to environment");
        Ok(value)
    }

    /// Store `encrypted_key` as the key of `user_id`.
    ///
    /// # Errors
    ///
    /// Same as [`put`](Self::put).
    pub async fn put_user_key(
        &self,
        user_id: &str,
        encrypted_key: &str,
        timeout: Option<Duration>,
    ) -> Result<VersionId, SecretError> {
        self.put(
            Collection::UserKeys,
            user_id,
            SecretFields::single(USER_KEY_FIELD, encrypted_key),
            timeout,
        )
        .await
    }

    /// Read the key of `user_id`, or `None` if no key was stored.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn user_key(
        &self,
        user_id: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<SecureSecret>, SecretError> {
        Ok(self
            .get(Collection::UserKeys, user_id, timeout)
            .await?
            .and_then(|fields| fields.secret(USER_KEY_FIELD)))
    }

    /// Store `value` as the system secret `name`.
    ///
    /// # Errors
    ///
    /// Same as [`put`](Self::put).
    pub async fn put_system_secret(
        &self,
        name: &str,
        value: &str,
        timeout: Option<Duration>,
    ) -> Result<VersionId, SecretError> {
        self.put(
            Collection::System,
            name,
            SecretFields::single(SYSTEM_VALUE_FIELD, value),
            timeout,
        )
        .await
    }

    /// Run `call` under the effective deadline.
    async fn bounded<T>(
        &self,
        path: &SecretPath,
        timeout: Option<Duration>,
        call: impl Future<Output = T>,
    ) -> Result<T, SecretError> {
        match timeout.or(self.default_timeout) {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                tracing::warn!(path = %path, timeout_ms = limit.as_millis(), "Secret store call timed out");
                SecretError::DeadlineExceeded {
                    path: path.to_string(),
                    timeout: limit,
                }
            }),
            None => Ok(call.await),
        }
    }
}

/// Translate a store error for an operation on `path`.
fn classify(secret: &SecretPath, operation: &'static str, error: StoreError) -> SecretError {
    let path = secret.to_string();
    match error {
        StoreError::Unauthorized(message) => SecretError::Auth { message },
        StoreError::Forbidden(message) => SecretError::PermissionDenied {
            path,
            operation,
            message,
        },
        StoreError::NotFound => SecretError::NotFound {
            name: secret.id().to_string(),
            path,
        },
        StoreError::Conflict(message) => SecretError::Conflict { path, message },
        StoreError::Unavailable(message) => SecretError::Unavailable { path, message },
        StoreError::Malformed(message) => SecretError::Store { path, message },
    }
}

impl<B: SecretBackend> std::fmt::Debug for SecretClient<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretClient")
            .field("backend", &self.backend.backend_name())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
