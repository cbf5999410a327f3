//! `HashiCorp` Vault KV v2 backend

use crate::config::VaultConfig;
use crate::VaultCredentials;
use async_trait::async_trait;
use rustify::errors::ClientError as RestError;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, PoisonError, RwLock};
use strongbox_secrets::{
    SecretBackend, SecretError, SecretFields, SecretPath, StoreError, VersionId,
};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

/// Stores secrets in a Vault KV v2 secrets engine.
///
/// The session token is held behind a lock and can be replaced with
/// [`rotate_token`](Self::rotate_token). Calls already in flight finish on the
/// session they started with; no call ever sees a partially replaced session.
pub struct VaultBackend {
    config: VaultConfig,
    session: RwLock<Arc<VaultClient>>,
}

impl std::fmt::Debug for VaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultBackend")
            .field("address", &self.config.address)
            .field("mount", &self.config.mount)
            .field("path_prefix", &self.config.path_prefix)
            .finish_non_exhaustive()
    }
}

impl VaultBackend {
    /// Create a backend that authenticates with an existing token.
    ///
    /// No request is sent; use
    /// [`SecretClient::connect`](strongbox_secrets::SecretClient::connect) to
    /// validate the session.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidRequest`] if the Vault client cannot be
    /// built from `config` (e.g. an unparseable address).
    pub fn with_token(config: VaultConfig, token: &SecretString) -> Result<Self, SecretError> {
        let client = build_client(&config, Some(token))?;
        Ok(Self {
            config,
            session: RwLock::new(Arc::new(client)),
        })
    }

    /// Create a backend from `credentials`, logging in first for AppRole.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidRequest`] for an unusable config,
    /// [`SecretError::Auth`] if the AppRole login is rejected and
    /// [`SecretError::Unavailable`] if Vault cannot be reached.
    pub async fn connect(
        config: VaultConfig,
        credentials: &VaultCredentials,
    ) -> Result<Self, SecretError> {
        tracing::debug!(
            address = %config.address,
            method = credentials.method(),
            "Connecting to Vault"
        );

        match credentials {
            VaultCredentials::Token(token) => Self::with_token(config, token),
            VaultCredentials::AppRole {
                mount,
                role_id,
                secret_id,
            } => {
                let anonymous = build_client(&config, None)?;
                let auth = vaultrs::auth::approle::login(
                    &anonymous,
                    mount,
                    role_id,
                    secret_id.expose_secret(),
                )
                .await
                .map_err(|e| match classify_client_error(e) {
                    StoreError::Unavailable(message) => SecretError::Unavailable {
                        path: format!("auth/{mount}/login"),
                        message,
                    },
                    other => SecretError::Auth {
                        message: format!("AppRole login failed: {other}"),
                    },
                })?;

                tracing::info!(mount = %mount, "Obtained Vault token via AppRole login");
                Self::with_token(config, &SecretString::from(auth.client_token))
            }
        }
    }

    /// Create a backend from `VAULT_*` environment variables.
    ///
    /// See [`VaultConfig::from_env`] and [`VaultCredentials::from_env`].
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect), plus
    /// [`SecretError::InvalidRequest`] when no credentials are configured.
    pub async fn from_env() -> Result<Self, SecretError> {
        let credentials = VaultCredentials::from_env()?;
        Self::connect(VaultConfig::from_env(), &credentials).await
    }

    /// Replace the session token.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidRequest`] if a client cannot be built for
    /// the new token; the previous session stays active in that case.
    pub fn rotate_token(&self, token: &SecretString) -> Result<(), SecretError> {
        let client = Arc::new(build_client(&self.config, Some(token))?);
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = client;
        tracing::info!(address = %self.config.address, "Rotated Vault session token");
        Ok(())
    }

    /// The connection settings.
    #[must_use]
    pub const fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Vault path of `path`, relative to the mount.
    #[must_use]
    pub fn vault_path(&self, path: &SecretPath) -> String {
        self.config.relative_path(path.as_str())
    }

    fn session(&self) -> Arc<VaultClient> {
        Arc::clone(&self.session.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn build_client(
    config: &VaultConfig,
    token: Option<&SecretString>,
) -> Result<VaultClient, SecretError> {
    if !(config.address.starts_with("http://") || config.address.starts_with("https://")) {
        return Err(SecretError::InvalidRequest {
            reason: format!(
                "Vault address '{}' must start with http:// or https://",
                config.address
            ),
        });
    }

    let mut settings = VaultClientSettingsBuilder::default();
    settings.address(&config.address);
    if let Some(token) = token {
        settings.token(token.expose_secret());
    }

    let settings = settings.build().map_err(|e| SecretError::InvalidRequest {
        reason: format!("Failed to build Vault client settings: {e}"),
    })?;

    VaultClient::new(settings).map_err(|e| SecretError::InvalidRequest {
        reason: format!("Failed to create Vault client: {e}"),
    })
}

/// Translate a `vaultrs` error into a [`StoreError`].
///
/// - 401 is unauthorized, 403 forbidden (Vault also answers 403 for
///   invalid tokens), 404 not found
/// - 400 mentioning check-and-set, 409 and 412 are conflicts
/// - 429 and 5xx mean the service is unavailable (e.g. sealed)
/// - transport failures are unavailable
/// - anything else is a malformed response
///
/// The status decides the class whether or not the body parsed as a Vault
/// error list, so a soft-deleted version or a proxy's plain-text 404 is still
/// not found.
#[must_use]
pub fn classify_client_error(error: ClientError) -> StoreError {
    match error {
        ClientError::APIError { code, errors } => {
            let message = if errors.is_empty() {
                format!("Vault returned status {code}")
            } else {
                errors.join("; ")
            };
            classify_status(code, message)
        }
        ClientError::RestClientError { source } => match source {
            RestError::ServerResponseError { code, .. } => {
                classify_status(code, format!("Vault returned status {code}"))
            }
            RestError::RequestError { .. } | RestError::ResponseError { .. } => {
                StoreError::Unavailable(source.to_string())
            }
            other => StoreError::Malformed(other.to_string()),
        },
        other => StoreError::Malformed(other.to_string()),
    }
}

fn classify_status(code: u16, message: String) -> StoreError {
    match code {
        401 => StoreError::Unauthorized(message),
        403 => StoreError::Forbidden(message),
        404 => StoreError::NotFound,
        400 if message.contains("check-and-set") => StoreError::Conflict(message),
        409 | 412 => StoreError::Conflict(message),
        429 | 500..=599 => StoreError::Unavailable(message),
        _ => StoreError::Malformed(format!("status {code}: {message}")),
    }
}

#[async_trait]
impl SecretBackend for VaultBackend {
    fn backend_name(&self) -> &'static str {
        "vault"
    }

    async fn validate_session(&self) -> Result<(), StoreError> {
        let client = self.session();
        vaultrs::token::lookup_self(&*client)
            .await
            .map(|_| ())
            .map_err(classify_client_error)
    }

    async fn write(
        &self,
        path: &SecretPath,
        fields: &SecretFields,
    ) -> Result<VersionId, StoreError> {
        let client = self.session();
        let vault_path = self.vault_path(path);

        let metadata = kv2::set(&*client, &self.config.mount, &vault_path, fields)
            .await
            .map_err(classify_client_error)?;

        Ok(VersionId::new(metadata.version))
    }

    async fn read_latest(&self, path: &SecretPath) -> Result<SecretFields, StoreError> {
        let client = self.session();
        let vault_path = self.vault_path(path);

        kv2::read::<SecretFields>(&*client, &self.config.mount, &vault_path)
            .await
            .map_err(classify_client_error)
    }

    async fn read_version(
        &self,
        path: &SecretPath,
        version: VersionId,
    ) -> Result<SecretFields, StoreError> {
        let client = self.session();
        let vault_path = self.vault_path(path);

        kv2::read_version::<SecretFields>(
            &*client,
            &self.config.mount,
            &vault_path,
            version.get(),
        )
        .await
        .map_err(classify_client_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_secrets::Collection;

    fn backend(config: VaultConfig) -> VaultBackend {
        VaultBackend::with_token(config, &SecretString::from("test-token".to_string())).unwrap()
    }

    fn api_error(code: u16, errors: &[&str]) -> ClientError {
        ClientError::APIError {
            code,
            errors: errors.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_vault_path_without_prefix() {
        let backend = backend(VaultConfig::new("http://127.0.0.1:8200"));
        let path = SecretPath::new(Collection::UserKeys, "u1").unwrap();
        assert_eq!(backend.vault_path(&path), "user_keys/u1");
    }

    #[test]
    fn test_vault_path_with_prefix() {
        let backend = backend(VaultConfig::new("http://127.0.0.1:8200").with_path_prefix("app"));
        let path = SecretPath::new(Collection::System, "db_password").unwrap();
        assert_eq!(backend.vault_path(&path), "app/system_secrets/db_password");
    }

    #[test]
    fn test_classify_status_codes() {
        assert!(matches!(
            classify_client_error(api_error(401, &["missing client token"])),
            StoreError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_client_error(api_error(403, &["permission denied"])),
            StoreError::Forbidden(ref m) if m == "permission denied"
        ));
        assert_eq!(
            classify_client_error(api_error(404, &[])),
            StoreError::NotFound
        );
        assert!(matches!(
            classify_client_error(api_error(503, &["Vault is sealed"])),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            classify_client_error(api_error(429, &[])),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn test_classify_conflicts() {
        assert!(matches!(
            classify_client_error(api_error(
                400,
                &["check-and-set parameter did not match the current version"]
            )),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            classify_client_error(api_error(412, &[])),
            StoreError::Conflict(_)
        ));
    }

    #[test]
    fn test_classify_non_vault_error_bodies_by_status() {
        let server_error = |code, content: &str| ClientError::RestClientError {
            source: RestError::ServerResponseError {
                code,
                content: Some(content.to_string()),
            },
        };
        assert_eq!(
            classify_client_error(server_error(404, "404 page not found")),
            StoreError::NotFound
        );
        assert!(matches!(
            classify_client_error(server_error(403, "<html>Forbidden</html>")),
            StoreError::Forbidden(_)
        ));
        assert!(matches!(
            classify_client_error(server_error(502, "<html>Bad Gateway</html>")),
            StoreError::Unavailable(ref m) if m.contains("502")
        ));
    }

    #[test]
    fn test_classify_other_bad_request_is_malformed() {
        assert!(matches!(
            classify_client_error(api_error(400, &["no data provided"])),
            StoreError::Malformed(ref m) if m.contains("no data provided")
        ));
    }

    #[test]
    fn test_rotate_token_keeps_config() {
        let backend = backend(VaultConfig::new("http://127.0.0.1:8200").with_mount("kv"));
        backend
            .rotate_token(&SecretString::from("rotated".to_string()))
            .unwrap();
        assert_eq!(backend.config().mount, "kv");
    }

    #[test]
    fn test_invalid_address_rejected() {
        let result = VaultBackend::with_token(
            VaultConfig::new("not a url"),
            &SecretString::from("t".to_string()),
        );
        assert!(matches!(result, Err(SecretError::InvalidRequest { .. })));
    }

    #[test]
    fn test_debug_hides_token() {
        let backend = backend(VaultConfig::new("http://127.0.0.1:8200"));
        let debug = format!("{backend:?}");
        assert!(debug.contains("VaultBackend"));
        assert!(debug.contains("127.0.0.1"));
        assert!(!debug.contains("test-token"));
    }
}
