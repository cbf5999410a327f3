//! Connection settings for `HashiCorp` Vault

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strongbox_secrets::SecretError;

/// Environment variable for Vault server address.
pub(crate) const ENV_VAULT_ADDR: &str = "VAULT_ADDR";

/// Environment variable for Vault authentication token.
pub(crate) const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";

/// Environment variable for the KV v2 mount path.
pub(crate) const ENV_VAULT_MOUNT: &str = "VAULT_MOUNT";

/// Environment variable for the path prefix nested under the mount.
pub(crate) const ENV_PATH_PREFIX: &str = "STRONGBOX_PATH_PREFIX";

/// Environment variables for AppRole login.
pub(crate) const ENV_ROLE_ID: &str = "VAULT_ROLE_ID";
pub(crate) const ENV_SECRET_ID: &str = "VAULT_SECRET_ID";
pub(crate) const ENV_APPROLE_MOUNT: &str = "VAULT_APPROLE_MOUNT";

const DEFAULT_ADDR: &str = "http://127.0.0.1:8200";
const DEFAULT_MOUNT: &str = "secret";
const DEFAULT_APPROLE_MOUNT: &str = "approle";

/// Where secrets live in Vault.
///
/// Secret paths are resolved as `{mount}/data/{path_prefix}/{collection}/{id}`;
/// the `data/` segment is added by the KV v2 client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Vault server address (e.g. `https://vault.example.com:8200`)
    pub address: String,

    /// KV v2 secrets engine mount point (defaults to "secret")
    #[serde(default = "default_mount")]
    pub mount: String,

    /// Optional prefix nested under the mount (e.g. "myapp")
    #[serde(default)]
    pub path_prefix: Option<String>,
}

fn default_mount() -> String {
    DEFAULT_MOUNT.to_string()
}

impl VaultConfig {
    /// Create a config for `address` using the default mount and no prefix.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            mount: default_mount(),
            path_prefix: None,
        }
    }

    /// Use `mount` as the KV v2 mount point.
    #[must_use]
    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    /// Nest every secret path under `prefix`.
    #[must_use]
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_matches('/');
        self.path_prefix = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Read the config from the environment.
    ///
    /// - `VAULT_ADDR` (defaults to `http://127.0.0.1:8200`)
    /// - `VAULT_MOUNT` (defaults to "secret")
    /// - `STRONGBOX_PATH_PREFIX` (optional)
    #[must_use]
    pub fn from_env() -> Self {
        let address = std::env::var(ENV_VAULT_ADDR).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        let mut config = Self::new(address);
        if let Ok(mount) = std::env::var(ENV_VAULT_MOUNT) {
            config = config.with_mount(mount);
        }
        if let Ok(prefix) = std::env::var(ENV_PATH_PREFIX) {
            config = config.with_path_prefix(prefix);
        }
        config
    }

    /// Path of a secret relative to the mount.
    #[must_use]
    pub fn relative_path(&self, path: &str) -> String {
        match &self.path_prefix {
            Some(prefix) => format!("{prefix}/{path}"),
            None => path.to_string(),
        }
    }
}

/// How to obtain a Vault session.
#[derive(Debug, Clone)]
pub enum VaultCredentials {
    /// An existing token
    Token(SecretString),

    /// AppRole login, exchanged for a token when connecting
    AppRole {
        /// Auth mount of the AppRole method (defaults to "approle")
        mount: String,
        /// Role id
        role_id: String,
        /// Secret id
        secret_id: SecretString,
    },
}

impl VaultCredentials {
    /// Credentials from an existing token.
    #[must_use]
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(SecretString::from(token.into()))
    }

    /// AppRole credentials on the default `approle` mount.
    #[must_use]
    pub fn app_role(role_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self::AppRole {
            mount: DEFAULT_APPROLE_MOUNT.to_string(),
            role_id: role_id.into(),
            secret_id: SecretString::from(secret_id.into()),
        }
    }

    /// Read credentials from the environment.
    ///
    /// `VAULT_TOKEN` wins when set. Otherwise `VAULT_ROLE_ID` and
    /// `VAULT_SECRET_ID` select AppRole login on `VAULT_APPROLE_MOUNT`
    /// (defaults to "approle").
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidRequest`] if neither a token nor a
    /// complete AppRole pair is available.
    pub fn from_env() -> Result<Self, SecretError> {
        if let Ok(token) = std::env::var(ENV_VAULT_TOKEN) {
            return Ok(Self::token(token));
        }

        match (std::env::var(ENV_ROLE_ID), std::env::var(ENV_SECRET_ID)) {
            (Ok(role_id), Ok(secret_id)) => {
                let mount = std::env::var(ENV_APPROLE_MOUNT)
                    .unwrap_or_else(|_| DEFAULT_APPROLE_MOUNT.to_string());
                Ok(Self::AppRole {
                    mount,
                    role_id,
                    secret_id: SecretString::from(secret_id),
                })
            }
            _ => Err(SecretError::InvalidRequest {
                reason: format!(
                    "Missing Vault credentials: set {ENV_VAULT_TOKEN}, or {ENV_ROLE_ID} and {ENV_SECRET_ID}"
                ),
            }),
        }
    }

    /// Short name of the credential type, safe to log.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::AppRole { .. } => "approle",
        }
    }
}
