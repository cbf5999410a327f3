//! Command-line arguments

use crate::errors::CliError;
use crate::logging::{LogLevel, TracingConfig, TracingFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::time::Duration;
use strongbox_secrets::Collection;
use strongbox_vault::{VaultConfig, VaultCredentials};

/// Store and read versioned secrets in HashiCorp Vault.
#[derive(Parser, Debug)]
#[command(name = "strongbox")]
#[command(about = "Store and read versioned secrets in HashiCorp Vault")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Vault connection settings.
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(long, global = true, help = "Emit JSON output and JSON logs")]
    pub json: bool,
}

impl Cli {
    /// Tracing settings selected by the logging flags.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            format: if self.json {
                TracingFormat::Json
            } else {
                self.log_format
            },
            level: self.level.into(),
            filter: None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Write a new version of a secret")]
    Put {
        #[arg(value_enum, help = "Collection holding the secret")]
        collection: CollectionArg,
        #[arg(help = "Secret id")]
        id: String,
        #[arg(
            required = true,
            value_name = "KEY=VALUE",
            value_parser = parse_assignment,
            help = "Fields of the new version"
        )]
        fields: Vec<(String, String)>,
    },
    #[command(about = "Read a secret; exits with 1 when it does not exist")]
    Get {
        #[arg(value_enum, help = "Collection holding the secret")]
        collection: CollectionArg,
        #[arg(help = "Secret id")]
        id: String,
        #[arg(long, help = "Read this version instead of the latest")]
        version: Option<u64>,
        #[arg(long, help = "Print only the value of this field")]
        field: Option<String>,
    },
    #[command(about = "Run a command with system secrets in its environment")]
    Exec {
        #[arg(
            short = 's',
            long = "secret",
            value_name = "NAME",
            required = true,
            help = "System secret to expose as an environment variable (repeatable)"
        )]
        secrets: Vec<String>,
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

impl Commands {
    /// Subcommand name as typed on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::Get { .. } => "get",
            Self::Exec { .. } => "exec",
        }
    }
}

/// Usage error for a failed parse of `args` when `--json` output was asked for.
///
/// Arguments after `--` belong to the `exec` child and are ignored. Help and
/// version requests are not errors and yield `None`, as does any failure
/// without `--json`; clap prints those itself.
#[must_use]
pub fn json_usage_error(err: &clap::Error, args: &[OsString]) -> Option<CliError> {
    if matches!(
        err.kind(),
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
    ) {
        return None;
    }

    let json_requested = args
        .iter()
        .skip(1)
        .take_while(|arg| arg.as_os_str() != "--")
        .any(|arg| arg.as_os_str() == "--json");
    if !json_requested {
        return None;
    }

    let rendered = err.to_string();
    let message = rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string();
    Some(CliError::usage_with_help(
        message,
        "Run 'strongbox --help' for usage",
    ))
}

/// Collection names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollectionArg {
    /// Per-user encrypted keys
    #[value(name = "user_keys", alias = "user-keys")]
    UserKeys,
    /// Named system secrets
    System,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::UserKeys => Self::UserKeys,
            CollectionArg::System => Self::System,
        }
    }
}

/// Vault connection settings, each with an environment fallback.
#[derive(Args, Clone)]
pub struct StoreArgs {
    #[arg(
        long,
        global = true,
        env = "VAULT_ADDR",
        default_value = "http://127.0.0.1:8200",
        help = "Vault server address"
    )]
    pub vault_addr: String,

    #[arg(
        long,
        global = true,
        env = "VAULT_TOKEN",
        hide_env_values = true,
        help = "Vault token"
    )]
    pub vault_token: Option<String>,

    #[arg(long, global = true, env = "VAULT_ROLE_ID", help = "AppRole role id")]
    pub role_id: Option<String>,

    #[arg(
        long,
        global = true,
        env = "VAULT_SECRET_ID",
        hide_env_values = true,
        help = "AppRole secret id"
    )]
    pub secret_id: Option<String>,

    #[arg(
        long,
        global = true,
        env = "VAULT_APPROLE_MOUNT",
        default_value = "approle",
        help = "Mount of the AppRole auth method"
    )]
    pub approle_mount: String,

    #[arg(
        long,
        global = true,
        env = "VAULT_MOUNT",
        default_value = "secret",
        help = "Mount of the KV v2 secrets engine"
    )]
    pub mount: String,

    #[arg(
        long,
        global = true,
        env = "STRONGBOX_PATH_PREFIX",
        help = "Prefix nested under the mount"
    )]
    pub path_prefix: Option<String>,

    #[arg(
        long,
        global = true,
        env = "STRONGBOX_TIMEOUT_SECS",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Deadline for each store call, in seconds"
    )]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for StoreArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreArgs")
            .field("vault_addr", &self.vault_addr)
            .field("vault_token", &self.vault_token.as_ref().map(|_| "[REDACTED]"))
            .field("role_id", &self.role_id)
            .field("secret_id", &self.secret_id.as_ref().map(|_| "[REDACTED]"))
            .field("approle_mount", &self.approle_mount)
            .field("mount", &self.mount)
            .field("path_prefix", &self.path_prefix)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl StoreArgs {
    /// Where secrets live.
    #[must_use]
    pub fn vault_config(&self) -> VaultConfig {
        let config = VaultConfig::new(self.vault_addr.clone()).with_mount(self.mount.clone());
        match &self.path_prefix {
            Some(prefix) => config.with_path_prefix(prefix.clone()),
            None => config,
        }
    }

    /// How to authenticate. A token wins over AppRole credentials.
    ///
    /// # Errors
    ///
    /// Returns a usage error when neither a token nor a complete AppRole pair
    /// was given.
    pub fn credentials(&self) -> Result<VaultCredentials, CliError> {
        if let Some(token) = &self.vault_token {
            return Ok(VaultCredentials::token(token.clone()));
        }

        match (&self.role_id, &self.secret_id) {
            (Some(role_id), Some(secret_id)) => Ok(VaultCredentials::AppRole {
                mount: self.approle_mount.clone(),
                role_id: role_id.clone(),
                secret_id: secret_id.clone().into(),
            }),
            (Some(_), None) | (None, Some(_)) => Err(CliError::usage_with_help(
                "AppRole login needs both a role id and a secret id",
                "Pass --role-id and --secret-id, or set VAULT_ROLE_ID and VAULT_SECRET_ID",
            )),
            (None, None) => Err(CliError::usage_with_help(
                "No Vault credentials given",
                "Pass --vault-token or set VAULT_TOKEN, or use AppRole with VAULT_ROLE_ID and VAULT_SECRET_ID",
            )),
        }
    }

    /// Default deadline for store calls.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("field name missing in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use secrecy::ExposeSecret;

    const STORE_ENV: [&str; 8] = [
        "VAULT_ADDR",
        "VAULT_TOKEN",
        "VAULT_ROLE_ID",
        "VAULT_SECRET_ID",
        "VAULT_APPROLE_MOUNT",
        "VAULT_MOUNT",
        "STRONGBOX_PATH_PREFIX",
        "STRONGBOX_TIMEOUT_SECS",
    ];

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        temp_env::with_vars_unset(STORE_ENV, || Cli::try_parse_from(args))
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["strongbox", "get", "system", "db_password"]).unwrap();

        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert!(!cli.json);
        assert_eq!(cli.store.vault_addr, "http://127.0.0.1:8200");
        assert_eq!(cli.store.mount, "secret");
        assert_eq!(cli.store.approle_mount, "approle");
        assert!(cli.store.vault_token.is_none());
        assert!(cli.store.timeout().is_none());
    }

    #[test]
    fn test_put_fields() {
        let cli = parse(&[
            "strongbox",
            "put",
            "user_keys",
            "u1",
            "key=enc123",
            "note=a=b",
        ])
        .unwrap();

        let Commands::Put {
            collection,
            id,
            fields,
        } = cli.command
        else {
            panic!("expected put");
        };
        assert_eq!(collection, CollectionArg::UserKeys);
        assert_eq!(id, "u1");
        assert_eq!(
            fields,
            vec![
                ("key".to_string(), "enc123".to_string()),
                ("note".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn test_put_requires_fields() {
        assert!(parse(&["strongbox", "put", "system", "db_password"]).is_err());
        assert!(parse(&["strongbox", "put", "system", "db_password", "novalue"]).is_err());
        assert!(parse(&["strongbox", "put", "system", "db_password", "=x"]).is_err());
    }

    #[test]
    fn test_get_options() {
        let cli = parse(&[
            "strongbox",
            "get",
            "system",
            "db_password",
            "--version",
            "2",
            "--field",
            "value",
        ])
        .unwrap();

        let Commands::Get {
            collection,
            version,
            field,
            ..
        } = cli.command
        else {
            panic!("expected get");
        };
        assert_eq!(collection, CollectionArg::System);
        assert_eq!(version, Some(2));
        assert_eq!(field.as_deref(), Some("value"));
    }

    #[test]
    fn test_collection_alias_and_rejection() {
        let cli = parse(&["strongbox", "get", "user-keys", "u1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Get {
                collection: CollectionArg::UserKeys,
                ..
            }
        ));

        assert!(parse(&["strongbox", "get", "tokens", "u1"]).is_err());
    }

    #[test]
    fn test_exec_command_after_separator() {
        let cli = parse(&[
            "strongbox",
            "exec",
            "--secret",
            "db_password",
            "-s",
            "api_key",
            "--",
            "env",
            "-i",
        ])
        .unwrap();

        let Commands::Exec { secrets, command } = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(secrets, vec!["db_password", "api_key"]);
        assert_eq!(command, vec!["env", "-i"]);
    }

    #[test]
    fn test_exec_requires_secret_and_command() {
        assert!(parse(&["strongbox", "exec", "--", "env"]).is_err());
        assert!(parse(&["strongbox", "exec", "--secret", "db_password"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&[
            "strongbox",
            "get",
            "system",
            "db_password",
            "--vault-addr",
            "https://vault.example.com:8200",
            "--mount",
            "kv",
            "--path-prefix",
            "payments",
            "--timeout-secs",
            "5",
            "--json",
        ])
        .unwrap();

        let config = cli.store.vault_config();
        assert_eq!(config.address, "https://vault.example.com:8200");
        assert_eq!(config.mount, "kv");
        assert_eq!(config.path_prefix.as_deref(), Some("payments"));
        assert_eq!(cli.store.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cli.tracing_config().format, TracingFormat::Json);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(
            parse(&[
                "strongbox",
                "--timeout-secs",
                "0",
                "get",
                "system",
                "db_password"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_settings_from_env() {
        let cli = temp_env::with_vars(
            [
                ("VAULT_ADDR", Some("https://vault.internal:8200")),
                ("VAULT_TOKEN", Some("hvs.from-env")),
                ("VAULT_MOUNT", Some("kv")),
                ("STRONGBOX_PATH_PREFIX", Some("ci")),
            ],
            || Cli::try_parse_from(["strongbox", "get", "system", "db_password"]),
        )
        .unwrap();

        assert_eq!(cli.store.vault_addr, "https://vault.internal:8200");
        assert_eq!(cli.store.mount, "kv");
        assert_eq!(cli.store.path_prefix.as_deref(), Some("ci"));
        let credentials = cli.store.credentials().unwrap();
        assert!(
            matches!(credentials, VaultCredentials::Token(ref t) if t.expose_secret() == "hvs.from-env")
        );
    }

    #[test]
    fn test_credentials_app_role() {
        let cli = parse(&[
            "strongbox",
            "--role-id",
            "role-123",
            "--secret-id",
            "secret-456",
            "--approle-mount",
            "ci-approle",
            "get",
            "system",
            "db_password",
        ])
        .unwrap();

        match cli.store.credentials().unwrap() {
            VaultCredentials::AppRole {
                mount,
                role_id,
                secret_id,
            } => {
                assert_eq!(mount, "ci-approle");
                assert_eq!(role_id, "role-123");
                assert_eq!(secret_id.expose_secret(), "secret-456");
            }
            VaultCredentials::Token(_) => panic!("expected AppRole credentials"),
        }
    }

    #[test]
    fn test_credentials_missing_or_incomplete() {
        let cli = parse(&["strongbox", "get", "system", "db_password"]).unwrap();
        let err = cli.store.credentials().unwrap_err();
        assert!(err.to_string().contains("No Vault credentials"));

        let cli = parse(&[
            "strongbox",
            "--role-id",
            "role-123",
            "get",
            "system",
            "db_password",
        ])
        .unwrap();
        assert!(cli.store.credentials().is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let cli = parse(&[
            "strongbox",
            "--vault-token",
            "hvs.super-secret",
            "--secret-id",
            "sid-very-secret",
            "get",
            "system",
            "db_password",
        ])
        .unwrap();

        let debug = format!("{cli:?}");
        assert!(!debug.contains("hvs.super-secret"));
        assert!(!debug.contains("sid-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_command_names() {
        let cli = parse(&["strongbox", "get", "system", "db_password"]).unwrap();
        assert_eq!(cli.command.name(), "get");
        let cli = parse(&["strongbox", "exec", "-s", "db_password", "--", "env"]).unwrap();
        assert_eq!(cli.command.name(), "exec");
    }

    #[test]
    fn test_json_parse_error_becomes_usage_error() {
        let args = os_args(&["strongbox", "--json", "get", "tokens", "u1"]);
        let err = parse(&["strongbox", "--json", "get", "tokens", "u1"]).unwrap_err();

        let usage = json_usage_error(&err, &args).unwrap();

        assert!(matches!(usage, CliError::Usage { ref message, .. } if message.contains("tokens")));
        assert!(!usage.to_string().starts_with("error:"));
    }

    #[test]
    fn test_parse_error_without_json_is_left_to_clap() {
        let args = os_args(&["strongbox", "get", "tokens", "u1"]);
        let err = parse(&["strongbox", "get", "tokens", "u1"]).unwrap_err();

        assert!(json_usage_error(&err, &args).is_none());
    }

    #[test]
    fn test_json_after_separator_belongs_to_child() {
        let args = os_args(&["strongbox", "exec", "--", "tool", "--json"]);
        let err = parse(&["strongbox", "exec", "--", "tool", "--json"]).unwrap_err();

        assert!(json_usage_error(&err, &args).is_none());
    }

    #[test]
    fn test_help_with_json_is_not_an_error() {
        let args = os_args(&["strongbox", "--json", "--help"]);
        let err = parse(&["strongbox", "--json", "--help"]).unwrap_err();

        assert!(json_usage_error(&err, &args).is_none());
    }

    #[test]
    fn test_help_flag() {
        let err = parse(&["strongbox", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
