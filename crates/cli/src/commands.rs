//! Subcommand implementations
//!
//! Each command takes a connected [`SecretClient`] and writes its result to
//! the given writer; the returned value is the process exit code.

use crate::cli::{Cli, Commands, StoreArgs};
use crate::errors::{CliError, EXIT_ABSENT, EXIT_OK};
use serde::Serialize;
use std::io::Write;
use std::process::ExitStatus;
use std::sync::Arc;
use strongbox_secrets::{
    Collection, EnvironmentMirror, SecretBackend, SecretClient, SecretError, SecretFields,
    VersionId,
};
use strongbox_vault::VaultBackend;
use tracing::instrument;

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    /// Always "ok"
    pub status: &'static str,
    /// The payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

#[derive(Debug, Serialize)]
struct Written<'a> {
    collection: Collection,
    id: &'a str,
    version: VersionId,
}

#[derive(Debug, Serialize)]
struct Read<'a> {
    collection: Collection,
    id: &'a str,
    fields: &'a SecretFields,
}

/// Connect to Vault and run the selected subcommand.
pub async fn run(cli: Cli) -> Result<i32, CliError> {
    let Cli {
        command,
        store,
        json,
        ..
    } = cli;
    let mut out = std::io::stdout();

    match command {
        Commands::Put {
            collection,
            id,
            fields,
        } => {
            let (client, _) = connect(&store).await?;
            put(
                &client,
                collection.into(),
                &id,
                fields.into_iter().collect(),
                json,
                &mut out,
            )
            .await
        }
        Commands::Get {
            collection,
            id,
            version,
            field,
        } => {
            let (client, _) = connect(&store).await?;
            get(
                &client,
                collection.into(),
                &id,
                version.map(VersionId::new),
                field.as_deref(),
                json,
                &mut out,
            )
            .await
        }
        Commands::Exec { secrets, command } => {
            let (client, mirror) = connect(&store).await?;
            exec(&client, &mirror, &secrets, &command).await
        }
    }
}

#[instrument(skip_all, fields(address = %store.vault_addr, mount = %store.mount))]
async fn connect(
    store: &StoreArgs,
) -> Result<(SecretClient<VaultBackend>, Arc<EnvironmentMirror>), CliError> {
    let credentials = store.credentials()?;
    let backend = VaultBackend::connect(store.vault_config(), &credentials).await?;
    let mirror = Arc::new(EnvironmentMirror::new());
    let client = SecretClient::connect(backend, mirror.clone()).await?;

    let client = match store.timeout() {
        Some(timeout) => client.with_default_timeout(timeout),
        None => client,
    };
    Ok((client, mirror))
}

/// `strongbox put`
pub async fn put<B: SecretBackend, W: Write>(
    client: &SecretClient<B>,
    collection: Collection,
    id: &str,
    fields: SecretFields,
    json: bool,
    out: &mut W,
) -> Result<i32, CliError> {
    let version = client.put(collection, id, fields, None).await?;

    if json {
        serde_json::to_writer(
            &mut *out,
            &OkEnvelope::new(Written {
                collection,
                id,
                version,
            }),
        )
        .map_err(std::io::Error::from)?;
        writeln!(out)?;
    } else {
        writeln!(out, "Stored {collection}/{id} {version}")?;
    }
    Ok(EXIT_OK)
}

/// `strongbox get`
///
/// Exits with [`EXIT_ABSENT`] when the latest version is requested and the
/// secret does not exist. A missing field or version is an error.
pub async fn get<B: SecretBackend, W: Write>(
    client: &SecretClient<B>,
    collection: Collection,
    id: &str,
    version: Option<VersionId>,
    field: Option<&str>,
    json: bool,
    out: &mut W,
) -> Result<i32, CliError> {
    let fields = match version {
        Some(version) => client.get_version(collection, id, version, None).await?,
        None => match client.get(collection, id, None).await? {
            Some(fields) => fields,
            None => {
                tracing::warn!(collection = %collection, id, "No secret stored at this path");
                return Ok(EXIT_ABSENT);
            }
        },
    };

    let fields = match field {
        Some(name) => {
            let value = fields.get(name).ok_or_else(|| SecretError::NotFound {
                name: name.to_string(),
                path: format!("{collection}/{id}"),
            })?;
            SecretFields::single(name, value)
        }
        None => fields,
    };

    if json {
        serde_json::to_writer(
            &mut *out,
            &OkEnvelope::new(Read {
                collection,
                id,
                fields: &fields,
            }),
        )
        .map_err(std::io::Error::from)?;
        writeln!(out)?;
    } else if field.is_some() {
        for (_, value) in fields.iter() {
            writeln!(out, "{value}")?;
        }
    } else {
        for (name, value) in fields.iter() {
            writeln!(out, "{name}={value}")?;
        }
    }
    Ok(EXIT_OK)
}

/// `strongbox exec`
///
/// Syncs every named system secret into `mirror`, then runs `command` with
/// the mirror's bindings added to the inherited environment. Nothing is run
/// if any secret cannot be synced.
pub async fn exec<B: SecretBackend>(
    client: &SecretClient<B>,
    mirror: &EnvironmentMirror,
    secrets: &[String],
    command: &[String],
) -> Result<i32, CliError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| CliError::usage("No command given to exec"))?;

    for name in secrets {
        client.sync_to_environment(name, None).await?;
    }

    tracing::info!(
        program = %program,
        secret_count = mirror.len(),
        "Running command with synced secrets"
    );
    let status = tokio::process::Command::new(program)
        .args(args)
        .envs(mirror.to_env_map())
        .status()
        .await
        .map_err(|source| CliError::Spawn {
            program: program.clone(),
            source,
        })?;

    Ok(exit_status_code(status))
}

fn exit_status_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(1)
}
