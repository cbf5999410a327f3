//! CLI error type and exit codes
//!
//! Library errors are folded into [`CliError`], a `miette` diagnostic with
//! help text. [`exit_code_for`] maps each error onto the documented exit codes.

use miette::{Diagnostic, Report};
use serde::Serialize;
use std::io::{self, Write};
use strongbox_secrets::{ErrorKind, SecretError};
use thiserror::Error;

/// Success
pub const EXIT_OK: i32 = 0;
/// `get` found no secret at the path
pub const EXIT_ABSENT: i32 = 1;
/// Invalid arguments or configuration
pub const EXIT_USAGE: i32 = 2;
/// A secret that had to exist was not found
pub const EXIT_NOT_FOUND: i32 = 3;
/// Session rejected or capability missing
pub const EXIT_AUTH: i32 = 4;
/// Write conflicted with the stored version
pub const EXIT_CONFLICT: i32 = 5;
/// Store unreachable or deadline elapsed; retrying may help
pub const EXIT_TRANSIENT: i32 = 6;
/// Store answered with something unexpected
pub const EXIT_STORE: i32 = 7;
/// Writing command output failed (`EX_IOERR`)
pub const EXIT_IO: i32 = 74;
/// The command given to `exec` could not be run
pub const EXIT_CANNOT_EXECUTE: i32 = 126;
/// The command given to `exec` does not exist
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Errors reported by the strongbox CLI
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid arguments or configuration
    #[error("Invalid usage: {message}")]
    #[diagnostic(code(strongbox::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A secret operation failed
    #[error("{message}")]
    #[diagnostic(code(strongbox::cli::secret))]
    Secret {
        kind: ErrorKind,
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The command given to `exec` could not be started
    #[error("Failed to start '{program}'")]
    #[diagnostic(
        code(strongbox::cli::spawn),
        help("Check that the command exists and is executable")
    )]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Writing to stdout failed
    #[error("Failed to write output")]
    #[diagnostic(code(strongbox::cli::output))]
    Output(#[from] io::Error),
}

impl CliError {
    /// Create a usage error
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: None,
        }
    }

    /// Create a usage error with help text
    #[must_use]
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    const fn code_name(&self) -> &'static str {
        match self {
            Self::Usage { .. } => "usage",
            Self::Secret { kind, .. } => match kind {
                ErrorKind::Auth => "auth",
                ErrorKind::Permission => "permission",
                ErrorKind::NotFound => "not_found",
                ErrorKind::Conflict => "conflict",
                ErrorKind::Transient => "transient",
                ErrorKind::InvalidRequest => "invalid_request",
                ErrorKind::Store => "store",
            },
            Self::Spawn { .. } => "spawn",
            Self::Output(_) => "output",
        }
    }
}

impl From<SecretError> for CliError {
    fn from(err: SecretError) -> Self {
        let kind = err.kind();
        let help = match kind {
            ErrorKind::Auth => {
                Some("Check VAULT_TOKEN, or VAULT_ROLE_ID and VAULT_SECRET_ID for AppRole login")
            }
            ErrorKind::Permission => {
                Some("The Vault policy of this session does not grant access to the path")
            }
            ErrorKind::Conflict => Some("Read the secret again and retry the write"),
            ErrorKind::Transient => {
                Some("Vault may be sealed or unreachable; the request can be retried")
            }
            ErrorKind::NotFound | ErrorKind::InvalidRequest | ErrorKind::Store => None,
        };
        Self::Secret {
            kind,
            message: err.to_string(),
            help: help.map(String::from),
        }
    }
}

/// Map CLI error to its exit code
#[must_use]
pub fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Usage { .. } => EXIT_USAGE,
        CliError::Secret { kind, .. } => match kind {
            ErrorKind::Auth | ErrorKind::Permission => EXIT_AUTH,
            ErrorKind::NotFound => EXIT_NOT_FOUND,
            ErrorKind::Conflict => EXIT_CONFLICT,
            ErrorKind::Transient => EXIT_TRANSIENT,
            ErrorKind::InvalidRequest => EXIT_USAGE,
            ErrorKind::Store => EXIT_STORE,
        },
        CliError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            EXIT_COMMAND_NOT_FOUND
        }
        CliError::Spawn { .. } => EXIT_CANNOT_EXECUTE,
        CliError::Output(_) => EXIT_IO,
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    /// Always "error"
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Error details in JSON output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable error class name
    pub code: &'static str,
    /// Exit code of the process
    pub exit_code: i32,
    /// Human-readable message
    pub message: String,
}

/// JSON envelope describing `err`
#[must_use]
pub fn error_envelope(err: &CliError) -> ErrorEnvelope<ErrorBody> {
    ErrorEnvelope::new(ErrorBody {
        code: err.code_name(),
        exit_code: exit_code_for(err),
        message: err.to_string(),
    })
}

/// Render `err` as JSON on stdout or as a diagnostic on stderr
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: CliError, json_mode: bool) {
    if json_mode {
        match serde_json::to_string(&error_envelope(&err)) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        eprintln!("{:?}", Report::new(err));
        let _ = io::stderr().flush();
    }
}
