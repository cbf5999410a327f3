//! strongbox: store and read versioned secrets in HashiCorp Vault
//!
//! ```text
//! strongbox put user_keys u1 key=enc123
//! strongbox get system db_password --field value
//! strongbox exec --secret db_password -- ./migrate
//! ```
//!
//! Exit codes: 0 ok, 1 absent on `get`, 2 usage or configuration, 3 not
//! found, 4 auth or permission, 5 conflict, 6 transient, 7 unexpected store
//! response. `exec` exits with the child's status.

// The binary reports fatal errors on stderr before tracing is available
#![allow(clippy::print_stderr)]

mod cli;
mod commands;
mod errors;
mod logging;

use clap::Parser;
use cli::Cli;
use errors::{EXIT_USAGE, exit_code_for, render_error};
use std::ffi::OsString;
use tracing::Instrument;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let args: Vec<OsString> = std::env::args_os().collect();
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) => match cli::json_usage_error(&e, &args) {
            Some(err) => {
                render_error(err, true);
                std::process::exit(EXIT_USAGE);
            }
            None => e.exit(),
        },
    };
    let json = cli.json;

    if let Err(e) = logging::init_tracing(cli.tracing_config()) {
        eprintln!("{e:?}");
        std::process::exit(EXIT_USAGE);
    }

    let span = logging::command_span(cli.command.name());
    let exit_code = match commands::run(cli).instrument(span).await {
        Ok(code) => code,
        Err(err) => {
            let code = exit_code_for(&err);
            tracing::debug!(exit_code = code, "Command failed");
            render_error(err, json);
            code
        }
    };

    std::process::exit(exit_code);
}
