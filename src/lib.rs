//! Core library for the code-grinder tools.
//!
//! The client side resolves a student's workspace and gathers files for a
//! commit; the server side manages commit sessions and signs problems.

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod instructions;
pub mod model;
pub mod ports;
pub mod session;
pub mod signature;
pub mod whitelist;
pub mod workspace;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    init_logging(cli.verbose);
    commands::dispatch(&cli.command)
}

/// Installs a stderr log subscriber filtered by `RUST_LOG`.
///
/// Does nothing if a subscriber is already installed.
fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let result = run(["grind", "unknown"]);
        assert!(result.is_err());
    }

    #[test]
    fn run_errors_on_missing_cookie_argument() {
        let err = run(["grind", "init"]).unwrap_err();
        assert!(err.contains("<COOKIE>"));
    }
}
