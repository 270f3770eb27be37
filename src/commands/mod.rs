//! Command dispatch and handlers.

pub mod init;
pub mod save;
pub mod status;

use std::env;
use std::path::Path;

use crate::adapters::live::filesystem::LiveFileSystem;
use crate::cli::Command;
use crate::config::ClientConfig;
use crate::context::ServiceContext;

/// Dispatch a parsed command to its handler.
///
/// The client config is loaded once here. When `GRIND_RECORD` is set to a
/// file path, all port interactions are recorded to a cassette at that path.
///
/// # Errors
///
/// Returns an error string if the config cannot be loaded or the selected
/// command handler fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    let rc_path = ClientConfig::rc_path().map_err(|e| e.to_string())?;
    let config = ClientConfig::load_from(&LiveFileSystem, &rc_path, |key| env::var(key).ok())
        .map_err(|e| e.to_string())?;

    let ctx = match env::var("GRIND_RECORD") {
        Ok(path) => ServiceContext::recording(&config, Path::new(&path), command_name(command)),
        Err(_) => ServiceContext::live(&config),
    };

    let result = dispatch_with_context(command, &ctx, &config, &rc_path);

    // Finish recording after command completes (even on error)
    if let Some(path) = ctx.finish()? {
        eprintln!("Recording saved to: {}", path.display());
    }
    result
}

/// Dispatch a command with the given service context.
fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    config: &ClientConfig,
    rc_path: &Path,
) -> Result<(), String> {
    match command {
        Command::Init { cookie } => init::run(ctx, rc_path, cookie),
        Command::Status { dir } => status::run(ctx, dir),
        Command::Save { dir } => {
            config.require_cookie().map_err(|e| e.to_string())?;
            save::run(ctx, dir)
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Init { .. } => "init",
        Command::Status { .. } => "status",
        Command::Save { .. } => "save",
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> ServiceContext {
    use crate::adapters::live::clock::LiveClock;

    ServiceContext::from_parts(
        Box::new(LiveClock),
        Box::new(LiveFileSystem),
        Box::new(test_support::EchoApi::default()),
    )
}
