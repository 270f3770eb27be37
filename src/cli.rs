//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `grind`.
#[derive(Debug, Parser)]
#[command(name = "grind", version, about = "Work on and submit code-grinder problems")]
pub struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the session cookie used to talk to the server.
    Init {
        /// Cookie copied from the browser, `codegrinder_session=...`.
        cookie: String,
    },
    /// Show the assignment and problem for a directory.
    Status {
        /// Directory inside a problem-set workspace.
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Save the current files to the server without grading.
    Save {
        /// Directory of the problem to save.
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn parses_init_with_cookie() {
        let cli = Cli::parse_from(["grind", "init", "codegrinder_session=abc"]);
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Command::Init { cookie } if cookie == "codegrinder_session=abc"));
    }

    #[test]
    fn directory_defaults_to_current() {
        let cli = Cli::parse_from(["grind", "status"]);
        assert!(matches!(cli.command, Command::Status { dir } if dir == Path::new(".")));
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["grind", "save", "hello", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Save { dir } if dir == Path::new("hello")));
    }

    #[test]
    fn init_requires_a_cookie() {
        assert!(Cli::try_parse_from(["grind", "init"]).is_err());
    }
}
