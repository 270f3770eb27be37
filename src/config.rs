//! Client and server configuration values.
//!
//! Both are loaded once at startup and passed by reference.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::GrindError;
use crate::ports::FileSystem;

/// Name of the client rc file in the user's home directory.
pub const RC_FILE_NAME: &str = ".grindrc";

/// Server used when neither the rc file nor the environment names one.
pub const DEFAULT_HOST: &str = "dorking.cs.dixie.edu";

/// Every session cookie starts with this.
pub const COOKIE_PREFIX: &str = "codegrinder_session=";

/// Idle period after which an open commit is closed, in seconds.
pub const DEFAULT_OPEN_COMMIT_TIMEOUT_SECS: i64 = 20 * 60;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

/// Where the `grind` tool talks to and who it talks as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host name, without scheme.
    #[serde(default = "default_host")]
    pub host: String,
    /// Session cookie, `codegrinder_session=...`; empty until `grind init`.
    #[serde(default)]
    pub cookie: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { host: default_host(), cookie: String::new() }
    }
}

impl ClientConfig {
    /// Path of the rc file in the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns a workspace error if the home directory cannot be determined.
    pub fn rc_path() -> Result<PathBuf, GrindError> {
        dirs::home_dir()
            .map(|home| home.join(RC_FILE_NAME))
            .ok_or_else(|| GrindError::Workspace("cannot locate home directory".into()))
    }

    /// Loads the rc file at `path` and applies `GRIND_HOST` / `GRIND_COOKIE`
    /// overrides from `env`. A missing rc file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns a workspace error if the file exists but cannot be read or parsed.
    pub fn load_from(
        fs: &dyn FileSystem,
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, GrindError> {
        let mut config = if fs.exists(path) {
            let raw = fs.read_to_string(path).map_err(|e| {
                GrindError::Workspace(format!("cannot read {}: {e}", path.display()))
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                GrindError::Workspace(format!("cannot parse {}: {e}", path.display()))
            })?
        } else {
            Self::default()
        };

        if let Some(host) = env("GRIND_HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(cookie) = env("GRIND_COOKIE").filter(|c| !c.trim().is_empty()) {
            config.cookie = cookie.trim().to_string();
        }
        Ok(config)
    }

    /// Replaces the cookie after checking its prefix.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the cookie does not start with
    /// `codegrinder_session=`.
    pub fn set_cookie(&mut self, cookie: &str) -> Result<(), GrindError> {
        let cookie = cookie.trim();
        if !cookie.starts_with(COOKIE_PREFIX) || cookie.len() == COOKIE_PREFIX.len() {
            return Err(GrindError::Validation(format!(
                "session cookie must look like {COOKIE_PREFIX}<value>"
            )));
        }
        self.cookie = cookie.to_string();
        Ok(())
    }

    /// The session cookie, or an error telling the user to sign in.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no cookie has been configured.
    pub fn require_cookie(&self) -> Result<&str, GrindError> {
        if self.cookie.is_empty() {
            return Err(GrindError::Validation(
                "no session cookie configured; run `grind init <cookie>` first".into(),
            ));
        }
        Ok(&self.cookie)
    }

    /// Writes the config as pretty JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns a workspace error if the file cannot be written.
    pub fn save(&self, fs: &dyn FileSystem, path: &Path) -> Result<(), GrindError> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| GrindError::Workspace(format!("cannot encode config: {e}")))?;
        json.push('\n');
        fs.write(path, &json)
            .map_err(|e| GrindError::Workspace(format!("cannot write {}: {e}", path.display())))
    }
}

/// Settings for the commit server library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// SQLite database file.
    pub database: PathBuf,
    /// HMAC key for problem signatures.
    pub secret: String,
    /// Idle period after which an open commit is closed.
    pub open_commit_timeout: TimeDelta,
}

impl ServerConfig {
    /// Builds the config from `GRINDER_DATABASE`, `GRINDER_SECRET` and
    /// `GRINDER_OPEN_COMMIT_TIMEOUT_SECS` as answered by `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `GRINDER_DATABASE` or `GRINDER_SECRET`
    /// is missing or empty, or the timeout is not a positive integer.
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, GrindError> {
        let required = |key: &str| {
            env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| GrindError::Validation(format!("{key} must be set")))
        };
        let database = PathBuf::from(required("GRINDER_DATABASE")?);
        let secret = required("GRINDER_SECRET")?;

        let timeout_secs = match env("GRINDER_OPEN_COMMIT_TIMEOUT_SECS") {
            None => DEFAULT_OPEN_COMMIT_TIMEOUT_SECS,
            Some(raw) => raw.trim().parse::<i64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                GrindError::Validation(format!(
                    "GRINDER_OPEN_COMMIT_TIMEOUT_SECS must be a positive number of seconds, got {raw:?}"
                ))
            })?,
        };

        Ok(Self { database, secret, open_commit_timeout: TimeDelta::seconds(timeout_secs) })
    }
}
