//! `grind init` command.

use std::path::Path;

use crate::config::ClientConfig;
use crate::context::ServiceContext;

/// Execute the `init` command.
///
/// Validates the cookie, then writes it into the rc file at `rc_path`,
/// keeping any other settings already there.
///
/// # Errors
///
/// Returns an error string if the cookie is malformed or the rc file
/// cannot be read or written.
pub fn run(ctx: &ServiceContext, rc_path: &Path, cookie: &str) -> Result<(), String> {
    let mut config = ClientConfig::load_from(ctx.fs.as_ref(), rc_path, |_| None)
        .map_err(|e| e.to_string())?;
    config.set_cookie(cookie).map_err(|e| e.to_string())?;
    config.save(ctx.fs.as_ref(), rc_path).map_err(|e| e.to_string())?;
    tracing::info!(path = %rc_path.display(), host = %config.host, "saved session cookie");
    println!("Cookie saved to {}", rc_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_context;

    #[test]
    fn writes_cookie_and_keeps_host() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".grindrc");
        std::fs::write(&rc, r#"{"host": "grind.example.edu", "cookie": ""}"#).unwrap();

        run(&test_context(), &rc, "codegrinder_session=xyz").unwrap();
        let saved: ClientConfig =
            serde_json::from_str(&std::fs::read_to_string(&rc).unwrap()).unwrap();
        assert_eq!(saved.host, "grind.example.edu");
        assert_eq!(saved.cookie, "codegrinder_session=xyz");
    }

    #[test]
    fn rejects_cookie_without_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".grindrc");
        let err = run(&test_context(), &rc, "session=xyz").unwrap_err();
        assert!(err.contains("codegrinder_session="));
        assert!(!rc.exists());
    }
}
