//! `grind save` command.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::context::ServiceContext;
use crate::model::Commit;
use crate::workspace::gather;

/// Comment attached to commits made by `grind save`.
pub const SAVE_COMMENT: &str = "saving from grind tool";

/// Execute the `save` command.
///
/// Gathers the whitelisted files of the problem in `dir` and posts them as
/// an ungraded commit for the current step.
///
/// # Errors
///
/// Returns an error string if the workspace cannot be resolved, files are
/// missing, or the server rejects the commit.
pub fn run(ctx: &ServiceContext, dir: &Path) -> Result<(), String> {
    let (commit, saved_at) = save(ctx, dir)?;
    println!(
        "Saved commit {} for step {} at {}",
        commit.id,
        commit.problem_step_number,
        saved_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if commit.closed {
        println!("The commit is closed; the next save starts a new one.");
    }
    Ok(())
}

/// Gathers and posts the files, returning the stored commit and the local
/// time the files were read.
fn save(ctx: &ServiceContext, dir: &Path) -> Result<(Commit, DateTime<Utc>), String> {
    let saved_at = ctx.clock.now();
    let gathered = gather(ctx.fs.as_ref(), dir).map_err(|e| e.to_string())?;
    let assignment_id = gathered.assignment_id;
    let unique = gathered.problem.unique.clone();
    let submission = gathered.into_submission("", SAVE_COMMENT);
    tracing::info!(assignment_id, problem = %unique, step = submission.problem_step_number, files = submission.submission.len(), "saving");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {e}"))?;
    let commit = rt
        .block_on(ctx.api.submit_commit(assignment_id, &submission))
        .map_err(|e| e.to_string())?;
    let elapsed = ctx.clock.now() - saved_at;
    tracing::debug!(commit_id = commit.id, elapsed_ms = elapsed.num_milliseconds(), "server accepted commit");
    Ok((commit, saved_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;
    use crate::adapters::memory::ManualClock;
    use crate::commands::test_support::EchoApi;

    fn workspace(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".grind"),
            r#"{"assignmentID": 31, "problems": {"hello": {"id": 2, "step": 3, "whitelist": {"main.py": true}}}}"#,
        )
        .unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    #[test]
    fn posts_whitelisted_files_with_save_comment() {
        let dir = workspace(&[("main.py", "print(1)\n"), ("notes.txt", "todo")]);
        let api = EchoApi::default();
        let sent = api.sent.clone();
        let ctx = ServiceContext::from_parts(
            Box::new(ManualClock::new("2024-09-02T15:04:05Z".parse().unwrap())),
            Box::new(LiveFileSystem),
            Box::new(api),
        );

        let (commit, saved_at) = save(&ctx, dir.path()).unwrap();
        assert_eq!(saved_at.to_rfc3339(), "2024-09-02T15:04:05+00:00");
        assert_eq!(commit.assignment_id, 31);
        assert_eq!(commit.problem_step_number, 3);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (assignment_id, submission) = &sent[0];
        assert_eq!(*assignment_id, 31);
        assert_eq!(submission.comment, SAVE_COMMENT);
        assert!(submission.action.is_empty());
        assert!(submission.report_card.is_none());
        assert_eq!(submission.submission.keys().collect::<Vec<_>>(), vec!["main.py"]);
    }

    #[test]
    fn missing_files_stop_before_posting() {
        let dir = workspace(&[]);
        let api = EchoApi::default();
        let sent = api.sent.clone();
        let ctx = ServiceContext::from_parts(
            Box::new(ManualClock::new("2024-09-02T15:04:05Z".parse().unwrap())),
            Box::new(LiveFileSystem),
            Box::new(api),
        );

        let err = run(&ctx, dir.path()).unwrap_err();
        assert!(err.contains("main.py"));
        assert!(sent.lock().unwrap().is_empty());
    }
}
