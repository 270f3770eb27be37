//! Collecting a problem directory's files for a commit.
//!
//! Listing the directory and choosing which files to send are separate
//! steps; only [`gather_files`] reads file contents.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::GrindError;
use crate::model::{CommitSubmission, DOT_FILE_NAME};
use crate::ports::FileSystem;

use super::{find_dot_file, ProblemTarget};

/// Candidate paths split by the whitelist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Whitelisted paths, to be read.
    pub keep: Vec<String>,
    /// Paths that are not whitelisted.
    pub skipped: Vec<String>,
}

/// Lists every regular file under `dir` except metadata files.
///
/// # Errors
///
/// Returns a workspace error if the directory cannot be walked.
pub fn list_candidates(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<String>, GrindError> {
    let files = fs
        .walk_files(dir)
        .map_err(|e| GrindError::Workspace(format!("walk error in {}: {e}", dir.display())))?;
    Ok(files
        .into_iter()
        .filter(|rel| rel.rsplit('/').next() != Some(DOT_FILE_NAME))
        .collect())
}

/// Splits candidates into whitelisted and skipped paths.
#[must_use]
pub fn select_files(candidates: &[String], whitelist: &BTreeSet<&str>) -> Selection {
    let (keep, skipped): (Vec<String>, Vec<String>) =
        candidates.iter().cloned().partition(|rel| whitelist.contains(rel.as_str()));
    Selection { keep, skipped }
}

/// Reads every whitelisted file in `dir`.
///
/// Non-whitelisted files are logged and left out. Every whitelisted name
/// must be present.
///
/// # Errors
///
/// Returns a workspace error if the walk or any read fails, and
/// [`GrindError::MissingFiles`] naming every whitelisted file not found.
pub fn gather_files(
    fs: &dyn FileSystem,
    dir: &Path,
    whitelist: &BTreeSet<&str>,
) -> Result<BTreeMap<String, String>, GrindError> {
    let candidates = list_candidates(fs, dir)?;
    let selection = select_files(&candidates, whitelist);
    for name in &selection.skipped {
        tracing::warn!(file = %name, "skipping file which is not a file introduced by the problem");
    }

    let mut files = BTreeMap::new();
    for name in selection.keep {
        let path = dir.join(&name);
        let contents = fs
            .read_to_string(&path)
            .map_err(|e| GrindError::Workspace(format!("error reading {}: {e}", path.display())))?;
        files.insert(name, contents);
    }

    if files.len() != whitelist.len() {
        let missing: Vec<String> = whitelist
            .iter()
            .filter(|name| !files.contains_key(**name))
            .map(|name| (*name).to_string())
            .collect();
        for name in &missing {
            tracing::error!(file = %name, dir = %dir.display(), "expected file not found");
        }
        return Err(GrindError::MissingFiles { dir: dir.to_path_buf(), missing });
    }
    Ok(files)
}

/// Everything needed to submit the current directory's work.
#[derive(Debug, Clone, PartialEq)]
pub struct Gathered {
    /// Assignment the workspace belongs to.
    pub assignment_id: i64,
    /// Problem identified from the directory.
    pub problem: ProblemTarget,
    /// Path of the metadata file used.
    pub dotfile_path: PathBuf,
    /// Whitelisted file contents.
    pub files: BTreeMap<String, String>,
}

impl Gathered {
    /// Turns the gathered files into a submission for the current step.
    #[must_use]
    pub fn into_submission(self, action: &str, comment: &str) -> CommitSubmission {
        CommitSubmission {
            problem_step_number: self.problem.info.step,
            submission: self.files,
            action: action.to_string(),
            comment: comment.to_string(),
            ..CommitSubmission::default()
        }
    }
}

/// Resolves the workspace around `start` and gathers its problem's files.
///
/// # Errors
///
/// Returns any workspace error from resolving, identifying, or gathering.
pub fn gather(fs: &dyn FileSystem, start: &Path) -> Result<Gathered, GrindError> {
    let workspace = find_dot_file(fs, start)?;
    let problem = workspace.identify_problem()?;
    let files = gather_files(fs, &problem.dir, &problem.info.allowed())?;
    Ok(Gathered {
        assignment_id: workspace.dotfile.assignment_id,
        problem,
        dotfile_path: workspace.dotfile.path,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::super::mem_fs::MemFs;
    use super::*;

    const DOTFILE: &str = r#"{"assignmentID": 11, "problems": {
        "hello": {"id": 3, "step": 1, "whitelist": {"main.py": true}}
    }}"#;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn selection_partitions_on_exact_relative_paths() {
        let whitelist = BTreeSet::from(["main.py", "util.py"]);
        let selection =
            select_files(&names(&["main.py", "scratch.txt", "tests/main.py"]), &whitelist);
        assert_eq!(selection.keep, names(&["main.py"]));
        assert_eq!(selection.skipped, names(&["scratch.txt", "tests/main.py"]));
    }

    #[test]
    fn candidates_exclude_metadata_files() {
        let fs = MemFs::with(&[("/p/.grind", "{}"), ("/p/main.py", ""), ("/p/sub/x.py", "")]);
        let listed = list_candidates(&fs, Path::new("/p")).unwrap();
        assert_eq!(listed, names(&["main.py", "sub/x.py"]));
    }

    #[test]
    fn untracked_files_are_skipped_not_fatal() {
        let fs = MemFs::with(&[
            ("/set/.grind", DOTFILE),
            ("/set/main.py", "print('hi')\n"),
            ("/set/scratch.txt", "notes"),
        ]);
        let gathered = gather(&fs, Path::new("/set")).unwrap();
        assert_eq!(gathered.assignment_id, 11);
        assert_eq!(gathered.files.len(), 1);
        assert_eq!(gathered.files["main.py"], "print('hi')\n");
        assert!(!gathered.files.contains_key("scratch.txt"));

        let submission = gathered.into_submission("", "saving");
        assert_eq!(submission.problem_step_number, 1);
        assert_eq!(submission.comment, "saving");
        assert!(submission.report_card.is_none());
    }

    #[test]
    fn every_missing_file_is_named() {
        let fs = MemFs::with(&[("/p/b.py", "")]);
        let whitelist = BTreeSet::from(["a.py", "b.py", "c.py"]);
        let err = gather_files(&fs, Path::new("/p"), &whitelist).unwrap_err();
        match &err {
            GrindError::MissingFiles { dir, missing } => {
                assert_eq!(dir, Path::new("/p"));
                assert_eq!(missing, &names(&["a.py", "c.py"]));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("a.py, c.py"));
    }

    #[test]
    fn read_failure_aborts_the_gather() {
        let mut fs = MemFs::with(&[("/p/a.py", "x"), ("/p/b.py", "y")]);
        fs.unreadable.push(PathBuf::from("/p/b.py"));
        let whitelist = BTreeSet::from(["a.py", "b.py"]);
        let err = gather_files(&fs, Path::new("/p"), &whitelist).unwrap_err();
        assert!(matches!(err, GrindError::Workspace(_)));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn empty_whitelist_gathers_nothing() {
        let fs = MemFs::with(&[("/p/a.py", "x")]);
        let files = gather_files(&fs, Path::new("/p"), &BTreeSet::new()).unwrap();
        assert!(files.is_empty());
    }
}
