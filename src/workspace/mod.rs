//! Locating the problem-set workspace around a directory.
//!
//! A workspace is marked by the metadata file at its root. Problems in a
//! multi-problem set live in subdirectories named by their unique key.

pub mod gather;

use std::path::{Path, PathBuf};

use crate::error::GrindError;
use crate::model::{DotFileInfo, ProblemInfo, DOT_FILE_NAME};
use crate::ports::FileSystem;

pub use gather::{gather, gather_files, list_candidates, select_files, Gathered, Selection};

/// Result of the upward search for the metadata file.
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    /// Parsed metadata; `path` is where it was read from.
    pub dotfile: DotFileInfo,
    /// Directory containing the metadata file.
    pub problem_set_dir: PathBuf,
    /// Last directory probed before the metadata file was found; `None`
    /// when it was found in the starting directory.
    pub problem_dir: Option<PathBuf>,
}

/// The problem a directory corresponds to.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemTarget {
    /// Unique key of the problem.
    pub unique: String,
    /// Local info for the problem.
    pub info: ProblemInfo,
    /// Directory holding the student's files for the problem.
    pub dir: PathBuf,
}

/// Searches `start` and its ancestors for the metadata file and parses it.
///
/// # Errors
///
/// Returns a workspace error if no ancestor holds the file, or if the file
/// cannot be read or parsed.
pub fn find_dot_file(fs: &dyn FileSystem, start: &Path) -> Result<Workspace, GrindError> {
    let mut dir = std::path::absolute(start).map_err(|e| {
        GrindError::Workspace(format!("cannot resolve {}: {e}", start.display()))
    })?;
    let mut problem_dir = None;

    let path = loop {
        let candidate = dir.join(DOT_FILE_NAME);
        if fs.exists(&candidate) {
            break candidate;
        }
        let Some(parent) = dir.parent().map(Path::to_path_buf) else {
            return Err(GrindError::Workspace(format!(
                "unable to find {DOT_FILE_NAME} in {} or an ancestor directory",
                start.display()
            )));
        };
        tracing::debug!(dir = %dir.display(), next = %parent.display(), "metadata file not found, trying parent");
        problem_dir = Some(std::mem::replace(&mut dir, parent));
    };

    let raw = fs
        .read_to_string(&path)
        .map_err(|e| GrindError::Workspace(format!("error reading {}: {e}", path.display())))?;
    let mut dotfile: DotFileInfo = serde_json::from_str(&raw)
        .map_err(|e| GrindError::Workspace(format!("error parsing {}: {e}", path.display())))?;
    dotfile.path = path;

    Ok(Workspace { dotfile, problem_set_dir: dir, problem_dir })
}

impl Workspace {
    /// Works out which problem the search started in.
    ///
    /// A set with one problem keeps its files at the set root. Otherwise
    /// the problem is named by the subdirectory the search passed through.
    ///
    /// # Errors
    ///
    /// Returns a workspace error if the set is empty, the search started at
    /// the root of a multi-problem set, or the subdirectory name is not a
    /// known problem.
    pub fn identify_problem(&self) -> Result<ProblemTarget, GrindError> {
        let problems = &self.dotfile.problems;
        if problems.len() == 1 {
            if let Some((unique, info)) = problems.iter().next() {
                return Ok(ProblemTarget {
                    unique: unique.clone(),
                    info: info.clone(),
                    dir: self.problem_set_dir.clone(),
                });
            }
        }
        if problems.is_empty() {
            return Err(GrindError::Workspace(format!(
                "{} lists no problems",
                self.dotfile.path.display()
            )));
        }

        let Some(dir) = &self.problem_dir else {
            return Err(GrindError::Workspace(
                "this problem set has several problems; run from within a problem directory"
                    .into(),
            ));
        };
        let unique = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let info = problems.get(&unique).ok_or_else(|| {
            GrindError::Workspace(format!(
                "unable to recognize the problem based on the directory name of {unique:?}"
            ))
        })?;
        Ok(ProblemTarget { unique, info: info.clone(), dir: dir.clone() })
    }
}


#[cfg(test)]
mod tests {
    use super::mem_fs::MemFs;
    use super::*;

    const MULTI: &str = r#"{"assignmentID": 5, "problems": {
        "alpha": {"id": 1, "step": 1, "whitelist": {"a.py": true}},
        "beta": {"id": 2, "step": 3, "whitelist": {"b.py": true}}
    }}"#;

    const SINGLE: &str = r#"{"assignmentID": 9, "problems": {
        "solo": {"id": 4, "step": 2, "whitelist": {"main.py": true}}
    }}"#;

    #[test]
    fn found_in_starting_directory() {
        let fs = MemFs::with(&[("/set/.grind", SINGLE)]);
        let ws = find_dot_file(&fs, Path::new("/set")).unwrap();
        assert_eq!(ws.problem_set_dir, PathBuf::from("/set"));
        assert_eq!(ws.problem_dir, None);
        assert_eq!(ws.dotfile.assignment_id, 9);
        assert_eq!(ws.dotfile.path, PathBuf::from("/set/.grind"));

        let target = ws.identify_problem().unwrap();
        assert_eq!(target.unique, "solo");
        assert_eq!(target.dir, PathBuf::from("/set"));
        assert_eq!(target.info.step, 2);
    }

    #[test]
    fn walks_up_and_remembers_the_last_directory() {
        let fs = MemFs::with(&[("/home/s/set/.grind", MULTI)]);
        let ws = find_dot_file(&fs, Path::new("/home/s/set/beta/tests")).unwrap();
        assert_eq!(ws.problem_set_dir, PathBuf::from("/home/s/set"));
        assert_eq!(ws.problem_dir, Some(PathBuf::from("/home/s/set/beta")));

        let target = ws.identify_problem().unwrap();
        assert_eq!(target.unique, "beta");
        assert_eq!(target.info.id, 2);
        assert_eq!(target.dir, PathBuf::from("/home/s/set/beta"));
    }

    #[test]
    fn single_problem_sets_use_the_set_root() {
        let fs = MemFs::with(&[("/set/.grind", SINGLE)]);
        let ws = find_dot_file(&fs, Path::new("/set/scratch")).unwrap();
        assert_eq!(ws.identify_problem().unwrap().dir, PathBuf::from("/set"));
    }

    #[test]
    fn missing_metadata_is_a_workspace_error() {
        let fs = MemFs::with(&[("/elsewhere/.grind", SINGLE)]);
        let err = find_dot_file(&fs, Path::new("/set/alpha")).unwrap_err();
        assert!(matches!(err, GrindError::Workspace(_)));
        assert!(err.to_string().contains(".grind"));
    }

    #[test]
    fn unparseable_metadata_is_a_workspace_error() {
        let fs = MemFs::with(&[("/set/.grind", "{not json")]);
        let err = find_dot_file(&fs, Path::new("/set")).unwrap_err();
        assert!(err.to_string().contains("error parsing"));
    }

    #[test]
    fn multi_problem_root_is_ambiguous() {
        let fs = MemFs::with(&[("/set/.grind", MULTI)]);
        let ws = find_dot_file(&fs, Path::new("/set")).unwrap();
        assert!(matches!(ws.identify_problem(), Err(GrindError::Workspace(_))));
    }

    #[test]
    fn unknown_subdirectory_is_rejected() {
        let fs = MemFs::with(&[("/set/.grind", MULTI)]);
        let ws = find_dot_file(&fs, Path::new("/set/gamma")).unwrap();
        let err = ws.identify_problem().unwrap_err();
        assert!(err.to_string().contains("\"gamma\""));
    }
}
