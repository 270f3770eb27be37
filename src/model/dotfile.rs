//! The per-problem-set metadata file kept in a student's workspace.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Name of the metadata file marking the root of a problem-set workspace.
pub const DOT_FILE_NAME: &str = ".grind";

/// Contents of the metadata file.
///
/// Advisory only: the server owns step state and this is refreshed from
/// its responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DotFileInfo {
    /// Where the file was read from; not stored in the file itself.
    #[serde(skip)]
    pub path: PathBuf,
    /// Assignment this workspace belongs to.
    #[serde(rename = "assignmentID")]
    pub assignment_id: i64,
    /// Problem unique key to per-problem info.
    #[serde(default)]
    pub problems: BTreeMap<String, ProblemInfo>,
}

/// Local view of one problem in the set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemInfo {
    /// Problem identity on the server.
    pub id: i64,
    /// Current one-based step.
    pub step: i64,
    /// File names the student may submit at this step.
    #[serde(default)]
    pub whitelist: BTreeMap<String, bool>,
}

impl ProblemInfo {
    /// The permitted file names (entries marked `true`).
    #[must_use]
    pub fn allowed(&self) -> BTreeSet<&str> {
        self.whitelist.iter().filter(|(_, ok)| **ok).map(|(name, _)| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metadata_file() {
        let json = r#"{
            "assignmentID": 12,
            "problems": {
                "hello": {"id": 3, "step": 2, "whitelist": {"main.py": true, "old.py": false}}
            }
        }"#;
        let info: DotFileInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.assignment_id, 12);
        let hello = &info.problems["hello"];
        assert_eq!(hello.step, 2);
        assert_eq!(hello.allowed().into_iter().collect::<Vec<_>>(), vec!["main.py"]);
        assert_eq!(info.path, PathBuf::new());
    }
}
