//! Problem types: sandbox limits plus the actions a student may request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GrindError;

/// One type of problem, e.g. `python3unittest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemType {
    /// Type name referenced by [`crate::model::Problem::problem_type`].
    pub name: String,
    /// Container image used for execution.
    pub image: String,
    /// CPU seconds.
    #[serde(rename = "maxCPU")]
    pub max_cpu: u32,
    /// Wall-clock seconds.
    pub max_clock: u32,
    /// Open file descriptors.
    #[serde(rename = "maxFD")]
    pub max_fd: u32,
    /// Largest file the sandbox may write, in kilobytes.
    pub max_file_size: u32,
    /// Memory, in megabytes.
    pub max_memory: u32,
    /// Threads.
    pub max_threads: u32,
    /// Actions keyed by action name.
    #[serde(default)]
    pub actions: BTreeMap<String, ProblemTypeAction>,
    /// Support files added to every problem of this type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, String>,
}

/// Label, UI hints, and handler for a single action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemTypeAction {
    /// Action name as sent in a commit.
    #[serde(default)]
    pub action: String,
    /// Button label.
    #[serde(default)]
    pub button: String,
    /// Message shown while the action runs.
    #[serde(default)]
    pub message: String,
    /// CSS class for the button.
    #[serde(default)]
    pub class_name: String,
    /// What the action does.
    pub handler: ActionKind,
}

/// The closed set of things an action can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Run the hidden tests and produce a report card.
    Grade {
        /// Test runner command.
        command: Vec<String>,
    },
    /// Run the visible tests without recording a grade.
    Test {
        /// Test runner command.
        command: Vec<String>,
    },
    /// Run the student's program.
    Run {
        /// Program command.
        command: Vec<String>,
    },
    /// Run the student's program under a debugger.
    Debug {
        /// Debugger command.
        command: Vec<String>,
    },
    /// Open an interactive shell in the sandbox.
    Shell,
    /// Feed `in/` fixtures to the program and compare against `out/`.
    StdinCheck {
        /// Program command.
        command: Vec<String>,
        /// Directory holding input fixtures.
        input_dir: String,
        /// Directory holding expected output.
        output_dir: String,
    },
}

impl ActionKind {
    /// Returns `true` if running this action produces a report card.
    #[must_use]
    pub fn produces_report_card(&self) -> bool {
        matches!(self, Self::Grade { .. } | Self::StdinCheck { .. })
    }

    /// Returns `true` if the action needs an interactive session.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Debug { .. } | Self::Shell)
    }
}

impl ProblemType {
    /// Looks up an action by name.
    ///
    /// # Errors
    ///
    /// Returns a validation error if this problem type has no such action.
    pub fn action(&self, name: &str) -> Result<&ProblemTypeAction, GrindError> {
        self.actions.get(name).ok_or_else(|| {
            GrindError::Validation(format!("problem type {} has no action {name:?}", self.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON: &str = r#"{
        "name": "python3unittest",
        "image": "codegrinder/python3",
        "maxCPU": 10, "maxClock": 30, "maxFD": 100,
        "maxFileSize": 10, "maxMemory": 128, "maxThreads": 20,
        "actions": {
            "grade": {"action": "grade", "button": "Grade", "handler": {"kind": "grade", "command": ["make", "grade"]}},
            "shell": {"action": "shell", "button": "Shell", "handler": {"kind": "shell"}},
            "stdin": {"action": "stdin", "handler": {"kind": "stdin_check", "command": ["python3", "main.py"], "input_dir": "in", "output_dir": "out"}}
        }
    }"#;

    #[test]
    fn parses_tagged_handlers() {
        let t: ProblemType = serde_json::from_str(PYTHON).unwrap();
        assert_eq!(t.max_cpu, 10);
        let grade = t.action("grade").unwrap();
        assert!(grade.handler.produces_report_card());
        assert!(t.action("shell").unwrap().handler.is_interactive());
        assert!(matches!(
            &t.action("stdin").unwrap().handler,
            ActionKind::StdinCheck { input_dir, .. } if input_dir == "in"
        ));
    }

    #[test]
    fn unknown_action_is_a_validation_error() {
        let t: ProblemType = serde_json::from_str(PYTHON).unwrap();
        assert!(matches!(t.action("launch"), Err(GrindError::Validation(_))));
    }

    #[test]
    fn unknown_handler_kind_is_rejected() {
        let bad = r#"{"handler": {"kind": "format_disk"}}"#;
        assert!(serde_json::from_str::<ProblemTypeAction>(bad).is_err());
    }
}
