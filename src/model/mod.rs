//! Domain types shared by the client tooling and the commit server.

mod assignment;
mod commit;
mod dotfile;
mod problem;
mod problem_type;

pub use assignment::Assignment;
pub use commit::{
    bound_transcript, Commit, CommitSubmission, EventMessage, Outcome, ReportCard,
    ReportCardResult, TRANSCRIPT_DATA_LIMIT, TRANSCRIPT_EVENT_COUNT_LIMIT,
};
pub use dotfile::{DotFileInfo, ProblemInfo, DOT_FILE_NAME};
pub use problem::{
    beginning_of_time, fix_line_endings, fix_newlines, is_raw_path, Problem, ProblemSet,
    ProblemStep, RAW_STEP_DIRECTORIES,
};
pub use problem_type::{ActionKind, ProblemType, ProblemTypeAction};
