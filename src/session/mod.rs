//! Commit Session Manager.
//!
//! Successive submissions for an assignment collapse into one open commit
//! until the session goes idle, moves to another step, or is graded. Every
//! decision runs inside a single store transaction so the check of the open
//! commit and the write that follows are serialized per assignment.

pub mod publish;
pub mod queries;

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::{ServerConfig, DEFAULT_OPEN_COMMIT_TIMEOUT_SECS};
use crate::error::GrindError;
use crate::model::{bound_transcript, Commit, CommitSubmission};
use crate::ports::{Clock, CommitStore, ProblemStore};

pub use publish::{dotfile_entry, load_verified_problem, publish_problem, verify_commit_step};
pub use queries::CommitQueries;

/// Why an open commit was closed before a new one was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The commit was idle longer than the timeout.
    Timeout,
    /// The submission is for a different step.
    StepChange,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::StepChange => write!(f, "step_change"),
        }
    }
}

/// What to do with the open commit when a submission arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No open commit; start a new one.
    Create,
    /// Merge into the open commit.
    Merge(Commit),
    /// Close the open commit, then start a new one.
    Replace {
        /// The commit to close.
        stale: Commit,
        /// Why it is being closed.
        reason: CloseReason,
    },
}

/// Decides how a submission for `step` arriving at `now` treats `open`.
///
/// Timeout is checked before step change. A commit is stale only when
/// strictly more than `timeout` has passed since its last update.
#[must_use]
pub fn decide(open: Option<Commit>, step: i64, now: DateTime<Utc>, timeout: TimeDelta) -> Decision {
    match open {
        None => Decision::Create,
        Some(stale) if now - stale.updated_at > timeout => {
            Decision::Replace { stale, reason: CloseReason::Timeout }
        }
        Some(stale) if stale.problem_step_number != step => {
            Decision::Replace { stale, reason: CloseReason::StepChange }
        }
        Some(open) => Decision::Merge(open),
    }
}

struct ProblemCheck<'a> {
    problems: &'a dyn ProblemStore,
    secret: &'a str,
}

/// Applies submissions to the commit store.
pub struct CommitSessions<'a> {
    store: &'a dyn CommitStore,
    clock: &'a dyn Clock,
    timeout: TimeDelta,
    problem_check: Option<ProblemCheck<'a>>,
}

impl<'a> CommitSessions<'a> {
    /// Creates a manager with the default 20-minute idle timeout.
    #[must_use]
    pub fn new(store: &'a dyn CommitStore, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            clock,
            timeout: TimeDelta::seconds(DEFAULT_OPEN_COMMIT_TIMEOUT_SECS),
            problem_check: None,
        }
    }

    /// Creates a manager using the server's configured timeout.
    #[must_use]
    pub fn from_config(
        store: &'a dyn CommitStore,
        clock: &'a dyn Clock,
        config: &ServerConfig,
    ) -> Self {
        Self::new(store, clock).with_timeout(config.open_commit_timeout)
    }

    /// Overrides the idle timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: TimeDelta) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks every submission's step against the assignment's verified problem.
    #[must_use]
    pub fn with_problem_check(mut self, problems: &'a dyn ProblemStore, secret: &'a str) -> Self {
        self.problem_check = Some(ProblemCheck { problems, secret });
        self
    }

    /// Merges, closes, scores, and persists a submission.
    ///
    /// Returns the commit as stored.
    ///
    /// # Errors
    ///
    /// Returns [`GrindError::NotFound`] if the assignment does not belong to
    /// the user, [`GrindError::Validation`] for an empty file set or unknown
    /// step, [`GrindError::Integrity`] if the problem fails verification, and
    /// [`GrindError::Storage`] if persistence fails. No state changes on error.
    pub fn submit(
        &self,
        user_id: i64,
        assignment_id: i64,
        submission: CommitSubmission,
    ) -> Result<Commit, GrindError> {
        self.preflight(user_id, assignment_id, &submission)?;

        let mut saved = None;
        self.store.in_transaction(&mut |tx| {
            if tx.find_assignment(assignment_id, user_id)?.is_none() {
                return Err(assignment_not_found(user_id, assignment_id));
            }

            let graded =
                submission.report_card.is_some() || !submission.transcript.is_empty();
            let (transcript, truncated) = bound_transcript(submission.transcript.clone());
            if truncated {
                tracing::warn!(
                    assignment_id,
                    received = submission.transcript.len(),
                    kept = transcript.len(),
                    "transcript truncated"
                );
            }

            let now = self.clock.now();
            let open = tx.open_commit(assignment_id)?;
            let mut commit = match decide(open, submission.problem_step_number, now, self.timeout) {
                Decision::Create => {
                    tracing::info!(assignment_id, step = submission.problem_step_number, "creating commit");
                    new_commit(now)
                }
                Decision::Merge(open) => {
                    tracing::info!(assignment_id, commit_id = open.id, "merging into open commit");
                    open
                }
                Decision::Replace { mut stale, reason } => {
                    tracing::info!(assignment_id, commit_id = stale.id, %reason, "closing stale commit");
                    stale.closed = true;
                    stale.updated_at = now;
                    tx.save_commit(&stale)?;
                    new_commit(now)
                }
            };

            commit.assignment_id = assignment_id;
            commit.user_id = user_id;
            commit.problem_step_number = submission.problem_step_number;
            commit.submission = submission.submission.clone();
            commit.action = submission.action.clone();
            commit.comment = submission.comment.clone();
            commit.report_card = submission.report_card.clone();
            commit.transcript = transcript;
            commit.score = commit.report_card.as_ref().map_or(0.0, |card| card.score());

            if graded {
                tracing::info!(assignment_id, commit_id = commit.id, score = commit.score, "closing graded commit");
                commit.closed = true;
            }
            commit.updated_at = now;
            commit.id = tx.save_commit(&commit)?;
            saved = Some(commit);
            Ok(())
        })?;
        saved.ok_or_else(|| GrindError::Storage("transaction finished without a commit".into()))
    }

    /// Rejects a submission before any state is touched.
    ///
    /// Must run outside the write transaction: the problem store may share
    /// the commit store's connection.
    fn preflight(
        &self,
        user_id: i64,
        assignment_id: i64,
        submission: &CommitSubmission,
    ) -> Result<(), GrindError> {
        let mut found = None;
        self.store.in_transaction(&mut |tx| {
            found = tx.find_assignment(assignment_id, user_id)?;
            Ok(())
        })?;
        let assignment = found.ok_or_else(|| assignment_not_found(user_id, assignment_id))?;

        if submission.submission.is_empty() {
            return Err(GrindError::Validation("commit has no files".into()));
        }
        if let Some(check) = &self.problem_check {
            let problem =
                load_verified_problem(check.problems, check.secret, assignment.problem_id)?;
            verify_commit_step(&problem, submission.problem_step_number)?;
        }
        Ok(())
    }
}

fn assignment_not_found(user_id: i64, assignment_id: i64) -> GrindError {
    GrindError::NotFound(format!("assignment {assignment_id} for user {user_id}"))
}

fn new_commit(now: DateTime<Utc>) -> Commit {
    Commit {
        id: 0,
        assignment_id: 0,
        problem_step_number: 0,
        user_id: 0,
        action: String::new(),
        closed: false,
        comment: String::new(),
        score: 0.0,
        report_card: None,
        submission: std::collections::BTreeMap::new(),
        transcript: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}
