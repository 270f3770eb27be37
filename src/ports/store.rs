//! Persistence ports used by the commit server.
//!
//! Storage is exposed as row-level operations. The commit session's
//! check-then-act sequence runs inside [`CommitStore::in_transaction`],
//! which implementations must serialize.

use chrono::{DateTime, Utc};

use crate::error::GrindError;
use crate::model::{Assignment, Commit, Problem, ProblemStep};

/// Operations available inside a commit transaction.
pub trait CommitTx {
    /// Looks up an assignment owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    fn find_assignment(
        &mut self,
        assignment_id: i64,
        user_id: i64,
    ) -> Result<Option<Assignment>, GrindError>;

    /// Returns the open commit for an assignment, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    fn open_commit(&mut self, assignment_id: i64) -> Result<Option<Commit>, GrindError>;

    /// Inserts the commit when its id is 0, otherwise updates the row in place.
    ///
    /// Returns the row id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    fn save_commit(&mut self, commit: &Commit) -> Result<i64, GrindError>;
}

/// Unit of work run inside a transaction.
pub type TxWork<'a> = dyn FnMut(&mut dyn CommitTx) -> Result<(), GrindError> + 'a;

/// Stores assignments and commits.
pub trait CommitStore: Send + Sync {
    /// Runs `work` in a serialized transaction.
    ///
    /// Changes are kept only when `work` returns `Ok`; on any error the
    /// store is left as it was.
    ///
    /// # Errors
    ///
    /// Returns the error from `work`, or a storage error if the
    /// transaction cannot begin or commit.
    fn in_transaction(&self, work: &mut TxWork<'_>) -> Result<(), GrindError>;

    /// Creates an assignment of `problem_id` to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails.
    fn create_assignment(
        &self,
        user_id: i64,
        problem_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Assignment, GrindError>;

    /// All commits for a user's assignment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    fn list_commits(&self, user_id: i64, assignment_id: i64) -> Result<Vec<Commit>, GrindError>;

    /// The most recently created commit for a user's assignment.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    fn last_commit(&self, user_id: i64, assignment_id: i64)
        -> Result<Option<Commit>, GrindError>;

    /// One commit, scoped by user and assignment.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    fn get_commit(
        &self,
        user_id: i64,
        assignment_id: i64,
        commit_id: i64,
    ) -> Result<Option<Commit>, GrindError>;

    /// Deletes one commit; returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    fn delete_commit(
        &self,
        user_id: i64,
        assignment_id: i64,
        commit_id: i64,
    ) -> Result<bool, GrindError>;

    /// Deletes every commit for a user's assignment; returns the count removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    fn delete_commits(&self, user_id: i64, assignment_id: i64) -> Result<usize, GrindError>;
}

/// A problem with its steps and the signature over both.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedProblem {
    /// Problem metadata.
    pub problem: Problem,
    /// Steps in order.
    pub steps: Vec<ProblemStep>,
    /// Base64 HMAC over the canonical encoding.
    pub signature: String,
}

/// Computes a signature once the problem id is known.
pub type Signer<'a> = dyn Fn(&Problem, &[ProblemStep]) -> Result<String, GrindError> + 'a;

/// Stores problem definitions.
pub trait ProblemStore: Send + Sync {
    /// Persists a problem, its steps, and its signature atomically.
    ///
    /// A problem with id 0 is assigned a fresh id first; every step's
    /// `problem_id` is set to match. `sign` is called after ids are final.
    /// Existing steps of the problem are replaced. `problem` and `steps`
    /// are updated only when the save succeeds. Returns the stored
    /// signature.
    ///
    /// # Errors
    ///
    /// Returns the error from `sign`, or a storage error if the write fails.
    fn save_problem(
        &self,
        problem: &mut Problem,
        steps: &mut [ProblemStep],
        sign: &Signer<'_>,
    ) -> Result<String, GrindError>;

    /// Loads a problem with its steps (in step order) and stored signature.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    fn load_problem(&self, problem_id: i64) -> Result<Option<SignedProblem>, GrindError>;
}
