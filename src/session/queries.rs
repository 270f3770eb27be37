//! Read and delete operations on a user's commits for one assignment.

use crate::error::GrindError;
use crate::model::Commit;
use crate::ports::CommitStore;

/// Commit lookups scoped to a user and assignment.
pub struct CommitQueries<'a> {
    store: &'a dyn CommitStore,
}

fn not_found(user_id: i64, assignment_id: i64, what: &str) -> GrindError {
    GrindError::NotFound(format!("{what} for user {user_id} in assignment {assignment_id}"))
}

impl<'a> CommitQueries<'a> {
    /// Wraps a commit store.
    #[must_use]
    pub fn new(store: &'a dyn CommitStore) -> Self {
        Self { store }
    }

    /// All commits ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn list(&self, user_id: i64, assignment_id: i64) -> Result<Vec<Commit>, GrindError> {
        self.store.list_commits(user_id, assignment_id)
    }

    /// The most recently created commit.
    ///
    /// # Errors
    ///
    /// Returns [`GrindError::NotFound`] if there are no commits.
    pub fn last(&self, user_id: i64, assignment_id: i64) -> Result<Commit, GrindError> {
        self.store
            .last_commit(user_id, assignment_id)?
            .ok_or_else(|| not_found(user_id, assignment_id, "no commits"))
    }

    /// One commit by id.
    ///
    /// # Errors
    ///
    /// Returns [`GrindError::NotFound`] if the commit does not exist in scope.
    pub fn get(&self, user_id: i64, assignment_id: i64, commit_id: i64) -> Result<Commit, GrindError> {
        self.store
            .get_commit(user_id, assignment_id, commit_id)?
            .ok_or_else(|| not_found(user_id, assignment_id, &format!("commit {commit_id}")))
    }

    /// Deletes one commit.
    ///
    /// # Errors
    ///
    /// Returns [`GrindError::NotFound`] if the commit does not exist in scope.
    pub fn delete(&self, user_id: i64, assignment_id: i64, commit_id: i64) -> Result<(), GrindError> {
        if self.store.delete_commit(user_id, assignment_id, commit_id)? {
            tracing::info!(user_id, assignment_id, commit_id, "deleted commit");
            Ok(())
        } else {
            Err(not_found(user_id, assignment_id, &format!("commit {commit_id}")))
        }
    }

    /// Deletes every commit, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub fn delete_all(&self, user_id: i64, assignment_id: i64) -> Result<usize, GrindError> {
        let removed = self.store.delete_commits(user_id, assignment_id)?;
        tracing::info!(user_id, assignment_id, removed, "deleted commits");
        Ok(removed)
    }
}
