//! Server API port for the client's network calls.

use std::future::Future;
use std::pin::Pin;

use crate::error::GrindError;
use crate::model::{Commit, CommitSubmission};

/// Boxed future type alias used by [`ServerApi`] to keep the trait dyn-compatible.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GrindError>> + Send + 'a>>;

/// Calls the commit server on behalf of the signed-in student.
pub trait ServerApi: Send + Sync {
    /// Submits files for an assignment step and returns the persisted commit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown assignment, `Validation` when the
    /// server rejects the payload, and `Transport` for network failures.
    fn submit_commit<'a>(
        &'a self,
        assignment_id: i64,
        submission: &'a CommitSubmission,
    ) -> ApiFuture<'a, Commit>;
}
