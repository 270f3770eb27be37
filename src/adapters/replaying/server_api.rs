//! Replaying adapter for the `ServerApi` port.

use super::{next_output, replay_result, SharedReplayer};
use crate::error::GrindError;
use crate::model::{Commit, CommitSubmission};
use crate::ports::{ApiFuture, ServerApi};

/// Serves recorded server responses.
///
/// Recorded failures come back as `Transport` errors carrying the
/// original message.
pub struct ReplayingServerApi {
    replayer: SharedReplayer,
}

impl ReplayingServerApi {
    /// Creates a replaying server client.
    #[must_use]
    pub fn new(replayer: SharedReplayer) -> Self {
        Self { replayer }
    }
}

impl ServerApi for ReplayingServerApi {
    fn submit_commit<'a>(
        &'a self,
        _assignment_id: i64,
        _submission: &'a CommitSubmission,
    ) -> ApiFuture<'a, Commit> {
        let output = next_output(&self.replayer, "api", "submit_commit");
        Box::pin(async move {
            replay_result(output, "api::submit_commit").map_err(GrindError::Transport)
        })
    }
}
