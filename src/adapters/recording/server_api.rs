//! Recording adapter for the `ServerApi` port.

use serde::Serialize;

use super::{record_result, SharedRecorder};
use crate::model::{Commit, CommitSubmission};
use crate::ports::{ApiFuture, ServerApi};

/// Records server calls while delegating to an inner client.
pub struct RecordingServerApi {
    inner: Box<dyn ServerApi>,
    recorder: SharedRecorder,
}

impl RecordingServerApi {
    /// Creates a recording client wrapping `inner`.
    pub fn new(inner: Box<dyn ServerApi>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
struct SubmitInput<'a> {
    assignment_id: i64,
    submission: &'a CommitSubmission,
}

impl ServerApi for RecordingServerApi {
    fn submit_commit<'a>(
        &'a self,
        assignment_id: i64,
        submission: &'a CommitSubmission,
    ) -> ApiFuture<'a, Commit> {
        Box::pin(async move {
            let result = self.inner.submit_commit(assignment_id, submission).await;
            let input = SubmitInput { assignment_id, submission };
            record_result(&self.recorder, "api", "submit_commit", &input, &result);
            result
        })
    }
}
