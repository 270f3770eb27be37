//! Live adapter for the `ServerApi` port using the grinder HTTP API.

use reqwest::header::COOKIE;
use reqwest::{Client, StatusCode};

use crate::config::ClientConfig;
use crate::error::GrindError;
use crate::model::{Commit, CommitSubmission};
use crate::ports::server_api::{ApiFuture, ServerApi};

/// Live server client that calls `https://<host>/api/v2`.
pub struct LiveServerApi {
    client: Client,
    base_url: String,
    cookie: String,
}

impl LiveServerApi {
    /// Creates a client for the configured host and session cookie.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://{}/api/v2", config.host),
            cookie: config.cookie.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Maps a non-success response to the matching error category.
fn status_error(status: StatusCode, body: &str) -> GrindError {
    let msg = format!("server returned {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::NOT_FOUND => GrindError::NotFound(msg),
        StatusCode::BAD_REQUEST => GrindError::Validation(msg),
        _ => GrindError::Transport(msg),
    }
}

impl ServerApi for LiveServerApi {
    fn submit_commit<'a>(
        &'a self,
        assignment_id: i64,
        submission: &'a CommitSubmission,
    ) -> ApiFuture<'a, Commit> {
        Box::pin(async move {
            let url = self.url(&format!("/assignments/{assignment_id}/commits"));
            tracing::debug!(%url, files = submission.submission.len(), "posting commit");

            let response = self
                .client
                .post(&url)
                .header(COOKIE, &self.cookie)
                .json(submission)
                .send()
                .await
                .map_err(|e| GrindError::Transport(format!("request to {url} failed: {e}")))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| GrindError::Transport(format!("failed to read response: {e}")))?;

            if !status.is_success() {
                return Err(status_error(status, &text));
            }

            serde_json::from_str(&text)
                .map_err(|e| GrindError::Transport(format!("failed to parse commit: {e}")))
        })
    }
}
