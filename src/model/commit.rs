//! Commits, report cards, and execution transcripts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of transcript events stored with a commit.
pub const TRANSCRIPT_EVENT_COUNT_LIMIT: usize = 500;

/// Maximum total bytes of transcript stream data stored with a commit.
pub const TRANSCRIPT_DATA_LIMIT: usize = 100_000;

/// One persisted submission session for an assignment step.
///
/// Mutable while open; never modified again once closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Row identity; 0 until first saved.
    pub id: i64,
    /// Owning assignment.
    #[serde(rename = "assignmentID")]
    pub assignment_id: i64,
    /// One-based step the files were submitted for.
    pub problem_step_number: i64,
    /// Submitting user.
    #[serde(rename = "userID")]
    pub user_id: i64,
    /// Requested operation, may be empty.
    #[serde(default)]
    pub action: String,
    /// Whether the session is finished.
    #[serde(default)]
    pub closed: bool,
    /// Free-text comment.
    #[serde(default)]
    pub comment: String,
    /// Fraction of the report card that passed.
    #[serde(default)]
    pub score: f64,
    /// Grading result.
    #[serde(default)]
    pub report_card: Option<ReportCard>,
    /// File name to contents.
    #[serde(default)]
    pub submission: BTreeMap<String, String>,
    /// Bounded execution events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<EventMessage>,
    /// When the session started.
    pub created_at: DateTime<Utc>,
    /// Last write to the session.
    pub updated_at: DateTime<Utc>,
}

/// The payload a client sends to create or extend a commit.
///
/// Identity, ownership, closure, and timestamps are decided by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSubmission {
    /// One-based step the files belong to.
    pub problem_step_number: i64,
    /// File name to contents.
    #[serde(default)]
    pub submission: BTreeMap<String, String>,
    /// Requested operation, may be empty.
    #[serde(default)]
    pub action: String,
    /// Free-text comment.
    #[serde(default)]
    pub comment: String,
    /// Grading result, when the submission comes back from a grader.
    #[serde(default)]
    pub report_card: Option<ReportCard>,
    /// Execution events, when the submission comes back from a grader.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<EventMessage>,
}

/// Outcome of a single graded test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The test passed.
    Passed,
    /// The test ran and failed.
    Failed,
    /// The test could not run.
    Error,
    /// The test was not run.
    Skipped,
}

/// A single graded test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportCardResult {
    /// Test name.
    pub name: String,
    /// What happened.
    pub outcome: Outcome,
    /// Failure output or other detail.
    #[serde(default)]
    pub details: String,
}

/// Grading result attached to a commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    /// Overall verdict.
    #[serde(default)]
    pub passed: bool,
    /// Summary shown to the student.
    #[serde(default)]
    pub note: String,
    /// Wall-clock seconds spent grading.
    #[serde(default)]
    pub duration_secs: f64,
    /// Per-test results.
    #[serde(default)]
    pub results: Vec<ReportCardResult>,
}

impl ReportCard {
    /// Fraction of results that passed, in `[0, 1]`.
    ///
    /// A card with no individual results scores 1.0 if it passed, else 0.0.
    #[must_use]
    pub fn score(&self) -> f64 {
        if self.results.is_empty() {
            return if self.passed { 1.0 } else { 0.0 };
        }
        let passed = self.results.iter().filter(|r| r.outcome == Outcome::Passed).count();
        #[allow(clippy::cast_precision_loss)]
        let score = passed as f64 / self.results.len() as f64;
        score
    }
}

/// One event from running a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    /// When the event happened.
    pub time: DateTime<Utc>,
    /// Event kind, e.g. `exec`, `stdout`, `exit`.
    pub event: String,
    /// Command line for `exec` events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exec_command: Vec<String>,
    /// Output for stream events.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stream_data: String,
    /// Exit status for `exit` events.
    #[serde(default)]
    pub exit_status: i32,
}

/// Truncates a transcript to the event-count and data-size limits.
///
/// Events are kept in order until either limit would be exceeded.
/// Returns the kept events and whether anything was dropped.
#[must_use]
pub fn bound_transcript(events: Vec<EventMessage>) -> (Vec<EventMessage>, bool) {
    let total = events.len();
    let mut data = 0;
    let mut kept = Vec::with_capacity(total.min(TRANSCRIPT_EVENT_COUNT_LIMIT));
    for event in events {
        if kept.len() == TRANSCRIPT_EVENT_COUNT_LIMIT
            || data + event.stream_data.len() > TRANSCRIPT_DATA_LIMIT
        {
            break;
        }
        data += event.stream_data.len();
        kept.push(event);
    }
    let truncated = kept.len() < total;
    (kept, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: &str) -> EventMessage {
        EventMessage {
            time: "2024-01-01T00:00:00Z".parse().unwrap(),
            event: "stdout".into(),
            exec_command: Vec::new(),
            stream_data: data.into(),
            exit_status: 0,
        }
    }

    fn result(outcome: Outcome) -> ReportCardResult {
        ReportCardResult { name: "t".into(), outcome, details: String::new() }
    }

    #[test]
    fn commit_uses_wire_field_names() {
        let json = r#"{
            "id": 3, "assignmentID": 9, "problemStepNumber": 1, "userID": 4,
            "submission": {"main.py": "print(1)\n"},
            "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
        }"#;
        let commit: Commit = serde_json::from_str(json).unwrap();
        assert_eq!(commit.assignment_id, 9);
        assert_eq!(commit.user_id, 4);
        assert!(!commit.closed);
        assert!(commit.report_card.is_none());

        let back = serde_json::to_value(&commit).unwrap();
        assert_eq!(back["assignmentID"], 9);
        assert!(back.get("transcript").is_none());
    }

    #[test]
    fn report_card_score_is_passed_fraction() {
        assert!(ReportCard::default().score().abs() < f64::EPSILON);
        let card = ReportCard {
            results: vec![result(Outcome::Passed), result(Outcome::Failed), result(Outcome::Passed), result(Outcome::Skipped)],
            ..ReportCard::default()
        };
        assert!((card.score() - 0.5).abs() < f64::EPSILON);

        let passed = ReportCard { passed: true, ..ReportCard::default() };
        assert!((passed.score() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn transcript_is_capped_by_count() {
        let events: Vec<_> = (0..TRANSCRIPT_EVENT_COUNT_LIMIT + 20).map(|_| event("x")).collect();
        let (kept, truncated) = bound_transcript(events);
        assert_eq!(kept.len(), TRANSCRIPT_EVENT_COUNT_LIMIT);
        assert!(truncated);
    }

    #[test]
    fn transcript_is_capped_by_data() {
        let big = "y".repeat(60_000);
        let (kept, truncated) = bound_transcript(vec![event(&big), event(&big), event("z")]);
        assert_eq!(kept.len(), 1);
        assert!(truncated);

        let (kept, truncated) = bound_transcript(vec![event("a"), event("b")]);
        assert_eq!(kept.len(), 2);
        assert!(!truncated);
    }
}
