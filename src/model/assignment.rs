//! A student's assignment to a problem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Links a user to a problem; commits are grouped per assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Row identity.
    pub id: i64,
    /// Student the assignment belongs to.
    #[serde(rename = "userID")]
    pub user_id: i64,
    /// Problem being worked on.
    #[serde(rename = "problemID")]
    pub problem_id: i64,
    /// When the assignment was created.
    pub created_at: DateTime<Utc>,
}
