//! Time source for commit timestamps and idle-timeout checks.

use chrono::{DateTime, Utc};

/// Source of "now" for the session manager and the `grind` tool.
///
/// Sessions read it once per submission; every timestamp written by that
/// submission uses the same reading.
pub trait Clock: Send + Sync {
    /// The current UTC time.
    fn now(&self) -> DateTime<Utc>;
}
