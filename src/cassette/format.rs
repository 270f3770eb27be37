//! Cassette data structures for recording and replaying interactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded call on a client port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Position in the whole recording, assigned by the recorder.
    pub seq: u64,
    /// Port name: `clock`, `fs` or `api`.
    pub port: String,
    /// Method name invoked on the port.
    pub method: String,
    /// Arguments, for reading the cassette; replay does not match on them.
    pub input: serde_json::Value,
    /// Returned value; fallible calls use `{"Ok": v}` / `{"Err": msg}`.
    pub output: serde_json::Value,
}

/// A recorded `grind` run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name, usually the command that was run.
    pub name: String,
    /// When the recording was written.
    pub recorded_at: DateTime<Utc>,
    /// `grind` version that produced the recording.
    pub tool_version: String,
    /// Interactions in call order.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Parses a cassette from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error string if the YAML does not describe a cassette.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("invalid cassette: {e}"))
    }
}
