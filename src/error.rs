//! Error taxonomy shared by the client tooling and the commit server.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by workspace tooling, signing, and commit sessions.
#[derive(Debug, Error)]
pub enum GrindError {
    /// Malformed identifiers, empty submissions, invalid problem content.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The assignment, commit, or problem does not exist in the requested scope.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A problem signature did not match its content.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Persistence or transaction failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Metadata file missing or unparseable, problem directory unidentifiable.
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Whitelisted files that were not found on disk.
    #[error("Missing files in {}: {}", dir.display(), missing.join(", "))]
    MissingFiles {
        /// The problem directory that was searched.
        dir: PathBuf,
        /// Every whitelisted name that was not found, sorted.
        missing: Vec<String>,
    },

    /// Network or protocol failure talking to the server.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Coarse category of a [`GrindError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input; never retried.
    Validation,
    /// Absent in the requested scope.
    NotFound,
    /// Signature mismatch; always fatal.
    Integrity,
    /// Persistence failure.
    Storage,
    /// Client-side workspace problem.
    Workspace,
    /// Network failure.
    Transport,
}

impl ErrorKind {
    /// HTTP status code a transport layer should report for this category.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::Validation | Self::Workspace => 400,
            Self::NotFound => 404,
            Self::Transport => 502,
            Self::Integrity | Self::Storage => 500,
        }
    }
}

impl GrindError {
    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Workspace(_) | Self::MissingFiles { .. } => ErrorKind::Workspace,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }
}

impl From<rusqlite::Error> for GrindError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(format!("sqlite: {value}"))
    }
}

impl From<serde_json::Error> for GrindError {
    fn from(value: serde_json::Error) -> Self {
        Self::Storage(format!("json column: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_lists_every_name() {
        let err = GrindError::MissingFiles {
            dir: PathBuf::from("/work/hello"),
            missing: vec!["main.py".into(), "util.py".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("/work/hello"));
        assert!(msg.contains("main.py, util.py"));
        assert_eq!(err.kind(), ErrorKind::Workspace);
    }

    #[test]
    fn kinds_map_to_http_status() {
        assert_eq!(GrindError::Validation("x".into()).kind().http_status(), 400);
        assert_eq!(GrindError::NotFound("x".into()).kind().http_status(), 404);
        assert_eq!(GrindError::Storage("x".into()).kind().http_status(), 500);
        assert_eq!(GrindError::Integrity("x".into()).kind().http_status(), 500);
    }

    #[test]
    fn sqlite_errors_become_storage_errors() {
        let err: GrindError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
