//! Replaying adapter for the `FileSystem` port.

use std::path::Path;

use super::{next_output, replay_result, SharedReplayer};
use crate::ports::filesystem::FileSystem;

/// Serves recorded filesystem results; nothing touches the disk.
pub struct ReplayingFileSystem {
    replayer: SharedReplayer,
}

impl ReplayingFileSystem {
    /// Creates a replaying filesystem.
    #[must_use]
    pub fn new(replayer: SharedReplayer) -> Self {
        Self { replayer }
    }
}

impl FileSystem for ReplayingFileSystem {
    fn read_to_string(
        &self,
        _path: &Path,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let output = next_output(&self.replayer, "fs", "read_to_string");
        Ok(replay_result(output, "fs::read_to_string")?)
    }

    fn write(
        &self,
        _path: &Path,
        _contents: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let output = next_output(&self.replayer, "fs", "write");
        Ok(replay_result(output, "fs::write")?)
    }

    fn exists(&self, _path: &Path) -> bool {
        let output = next_output(&self.replayer, "fs", "exists");
        output.as_bool().expect("fs::exists: expected boolean output")
    }

    fn walk_files(
        &self,
        _root: &Path,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let output = next_output(&self.replayer, "fs", "walk_files");
        Ok(replay_result(output, "fs::walk_files")?)
    }
}
