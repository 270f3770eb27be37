//! Service context bundling the client-side port trait objects.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::server_api::LiveServerApi;
use crate::adapters::recording::{
    RecordingClock, RecordingFileSystem, RecordingServerApi, SharedRecorder,
};
use crate::adapters::replaying::{ReplayingClock, ReplayingFileSystem, ReplayingServerApi};
use crate::cassette::format::Cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::cassette::replayer::CassetteReplayer;
use crate::config::ClientConfig;
use crate::ports::{Clock, FileSystem, ServerApi};

/// Bundles the ports the `grind` tool talks through.
///
/// Constructors wire up different adapter implementations (live,
/// recording, replaying).
pub struct ServiceContext {
    /// Clock for obtaining the current time.
    pub clock: Box<dyn Clock>,
    /// Filesystem for the workspace and rc file.
    pub fs: Box<dyn FileSystem>,
    /// Client for the commit server.
    pub api: Box<dyn ServerApi>,
    recorder: Option<SharedRecorder>,
}

impl ServiceContext {
    /// Creates a context from explicit port implementations.
    #[must_use]
    pub fn from_parts(
        clock: Box<dyn Clock>,
        fs: Box<dyn FileSystem>,
        api: Box<dyn ServerApi>,
    ) -> Self {
        Self { clock, fs, api, recorder: None }
    }

    /// Creates a live context talking to the configured server.
    #[must_use]
    pub fn live(config: &ClientConfig) -> Self {
        Self::from_parts(
            Box::new(LiveClock),
            Box::new(LiveFileSystem),
            Box::new(LiveServerApi::new(config)),
        )
    }

    /// Creates a live context that also records every port call.
    ///
    /// The cassette is written to `path` by [`ServiceContext::finish`].
    #[must_use]
    pub fn recording(config: &ClientConfig, path: &Path, name: &str) -> Self {
        let recorder: SharedRecorder = Arc::new(Mutex::new(CassetteRecorder::new(path, name)));
        Self {
            clock: Box::new(RecordingClock::new(Box::new(LiveClock), Arc::clone(&recorder))),
            fs: Box::new(RecordingFileSystem::new(Box::new(LiveFileSystem), Arc::clone(&recorder))),
            api: Box::new(RecordingServerApi::new(
                Box::new(LiveServerApi::new(config)),
                Arc::clone(&recorder),
            )),
            recorder: Some(recorder),
        }
    }

    /// Wraps the ports of `inner` so every call is recorded to `path`.
    #[must_use]
    pub fn recording_over(inner: Self, path: &Path, name: &str) -> Self {
        let recorder: SharedRecorder = Arc::new(Mutex::new(CassetteRecorder::new(path, name)));
        Self {
            clock: Box::new(RecordingClock::new(inner.clock, Arc::clone(&recorder))),
            fs: Box::new(RecordingFileSystem::new(inner.fs, Arc::clone(&recorder))),
            api: Box::new(RecordingServerApi::new(inner.api, Arc::clone(&recorder))),
            recorder: Some(recorder),
        }
    }

    /// Creates a context that serves every port from a cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be read or parsed.
    pub fn replaying(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
        let cassette = Cassette::from_yaml(&content)
            .map_err(|e| format!("Failed to load cassette file {}: {e}", path.display()))?;

        let replayer = Arc::new(Mutex::new(CassetteReplayer::new(&cassette)));
        Ok(Self::from_parts(
            Box::new(ReplayingClock::new(Arc::clone(&replayer))),
            Box::new(ReplayingFileSystem::new(Arc::clone(&replayer))),
            Box::new(ReplayingServerApi::new(replayer)),
        ))
    }

    /// Releases the ports and writes the cassette, if recording.
    ///
    /// Returns the cassette path when one was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be written.
    pub fn finish(self) -> Result<Option<PathBuf>, String> {
        let Self { clock, fs, api, recorder } = self;
        drop((clock, fs, api));
        let Some(recorder) = recorder else {
            return Ok(None);
        };
        let recorder = Arc::try_unwrap(recorder)
            .map_err(|_| "Recording adapters still hold the recorder".to_string())?
            .into_inner()
            .map_err(|e| format!("Recorder lock poisoned: {e}"))?;
        let path =
            recorder.finish().map_err(|e| format!("Failed to write cassette: {e}"))?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Interaction;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn replaying_context_serves_every_port_from_one_cassette() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.cassette.yaml");
        let cassette = Cassette {
            name: "test".into(),
            recorded_at: Utc::now(),
            tool_version: "0.1.0".into(),
            interactions: vec![
                Interaction {
                    seq: 0,
                    port: "clock".into(),
                    method: "now".into(),
                    input: json!(null),
                    output: json!("2024-06-15T10:30:00Z"),
                },
                Interaction {
                    seq: 1,
                    port: "fs".into(),
                    method: "walk_files".into(),
                    input: json!({"path": "/work"}),
                    output: json!({"Ok": ["main.py"]}),
                },
            ],
        };
        std::fs::write(&path, serde_yaml::to_string(&cassette).unwrap()).unwrap();

        let ctx = ServiceContext::replaying(&path).unwrap();
        assert_eq!(ctx.clock.now().to_rfc3339(), "2024-06-15T10:30:00+00:00");
        assert_eq!(ctx.fs.walk_files(Path::new("/elsewhere")).unwrap(), vec!["main.py"]);
        assert_eq!(ctx.finish().unwrap(), None);
    }

    #[test]
    fn missing_cassette_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServiceContext::replaying(&dir.path().join("absent.yaml")).err().unwrap();
        assert!(err.contains("Failed to read cassette file"));
    }
}
