//! Cassettes: recorded client-port interactions replayed in tests.

pub mod format;
pub mod recorder;
pub mod replayer;
