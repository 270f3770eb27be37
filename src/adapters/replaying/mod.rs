//! Replaying adapters that serve recorded interactions.

pub mod clock;
pub mod filesystem;
pub mod server_api;

pub use clock::ReplayingClock;
pub use filesystem::ReplayingFileSystem;
pub use server_api::ReplayingServerApi;

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;

use crate::cassette::replayer::CassetteReplayer;

/// Replayer shared by every adapter in one `ServiceContext`.
pub type SharedReplayer = Arc<Mutex<CassetteReplayer>>;

/// Takes the next recorded output for `port`/`method`.
pub(crate) fn next_output(replayer: &SharedReplayer, port: &str, method: &str) -> serde_json::Value {
    let mut guard = replayer.lock().expect("replayer lock poisoned");
    guard.next_output(port, method)
}

/// Decodes an output written by `recording::record_result`.
///
/// Mirror of `recording::record_result`: `{"Ok": v}` yields `Ok(v)`,
/// `{"Err": msg}` yields `Err(msg)`.
pub(crate) fn replay_result<T: DeserializeOwned>(
    output: serde_json::Value,
    context: &str,
) -> Result<T, String> {
    if let Some(err) = output.get("Err") {
        return Err(err.as_str().unwrap_or("unknown error").to_string());
    }
    let value = output.get("Ok").cloned().unwrap_or(serde_json::Value::Null);
    Ok(serde_json::from_value(value)
        .unwrap_or_else(|e| panic!("{context}: recorded output does not decode: {e}")))
}
