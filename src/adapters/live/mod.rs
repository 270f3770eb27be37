//! Live adapters for real external interactions.

pub mod clock;
pub mod filesystem;
pub mod server_api;
