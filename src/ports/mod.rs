//! Port traits defining external boundaries.
//!
//! Client-side ports (time, filesystem, server API) are bundled into a
//! `ServiceContext`; server-side ports (commit and problem stores) are
//! handed to the session manager directly. Implementations live in
//! `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod server_api;
pub mod store;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use server_api::{ApiFuture, ServerApi};
pub use store::{CommitStore, CommitTx, ProblemStore, SignedProblem, Signer, TxWork};
