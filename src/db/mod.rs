//! Persistence layer for Uptrail.
//!
//! Two independent sinks: an append-only SQLite log (authoritative) and a
//! bounded JSON snapshot (cache for fast reads). [`Recorder`] writes to both.

mod models;
mod recorder;
mod snapshot;
mod store;

pub use models::*;
pub use recorder::*;
pub use snapshot::*;
pub use store::*;
