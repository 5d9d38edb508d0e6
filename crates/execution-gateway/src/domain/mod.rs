//! Domain layer for the reference key/value engine.
//!
//! Pure logic, no locking and no I/O.

mod kv;
mod state;

pub use kv::*;
pub use state::*;
