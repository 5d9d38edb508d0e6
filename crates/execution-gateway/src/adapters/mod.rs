//! Adapters implementing the gateway port and its durability backends.

mod kv_store;
#[cfg(any(test, feature = "test-utils"))]
mod recording;
mod store;

pub use kv_store::KvStoreGateway;
#[cfg(any(test, feature = "test-utils"))]
pub use recording::{GatewayCall, RecordingGateway};
pub use store::{JsonFileStore, MemoryStore, StateStore};
