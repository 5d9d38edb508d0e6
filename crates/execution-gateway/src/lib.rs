//! # execution-gateway
//!
//! The call boundary through which the bridge drives the execution engine.
//!
//! ## Architecture
//!
//! ```text
//! BridgeAdapter ──ExecutionGateway──→ [engine]
//!                   query_info / check_tx
//!                   begin_block / deliver_tx / end_block / commit
//! ```
//!
//! Every operation is deterministic. Strings cross the boundary as
//! hex-encoded [`GatewayBuffer`]s whose ownership moves to the caller; the
//! buffer is released when the caller drops it, and a [`BufferLedger`]
//! counts outstanding buffers so leaks are visible in tests.
//!
//! ## Reference Engine
//!
//! [`KvStoreGateway`] is a small key/value state machine that honours the
//! contract: `check_tx` reads committed state only, block effects are staged
//! until `commit`, and the committed snapshot goes through a [`StateStore`]
//! before the new app hash is published.

pub mod adapters;
pub mod buffer;
pub mod domain;
pub mod error;
pub mod ports;

pub use adapters::{JsonFileStore, KvStoreGateway, MemoryStore, StateStore};
#[cfg(any(test, feature = "test-utils"))]
pub use adapters::{GatewayCall, RecordingGateway};
pub use buffer::{BufferLedger, GatewayBuffer};
pub use domain::{KvCode, KvLimits, Snapshot};
pub use error::{GatewayError, GatewayResult};
pub use ports::{ExecutionGateway, GatewayInfo};
