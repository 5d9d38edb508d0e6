//! # abci-bridge
//!
//! The adapter a BFT consensus engine installs as its application.
//!
//! ## Architecture
//!
//! ```text
//! consensus engine ──Application──→ BridgeAdapter ──ExecutionGateway──→ engine
//!        ↑                               │
//!        └──────── responses ────────────┘
//! ```
//!
//! ### Block Execution State Machine
//!
//! ```text
//! Uninitialized ──Info──→ Idle ──BeginBlock(h)──→ BlockOpen(h)
//!                          ↑                         │ DeliverTx*
//!                          │                         ↓
//!                          └────────Commit──── BlockClosed(h) ←─EndBlock
//! ```
//!
//! Any fatal error moves the adapter to `Halted`; every later lifecycle call
//! is refused. The runner is expected to terminate the process and let the
//! `Info` handshake recover on restart.
//!
//! ### Two Pipelines
//!
//! - Block lifecycle (`BeginBlock` … `Commit`) is serialised by one mutex.
//! - `CheckTx` never takes that mutex and only sees committed state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use abci_bridge::{Application, BridgeAdapter, BridgeConfig, RequestInfo};
//! use execution_gateway::{KvStoreGateway, MemoryStore};
//!
//! let gateway = KvStoreGateway::open(MemoryStore::new())?;
//! let app = BridgeAdapter::new(gateway, BridgeConfig::default());
//! let info = app.info(RequestInfo::default())?;
//! ```

pub mod adapter;
pub mod application;
pub mod config;
pub mod error;
pub mod state;
pub mod types;

pub use adapter::BridgeAdapter;
pub use application::Application;
pub use config::BridgeConfig;
pub use error::{AbortOnFatal, AppResult, FatalHandler, ProtocolError};
pub use state::{BlockPhase, ExecutionState};
pub use types::*;
