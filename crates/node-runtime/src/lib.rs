//! # Node Runtime Library
//!
//! Lifecycle management for a bridge node. The `node-runtime` binary is a
//! thin CLI over this library.
//!
//! ## Modules
//!
//! - `container/` - configuration and the process-wide `NodeContext`
//! - `keys` - node key and file-backed private validator
//! - `genesis/` - genesis document creation and loading
//! - `provision` - idempotent home directory setup
//! - `consensus/` - mempool, block log and the local consensus engine
//! - `telemetry` - log subscriber setup
//! - `runtime` - `NodeRuntime::start` / `stop`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use execution_gateway::{JsonFileStore, KvStoreGateway};
//! use node_runtime::NodeRuntime;
//!
//! let gateway = KvStoreGateway::open(JsonFileStore::new(state_path))?;
//! let node = NodeRuntime::start(&config_path, gateway).await?;
//! node.submit_tx("key=value")?;
//! node.stop().await?;
//! ```

#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_lines)]

pub mod consensus;
pub mod container;
pub mod genesis;
pub mod keys;
pub mod provision;
pub mod runtime;
pub mod telemetry;

pub use consensus::{ConsensusEngineError, LocalConsensusEngine, MempoolError};
pub use container::{ConfigError, ConfigOverride, NodeConfig, NodeContext, NodeMode};
pub use genesis::{GenesisBuilder, GenesisDoc};
pub use keys::{FilePV, NodeKey};
pub use provision::{provision, reset_all, ProvisionError, Provisioned};
pub use runtime::{LifecycleError, NodeRuntime, StartOptions};
