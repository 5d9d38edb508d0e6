//! # Node Container
//!
//! Process-wide state built once at start and passed explicitly.
//!
//! - `config` - validated [`NodeConfig`]
//! - `context` - [`NodeContext`]: config, genesis, node key, private validator

pub mod config;
pub mod context;

pub use config::{
    home_from_config_path, BaseConfig, ConfigError, ConfigOverride, ConsensusConfig, LogFormat,
    MempoolConfig, NodeConfig, NodeMode,
};
pub use context::NodeContext;
