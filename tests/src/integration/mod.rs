//! # Integration Scenarios
//!
//! Every scenario runs a full node (config, keys, genesis, block log,
//! consensus engine, bridge adapter, reference engine) in a temporary home.

pub mod fixtures;
pub mod node_flows;
pub mod recovery;
