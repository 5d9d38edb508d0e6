//! # Genesis Module
//!
//! Genesis document creation and loading.
//!
//! ## Generated Genesis
//!
//! - Chain id: `test-chain-XXXXXX`
//! - Time: now
//! - Initial height: 1
//! - Validators: the local private validator with power 10, if any
//! - App hash: empty

pub mod builder;
pub mod doc;

pub use builder::{random_chain_id, GenesisBuilder, DEFAULT_VALIDATOR_POWER};
pub use doc::{GenesisDoc, GenesisError, GenesisValidator};
