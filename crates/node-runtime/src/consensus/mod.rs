//! # Consensus Module
//!
//! The local consensus engine the node runs the bridge adapter under.
//!
//! - `mempool` - FIFO of admitted transactions
//! - `block_store` - JSON-lines block and commit log
//! - `engine` - handshake, replay and block production

pub mod block_store;
pub mod engine;
pub mod error;
pub mod mempool;

pub use block_store::{BlockRecord, BlockStore, BlockStoreError, StoredBlock};
pub use engine::{LocalConsensusEngine, MempoolHandle};
pub use error::ConsensusEngineError;
pub use mempool::{Mempool, MempoolError, PooledTx};
