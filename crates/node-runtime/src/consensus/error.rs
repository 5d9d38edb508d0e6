//! Consensus engine errors.

use abci_bridge::ProtocolError;
use shared_types::{AppHash, BlockHeight};
use thiserror::Error;
use tokio::task::JoinError;

use super::block_store::BlockStoreError;
use crate::keys::KeyError;

#[derive(Debug, Error)]
pub enum ConsensusEngineError {
    /// Fatal error raised by the application. Already handed to the
    /// engine's fatal handler.
    #[error("Application failed: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    BlockStore(#[from] BlockStoreError),

    #[error("Failed to update private validator state: {0}")]
    PrivValidator(#[from] KeyError),

    #[error("Application is at height {app_height} but the block log ends at {store_height}")]
    AppAheadOfStore {
        app_height: BlockHeight,
        store_height: BlockHeight,
    },

    #[error("App hash mismatch at height {height}: block log has {expected}, application returned {actual}")]
    AppHashMismatch {
        height: BlockHeight,
        expected: AppHash,
        actual: AppHash,
    },

    #[error("Height {height} has no successor")]
    HeightOverflow { height: BlockHeight },

    #[error("Block log has no block at height {height}")]
    MissingBlock { height: BlockHeight },

    #[error("Block production requested before the handshake")]
    HandshakeRequired,

    #[error("Block production worker panicked or was cancelled: {0}")]
    Worker(#[from] JoinError),
}
