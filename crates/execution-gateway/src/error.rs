//! Error types for the execution gateway.

use shared_types::BlockHeight;
use thiserror::Error;

/// Failures reported by an execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{operation} called with no open block")]
    NoOpenBlock { operation: &'static str },

    #[error("Block {height} is already open")]
    BlockAlreadyOpen { height: BlockHeight },

    #[error("Block {height} was already ended")]
    BlockAlreadyEnded { height: BlockHeight },

    #[error("Commit called before end_block for height {height}")]
    BlockNotEnded { height: BlockHeight },

    #[error("Invalid block height: expected {expected}, got {actual}")]
    HeightMismatch {
        expected: BlockHeight,
        actual: BlockHeight,
    },

    #[error("Height {height} has no successor")]
    HeightOverflow { height: BlockHeight },

    #[error("State store error: {0}")]
    Storage(String),

    #[error("Corrupted state snapshot: {0}")]
    Corrupted(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
