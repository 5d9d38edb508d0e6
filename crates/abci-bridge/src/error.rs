//! Fatal protocol errors raised by the bridge adapter.
//!
//! Any of these means the consensus engine and the execution engine can no
//! longer be trusted to agree. The adapter moves to `Halted` and the runner
//! terminates the process through a [`FatalHandler`]; the `Info` handshake
//! recovers on restart.

use execution_gateway::GatewayError;
use shared_types::{BlockHeight, HashDecodeError};
use thiserror::Error;

use crate::state::BlockPhase;

/// Errors returned by the block-lifecycle operations of [`crate::Application`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{operation} is not allowed while {phase}")]
    Sequencing {
        operation: &'static str,
        phase: BlockPhase,
    },

    #[error("{operation} for height {actual}, expected {expected}")]
    UnexpectedHeight {
        operation: &'static str,
        expected: BlockHeight,
        actual: BlockHeight,
    },

    #[error("InitChain rejected: {reason}")]
    InitChainRejected { reason: String },

    #[error("Execution engine reported invalid height {height}")]
    InvalidGatewayHeight { height: BlockHeight },

    #[error("Height {height} has no successor")]
    HeightOverflow { height: BlockHeight },

    #[error("Execution engine reports height {gateway}, bridge committed {bridge}")]
    HeightDivergence {
        bridge: BlockHeight,
        gateway: BlockHeight,
    },

    #[error("Malformed app hash from {operation}: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: HashDecodeError,
    },

    #[error("{operation} returned no result")]
    NullResult { operation: &'static str },

    #[error("Execution engine failed during {operation}: {source}")]
    Gateway {
        operation: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("{operation} refused: adapter halted after a fatal error")]
    Halted { operation: &'static str },
}

impl ProtocolError {
    /// Every protocol error ends the process.
    pub fn is_fatal(&self) -> bool {
        true
    }

    pub fn gateway(operation: &'static str, source: GatewayError) -> Self {
        Self::Gateway { operation, source }
    }
}

/// Result type for block-lifecycle operations.
pub type AppResult<T> = Result<T, ProtocolError>;

/// Turns a fatal protocol error into process termination.
///
/// Production runners install [`AbortOnFatal`]; tests install a handler that
/// records the error instead.
pub trait FatalHandler: Send + Sync {
    fn on_fatal(&self, error: &ProtocolError);
}

/// Logs the error and aborts the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortOnFatal;

impl FatalHandler for AbortOnFatal {
    fn on_fatal(&self, error: &ProtocolError) {
        tracing::error!(error = %error, "Fatal consensus/execution divergence, aborting");
        std::process::abort();
    }
}
