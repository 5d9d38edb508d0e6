//! # Block Execution State Machine
//!
//! Pure bookkeeping for the lifecycle pipeline. Every transition validates
//! its precondition and either moves to the next phase or returns a
//! [`ProtocolError`]; the adapter halts on any error, so a rejected call
//! never leaves the machine half-advanced.
//!
//! ```text
//! Uninitialized ──info──→ Idle ──begin_block(h)──→ BlockOpen(h)
//!                          ↑                          │ deliver_tx*
//!                          │                          ↓
//!                          └──committed(h)──── BlockClosed(h) ←─end_block(h)
//! ```

use std::fmt;

use shared_types::BlockHeight;

use crate::error::{AppResult, ProtocolError};

/// Where the lifecycle pipeline currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPhase {
    /// `Info` has not run yet.
    Uninitialized,
    /// Between blocks.
    Idle,
    /// `BeginBlock(h)` accepted; transactions may be delivered.
    BlockOpen(BlockHeight),
    /// `EndBlock(h)` accepted; waiting for `Commit`.
    BlockClosed(BlockHeight),
    /// A fatal error occurred. Terminal.
    Halted,
}

impl fmt::Display for BlockPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockPhase::Uninitialized => f.write_str("uninitialized"),
            BlockPhase::Idle => f.write_str("idle"),
            BlockPhase::BlockOpen(h) => write!(f, "block {h} open"),
            BlockPhase::BlockClosed(h) => write!(f, "block {h} closed"),
            BlockPhase::Halted => f.write_str("halted"),
        }
    }
}

/// Lifecycle state guarded by the adapter's pipeline mutex.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    phase: BlockPhase,
    last_committed: BlockHeight,
    next_height: BlockHeight,
    init_chain_done: bool,
    any_block_started: bool,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionState {
    pub fn new() -> Self {
        Self {
            phase: BlockPhase::Uninitialized,
            last_committed: 0,
            next_height: 1,
            init_chain_done: false,
            any_block_started: false,
        }
    }

    pub fn phase(&self) -> BlockPhase {
        self.phase
    }

    pub fn last_committed(&self) -> BlockHeight {
        self.last_committed
    }

    /// Height the next `BeginBlock` must carry.
    pub fn next_height(&self) -> BlockHeight {
        self.next_height
    }

    pub fn is_halted(&self) -> bool {
        self.phase == BlockPhase::Halted
    }

    /// Record the engine's last committed height.
    ///
    /// The first call moves `Uninitialized → Idle`. Later calls change
    /// nothing but must agree with what the bridge itself committed.
    pub fn on_info(&mut self, gateway_height: BlockHeight) -> AppResult<()> {
        let next_height = gateway_height
            .checked_add(1)
            .filter(|_| gateway_height >= 0)
            .ok_or(ProtocolError::InvalidGatewayHeight {
                height: gateway_height,
            })?;

        match self.phase {
            BlockPhase::Uninitialized => {
                self.last_committed = gateway_height;
                self.next_height = next_height;
                self.phase = BlockPhase::Idle;
                Ok(())
            }
            BlockPhase::Halted => Err(ProtocolError::Halted { operation: "Info" }),
            _ if gateway_height != self.last_committed => Err(ProtocolError::HeightDivergence {
                bridge: self.last_committed,
                gateway: gateway_height,
            }),
            _ => Ok(()),
        }
    }

    /// Accept genesis. `initial_height <= 0` means 1.
    pub fn on_init_chain(&mut self, initial_height: BlockHeight) -> AppResult<()> {
        self.expect_phase("InitChain", BlockPhase::Idle)?;

        if self.init_chain_done {
            return Err(ProtocolError::InitChainRejected {
                reason: "InitChain already ran".into(),
            });
        }
        if self.any_block_started || self.last_committed != 0 {
            return Err(ProtocolError::InitChainRejected {
                reason: format!("chain already at height {}", self.last_committed),
            });
        }

        self.next_height = initial_height.max(1);
        self.init_chain_done = true;
        Ok(())
    }

    pub fn begin_block(&mut self, height: BlockHeight) -> AppResult<()> {
        self.expect_phase("BeginBlock", BlockPhase::Idle)?;
        if height != self.next_height {
            return Err(ProtocolError::UnexpectedHeight {
                operation: "BeginBlock",
                expected: self.next_height,
                actual: height,
            });
        }
        self.phase = BlockPhase::BlockOpen(height);
        self.any_block_started = true;
        Ok(())
    }

    /// Returns the height of the open block.
    pub fn deliver_tx(&self) -> AppResult<BlockHeight> {
        match self.phase {
            BlockPhase::BlockOpen(height) => Ok(height),
            phase => Err(ProtocolError::Sequencing {
                operation: "DeliverTx",
                phase,
            }),
        }
    }

    pub fn end_block(&mut self, height: BlockHeight) -> AppResult<()> {
        let open = match self.phase {
            BlockPhase::BlockOpen(height) => height,
            phase => {
                return Err(ProtocolError::Sequencing {
                    operation: "EndBlock",
                    phase,
                })
            }
        };
        if height != open {
            return Err(ProtocolError::UnexpectedHeight {
                operation: "EndBlock",
                expected: open,
                actual: height,
            });
        }
        self.phase = BlockPhase::BlockClosed(open);
        Ok(())
    }

    /// Height of the closed block awaiting `Commit`.
    pub fn commit_height(&self) -> AppResult<BlockHeight> {
        match self.phase {
            BlockPhase::BlockClosed(height) => Ok(height),
            phase => Err(ProtocolError::Sequencing {
                operation: "Commit",
                phase,
            }),
        }
    }

    /// The engine durably committed `height`: back to `Idle`.
    pub fn committed(&mut self, height: BlockHeight) -> AppResult<()> {
        let next_height = height
            .checked_add(1)
            .ok_or(ProtocolError::HeightOverflow { height })?;
        self.last_committed = height;
        self.next_height = next_height;
        self.phase = BlockPhase::Idle;
        Ok(())
    }

    pub fn halt(&mut self) {
        self.phase = BlockPhase::Halted;
    }

    fn expect_phase(&self, operation: &'static str, expected: BlockPhase) -> AppResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ProtocolError::Sequencing {
                operation,
                phase: self.phase,
            })
        }
    }
}
