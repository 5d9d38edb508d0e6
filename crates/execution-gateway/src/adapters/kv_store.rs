//! # Key/Value Engine
//!
//! Reference execution engine behind the gateway boundary.
//!
//! - `key=value` transactions set `key`; bare transactions store themselves
//!   under their own bytes.
//! - Block effects are staged in a [`PendingBlock`] and become visible only
//!   after `commit` has persisted the new snapshot.
//! - `check_tx` never touches the pending block.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use shared_types::BlockHeight;
use tracing::{debug, info};

use crate::buffer::{BufferLedger, GatewayBuffer};
use crate::domain::{parse_tx, validate_tx, CommittedState, KvCode, KvLimits, PendingBlock};
use crate::error::{GatewayError, GatewayResult};
use crate::ports::{ExecutionGateway, GatewayInfo};

use super::store::StateStore;

/// Deterministic key/value execution engine.
pub struct KvStoreGateway<S: StateStore> {
    store: S,
    limits: KvLimits,
    committed: RwLock<Arc<CommittedState>>,
    pending: Mutex<Option<PendingBlock>>,
    ledger: BufferLedger,
}

impl<S: StateStore> KvStoreGateway<S> {
    /// Open the engine over `store`, restoring the last committed snapshot.
    pub fn open(store: S) -> GatewayResult<Self> {
        Self::open_with_limits(store, KvLimits::default())
    }

    pub fn open_with_limits(store: S, limits: KvLimits) -> GatewayResult<Self> {
        let committed = match store.load()? {
            Some(snapshot) => CommittedState::from_snapshot(snapshot)?,
            None => CommittedState::genesis(),
        };

        info!(
            height = committed.height,
            app_hash = %committed.app_hash,
            entries = committed.entries.len(),
            "Opened key/value execution state"
        );

        Ok(Self {
            store,
            limits,
            committed: RwLock::new(Arc::new(committed)),
            pending: Mutex::new(None),
            ledger: BufferLedger::new(),
        })
    }

    /// Ledger of app-hash buffers handed to callers.
    pub fn ledger(&self) -> &BufferLedger {
        &self.ledger
    }

    /// Read a committed value. Never sees staged effects.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.committed_state().get(key).map(<[u8]>::to_vec)
    }

    pub fn last_height(&self) -> BlockHeight {
        self.committed_state().height
    }

    fn committed_state(&self) -> Arc<CommittedState> {
        Arc::clone(&self.committed.read())
    }
}

impl<S: StateStore> ExecutionGateway for KvStoreGateway<S> {
    fn query_info(&self) -> GatewayResult<Option<GatewayInfo>> {
        let state = self.committed_state();
        if state.height == 0 {
            return Ok(None);
        }
        Ok(Some(GatewayInfo {
            last_block_height: state.height,
            last_block_app_hash: self.ledger.issue(state.app_hash.to_hex()),
        }))
    }

    fn check_tx(&self, tx: &[u8]) -> GatewayResult<u32> {
        Ok(validate_tx(tx, &self.limits).as_u32())
    }

    fn begin_block(&self, height: BlockHeight) -> GatewayResult<()> {
        let mut pending = self.pending.lock();
        if let Some(open) = pending.as_ref() {
            return Err(GatewayError::BlockAlreadyOpen {
                height: open.height,
            });
        }

        let last = self.committed_state().height;
        let expected = last
            .checked_add(1)
            .ok_or(GatewayError::HeightOverflow { height: last })?;
        // The first block may start above 1 when genesis sets an initial height.
        let valid = if last == 0 { height >= 1 } else { height == expected };
        if !valid {
            return Err(GatewayError::HeightMismatch {
                expected,
                actual: height,
            });
        }

        debug!(height, "begin_block");
        *pending = Some(PendingBlock::new(height));
        Ok(())
    }

    fn deliver_tx(&self, tx: &[u8]) -> GatewayResult<u32> {
        let mut pending = self.pending.lock();
        let block = match pending.as_mut() {
            Some(block) if !block.ended => block,
            Some(block) => {
                return Err(GatewayError::BlockAlreadyEnded {
                    height: block.height,
                })
            }
            None => {
                return Err(GatewayError::NoOpenBlock {
                    operation: "deliver_tx",
                })
            }
        };

        let code = validate_tx(tx, &self.limits);
        if code == KvCode::Ok {
            let (key, value) = parse_tx(tx);
            block.put(key, value);
        }
        debug!(height = block.height, code = code.as_u32(), "deliver_tx");
        Ok(code.as_u32())
    }

    fn end_block(&self) -> GatewayResult<()> {
        let mut pending = self.pending.lock();
        match pending.as_mut() {
            Some(block) if block.ended => Err(GatewayError::BlockAlreadyEnded {
                height: block.height,
            }),
            Some(block) => {
                block.ended = true;
                debug!(height = block.height, txs = block.tx_count, "end_block");
                Ok(())
            }
            None => Err(GatewayError::NoOpenBlock {
                operation: "end_block",
            }),
        }
    }

    fn commit(&self) -> GatewayResult<Option<GatewayBuffer>> {
        let mut pending = self.pending.lock();
        let block = match pending.take() {
            Some(block) if block.ended => block,
            Some(block) => {
                let height = block.height;
                *pending = Some(block);
                return Err(GatewayError::BlockNotEnded { height });
            }
            None => return Err(GatewayError::NoOpenBlock { operation: "commit" }),
        };

        let next = self.committed_state().apply(&block);
        if let Err(e) = self.store.persist(&next.to_snapshot()) {
            *pending = Some(block);
            return Err(e);
        }

        info!(
            height = next.height,
            txs = block.tx_count,
            app_hash = %next.app_hash,
            "Committed block"
        );

        let app_hash = next.app_hash.to_hex();
        *self.committed.write() = Arc::new(next);
        Ok(Some(self.ledger.issue(app_hash)))
    }
}
