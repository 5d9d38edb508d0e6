//! # Local Consensus Engine
//!
//! Single-validator driver that owns the application connection.
//!
//! ## Startup
//!
//! `handshake()` asks the application where it is and brings it level with
//! the block log:
//!
//! ```text
//! Info ─→ (app_height, app_hash)
//!   app_height > log height       → AppAheadOfStore
//!   app_height == 0               → InitChain(genesis)
//!   recorded hash at app_height   → must equal app_hash
//!   app_height+1 ..= log height   → replay through the full lifecycle
//! ```
//!
//! ## Production
//!
//! Every `consensus.timeout_commit_ms` the spawned task reaps the mempool,
//! runs `PrepareProposal`, records the block, executes it, records the
//! commit and updates the mempool.

use std::sync::Arc;
use std::time::Duration;

use abci_bridge::{
    AppResult, Application, FatalHandler, RequestBeginBlock, RequestCheckTx, RequestDeliverTx,
    RequestEndBlock, RequestInfo, RequestPrepareProposal,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use shared_types::{AppHash, BlockHeader, BlockHeight, CheckTxKind, Transaction, TxHash};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::block_store::{BlockStore, StoredBlock};
use super::error::ConsensusEngineError;
use super::mempool::{Mempool, MempoolError};
use crate::container::NodeContext;

/// Block protocol version announced in `Info`.
pub const BLOCK_PROTOCOL_VERSION: u64 = 11;

/// P2P protocol version announced in `Info`.
pub const P2P_PROTOCOL_VERSION: u64 = 8;

/// Application interface version announced in `Info`.
pub const ABCI_VERSION: &str = "0.17.0";

pub struct LocalConsensusEngine<A: Application + 'static> {
    app: Arc<A>,
    mempool: Arc<Mutex<Mempool>>,
    store: BlockStore,
    context: Arc<NodeContext>,
    fatal: Arc<dyn FatalHandler>,
    last_height: BlockHeight,
    last_app_hash: AppHash,
    handshake_done: bool,
}

impl<A: Application + 'static> LocalConsensusEngine<A> {
    pub fn new(
        app: Arc<A>,
        store: BlockStore,
        context: Arc<NodeContext>,
        fatal: Arc<dyn FatalHandler>,
    ) -> Self {
        let mempool = Mempool::new(context.config.mempool.clone());
        Self {
            app,
            mempool: Arc::new(Mutex::new(mempool)),
            store,
            context,
            fatal,
            last_height: 0,
            last_app_hash: AppHash::empty(),
            handshake_done: false,
        }
    }

    /// Handle for submitting transactions while the engine runs.
    pub fn mempool(&self) -> MempoolHandle<A> {
        MempoolHandle {
            app: Arc::clone(&self.app),
            mempool: Arc::clone(&self.mempool),
        }
    }

    pub fn last_height(&self) -> BlockHeight {
        self.last_height
    }

    pub fn last_app_hash(&self) -> &AppHash {
        &self.last_app_hash
    }

    pub fn block_store(&self) -> &BlockStore {
        &self.store
    }

    /// Bring the application level with the block log.
    pub fn handshake(&mut self) -> Result<(), ConsensusEngineError> {
        let response = self.fatal_on_error(self.app.info(RequestInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            block_version: BLOCK_PROTOCOL_VERSION,
            p2p_version: P2P_PROTOCOL_VERSION,
            abci_version: ABCI_VERSION.to_string(),
        }))?;
        let app_height = response.last_block_height;
        let store_height = self.store.height();

        info!(
            app_height,
            app_hash = %response.last_block_app_hash,
            store_height,
            "Handshake with application"
        );

        if app_height > store_height {
            return Err(ConsensusEngineError::AppAheadOfStore {
                app_height,
                store_height,
            });
        }

        let first_replay = if app_height == 0 {
            let request = self.context.genesis.init_chain_request();
            let response = self.fatal_on_error(self.app.init_chain(request))?;
            self.last_app_hash = if response.app_hash.is_empty() {
                self.context.genesis.app_hash.clone()
            } else {
                response.app_hash
            };
            self.context.genesis.first_height()
        } else {
            self.check_recorded_hash(app_height, response.last_block_app_hash.clone())?;
            self.last_height = app_height;
            self.last_app_hash = response.last_block_app_hash;
            app_height
                .checked_add(1)
                .ok_or(ConsensusEngineError::HeightOverflow { height: app_height })?
        };

        let mut replayed = 0;
        for height in first_replay..=store_height {
            let block = self
                .store
                .block(height)
                .cloned()
                .ok_or(ConsensusEngineError::MissingBlock { height })?;
            let app_hash = self.execute_block(&block)?;
            self.check_recorded_hash(height, app_hash)?;
            replayed += 1;
        }

        if replayed > 0 {
            info!(
                replayed,
                height = self.last_height,
                app_hash = %self.last_app_hash,
                "Replayed blocks from block log"
            );
        }
        self.handshake_done = true;
        Ok(())
    }

    /// Produce and commit the next block. Returns `None` when the height was
    /// skipped because the mempool is empty and empty blocks are disabled.
    pub fn produce_block(&mut self) -> Result<Option<BlockHeight>, ConsensusEngineError> {
        if !self.handshake_done {
            return Err(ConsensusEngineError::HandshakeRequired);
        }

        let height = self.next_height()?;
        let max_bytes = self.context.genesis.consensus_params.block.max_bytes;
        let candidates = self.mempool.lock().reap(max_bytes);
        if candidates.is_empty() && !self.context.config.consensus.create_empty_blocks {
            debug!(height, "Mempool empty, skipping height");
            return Ok(None);
        }

        let proposal = self.app.prepare_proposal(RequestPrepareProposal {
            height,
            txs: candidates,
            max_tx_bytes: max_bytes,
        });

        let time = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        self.store.append_block(
            height,
            time,
            self.context.proposer_address(),
            proposal.txs.clone(),
        )?;
        let block = StoredBlock {
            height,
            time,
            proposer: self.context.proposer_address(),
            txs: proposal.txs,
            app_hash: None,
        };

        let app_hash = self.execute_block(&block)?;
        self.store.append_commit(height, app_hash)?;

        if let Some(pv) = self.context.priv_validator() {
            pv.lock().record_signed(height)?;
        }

        self.mempool.lock().remove_committed(&block.txs);
        if self.context.config.mempool.recheck {
            self.recheck();
        }
        Ok(Some(height))
    }

    /// Run the production loop until `shutdown` flips to `true` or a block
    /// fails. Non-validators only wait for shutdown. `exited` flips to
    /// `true` when the task ends, however it ends.
    ///
    /// Blocks are produced on the blocking pool, since producing one syncs
    /// files to disk.
    pub fn spawn(
        self,
        mut shutdown: watch::Receiver<bool>,
        exited: watch::Sender<bool>,
    ) -> JoinHandle<Result<(), ConsensusEngineError>> {
        tokio::spawn(async move {
            let _exit = ExitSignal(exited);
            let mut engine = self;

            if !engine.context.is_validator() {
                info!("Not a validator, block production disabled");
                while !*shutdown.borrow() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
                return Ok(());
            }

            let period =
                Duration::from_millis(engine.context.config.consensus.timeout_commit_ms.max(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                last_height = engine.last_height,
                timeout_commit_ms = period.as_millis() as u64,
                "Block production started"
            );

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        let (returned, result) = tokio::task::spawn_blocking(move || {
                            let result = engine.produce_block();
                            (engine, result)
                        })
                        .await?;
                        engine = returned;
                        if let Err(e) = result {
                            error!(last_height = engine.last_height, error = %e, "Block production stopped");
                            return Err(e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!(height = engine.last_height, "Consensus engine stopped");
            Ok(())
        })
    }

    fn next_height(&self) -> Result<BlockHeight, ConsensusEngineError> {
        if self.last_height == 0 {
            return Ok(self.context.genesis.first_height());
        }
        self.last_height
            .checked_add(1)
            .ok_or(ConsensusEngineError::HeightOverflow {
                height: self.last_height,
            })
    }

    /// Drive one block through `BeginBlock` … `Commit`.
    fn execute_block(&mut self, block: &StoredBlock) -> Result<AppHash, ConsensusEngineError> {
        let header = BlockHeader {
            chain_id: self.context.genesis.chain_id.clone(),
            height: block.height,
            time: block.time,
            last_app_hash: self.last_app_hash.clone(),
            proposer_address: block.proposer.clone(),
        };
        let hash = block_hash(&header, &block.txs);

        self.fatal_on_error(self.app.begin_block(RequestBeginBlock { hash, header }))?;

        let mut failed = 0;
        for tx in &block.txs {
            let result = self.fatal_on_error(self.app.deliver_tx(RequestDeliverTx { tx: tx.clone() }))?;
            if !result.is_ok() {
                failed += 1;
                debug!(height = block.height, tx = %tx.hash().short(), code = result.code, log = %result.log, "Transaction failed");
            }
        }

        self.fatal_on_error(self.app.end_block(RequestEndBlock {
            height: block.height,
        }))?;
        let commit = self.fatal_on_error(self.app.commit())?;

        info!(
            height = block.height,
            txs = block.txs.len(),
            failed,
            app_hash = %commit.data,
            "Executed block"
        );
        self.last_height = block.height;
        self.last_app_hash = commit.data.clone();
        Ok(commit.data)
    }

    /// Compare against the block log, or fill in a missing commit record.
    fn check_recorded_hash(
        &mut self,
        height: BlockHeight,
        actual: AppHash,
    ) -> Result<(), ConsensusEngineError> {
        match self.store.block(height) {
            None => Err(ConsensusEngineError::MissingBlock { height }),
            Some(StoredBlock {
                app_hash: Some(expected),
                ..
            }) => {
                if *expected == actual {
                    Ok(())
                } else {
                    Err(ConsensusEngineError::AppHashMismatch {
                        height,
                        expected: expected.clone(),
                        actual,
                    })
                }
            }
            Some(_) => {
                warn!(height, app_hash = %actual, "Recording missing commit");
                self.store.append_commit(height, actual)?;
                Ok(())
            }
        }
    }

    fn recheck(&self) {
        let pending = self.mempool.lock().snapshot();
        if pending.is_empty() {
            return;
        }

        let rejected: Vec<TxHash> = pending
            .into_iter()
            .filter_map(|tx| {
                let check = self.app.check_tx(RequestCheckTx {
                    tx: tx.clone(),
                    kind: CheckTxKind::Recheck,
                });
                (!check.is_ok()).then(|| tx.hash())
            })
            .collect();

        if !rejected.is_empty() {
            debug!(evicted = rejected.len(), "Recheck evicted transactions");
            self.mempool.lock().evict(&rejected);
        }
    }

    fn fatal_on_error<T>(&self, result: AppResult<T>) -> Result<T, ConsensusEngineError> {
        result.map_err(|e| {
            self.fatal.on_fatal(&e);
            ConsensusEngineError::Protocol(e)
        })
    }
}

/// SHA-256 over the header fields and the transaction hashes.
fn block_hash(header: &BlockHeader, txs: &[Transaction]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(header.chain_id.as_bytes());
    hasher.update(header.height.to_be_bytes());
    hasher.update(header.time.to_be_bytes());
    hasher.update(header.last_app_hash.as_bytes());
    hasher.update(&header.proposer_address);
    for tx in txs {
        hasher.update(tx.hash().0);
    }
    hasher.finalize().to_vec()
}

/// Submits transactions to a running engine's mempool.
pub struct MempoolHandle<A: Application + 'static> {
    app: Arc<A>,
    mempool: Arc<Mutex<Mempool>>,
}

impl<A: Application + 'static> Clone for MempoolHandle<A> {
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            mempool: Arc::clone(&self.mempool),
        }
    }
}

impl<A: Application + 'static> MempoolHandle<A> {
    /// Admit a transaction through `CheckTx(New)`. The pool lock is not held
    /// while the application checks it.
    pub fn submit_tx(&self, tx: Transaction) -> Result<TxHash, MempoolError> {
        self.mempool.lock().precheck(&tx)?;

        let check = self.app.check_tx(RequestCheckTx {
            tx: tx.clone(),
            kind: CheckTxKind::New,
        });
        let hash = self.mempool.lock().insert(tx, &check)?;
        debug!(tx = %hash.short(), priority = check.priority, "Transaction admitted");
        Ok(hash)
    }

    pub fn len(&self) -> usize {
        self.mempool.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mempool.lock().is_empty()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.mempool.lock().snapshot()
    }
}


/// Sets the engine's exit flag on drop, so a panicking task flips it too.
struct ExitSignal(watch::Sender<bool>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}
