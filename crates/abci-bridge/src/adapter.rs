//! Bridge Adapter
//!
//! Implements [`Application`] on top of an [`ExecutionGateway`].
//!
//! # Architecture
//! - Lifecycle calls (`Info`, `InitChain`, `BeginBlock` … `Commit`) hold the
//!   pipeline mutex for the whole call, gateway call included.
//! - `CheckTx` never touches the pipeline mutex.
//! - Every [`GatewayBuffer`] is decoded and released inside the call that
//!   received it.
//! - The first [`ProtocolError`] halts the adapter for good.

use execution_gateway::{ExecutionGateway, GatewayBuffer};
use parking_lot::Mutex;
use shared_types::{AppHash, BlockHeight, CheckResult, DeliverResult, CODE_OK};
use tracing::{debug, error, info, warn};

use crate::application::Application;
use crate::config::BridgeConfig;
use crate::error::{AppResult, ProtocolError};
use crate::state::{BlockPhase, ExecutionState};
use crate::types::*;

/// Consensus-facing adapter over one execution engine.
pub struct BridgeAdapter<G: ExecutionGateway> {
    gateway: G,
    pipeline: Mutex<ExecutionState>,
    config: BridgeConfig,
}

impl<G: ExecutionGateway> BridgeAdapter<G> {
    pub fn new(gateway: G, config: BridgeConfig) -> Self {
        Self {
            gateway,
            pipeline: Mutex::new(ExecutionState::new()),
            config,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn phase(&self) -> BlockPhase {
        self.pipeline.lock().phase()
    }

    pub fn last_committed_height(&self) -> BlockHeight {
        self.pipeline.lock().last_committed()
    }

    /// Run one lifecycle call under the pipeline mutex. Any error halts.
    fn lifecycle<T>(
        &self,
        operation: &'static str,
        call: impl FnOnce(&mut ExecutionState) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut state = self.pipeline.lock();
        if state.is_halted() {
            return Err(ProtocolError::Halted { operation });
        }

        let result = call(&mut state);
        if let Err(e) = &result {
            error!(operation, phase = %state.phase(), error = %e, "Protocol violation, halting adapter");
            state.halt();
        }
        result
    }
}

/// Decode an app hash buffer and release it.
fn decode_app_hash(operation: &'static str, buffer: GatewayBuffer) -> AppResult<AppHash> {
    buffer
        .read(AppHash::from_hex)
        .map_err(|source| ProtocolError::Decode { operation, source })
}

impl<G: ExecutionGateway> Application for BridgeAdapter<G> {
    fn info(&self, request: RequestInfo) -> AppResult<ResponseInfo> {
        self.lifecycle("Info", |state| {
            let reported = self
                .gateway
                .query_info()
                .map_err(|e| ProtocolError::gateway("Info", e))?;

            let (height, app_hash) = match reported {
                Some(info) => {
                    let height = info.last_block_height;
                    (height, decode_app_hash("Info", info.last_block_app_hash)?)
                }
                None => (0, AppHash::empty()),
            };
            state.on_info(height)?;

            info!(
                consensus_version = %request.version,
                last_block_height = height,
                last_block_app_hash = %app_hash,
                "Info handshake"
            );

            Ok(ResponseInfo {
                data: "abci-bridge".to_string(),
                version: self.config.version.clone(),
                app_version: self.config.app_version,
                last_block_height: height,
                last_block_app_hash: app_hash,
            })
        })
    }

    fn init_chain(&self, request: RequestInitChain) -> AppResult<ResponseInitChain> {
        self.lifecycle("InitChain", |state| {
            state.on_init_chain(request.initial_height)?;
            info!(
                chain_id = %request.chain_id,
                initial_height = state.next_height(),
                validators = request.validators.len(),
                "InitChain"
            );
            Ok(ResponseInitChain::default())
        })
    }

    fn check_tx(&self, request: RequestCheckTx) -> ResponseCheckTx {
        let sender = request.tx.hash().short();
        let priority = self.config.check_priority;

        match self.gateway.check_tx(request.tx.as_bytes()) {
            Ok(code) => {
                let log = if code == CODE_OK {
                    String::new()
                } else {
                    format!("rejected by execution engine with code {code}")
                };
                debug!(tx = %sender, kind = ?request.kind, code, "CheckTx");
                CheckResult {
                    code,
                    sender,
                    priority,
                    log,
                }
            }
            Err(e) => {
                warn!(tx = %sender, error = %e, "CheckTx failed in execution engine");
                CheckResult {
                    code: CODE_CHECK_FAILED,
                    sender,
                    priority,
                    log: e.to_string(),
                }
            }
        }
    }

    fn begin_block(&self, request: RequestBeginBlock) -> AppResult<ResponseBeginBlock> {
        self.lifecycle("BeginBlock", |state| {
            let height = request.header.height;
            state.begin_block(height)?;
            self.gateway
                .begin_block(height)
                .map_err(|e| ProtocolError::gateway("BeginBlock", e))?;
            debug!(height, chain_id = %request.header.chain_id, "BeginBlock");
            Ok(ResponseBeginBlock {})
        })
    }

    fn deliver_tx(&self, request: RequestDeliverTx) -> AppResult<ResponseDeliverTx> {
        self.lifecycle("DeliverTx", |state| {
            let height = state.deliver_tx()?;
            let code = self
                .gateway
                .deliver_tx(request.tx.as_bytes())
                .map_err(|e| ProtocolError::gateway("DeliverTx", e))?;

            let log = if code == CODE_OK {
                String::new()
            } else {
                format!("execution failed with code {code}")
            };
            debug!(height, tx = %request.tx.hash().short(), code, "DeliverTx");
            Ok(DeliverResult { code, log })
        })
    }

    fn end_block(&self, request: RequestEndBlock) -> AppResult<ResponseEndBlock> {
        self.lifecycle("EndBlock", |state| {
            state.end_block(request.height)?;
            self.gateway
                .end_block()
                .map_err(|e| ProtocolError::gateway("EndBlock", e))?;
            debug!(height = request.height, "EndBlock");
            Ok(ResponseEndBlock::default())
        })
    }

    fn commit(&self) -> AppResult<ResponseCommit> {
        self.lifecycle("Commit", |state| {
            let height = state.commit_height()?;
            let buffer = self
                .gateway
                .commit()
                .map_err(|e| ProtocolError::gateway("Commit", e))?
                .ok_or(ProtocolError::NullResult { operation: "Commit" })?;
            if buffer.is_empty() {
                return Err(ProtocolError::NullResult { operation: "Commit" });
            }
            let app_hash = decode_app_hash("Commit", buffer)?;

            state.committed(height)?;
            info!(height, app_hash = %app_hash, "Committed block");
            Ok(ResponseCommit {
                data: app_hash,
                retain_height: 0,
            })
        })
    }

    fn prepare_proposal(&self, request: RequestPrepareProposal) -> ResponsePrepareProposal {
        let limit = request.max_tx_bytes;
        let proposed = request.txs.len();
        let mut total: i64 = 0;

        let txs: Vec<_> = request
            .txs
            .into_iter()
            .take_while(|tx| {
                total = total.saturating_add(tx.len() as i64);
                limit < 0 || total <= limit
            })
            .collect();

        if txs.len() < proposed {
            debug!(
                height = request.height,
                kept = txs.len(),
                dropped = proposed - txs.len(),
                max_tx_bytes = limit,
                "PrepareProposal trimmed transactions"
            );
        }
        ResponsePrepareProposal { txs }
    }

    fn extend_vote(&self, _request: RequestExtendVote) -> ResponseExtendVote {
        ResponseExtendVote::default()
    }

    fn verify_vote_extension(
        &self,
        _request: RequestVerifyVoteExtension,
    ) -> ResponseVerifyVoteExtension {
        ResponseVerifyVoteExtension {
            status: VerifyStatus::Accept,
        }
    }

    fn query(&self, request: RequestQuery) -> ResponseQuery {
        debug!(path = %request.path, "Query not supported");
        ResponseQuery {
            code: CODE_UNSUPPORTED,
            log: "queries are not supported by this application".to_string(),
            ..ResponseQuery::default()
        }
    }

    fn list_snapshots(&self, _request: RequestListSnapshots) -> ResponseListSnapshots {
        ResponseListSnapshots::default()
    }

    fn offer_snapshot(&self, request: RequestOfferSnapshot) -> ResponseOfferSnapshot {
        debug!(
            height = request.snapshot.as_ref().map(|s| s.height),
            "State sync not supported, aborting snapshot offer"
        );
        ResponseOfferSnapshot {
            result: OfferSnapshotResult::Abort,
        }
    }

    fn load_snapshot_chunk(&self, _request: RequestLoadSnapshotChunk) -> ResponseLoadSnapshotChunk {
        ResponseLoadSnapshotChunk::default()
    }

    fn apply_snapshot_chunk(
        &self,
        _request: RequestApplySnapshotChunk,
    ) -> ResponseApplySnapshotChunk {
        ResponseApplySnapshotChunk {
            result: ApplySnapshotChunkResult::Abort,
            ..ResponseApplySnapshotChunk::default()
        }
    }
}
