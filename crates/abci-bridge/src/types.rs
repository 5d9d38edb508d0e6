//! Request and response shapes of the consensus-facing interface.
//!
//! Heights are `i64`, hashes are byte strings, transactions are opaque
//! bytes and result codes are `u32`, matching what the consensus engine
//! speaks.

use shared_types::{
    AppHash, BlockHeader, BlockHeight, CheckResult, CheckTxKind, ConsensusParams, DeliverResult,
    Transaction, ValidatorUpdate,
};

/// Code returned by hooks this bridge does not implement.
pub const CODE_UNSUPPORTED: u32 = 255;

/// Code returned by `CheckTx` when the execution engine could not answer.
pub const CODE_CHECK_FAILED: u32 = 254;

// =============================================================================
// INFO / INIT CHAIN
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub version: String,
    pub block_version: u64,
    pub p2p_version: u64,
    pub abci_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseInfo {
    pub data: String,
    pub version: String,
    pub app_version: u64,
    pub last_block_height: BlockHeight,
    pub last_block_app_hash: AppHash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInitChain {
    /// Genesis time, unix seconds.
    pub time: u64,
    pub chain_id: String,
    pub consensus_params: Option<ConsensusParams>,
    pub validators: Vec<ValidatorUpdate>,
    pub app_state_bytes: Vec<u8>,
    /// First height the chain will produce; `0` is treated as `1`.
    pub initial_height: BlockHeight,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseInitChain {
    pub consensus_params: Option<ConsensusParams>,
    pub validators: Vec<ValidatorUpdate>,
    pub app_hash: AppHash,
}

// =============================================================================
// MEMPOOL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCheckTx {
    pub tx: Transaction,
    pub kind: CheckTxKind,
}

pub type ResponseCheckTx = CheckResult;

// =============================================================================
// BLOCK EXECUTION
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestBeginBlock {
    pub hash: Vec<u8>,
    pub header: BlockHeader,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBeginBlock {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDeliverTx {
    pub tx: Transaction,
}

pub type ResponseDeliverTx = DeliverResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestEndBlock {
    pub height: BlockHeight,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseEndBlock {
    pub validator_updates: Vec<ValidatorUpdate>,
    pub consensus_param_updates: Option<ConsensusParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseCommit {
    /// App hash of the committed state.
    pub data: AppHash,
    /// Blocks below this height may be pruned; `0` retains everything.
    pub retain_height: BlockHeight,
}

// =============================================================================
// PROPOSALS & VOTE EXTENSIONS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPrepareProposal {
    pub height: BlockHeight,
    pub txs: Vec<Transaction>,
    pub max_tx_bytes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePrepareProposal {
    pub txs: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestExtendVote {
    pub hash: Vec<u8>,
    pub height: BlockHeight,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseExtendVote {
    pub vote_extension: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestVerifyVoteExtension {
    pub hash: Vec<u8>,
    pub validator_address: Vec<u8>,
    pub height: BlockHeight,
    pub vote_extension: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerifyStatus {
    #[default]
    Unknown,
    Accept,
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseVerifyVoteExtension {
    pub status: VerifyStatus,
}

// =============================================================================
// QUERY & STATE SYNC
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    pub data: Vec<u8>,
    pub path: String,
    pub height: BlockHeight,
    pub prove: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseQuery {
    pub code: u32,
    pub log: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub height: BlockHeight,
}

/// A state-sync snapshot descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub height: u64,
    pub format: u32,
    pub chunks: u32,
    pub hash: Vec<u8>,
    pub metadata: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestListSnapshots {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseListSnapshots {
    pub snapshots: Vec<Snapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOfferSnapshot {
    pub snapshot: Option<Snapshot>,
    pub app_hash: AppHash,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OfferSnapshotResult {
    #[default]
    Unknown,
    Accept,
    /// Abort state sync entirely; the consensus engine falls back to replay.
    Abort,
    Reject,
    RejectFormat,
    RejectSender,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseOfferSnapshot {
    pub result: OfferSnapshotResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLoadSnapshotChunk {
    pub height: u64,
    pub format: u32,
    pub chunk: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseLoadSnapshotChunk {
    pub chunk: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestApplySnapshotChunk {
    pub index: u32,
    pub chunk: Vec<u8>,
    pub sender: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplySnapshotChunkResult {
    #[default]
    Unknown,
    Accept,
    Abort,
    Retry,
    RetrySnapshot,
    RejectSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseApplySnapshotChunk {
    pub result: ApplySnapshotChunkResult,
    pub refetch_chunks: Vec<u32>,
    pub reject_senders: Vec<String>,
}
