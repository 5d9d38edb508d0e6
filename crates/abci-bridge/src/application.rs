//! The consensus-facing application interface.

use crate::error::AppResult;
use crate::types::*;

/// Every callback a consensus engine makes into its application.
///
/// All methods are required. Block-lifecycle methods return [`AppResult`]
/// because a failure there is fatal; the remaining methods always produce a
/// response, and hooks the application does not implement answer with an
/// explicit unsupported response instead of being left out.
///
/// Lifecycle calls for one height arrive strictly in the order
/// `BeginBlock`, `DeliverTx`*, `EndBlock`, `Commit`. `CheckTx` may arrive at
/// any time, concurrently with them.
pub trait Application: Send + Sync {
    // === Connection handshake ===

    fn info(&self, request: RequestInfo) -> AppResult<ResponseInfo>;

    fn init_chain(&self, request: RequestInitChain) -> AppResult<ResponseInitChain>;

    // === Mempool ===

    /// Admission check. Rejection is a non-zero code, never an error.
    fn check_tx(&self, request: RequestCheckTx) -> ResponseCheckTx;

    // === Block execution ===

    fn begin_block(&self, request: RequestBeginBlock) -> AppResult<ResponseBeginBlock>;

    fn deliver_tx(&self, request: RequestDeliverTx) -> AppResult<ResponseDeliverTx>;

    fn end_block(&self, request: RequestEndBlock) -> AppResult<ResponseEndBlock>;

    fn commit(&self) -> AppResult<ResponseCommit>;

    // === Proposals & vote extensions ===

    fn prepare_proposal(&self, request: RequestPrepareProposal) -> ResponsePrepareProposal;

    fn extend_vote(&self, request: RequestExtendVote) -> ResponseExtendVote;

    fn verify_vote_extension(
        &self,
        request: RequestVerifyVoteExtension,
    ) -> ResponseVerifyVoteExtension;

    // === Query & state sync ===

    fn query(&self, request: RequestQuery) -> ResponseQuery;

    fn list_snapshots(&self, request: RequestListSnapshots) -> ResponseListSnapshots;

    fn offer_snapshot(&self, request: RequestOfferSnapshot) -> ResponseOfferSnapshot;

    fn load_snapshot_chunk(&self, request: RequestLoadSnapshotChunk) -> ResponseLoadSnapshotChunk;

    fn apply_snapshot_chunk(&self, request: RequestApplySnapshotChunk)
        -> ResponseApplySnapshotChunk;
}
