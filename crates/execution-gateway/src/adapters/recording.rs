//! Call-recording decorator for tests.

use parking_lot::Mutex;
use shared_types::BlockHeight;

use crate::buffer::GatewayBuffer;
use crate::error::GatewayResult;
use crate::ports::{ExecutionGateway, GatewayInfo};

/// One call observed at the gateway boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    QueryInfo,
    CheckTx(Vec<u8>),
    BeginBlock(BlockHeight),
    DeliverTx(Vec<u8>),
    EndBlock,
    Commit,
}

impl GatewayCall {
    /// True for calls that belong to the block-execution pipeline.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            GatewayCall::BeginBlock(_)
                | GatewayCall::DeliverTx(_)
                | GatewayCall::EndBlock
                | GatewayCall::Commit
        )
    }
}

/// Forwards every call to `inner` and records it first.
pub struct RecordingGateway<G> {
    inner: G,
    calls: Mutex<Vec<GatewayCall>>,
}

impl<G: ExecutionGateway> RecordingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// All calls so far, in arrival order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    /// Only the block-lifecycle calls, in arrival order.
    pub fn lifecycle_calls(&self) -> Vec<GatewayCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.is_lifecycle())
            .cloned()
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().push(call);
    }
}

impl<G: ExecutionGateway> ExecutionGateway for RecordingGateway<G> {
    fn query_info(&self) -> GatewayResult<Option<GatewayInfo>> {
        self.record(GatewayCall::QueryInfo);
        self.inner.query_info()
    }

    fn check_tx(&self, tx: &[u8]) -> GatewayResult<u32> {
        self.record(GatewayCall::CheckTx(tx.to_vec()));
        self.inner.check_tx(tx)
    }

    fn begin_block(&self, height: BlockHeight) -> GatewayResult<()> {
        self.record(GatewayCall::BeginBlock(height));
        self.inner.begin_block(height)
    }

    fn deliver_tx(&self, tx: &[u8]) -> GatewayResult<u32> {
        self.record(GatewayCall::DeliverTx(tx.to_vec()));
        self.inner.deliver_tx(tx)
    }

    fn end_block(&self) -> GatewayResult<()> {
        self.record(GatewayCall::EndBlock);
        self.inner.end_block()
    }

    fn commit(&self) -> GatewayResult<Option<GatewayBuffer>> {
        self.record(GatewayCall::Commit);
        self.inner.commit()
    }
}
