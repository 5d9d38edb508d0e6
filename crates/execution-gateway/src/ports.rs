//! Driven port: what the bridge requires from an execution engine.

use shared_types::BlockHeight;

use crate::buffer::GatewayBuffer;
use crate::error::GatewayResult;

/// Last committed state as reported by the engine.
#[derive(Debug)]
pub struct GatewayInfo {
    pub last_block_height: BlockHeight,
    /// Hex-encoded app hash. Owned by the caller.
    pub last_block_app_hash: GatewayBuffer,
}

/// Execution engine call boundary.
///
/// Block-lifecycle operations (`begin_block` through `commit`) arrive
/// strictly sequentially from a single caller. `check_tx` and `query_info`
/// may arrive concurrently with them and must only observe committed state.
///
/// # Buffer ownership
/// Every [`GatewayBuffer`] returned here belongs to the caller from the
/// moment the call returns; the caller releases it by dropping it.
pub trait ExecutionGateway: Send + Sync {
    /// Last committed height and app hash, or `None` if nothing was ever
    /// committed.
    fn query_info(&self) -> GatewayResult<Option<GatewayInfo>>;

    /// Mempool admission check against committed state. Returns a result
    /// code; `0` admits.
    fn check_tx(&self, tx: &[u8]) -> GatewayResult<u32>;

    /// Start staging effects for `height`.
    fn begin_block(&self, height: BlockHeight) -> GatewayResult<()>;

    /// Execute one transaction in the open block. Returns a result code;
    /// `0` is success.
    fn deliver_tx(&self, tx: &[u8]) -> GatewayResult<u32>;

    /// No more transactions for the open block.
    fn end_block(&self) -> GatewayResult<()>;

    /// Durably persist the block and return the new app hash, hex-encoded.
    /// `None` means the engine produced no hash.
    fn commit(&self) -> GatewayResult<Option<GatewayBuffer>>;
}

impl<G: ExecutionGateway + ?Sized> ExecutionGateway for std::sync::Arc<G> {
    fn query_info(&self) -> GatewayResult<Option<GatewayInfo>> {
        (**self).query_info()
    }

    fn check_tx(&self, tx: &[u8]) -> GatewayResult<u32> {
        (**self).check_tx(tx)
    }

    fn begin_block(&self, height: BlockHeight) -> GatewayResult<()> {
        (**self).begin_block(height)
    }

    fn deliver_tx(&self, tx: &[u8]) -> GatewayResult<u32> {
        (**self).deliver_tx(tx)
    }

    fn end_block(&self) -> GatewayResult<()> {
        (**self).end_block()
    }

    fn commit(&self) -> GatewayResult<Option<GatewayBuffer>> {
        (**self).commit()
    }
}
