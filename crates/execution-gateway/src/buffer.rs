//! Owned buffers handed across the gateway boundary.
//!
//! The engine allocates, the caller releases. Releasing happens in `Drop`,
//! so a buffer can never be freed twice and is freed on every exit path of
//! the caller, including early returns on decode errors.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counts buffers issued by an engine and released by its callers.
#[derive(Debug, Clone, Default)]
pub struct BufferLedger {
    inner: Arc<LedgerCounters>,
}

#[derive(Debug, Default)]
struct LedgerCounters {
    issued: AtomicU64,
    released: AtomicU64,
}

impl BufferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a buffer whose release is recorded in this ledger.
    pub fn issue(&self, hex: impl Into<String>) -> GatewayBuffer {
        self.inner.issued.fetch_add(1, Ordering::SeqCst);
        GatewayBuffer {
            hex: hex.into(),
            ledger: Some(self.clone()),
        }
    }

    pub fn issued(&self) -> u64 {
        self.inner.issued.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Buffers handed out and not yet dropped by their owner.
    pub fn outstanding(&self) -> u64 {
        self.issued().saturating_sub(self.released())
    }

    fn release(&self) {
        self.inner.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A hex-encoded byte string owned by the caller of a gateway operation.
pub struct GatewayBuffer {
    hex: String,
    ledger: Option<BufferLedger>,
}

impl GatewayBuffer {
    /// A buffer not tracked by any ledger.
    pub fn untracked(hex: impl Into<String>) -> Self {
        Self {
            hex: hex.into(),
            ledger: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    pub fn len(&self) -> usize {
        self.hex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hex.is_empty()
    }

    /// Scoped access: run `f` on the contents, then release the buffer.
    pub fn read<T>(self, f: impl FnOnce(&str) -> T) -> T {
        f(&self.hex)
    }
}

impl Drop for GatewayBuffer {
    fn drop(&mut self) {
        if let Some(ledger) = self.ledger.take() {
            ledger.release();
        }
    }
}

impl fmt::Debug for GatewayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GatewayBuffer({:?})", self.hex)
    }
}
