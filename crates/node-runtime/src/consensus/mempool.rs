//! # Mempool
//!
//! FIFO pool of transactions admitted by `CheckTx`.
//!
//! ## Data Structures
//!
//! - `by_hash`: lookup by SHA-256 tx hash, rejects duplicates
//! - `order`: arrival order, which is also proposal order
//!
//! The pool itself never calls the application. The engine checks a
//! transaction against the pool limits, asks `CheckTx` without holding the
//! pool lock, then inserts.

use std::collections::{HashMap, VecDeque};

use shared_types::{CheckResult, Transaction, TxHash};
use thiserror::Error;

use crate::container::MempoolConfig;

/// Reasons a transaction is not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MempoolError {
    #[error("Transaction {0} is already in the mempool")]
    Duplicate(TxHash),

    #[error("Mempool is full ({capacity} transactions)")]
    Full { capacity: usize },

    #[error("Transaction of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("Transaction rejected by application (code {code}): {log}")]
    Rejected { code: u32, log: String },
}

/// A transaction waiting for a block.
#[derive(Debug, Clone)]
pub struct PooledTx {
    pub tx: Transaction,
    pub sender: String,
    pub priority: i64,
}

#[derive(Debug)]
pub struct Mempool {
    config: MempoolConfig,
    by_hash: HashMap<TxHash, PooledTx>,
    order: VecDeque<TxHash>,
}

impl Mempool {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            by_hash: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Pool-side admission checks, before the application is asked.
    pub fn precheck(&self, tx: &Transaction) -> Result<TxHash, MempoolError> {
        if tx.len() > self.config.max_tx_bytes {
            return Err(MempoolError::TooLarge {
                size: tx.len(),
                max: self.config.max_tx_bytes,
            });
        }
        let hash = tx.hash();
        if self.contains(&hash) {
            return Err(MempoolError::Duplicate(hash));
        }
        if self.len() >= self.config.size {
            return Err(MempoolError::Full {
                capacity: self.config.size,
            });
        }
        Ok(hash)
    }

    /// Insert a transaction the application accepted.
    ///
    /// Limits are checked again since the lock was released while the
    /// application ran.
    pub fn insert(&mut self, tx: Transaction, check: &CheckResult) -> Result<TxHash, MempoolError> {
        if !check.is_ok() {
            return Err(MempoolError::Rejected {
                code: check.code,
                log: check.log.clone(),
            });
        }
        let hash = self.precheck(&tx)?;
        self.by_hash.insert(
            hash,
            PooledTx {
                tx,
                sender: check.sender.clone(),
                priority: check.priority,
            },
        );
        self.order.push_back(hash);
        Ok(hash)
    }

    /// Transactions in arrival order whose total size fits `max_bytes`.
    /// Stops at the first transaction that does not fit. Nothing is removed.
    pub fn reap(&self, max_bytes: i64) -> Vec<Transaction> {
        let mut total: i64 = 0;
        self.order
            .iter()
            .filter_map(|hash| self.by_hash.get(hash))
            .take_while(|pooled| {
                total = total.saturating_add(pooled.tx.len() as i64);
                max_bytes < 0 || total <= max_bytes
            })
            .map(|pooled| pooled.tx.clone())
            .collect()
    }

    /// Every pooled transaction, in arrival order.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.reap(-1)
    }

    /// Drop transactions included in a committed block.
    pub fn remove_committed(&mut self, committed: &[Transaction]) {
        for tx in committed {
            self.by_hash.remove(&tx.hash());
        }
        let by_hash = &self.by_hash;
        self.order.retain(|hash| by_hash.contains_key(hash));
    }

    /// Drop transactions a recheck rejected.
    pub fn evict(&mut self, hashes: &[TxHash]) {
        for hash in hashes {
            self.by_hash.remove(hash);
        }
        let by_hash = &self.by_hash;
        self.order.retain(|hash| by_hash.contains_key(hash));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted() -> CheckResult {
        CheckResult {
            code: 0,
            sender: "s".into(),
            priority: 10,
            log: String::new(),
        }
    }

    fn txs(raw: &[&str]) -> Vec<Transaction> {
        raw.iter().map(|tx| Transaction::from(*tx)).collect()
    }

    fn pool(size: usize, max_tx_bytes: usize) -> Mempool {
        Mempool::new(MempoolConfig {
            size,
            max_tx_bytes,
            recheck: true,
        })
    }

    #[test]
    fn test_insert_and_reap_in_arrival_order() {
        let mut mempool = pool(10, 100);
        for tx in ["c=3", "a=1", "b=2"] {
            mempool.insert(tx.into(), &accepted()).unwrap();
        }
        let reaped = mempool.reap(-1);
        assert_eq!(reaped, txs(&["c=3", "a=1", "b=2"]));
        assert_eq!(mempool.len(), 3);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut mempool = pool(10, 100);
        mempool.insert("k=v".into(), &accepted()).unwrap();
        assert!(matches!(
            mempool.insert("k=v".into(), &accepted()),
            Err(MempoolError::Duplicate(_))
        ));
        assert_eq!(mempool.len(), 1);
    }

    #[test]
    fn test_full_and_oversize_rejected() {
        let mut mempool = pool(1, 4);
        assert!(matches!(
            mempool.precheck(&"too-long".into()),
            Err(MempoolError::TooLarge { size: 8, max: 4 })
        ));
        mempool.insert("a=1".into(), &accepted()).unwrap();
        assert_eq!(
            mempool.precheck(&"b=2".into()),
            Err(MempoolError::Full { capacity: 1 })
        );
    }

    #[test]
    fn test_rejected_check_not_inserted() {
        let mut mempool = pool(10, 100);
        let rejected = CheckResult {
            code: 1,
            log: "empty".into(),
            ..accepted()
        };
        assert!(matches!(
            mempool.insert("x".into(), &rejected),
            Err(MempoolError::Rejected { code: 1, .. })
        ));
        assert!(mempool.is_empty());
    }

    #[test]
    fn test_reap_respects_byte_limit() {
        let mut mempool = pool(10, 100);
        for tx in ["aaaa", "bbbb", "c"] {
            mempool.insert(tx.into(), &accepted()).unwrap();
        }
        assert_eq!(mempool.reap(8).len(), 2);
        assert_eq!(mempool.reap(3).len(), 0);
    }

    #[test]
    fn test_remove_committed_and_evict() {
        let mut mempool = pool(10, 100);
        let hashes: Vec<TxHash> = ["a=1", "b=2", "c=3"]
            .iter()
            .map(|tx| mempool.insert((*tx).into(), &accepted()).unwrap())
            .collect();

        mempool.remove_committed(&txs(&["a=1"]));
        assert_eq!(mempool.snapshot(), txs(&["b=2", "c=3"]));

        mempool.evict(&hashes[2..]);
        assert_eq!(mempool.snapshot(), txs(&["b=2"]));
    }
}
