//! Committed and staged state of the key/value engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{AppHash, BlockHeight, Hash};

use crate::error::GatewayError;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// State as of the last commit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommittedState {
    pub height: BlockHeight,
    pub app_hash: AppHash,
    pub entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl CommittedState {
    /// Nothing committed yet: height 0, empty hash.
    pub fn genesis() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Build the state that results from committing `block` on top of this one.
    pub fn apply(&self, block: &PendingBlock) -> CommittedState {
        let mut entries = self.entries.clone();
        for (key, value) in &block.changes {
            entries.insert(key.clone(), value.clone());
        }
        let root = state_root(&entries);
        CommittedState {
            height: block.height,
            app_hash: compute_app_hash(block.height, &root),
            entries,
        }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            last_block_height: self.height,
            last_block_app_hash: self.app_hash.clone(),
            entries: self
                .entries
                .iter()
                .map(|(key, value)| SnapshotEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild state from a snapshot, refusing one whose app hash does not
    /// match its contents.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, GatewayError> {
        if snapshot.last_block_height < 0 {
            return Err(GatewayError::Corrupted(format!(
                "negative height {}",
                snapshot.last_block_height
            )));
        }

        let entries: BTreeMap<Vec<u8>, Vec<u8>> = snapshot
            .entries
            .into_iter()
            .map(|e| (e.key, e.value))
            .collect();

        let expected = if snapshot.last_block_height == 0 {
            AppHash::empty()
        } else {
            compute_app_hash(snapshot.last_block_height, &state_root(&entries))
        };
        if expected != snapshot.last_block_app_hash {
            return Err(GatewayError::Corrupted(format!(
                "app hash {} does not match contents at height {} (recomputed {})",
                snapshot.last_block_app_hash, snapshot.last_block_height, expected
            )));
        }

        Ok(Self {
            height: snapshot.last_block_height,
            app_hash: snapshot.last_block_app_hash,
            entries,
        })
    }
}

/// Effects staged between `begin_block` and `commit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBlock {
    pub height: BlockHeight,
    pub changes: BTreeMap<Vec<u8>, Vec<u8>>,
    pub tx_count: usize,
    pub ended: bool,
}

impl PendingBlock {
    pub fn new(height: BlockHeight) -> Self {
        Self {
            height,
            changes: BTreeMap::new(),
            tx_count: 0,
            ended: false,
        }
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.changes.insert(key, value);
        self.tx_count += 1;
    }
}

/// Durable form of [`CommittedState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub last_block_height: BlockHeight,
    pub last_block_app_hash: AppHash,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(with = "hex::serde")]
    pub key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
}

/// Binary Merkle root over the sorted entries.
///
/// Leaves are `H(0x00 || len(key) || key || value)`, inner nodes
/// `H(0x01 || left || right)`; an odd node is carried up unchanged.
pub fn state_root(entries: &BTreeMap<Vec<u8>, Vec<u8>>) -> Hash {
    if entries.is_empty() {
        return Sha256::digest(b"").into();
    }

    let mut level: Vec<Hash> = entries
        .iter()
        .map(|(key, value)| {
            let mut hasher = Sha256::new();
            hasher.update([LEAF_PREFIX]);
            hasher.update((key.len() as u32).to_be_bytes());
            hasher.update(key);
            hasher.update(value);
            hasher.finalize().into()
        })
        .collect();

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = Sha256::new();
                    hasher.update([NODE_PREFIX]);
                    hasher.update(left);
                    hasher.update(right);
                    hasher.finalize().into()
                }
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }

    level[0]
}

/// App hash for a height: binds the state root to the height so every
/// committed block yields a distinct hash.
pub fn compute_app_hash(height: BlockHeight, root: &Hash) -> AppHash {
    let mut hasher = Sha256::new();
    hasher.update(height.to_be_bytes());
    hasher.update(root);
    AppHash::new(hasher.finalize().to_vec())
}
