//! # Block Store
//!
//! Append-only JSON-lines log at `<home>/data/blocks.jsonl`.
//!
//! ```text
//! {"type":"block","height":1,"time":1700000000,"proposer":"…","txs":["…"]}
//! {"type":"commit","height":1,"app_hash":"…"}
//! ```
//!
//! A block record is written before the block is executed and a commit
//! record after `Commit` returned. A block without a commit record is the
//! one in flight when the node stopped; the handshake replays it.
//!
//! A final line cut short by a crash is dropped on open. Any other
//! malformed line is corruption.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared_types::{AppHash, BlockHeight, Transaction};
use thiserror::Error;
use tracing::{info, warn};

/// Block store errors.
#[derive(Debug, Error)]
pub enum BlockStoreError {
    #[error("Block log I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Block log corrupted at line {line}: {reason}")]
    Corrupted { line: usize, reason: String },

    #[error("Block {actual} out of order, expected {expected}")]
    OutOfOrder {
        expected: BlockHeight,
        actual: BlockHeight,
    },

    #[error("Block log ends at height {0}, which has no successor")]
    HeightOverflow(BlockHeight),

    #[error("No block recorded at height {0}")]
    UnknownBlock(BlockHeight),

    #[error("Block {0} already has a commit record")]
    AlreadyCommitted(BlockHeight),
}

/// One line of the block log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockRecord {
    Block {
        height: BlockHeight,
        time: u64,
        #[serde(with = "hex::serde")]
        proposer: Vec<u8>,
        txs: Vec<Transaction>,
    },
    Commit {
        height: BlockHeight,
        app_hash: AppHash,
    },
}

/// A recorded block and, once committed, its app hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlock {
    pub height: BlockHeight,
    pub time: u64,
    pub proposer: Vec<u8>,
    pub txs: Vec<Transaction>,
    pub app_hash: Option<AppHash>,
}

pub struct BlockStore {
    path: PathBuf,
    file: File,
    blocks: BTreeMap<BlockHeight, StoredBlock>,
}

impl BlockStore {
    /// Open or create the log and index every record in it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BlockStoreError> {
        let path = path.into();
        let io_err = |source| BlockStoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(e)),
        };

        let (blocks, valid_len) = index_records(&contents)?;
        if valid_len < contents.len() {
            warn!(
                path = %path.display(),
                dropped_bytes = contents.len() - valid_len,
                "Dropping truncated final record from block log"
            );
            truncate(&path, valid_len as u64).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        let store = Self { path, file, blocks };
        info!(
            path = %store.path.display(),
            height = store.height(),
            "Opened block store"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Height of the last recorded block, committed or not. `0` if empty.
    pub fn height(&self) -> BlockHeight {
        self.blocks.keys().next_back().copied().unwrap_or(0)
    }

    /// Height of the first recorded block.
    pub fn base(&self) -> BlockHeight {
        self.blocks.keys().next().copied().unwrap_or(0)
    }

    pub fn block(&self, height: BlockHeight) -> Option<&StoredBlock> {
        self.blocks.get(&height)
    }

    pub fn app_hash(&self, height: BlockHeight) -> Option<&AppHash> {
        self.blocks.get(&height).and_then(|b| b.app_hash.as_ref())
    }

    /// Most recent block with a commit record.
    pub fn last_commit(&self) -> Option<&StoredBlock> {
        self.blocks.values().rev().find(|b| b.app_hash.is_some())
    }

    pub fn append_block(
        &mut self,
        height: BlockHeight,
        time: u64,
        proposer: Vec<u8>,
        txs: Vec<Transaction>,
    ) -> Result<(), BlockStoreError> {
        check_next_height(&self.blocks, height)?;
        let record = BlockRecord::Block {
            height,
            time,
            proposer,
            txs,
        };
        self.write_record(&record)?;
        apply_record(&mut self.blocks, record).map_err(|reason| BlockStoreError::Corrupted {
            line: self.blocks.len() + 1,
            reason,
        })
    }

    pub fn append_commit(
        &mut self,
        height: BlockHeight,
        app_hash: AppHash,
    ) -> Result<(), BlockStoreError> {
        match self.blocks.get(&height) {
            None => return Err(BlockStoreError::UnknownBlock(height)),
            Some(block) if block.app_hash.is_some() => {
                return Err(BlockStoreError::AlreadyCommitted(height))
            }
            Some(_) => {}
        }
        let record = BlockRecord::Commit { height, app_hash };
        self.write_record(&record)?;
        if let BlockRecord::Commit { height, app_hash } = record {
            if let Some(block) = self.blocks.get_mut(&height) {
                block.app_hash = Some(app_hash);
            }
        }
        Ok(())
    }

    fn write_record(&mut self, record: &BlockRecord) -> Result<(), BlockStoreError> {
        let mut line = serde_json::to_string(record).map_err(|e| BlockStoreError::Corrupted {
            line: 0,
            reason: e.to_string(),
        })?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.sync_data())
            .map_err(|source| BlockStoreError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Index every complete record. Returns the index and the byte length of
/// the well-formed prefix.
fn index_records(
    contents: &str,
) -> Result<(BTreeMap<BlockHeight, StoredBlock>, usize), BlockStoreError> {
    let mut blocks = BTreeMap::new();
    let mut offset = 0;
    let mut lines = contents.split_inclusive('\n').enumerate().peekable();

    while let Some((index, raw)) = lines.next() {
        let line_no = index + 1;
        let is_last = lines.peek().is_none();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            offset += raw.len();
            continue;
        }

        match serde_json::from_str::<BlockRecord>(trimmed) {
            Ok(record) => {
                apply_record(&mut blocks, record).map_err(|reason| BlockStoreError::Corrupted {
                    line: line_no,
                    reason,
                })?;
                offset += raw.len();
            }
            Err(_) if is_last && !raw.ends_with('\n') => break,
            Err(e) => {
                return Err(BlockStoreError::Corrupted {
                    line: line_no,
                    reason: e.to_string(),
                })
            }
        }
    }
    Ok((blocks, offset))
}

fn check_next_height(
    blocks: &BTreeMap<BlockHeight, StoredBlock>,
    height: BlockHeight,
) -> Result<(), BlockStoreError> {
    match blocks.keys().next_back() {
        Some(&last) => {
            let expected = last
                .checked_add(1)
                .ok_or(BlockStoreError::HeightOverflow(last))?;
            if height == expected {
                Ok(())
            } else {
                Err(BlockStoreError::OutOfOrder {
                    expected,
                    actual: height,
                })
            }
        }
        None if height < 1 => Err(BlockStoreError::OutOfOrder {
            expected: 1,
            actual: height,
        }),
        _ => Ok(()),
    }
}

fn apply_record(
    blocks: &mut BTreeMap<BlockHeight, StoredBlock>,
    record: BlockRecord,
) -> Result<(), String> {
    match record {
        BlockRecord::Block {
            height,
            time,
            proposer,
            txs,
        } => {
            check_next_height(blocks, height).map_err(|e| e.to_string())?;
            blocks.insert(
                height,
                StoredBlock {
                    height,
                    time,
                    proposer,
                    txs,
                    app_hash: None,
                },
            );
            Ok(())
        }
        BlockRecord::Commit { height, app_hash } => match blocks.get_mut(&height) {
            Some(block) if block.app_hash.is_none() => {
                block.app_hash = Some(app_hash);
                Ok(())
            }
            Some(_) => Err(format!("duplicate commit record for height {height}")),
            None => Err(format!("commit record for unknown height {height}")),
        },
    }
}

fn truncate(path: &Path, len: u64) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn hash(byte: u8) -> AppHash {
        AppHash::new(vec![byte; 32])
    }

    #[test]
    fn test_append_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data/blocks.jsonl");
        {
            let mut store = BlockStore::open(&path).unwrap();
            assert_eq!(store.height(), 0);
            store
                .append_block(1, 100, vec![1], vec!["a=1".into()])
                .unwrap();
            store.append_commit(1, hash(1)).unwrap();
            store.append_block(2, 101, vec![1], vec![]).unwrap();
        }

        let store = BlockStore::open(&path).unwrap();
        assert_eq!(store.height(), 2);
        assert_eq!(store.app_hash(1), Some(&hash(1)));
        assert_eq!(store.app_hash(2), None);
        assert_eq!(store.last_commit().map(|b| b.height), Some(1));
        assert_eq!(
            store.block(1).unwrap().txs,
            vec![Transaction::from("a=1")]
        );
    }

    #[test]
    fn test_first_block_may_start_above_one() {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::open(dir.path().join("blocks.jsonl")).unwrap();
        store.append_block(5, 0, vec![], vec![]).unwrap();
        assert_eq!(store.base(), 5);
        assert!(matches!(
            store.append_block(7, 0, vec![], vec![]),
            Err(BlockStoreError::OutOfOrder {
                expected: 6,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_no_block_after_max_height() {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::open(dir.path().join("blocks.jsonl")).unwrap();
        store.append_block(BlockHeight::MAX, 0, vec![], vec![]).unwrap();
        assert!(matches!(
            store.append_block(BlockHeight::MAX, 0, vec![], vec![]),
            Err(BlockStoreError::HeightOverflow(BlockHeight::MAX))
        ));
        assert_eq!(store.height(), BlockHeight::MAX);
    }

    #[test]
    fn test_commit_rules() {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::open(dir.path().join("blocks.jsonl")).unwrap();
        assert!(matches!(
            store.append_commit(1, hash(1)),
            Err(BlockStoreError::UnknownBlock(1))
        ));
        store.append_block(1, 0, vec![], vec![]).unwrap();
        store.append_commit(1, hash(1)).unwrap();
        assert!(matches!(
            store.append_commit(1, hash(2)),
            Err(BlockStoreError::AlreadyCommitted(1))
        ));
    }

    #[test]
    fn test_truncated_tail_is_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks.jsonl");
        {
            let mut store = BlockStore::open(&path).unwrap();
            store.append_block(1, 0, vec![], vec![]).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"type":"commit","hei"#).unwrap();
        drop(file);

        let mut store = BlockStore::open(&path).unwrap();
        assert_eq!(store.height(), 1);
        assert_eq!(store.app_hash(1), None);
        store.append_commit(1, hash(1)).unwrap();

        let store = BlockStore::open(&path).unwrap();
        assert_eq!(store.app_hash(1), Some(&hash(1)));
    }

    #[test]
    fn test_corrupted_middle_line_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks.jsonl");
        fs::write(
            &path,
            "not json\n{\"type\":\"block\",\"height\":1,\"time\":0,\"proposer\":\"\",\"txs\":[]}\n",
        )
        .unwrap();
        assert!(matches!(
            BlockStore::open(&path),
            Err(BlockStoreError::Corrupted { line: 1, .. })
        ));
    }

    #[test]
    fn test_gap_in_log_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks.jsonl");
        fs::write(
            &path,
            concat!(
                "{\"type\":\"block\",\"height\":1,\"time\":0,\"proposer\":\"\",\"txs\":[]}\n",
                "{\"type\":\"block\",\"height\":3,\"time\":0,\"proposer\":\"\",\"txs\":[]}\n",
            ),
        )
        .unwrap();
        assert!(matches!(
            BlockStore::open(&path),
            Err(BlockStoreError::Corrupted { line: 2, .. })
        ));
    }
}
