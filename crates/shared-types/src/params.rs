//! Consensus parameters carried in genesis and `InitChain`.

use serde::{Deserialize, Serialize};

use crate::entities::KeyType;

/// Chain-wide consensus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConsensusParams {
    pub block: BlockParams,
    pub validator: ValidatorParams,
}

impl ConsensusParams {
    /// Defaults, restricted to the given validator key type.
    pub fn for_key_type(key_type: KeyType) -> Self {
        Self {
            validator: ValidatorParams {
                pub_key_types: vec![key_type],
            },
            ..Default::default()
        }
    }
}

/// Block size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParams {
    /// Maximum block size in bytes.
    pub max_bytes: i64,
    /// Maximum gas per block; -1 means unlimited.
    pub max_gas: i64,
}

impl Default for BlockParams {
    fn default() -> Self {
        Self {
            max_bytes: 22_020_096, // 21 MiB
            max_gas: -1,
        }
    }
}

/// Which validator key types the chain accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorParams {
    pub pub_key_types: Vec<KeyType>,
}

impl Default for ValidatorParams {
    fn default() -> Self {
        Self {
            pub_key_types: vec![KeyType::Ed25519],
        }
    }
}
