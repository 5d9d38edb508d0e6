//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Chain**: `BlockHeight`, `AppHash`, `BlockHeader`
//! - **Transactions**: `Transaction`, `TxHash`, `CheckTxKind`
//! - **Results**: `CheckResult`, `DeliverResult`
//! - **Validators**: `KeyType`, `PublicKey`, `ValidatorUpdate`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::errors::{HashDecodeError, UnknownKeyType};

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// Height of a committed block. Consensus-owned, signed on the wire.
pub type BlockHeight = i64;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Result code for a successful check or delivery.
pub const CODE_OK: u32 = 0;

/// Commitment to the execution state after a height.
///
/// Produced only by `Commit`. The execution engine hands it over as a hex
/// string; an empty hash denotes a fresh chain.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct AppHash(Vec<u8>);

impl AppHash {
    /// Wrap raw hash bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The app hash of a chain that has never committed.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Decode a hex string from the execution engine.
    ///
    /// Accepts upper- and lower-case digits; rejects odd lengths and any
    /// non-hex character.
    pub fn from_hex(input: &str) -> Result<Self, HashDecodeError> {
        hex::decode(input)
            .map(Self)
            .map_err(|e| HashDecodeError::Malformed {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    /// Lower-case hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AppHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<empty>");
        }
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AppHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppHash({})", self)
    }
}

impl Serialize for AppHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AppHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AppHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Header fields the consensus engine passes with `BeginBlock`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Chain this block belongs to.
    pub chain_id: String,
    /// Height of the block being opened.
    pub height: BlockHeight,
    /// Unix timestamp (seconds) proposed for the block.
    pub time: u64,
    /// App hash committed by the previous height.
    pub last_app_hash: AppHash,
    /// Address of the proposing validator.
    pub proposer_address: Vec<u8>,
}

// =============================================================================
// CLUSTER B: TRANSACTIONS
// =============================================================================

/// An opaque transaction. The bridge never looks inside.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Transaction(Vec<u8>);

/// SHA-256 of the raw transaction bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash(pub Hash);

impl Transaction {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Content hash used for mempool de-duplication and logging.
    pub fn hash(&self) -> TxHash {
        TxHash(Sha256::digest(&self.0).into())
    }
}

impl From<&[u8]> for Transaction {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Transaction {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Transaction {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transaction({} bytes, {})", self.0.len(), self.hash())
    }
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map(Self).map_err(serde::de::Error::custom)
    }
}

impl TxHash {
    /// First eight bytes in hex, enough to tell transactions apart in logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.short())
    }
}

/// Why the mempool is asking about a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckTxKind {
    /// First time the transaction is seen.
    #[default]
    New,
    /// Re-validation of a pooled transaction after a commit.
    Recheck,
}

// =============================================================================
// CLUSTER C: RESULTS
// =============================================================================

/// Outcome of mempool admission.
///
/// `priority` is an ordering hint for the mempool and never affects
/// correctness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub code: u32,
    pub sender: String,
    pub priority: i64,
    pub log: String,
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

/// Outcome of executing one transaction inside a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverResult {
    pub code: u32,
    pub log: String,
}

impl DeliverResult {
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

// =============================================================================
// CLUSTER D: VALIDATORS
// =============================================================================

/// Signature scheme of a validator or node key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    #[default]
    Ed25519,
    Secp256k1,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
            KeyType::Secp256k1 => "secp256k1",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = UnknownKeyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(KeyType::Ed25519),
            "secp256k1" => Ok(KeyType::Secp256k1),
            other => Err(UnknownKeyType(other.to_string())),
        }
    }
}

/// A typed public key, hex-encoded on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(rename = "type")]
    pub key_type: KeyType,
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
}

impl PublicKey {
    /// 20-byte address: truncated SHA-256 of the key bytes.
    pub fn address(&self) -> [u8; 20] {
        let digest = Sha256::digest(&self.value);
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[..20]);
        address
    }
}

/// A change to the validator set returned from `EndBlock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: PublicKey,
    pub power: i64,
}
