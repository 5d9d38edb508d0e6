//! # Node & Validator Keys
//!
//! - [`NodeKey`]: always ed25519, identifies the node; its id is the hex
//!   address of the public key.
//! - [`FilePV`]: the private validator, a key file plus a last-sign state
//!   file. Either ed25519 or secp256k1.
//!
//! Key material is stored as JSON with hex-encoded bytes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{BlockHeight, KeyType, PublicKey};
use thiserror::Error;
use tracing::info;

/// Key file errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Failed to access key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed key file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {key_type} private key: {reason}")]
    InvalidKey { key_type: KeyType, reason: String },

    #[error("Key file {path} does not match its public key")]
    PublicKeyMismatch { path: PathBuf },
}

// =============================================================================
// PRIVATE KEYS
// =============================================================================

/// A signing key of either supported type.
#[derive(Clone)]
pub enum PrivateKey {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

impl PrivateKey {
    pub fn generate(key_type: KeyType) -> Self {
        let mut rng = rand::thread_rng();
        match key_type {
            KeyType::Ed25519 => Self::Ed25519(ed25519_dalek::SigningKey::generate(&mut rng)),
            KeyType::Secp256k1 => Self::Secp256k1(k256::ecdsa::SigningKey::random(&mut rng)),
        }
    }

    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, KeyError> {
        let invalid = |reason: String| KeyError::InvalidKey { key_type, reason };
        match key_type {
            KeyType::Ed25519 => {
                let seed: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| invalid(format!("expected 32 bytes, got {}", bytes.len())))?;
                Ok(Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)))
            }
            KeyType::Secp256k1 => k256::ecdsa::SigningKey::from_slice(bytes)
                .map(Self::Secp256k1)
                .map_err(|e| invalid(e.to_string())),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Ed25519(_) => KeyType::Ed25519,
            Self::Secp256k1(_) => KeyType::Secp256k1,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => key.to_bytes().to_vec(),
            Self::Secp256k1(key) => key.to_bytes().to_vec(),
        }
    }

    /// Public key; secp256k1 keys are SEC1-compressed (33 bytes).
    pub fn public_key(&self) -> PublicKey {
        let value = match self {
            Self::Ed25519(key) => key.verifying_key().to_bytes().to_vec(),
            Self::Secp256k1(key) => key.verifying_key().to_sec1_bytes().to_vec(),
        };
        PublicKey {
            key_type: self.key_type(),
            value,
        }
    }
}

/// On-disk form of a private key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrivKeyJson {
    #[serde(rename = "type")]
    key_type: KeyType,
    #[serde(with = "hex::serde")]
    value: Vec<u8>,
}

impl From<&PrivateKey> for PrivKeyJson {
    fn from(key: &PrivateKey) -> Self {
        Self {
            key_type: key.key_type(),
            value: key.to_bytes(),
        }
    }
}

// =============================================================================
// NODE KEY
// =============================================================================

/// The node's network identity.
#[derive(Clone)]
pub struct NodeKey {
    key: PrivateKey,
}

#[derive(Serialize, Deserialize)]
struct NodeKeyJson {
    priv_key: PrivKeyJson,
}

impl NodeKey {
    pub fn generate() -> Self {
        Self {
            key: PrivateKey::generate(KeyType::Ed25519),
        }
    }

    pub fn load(path: &Path) -> Result<Self, KeyError> {
        let json: NodeKeyJson = read_json(path)?;
        let key = PrivateKey::from_bytes(json.priv_key.key_type, &json.priv_key.value)?;
        Ok(Self { key })
    }

    /// Load `path`, generating and saving a fresh key if it does not exist.
    pub fn load_or_generate(path: &Path) -> Result<Self, KeyError> {
        if path.exists() {
            return Self::load(path);
        }
        let node_key = Self::generate();
        node_key.save(path)?;
        Ok(node_key)
    }

    pub fn save(&self, path: &Path) -> Result<(), KeyError> {
        write_json(
            path,
            &NodeKeyJson {
                priv_key: PrivKeyJson::from(&self.key),
            },
        )
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// Lower-case hex of the public key address.
    pub fn node_id(&self) -> String {
        hex::encode(self.public_key().address())
    }
}

// =============================================================================
// PRIVATE VALIDATOR
// =============================================================================

/// Height/round/step of the last signature, guarding against double signing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSignState {
    pub height: BlockHeight,
    pub round: i32,
    pub step: i8,
}

#[derive(Serialize, Deserialize)]
struct PrivValidatorKeyJson {
    #[serde(with = "hex::serde")]
    address: Vec<u8>,
    pub_key: PublicKey,
    priv_key: PrivKeyJson,
}

/// A private validator backed by a key file and a state file.
pub struct FilePV {
    key: PrivateKey,
    last_sign_state: LastSignState,
    key_path: PathBuf,
    state_path: PathBuf,
}

impl FilePV {
    /// A fresh validator. Nothing is written until [`FilePV::save`].
    pub fn generate(key_path: &Path, state_path: &Path, key_type: KeyType) -> Self {
        Self {
            key: PrivateKey::generate(key_type),
            last_sign_state: LastSignState::default(),
            key_path: key_path.to_path_buf(),
            state_path: state_path.to_path_buf(),
        }
    }

    /// Load both files. A missing state file means nothing was signed yet.
    pub fn load(key_path: &Path, state_path: &Path) -> Result<Self, KeyError> {
        let json: PrivValidatorKeyJson = read_json(key_path)?;
        let key = PrivateKey::from_bytes(json.priv_key.key_type, &json.priv_key.value)?;
        if key.public_key() != json.pub_key {
            return Err(KeyError::PublicKeyMismatch {
                path: key_path.to_path_buf(),
            });
        }

        let last_sign_state = if state_path.exists() {
            read_json(state_path)?
        } else {
            LastSignState::default()
        };

        Ok(Self {
            key,
            last_sign_state,
            key_path: key_path.to_path_buf(),
            state_path: state_path.to_path_buf(),
        })
    }

    pub fn save(&self) -> Result<(), KeyError> {
        let pub_key = self.key.public_key();
        write_json(
            &self.key_path,
            &PrivValidatorKeyJson {
                address: pub_key.address().to_vec(),
                pub_key,
                priv_key: PrivKeyJson::from(&self.key),
            },
        )?;
        self.save_state()
    }

    /// Forget all signing history; the key is kept.
    pub fn reset(&mut self) -> Result<(), KeyError> {
        self.last_sign_state = LastSignState::default();
        self.save_state()?;
        info!(state_file = %self.state_path.display(), "Reset private validator state");
        Ok(())
    }

    /// Record that `height` was signed.
    pub fn record_signed(&mut self, height: BlockHeight) -> Result<(), KeyError> {
        if height > self.last_sign_state.height {
            self.last_sign_state = LastSignState {
                height,
                round: 0,
                step: 3,
            };
            self.save_state()?;
        }
        Ok(())
    }

    pub fn key_type(&self) -> KeyType {
        self.key.key_type()
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    pub fn address(&self) -> [u8; 20] {
        self.public_key().address()
    }

    pub fn last_sign_state(&self) -> LastSignState {
        self.last_sign_state
    }

    fn save_state(&self) -> Result<(), KeyError> {
        write_json(&self.state_path, &self.last_sign_state)
    }
}

// =============================================================================
// FILE HELPERS
// =============================================================================

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, KeyError> {
    let bytes = fs::read(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| KeyError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), KeyError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| KeyError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let write = || -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, bytes)
    };
    write().map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}
