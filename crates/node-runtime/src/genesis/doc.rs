//! # Genesis Document
//!
//! The chain's starting point, stored as `<home>/config/genesis.json`.
//! Generated once and never modified afterwards.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use abci_bridge::RequestInitChain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{AppHash, BlockHeight, ConsensusParams, PublicKey, ValidatorUpdate};
use thiserror::Error;

/// Maximum length of a chain id.
pub const MAX_CHAIN_ID_LEN: usize = 50;

/// Genesis errors.
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("Failed to access genesis file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed genesis file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid genesis: {0}")]
    Invalid(String),
}

/// A validator in the initial set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    #[serde(with = "hex::serde")]
    pub address: Vec<u8>,
    pub pub_key: PublicKey,
    pub power: i64,
    #[serde(default)]
    pub name: String,
}

/// The genesis document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub genesis_time: DateTime<Utc>,
    pub chain_id: String,
    #[serde(default = "default_initial_height")]
    pub initial_height: BlockHeight,
    #[serde(default)]
    pub consensus_params: ConsensusParams,
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
    #[serde(default)]
    pub app_hash: AppHash,
    #[serde(default)]
    pub app_state: serde_json::Value,
}

fn default_initial_height() -> BlockHeight {
    1
}

impl GenesisDoc {
    /// Structural checks on a loaded or freshly built document.
    pub fn validate(&self) -> Result<(), GenesisError> {
        if self.chain_id.is_empty() {
            return Err(GenesisError::Invalid("chain_id must not be empty".into()));
        }
        if self.chain_id.len() > MAX_CHAIN_ID_LEN {
            return Err(GenesisError::Invalid(format!(
                "chain_id exceeds {MAX_CHAIN_ID_LEN} characters"
            )));
        }
        if self.initial_height < 0 {
            return Err(GenesisError::Invalid(format!(
                "initial_height {} is negative",
                self.initial_height
            )));
        }
        if self.consensus_params.validator.pub_key_types.is_empty() {
            return Err(GenesisError::Invalid(
                "consensus_params.validator.pub_key_types is empty".into(),
            ));
        }

        for validator in &self.validators {
            if validator.power <= 0 {
                return Err(GenesisError::Invalid(format!(
                    "validator {} has non-positive power {}",
                    hex::encode(&validator.address),
                    validator.power
                )));
            }
            if validator.address != validator.pub_key.address() {
                return Err(GenesisError::Invalid(format!(
                    "validator address {} does not match its public key",
                    hex::encode(&validator.address)
                )));
            }
            if !self
                .consensus_params
                .validator
                .pub_key_types
                .contains(&validator.pub_key.key_type)
            {
                return Err(GenesisError::Invalid(format!(
                    "validator key type {} not allowed by consensus params",
                    validator.pub_key.key_type
                )));
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, GenesisError> {
        let bytes = fs::read(path).map_err(|source| GenesisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Self = serde_json::from_slice(&bytes).map_err(|source| GenesisError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn save_as(&self, path: &Path) -> Result<(), GenesisError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| GenesisError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let write = || -> io::Result<()> {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(path, bytes)
        };
        write().map_err(|source| GenesisError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// First height the chain produces.
    pub fn first_height(&self) -> BlockHeight {
        self.initial_height.max(1)
    }

    /// The `InitChain` request a fresh application receives.
    pub fn init_chain_request(&self) -> RequestInitChain {
        RequestInitChain {
            time: u64::try_from(self.genesis_time.timestamp()).unwrap_or(0),
            chain_id: self.chain_id.clone(),
            consensus_params: Some(self.consensus_params.clone()),
            validators: self
                .validators
                .iter()
                .map(|v| ValidatorUpdate {
                    pub_key: v.pub_key.clone(),
                    power: v.power,
                })
                .collect(),
            app_state_bytes: match &self.app_state {
                serde_json::Value::Null => Vec::new(),
                state => state.to_string().into_bytes(),
            },
            initial_height: self.initial_height,
        }
    }
}
