//! # Genesis Builder
//!
//! Creates the genesis document for a new single-validator chain.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared_types::{AppHash, BlockHeight, ConsensusParams, KeyType, PublicKey};

use super::doc::{GenesisDoc, GenesisError, GenesisValidator};

/// Voting power given to the local validator.
pub const DEFAULT_VALIDATOR_POWER: i64 = 10;

/// `test-chain-` followed by six random alphanumerics.
pub fn random_chain_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("test-chain-{suffix}")
}

/// Builder for genesis documents.
pub struct GenesisBuilder {
    chain_id: String,
    genesis_time: Option<DateTime<Utc>>,
    initial_height: BlockHeight,
    key_type: KeyType,
    validators: Vec<GenesisValidator>,
}

impl Default for GenesisBuilder {
    fn default() -> Self {
        Self::new(random_chain_id())
    }
}

impl GenesisBuilder {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            genesis_time: None,
            initial_height: 1,
            key_type: KeyType::Ed25519,
            validators: Vec::new(),
        }
    }

    /// Fixed genesis time. Defaults to now.
    pub fn genesis_time(mut self, time: DateTime<Utc>) -> Self {
        self.genesis_time = Some(time);
        self
    }

    pub fn initial_height(mut self, height: BlockHeight) -> Self {
        self.initial_height = height;
        self
    }

    /// Validator key type the chain accepts. `secp256k1` restricts
    /// `consensus_params.validator.pub_key_types` to itself.
    pub fn key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    pub fn validator(mut self, pub_key: PublicKey, power: i64) -> Self {
        self.validators.push(GenesisValidator {
            address: pub_key.address().to_vec(),
            pub_key,
            power,
            name: String::new(),
        });
        self
    }

    pub fn build(self) -> Result<GenesisDoc, GenesisError> {
        let consensus_params = match self.key_type {
            KeyType::Ed25519 => ConsensusParams::default(),
            KeyType::Secp256k1 => ConsensusParams::for_key_type(KeyType::Secp256k1),
        };

        let doc = GenesisDoc {
            genesis_time: self.genesis_time.unwrap_or_else(Utc::now),
            chain_id: self.chain_id,
            initial_height: self.initial_height,
            consensus_params,
            validators: self.validators,
            app_hash: AppHash::empty(),
            app_state: serde_json::Value::Null,
        };
        doc.validate()?;
        Ok(doc)
    }
}
