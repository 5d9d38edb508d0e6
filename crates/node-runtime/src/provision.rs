//! # Provisioning
//!
//! Creates whatever the home directory is missing. Every step first looks for
//! an existing file and only generates when none is found, so running it
//! twice leaves the second run with nothing to do.
//!
//! ## Sequence
//!
//! 1. Validator mode: load or generate the private validator
//! 2. Load or generate the node key
//! 3. Load or generate the genesis document
//! 4. Write the effective config file

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::container::{ConfigError, NodeConfig, NodeMode};
use crate::genesis::{GenesisBuilder, GenesisDoc, GenesisError, DEFAULT_VALIDATOR_POWER};
use crate::keys::{FilePV, KeyError, NodeKey};

/// Provisioning errors.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Genesis(#[from] GenesisError),

    #[error("Failed to prepare directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Genesis validator set does not contain the local validator {address}")]
    ValidatorNotInGenesis { address: String },
}

/// Everything provisioning found or generated.
pub struct Provisioned {
    pub priv_validator: Option<FilePV>,
    pub node_key: NodeKey,
    pub genesis: GenesisDoc,
}

/// Make `config.home` ready to run a node.
pub fn provision(config: &NodeConfig) -> Result<Provisioned, ProvisionError> {
    for dir in [config.home.join("config"), config.data_dir()] {
        fs::create_dir_all(&dir).map_err(|source| ProvisionError::Io { path: dir, source })?;
    }

    let priv_validator = match config.base.mode {
        NodeMode::Validator => Some(load_or_generate_priv_validator(config)?),
        NodeMode::Full | NodeMode::Seed => None,
    };

    let node_key_file = config.node_key_file();
    let node_key = if node_key_file.exists() {
        info!(path = %node_key_file.display(), "Found node key");
        NodeKey::load(&node_key_file)?
    } else {
        let node_key = NodeKey::load_or_generate(&node_key_file)?;
        info!(path = %node_key_file.display(), node_id = %node_key.node_id(), "Generated node key");
        node_key
    };

    let genesis_file = config.genesis_file();
    let genesis = if genesis_file.exists() {
        info!(path = %genesis_file.display(), "Found genesis file");
        GenesisDoc::load(&genesis_file)?
    } else {
        let mut builder = GenesisBuilder::default().key_type(config.base.key);
        if let Some(pv) = &priv_validator {
            builder = builder.validator(pv.public_key(), DEFAULT_VALIDATOR_POWER);
        }
        let genesis = builder.build()?;
        genesis.save_as(&genesis_file)?;
        info!(path = %genesis_file.display(), chain_id = %genesis.chain_id, "Generated genesis file");
        genesis
    };

    if let Some(pv) = &priv_validator {
        let address = pv.address().to_vec();
        if !genesis.validators.iter().any(|v| v.address == address) {
            return Err(ProvisionError::ValidatorNotInGenesis {
                address: hex::encode(address),
            });
        }
    }

    config.save()?;
    info!(mode = %config.base.mode, path = %config.config_file().display(), "Wrote config");

    Ok(Provisioned {
        priv_validator,
        node_key,
        genesis,
    })
}

fn load_or_generate_priv_validator(config: &NodeConfig) -> Result<FilePV, ProvisionError> {
    let key_file = config.priv_validator_key_file();
    let state_file = config.priv_validator_state_file();

    if key_file.exists() {
        let pv = FilePV::load(&key_file, &state_file)?;
        info!(key_file = %key_file.display(), state_file = %state_file.display(), "Found private validator");
        return Ok(pv);
    }

    let pv = FilePV::generate(&key_file, &state_file, config.base.key);
    pv.save()?;
    info!(
        key_file = %key_file.display(),
        state_file = %state_file.display(),
        key_type = %config.base.key,
        "Generated private validator"
    );
    Ok(pv)
}

/// Delete all blockchain data and reset the private validator to genesis
/// state. Keys, genesis and config are kept.
pub fn reset_all(config: &NodeConfig) -> Result<(), ProvisionError> {
    let data_dir = config.data_dir();
    match fs::remove_dir_all(&data_dir) {
        Ok(()) => info!(path = %data_dir.display(), "Removed all blockchain data"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ProvisionError::Io {
                path: data_dir,
                source,
            })
        }
    }
    fs::create_dir_all(&data_dir).map_err(|source| ProvisionError::Io {
        path: data_dir.clone(),
        source,
    })?;

    let key_file = config.priv_validator_key_file();
    if key_file.exists() {
        let mut pv = FilePV::load(&key_file, &config.priv_validator_state_file())?;
        pv.reset()?;
    }
    Ok(())
}
