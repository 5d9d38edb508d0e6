//! # Node Context
//!
//! Holds what provisioning produced for the lifetime of the node. Shared as
//! `Arc<NodeContext>`; only the private validator's sign state is mutable.

use parking_lot::Mutex;
use shared_types::PublicKey;

use crate::container::config::NodeConfig;
use crate::genesis::GenesisDoc;
use crate::keys::{FilePV, NodeKey};
use crate::provision::Provisioned;

pub struct NodeContext {
    pub config: NodeConfig,
    pub genesis: GenesisDoc,
    pub node_key: NodeKey,
    priv_validator: Option<Mutex<FilePV>>,
}

impl NodeContext {
    pub fn new(config: NodeConfig, provisioned: Provisioned) -> Self {
        Self {
            config,
            genesis: provisioned.genesis,
            node_key: provisioned.node_key,
            priv_validator: provisioned.priv_validator.map(Mutex::new),
        }
    }

    pub fn node_id(&self) -> String {
        self.node_key.node_id()
    }

    /// True when this node holds a private validator key.
    pub fn is_validator(&self) -> bool {
        self.priv_validator.is_some()
    }

    pub fn validator_public_key(&self) -> Option<PublicKey> {
        self.priv_validator.as_ref().map(|pv| pv.lock().public_key())
    }

    /// Address stamped as proposer on locally produced blocks.
    pub fn proposer_address(&self) -> Vec<u8> {
        self.validator_public_key()
            .map(|key| key.address().to_vec())
            .unwrap_or_default()
    }

    pub fn priv_validator(&self) -> Option<&Mutex<FilePV>> {
        self.priv_validator.as_ref()
    }
}
