//! # Node Runtime
//!
//! Starts and stops a node around a caller-supplied execution gateway.
//!
//! ## Startup Sequence
//!
//! 1. Load `<home>/config/config.toml`, apply overrides, validate
//! 2. Provision keys, genesis and the config file
//! 3. Initialize logging from config
//! 4. Build the bridge adapter over the gateway
//! 5. Open the block log, run the handshake
//! 6. Spawn block production
//!
//! Every failure before step 6 is returned as a [`LifecycleError`] and
//! nothing keeps running.

use std::path::Path;
use std::sync::Arc;

use abci_bridge::{AbortOnFatal, BridgeAdapter, BridgeConfig, FatalHandler};
use execution_gateway::ExecutionGateway;
use shared_types::{BlockHeight, Transaction, TxHash};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use crate::consensus::{
    BlockStore, BlockStoreError, ConsensusEngineError, LocalConsensusEngine, MempoolError,
    MempoolHandle,
};
use crate::container::{ConfigError, ConfigOverride, NodeConfig, NodeContext};
use crate::provision::{provision, ProvisionError};
use crate::telemetry::{init_logging, TelemetryError};

/// Errors starting or stopping a node.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Logging setup failed: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Block log unavailable: {0}")]
    BlockStore(#[from] BlockStoreError),

    #[error("Consensus engine failed: {0}")]
    Consensus(#[from] ConsensusEngineError),

    #[error("Consensus engine task panicked or was cancelled: {0}")]
    Join(#[from] JoinError),
}

/// Knobs for [`NodeRuntime::start_with`].
pub struct StartOptions {
    /// `key=value` settings applied over the config file.
    pub overrides: Vec<ConfigOverride>,
    /// Install the global log subscriber.
    pub init_logging: bool,
    pub bridge: BridgeConfig,
    pub fatal_handler: Arc<dyn FatalHandler>,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            overrides: Vec::new(),
            init_logging: true,
            bridge: BridgeConfig::default(),
            fatal_handler: Arc::new(AbortOnFatal),
        }
    }
}

/// A running node.
pub struct NodeRuntime<G: ExecutionGateway + 'static> {
    context: Arc<NodeContext>,
    app: Arc<BridgeAdapter<G>>,
    mempool: MempoolHandle<BridgeAdapter<G>>,
    shutdown_tx: watch::Sender<bool>,
    exited_rx: watch::Receiver<bool>,
    engine: JoinHandle<Result<(), ConsensusEngineError>>,
}

impl<G: ExecutionGateway + 'static> NodeRuntime<G> {
    /// Start a node from `<home>/config/config.toml` with default options.
    pub async fn start(config_path: &Path, gateway: G) -> Result<Self, LifecycleError> {
        Self::start_with(config_path, gateway, StartOptions::default()).await
    }

    pub async fn start_with(
        config_path: &Path,
        gateway: G,
        options: StartOptions,
    ) -> Result<Self, LifecycleError> {
        let mut config = NodeConfig::load(config_path)?;
        config.apply_overrides(&options.overrides)?;
        config.validate_basic()?;

        let provisioned = provision(&config)?;
        if options.init_logging {
            init_logging(&config.base.log_level, config.base.log_format)?;
        }

        let context = Arc::new(NodeContext::new(config, provisioned));
        info!(
            moniker = %context.config.base.moniker,
            mode = %context.config.base.mode,
            chain_id = %context.genesis.chain_id,
            node_id = %context.node_id(),
            home = %context.config.home.display(),
            "Starting node"
        );

        let app = Arc::new(BridgeAdapter::new(gateway, options.bridge));
        let store = BlockStore::open(context.config.block_log_file())?;
        let mut engine = LocalConsensusEngine::new(
            Arc::clone(&app),
            store,
            Arc::clone(&context),
            options.fatal_handler,
        );
        engine.handshake()?;
        let mempool = engine.mempool();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (exited_tx, exited_rx) = watch::channel(false);
        let engine = engine.spawn(shutdown_rx, exited_tx);

        info!(height = app.last_committed_height(), "Node started");
        Ok(Self {
            context,
            app,
            mempool,
            shutdown_tx,
            exited_rx,
            engine,
        })
    }

    /// Stop block production and wait for the engine task to finish.
    pub async fn stop(self) -> Result<(), LifecycleError> {
        info!("Initiating graceful shutdown...");
        // The task may already have exited after a fatal error.
        let _ = self.shutdown_tx.send(true);

        match self.engine.await? {
            Ok(()) => {
                info!(height = self.app.last_committed_height(), "Node stopped");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Consensus engine exited with an error");
                Err(e.into())
            }
        }
    }

    pub fn context(&self) -> &Arc<NodeContext> {
        &self.context
    }

    pub fn app(&self) -> &Arc<BridgeAdapter<G>> {
        &self.app
    }

    pub fn gateway(&self) -> &G {
        self.app.gateway()
    }

    pub fn last_committed_height(&self) -> BlockHeight {
        self.app.last_committed_height()
    }

    /// True once the engine task has exited on its own.
    pub fn is_finished(&self) -> bool {
        *self.exited_rx.borrow()
    }

    /// Resolves once the engine task has exited, after a fatal error or a
    /// panic. Call [`Self::stop`] afterwards to collect the result.
    pub async fn wait_for_exit(&self) {
        let mut exited = self.exited_rx.clone();
        // The sender is dropped only after it flipped the flag.
        let _ = exited.wait_for(|exited| *exited).await;
    }

    /// Submit a transaction to the mempool.
    pub fn submit_tx(&self, tx: impl Into<Transaction>) -> Result<TxHash, MempoolError> {
        self.mempool.submit_tx(tx.into())
    }

    pub fn pending_txs(&self) -> Vec<Transaction> {
        self.mempool.pending()
    }
}
