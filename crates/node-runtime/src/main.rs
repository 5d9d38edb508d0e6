//! # Bridge Node
//!
//! Runs the bridge adapter under the local consensus engine with the
//! reference key/value execution engine.
//!
//! ## Commands
//!
//! - `init` - provision `<home>` and exit
//! - `start` - provision, handshake and produce blocks until Ctrl+C
//! - `unsafe-reset-all` - delete block data, reset validator sign state
//! - `show-node-id` - print the node id

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use execution_gateway::{JsonFileStore, KvStoreGateway};
use tracing::info;

use node_runtime::container::ConfigOverride;
use node_runtime::keys::NodeKey;
use node_runtime::telemetry::init_logging;
use node_runtime::{provision, reset_all, NodeConfig, NodeRuntime, StartOptions};

/// Consensus-execution bridge node
#[derive(Parser, Debug)]
#[command(name = "node-runtime", version)]
#[command(about = "Single-validator node running the consensus-execution bridge")]
struct Cli {
    /// Node home directory
    #[arg(long, global = true, env = "BRIDGE_NODE_HOME", default_value = ".bridge-node")]
    home: PathBuf,

    /// Configuration override, KEY=VALUE (repeatable)
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    overrides: Vec<ConfigOverride>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate keys, genesis and config under the home directory
    Init,
    /// Run the node
    Start,
    /// Delete all blockchain data and reset the validator sign state
    UnsafeResetAll,
    /// Print this node's id
    ShowNodeId,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.home.join("config").join("config.toml");

    match cli.command {
        Command::Init => {
            let config = load_config(&config_path, &cli.overrides)?;
            init_logging(&config.base.log_level, config.base.log_format)?;
            provision(&config).context("Failed to provision node home")?;
            info!(home = %config.home.display(), "Initialized node");
        }
        Command::Start => start(&config_path, cli.overrides).await?,
        Command::UnsafeResetAll => {
            let config = load_config(&config_path, &cli.overrides)?;
            init_logging(&config.base.log_level, config.base.log_format)?;
            reset_all(&config).context("Failed to reset node data")?;
        }
        Command::ShowNodeId => {
            let config = load_config(&config_path, &cli.overrides)?;
            let node_key = NodeKey::load(&config.node_key_file()).with_context(|| {
                format!(
                    "No node key at {}; run `init` first",
                    config.node_key_file().display()
                )
            })?;
            println!("{}", node_key.node_id());
        }
    }
    Ok(())
}

fn load_config(config_path: &Path, overrides: &[ConfigOverride]) -> Result<NodeConfig> {
    let mut config = NodeConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    config
        .apply_overrides(overrides)
        .context("Invalid configuration override")?;
    config.validate_basic().context("Invalid configuration")?;
    Ok(config)
}

async fn start(config_path: &Path, overrides: Vec<ConfigOverride>) -> Result<()> {
    let config = load_config(config_path, &overrides)?;
    init_logging(&config.base.log_level, config.base.log_format)?;
    let store = JsonFileStore::new(config.application_state_file());
    let gateway = KvStoreGateway::open(store).context("Failed to open execution engine state")?;

    let options = StartOptions {
        overrides,
        init_logging: false,
        ..StartOptions::default()
    };
    let node = NodeRuntime::start_with(config_path, gateway, options)
        .await
        .context("Failed to start node")?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
        }
        _ = node.wait_for_exit() => {}
    }

    node.stop().await.context("Node stopped with an error")?;
    Ok(())
}
