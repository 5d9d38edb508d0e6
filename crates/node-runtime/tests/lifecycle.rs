//! # Node Lifecycle Tests
//!
//! Start and stop real nodes in temporary home directories with the
//! reference key/value engine persisted next to the block log.
//!
//! 1. `start` provisions the home and produces blocks
//! 2. `stop` waits for the engine and leaves a consistent block log
//! 3. A restarted node continues from where it stopped
//! 4. Configuration errors are reported before anything runs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use abci_bridge::{FatalHandler, ProtocolError};
use execution_gateway::{JsonFileStore, KvStoreGateway};
use node_runtime::consensus::BlockStore;
use node_runtime::container::{ConfigError, ConfigOverride};
use node_runtime::{LifecycleError, NodeConfig, NodeRuntime, StartOptions};
use parking_lot::Mutex;
use shared_types::BlockHeight;
use tempfile::tempdir;
use tokio::time::{sleep, timeout};

type KvGateway = KvStoreGateway<JsonFileStore>;

#[derive(Default)]
struct RecordingFatal(Mutex<Vec<ProtocolError>>);

impl FatalHandler for RecordingFatal {
    fn on_fatal(&self, error: &ProtocolError) {
        self.0.lock().push(error.clone());
    }
}

fn config_path(home: &Path) -> PathBuf {
    home.join("config").join("config.toml")
}

fn gateway(home: &Path) -> KvGateway {
    let config = NodeConfig::with_home(home);
    KvStoreGateway::open(JsonFileStore::new(config.application_state_file())).unwrap()
}

fn options(extra: &[&str]) -> StartOptions {
    let mut overrides: Vec<ConfigOverride> = vec!["consensus.timeout_commit_ms=10".parse().unwrap()];
    overrides.extend(extra.iter().map(|o| o.parse().unwrap()));
    StartOptions {
        overrides,
        init_logging: false,
        fatal_handler: Arc::new(RecordingFatal::default()),
        ..StartOptions::default()
    }
}

async fn wait_for_height(node: &NodeRuntime<KvGateway>, height: BlockHeight) {
    timeout(Duration::from_secs(10), async {
        while node.last_committed_height() < height {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("node did not reach height in time");
}

#[tokio::test]
async fn test_start_provisions_and_produces_blocks() {
    let dir = tempdir().unwrap();
    let home = dir.path();

    let node = NodeRuntime::start_with(&config_path(home), gateway(home), options(&[]))
        .await
        .unwrap();

    let config = NodeConfig::with_home(home);
    assert!(config.config_file().exists());
    assert!(config.genesis_file().exists());
    assert!(config.node_key_file().exists());
    assert!(config.priv_validator_key_file().exists());
    assert!(node.context().is_validator());

    node.submit_tx("greeting=hello").unwrap();
    wait_for_height(&node, 3).await;
    assert!(!node.is_finished());
    assert!(timeout(Duration::from_millis(50), node.wait_for_exit())
        .await
        .is_err());
    assert_eq!(node.gateway().get(b"greeting"), Some(b"hello".to_vec()));
    assert!(node.pending_txs().is_empty());

    node.stop().await.unwrap();

    let store = BlockStore::open(config.block_log_file()).unwrap();
    assert!(store.height() >= 3);
    let last = store.last_commit().unwrap();
    assert_eq!(last.height, store.height());
}

#[tokio::test]
async fn test_restart_continues_chain() {
    let dir = tempdir().unwrap();
    let home = dir.path();

    let node = NodeRuntime::start_with(&config_path(home), gateway(home), options(&[]))
        .await
        .unwrap();
    node.submit_tx("a=1").unwrap();
    wait_for_height(&node, 2).await;
    let chain_id = node.context().genesis.chain_id.clone();
    node.stop().await.unwrap();

    let config = NodeConfig::with_home(home);
    let stopped_at = BlockStore::open(config.block_log_file()).unwrap().height();

    let node = NodeRuntime::start_with(&config_path(home), gateway(home), options(&[]))
        .await
        .unwrap();
    assert_eq!(node.context().genesis.chain_id, chain_id);
    assert!(node.last_committed_height() >= stopped_at);
    assert_eq!(node.gateway().get(b"a"), Some(b"1".to_vec()));

    wait_for_height(&node, stopped_at + 1).await;
    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_lost_application_state_is_replayed() {
    let dir = tempdir().unwrap();
    let home = dir.path();

    let node = NodeRuntime::start_with(&config_path(home), gateway(home), options(&[]))
        .await
        .unwrap();
    node.submit_tx("k=v").unwrap();
    wait_for_height(&node, 2).await;
    node.stop().await.unwrap();

    let config = NodeConfig::with_home(home);
    let store = BlockStore::open(config.block_log_file()).unwrap();
    let height = store.height();
    let app_hash = store.app_hash(height).cloned();
    drop(store);
    std::fs::remove_file(config.application_state_file()).unwrap();

    let node = NodeRuntime::start_with(
        &config_path(home),
        gateway(home),
        options(&["consensus.create_empty_blocks=false"]),
    )
    .await
    .unwrap();
    assert_eq!(node.last_committed_height(), height);
    assert_eq!(node.gateway().get(b"k"), Some(b"v".to_vec()));
    node.stop().await.unwrap();

    let store = BlockStore::open(config.block_log_file()).unwrap();
    assert_eq!(store.app_hash(height).cloned(), app_hash);
}

#[tokio::test]
async fn test_full_node_does_not_produce() {
    let dir = tempdir().unwrap();
    let home = dir.path();

    let node = NodeRuntime::start_with(&config_path(home), gateway(home), options(&["mode=full"]))
        .await
        .unwrap();
    assert!(!node.context().is_validator());
    sleep(Duration::from_millis(50)).await;
    assert_eq!(node.last_committed_height(), 0);
    node.stop().await.unwrap();

    assert!(!NodeConfig::with_home(home).priv_validator_key_file().exists());
}

#[tokio::test]
async fn test_bad_override_rejected_before_start() {
    let dir = tempdir().unwrap();
    let home = dir.path();

    let result = NodeRuntime::start_with(
        &config_path(home),
        gateway(home),
        options(&["mempool.size=lots"]),
    )
    .await;
    assert!(matches!(
        result,
        Err(LifecycleError::Config(ConfigError::InvalidValue { .. }))
    ));
    assert!(!NodeConfig::with_home(home).config_file().exists());
}

#[tokio::test]
async fn test_invalid_config_rejected_before_start() {
    let dir = tempdir().unwrap();
    let home = dir.path();

    let result = NodeRuntime::start_with(
        &config_path(home),
        gateway(home),
        options(&["mempool.size=0"]),
    )
    .await;
    assert!(matches!(
        result,
        Err(LifecycleError::Config(ConfigError::Invalid(_)))
    ));
}
