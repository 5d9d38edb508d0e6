//! Shared fixtures for integration scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use abci_bridge::{FatalHandler, ProtocolError};
use execution_gateway::{ExecutionGateway, JsonFileStore, KvStoreGateway};
use node_runtime::{ConfigOverride, NodeConfig, NodeRuntime, StartOptions};
use parking_lot::Mutex;
use shared_types::BlockHeight;
use tempfile::TempDir;

/// Block production period used by every scenario.
pub const FAST_COMMIT_MS: u64 = 10;

/// A node home directory removed on drop.
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp home"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config").join("config.toml")
    }

    /// Default config rooted here; paths only, nothing is read from disk.
    pub fn config(&self) -> NodeConfig {
        NodeConfig::with_home(self.path())
    }

    /// Reference engine persisted under `data/application.json`.
    pub fn kv_gateway(&self) -> KvStoreGateway<JsonFileStore> {
        KvStoreGateway::open(JsonFileStore::new(self.config().application_state_file()))
            .expect("open reference engine")
    }

    pub fn block_log_lines(&self) -> Vec<String> {
        fs::read_to_string(self.config().block_log_file())
            .expect("read block log")
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn write_block_log_lines(&self, lines: &[String]) {
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(self.config().block_log_file(), contents).expect("write block log");
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects fatal errors instead of aborting the test process.
#[derive(Default)]
pub struct RecordingFatal {
    errors: Mutex<Vec<ProtocolError>>,
}

impl RecordingFatal {
    pub fn errors(&self) -> Vec<ProtocolError> {
        self.errors.lock().clone()
    }
}

impl FatalHandler for RecordingFatal {
    fn on_fatal(&self, error: &ProtocolError) {
        self.errors.lock().push(error.clone());
    }
}

/// Options for a fast, quiet node. `extra` are `key=value` overrides.
pub fn start_options(extra: &[&str], fatal: Arc<RecordingFatal>) -> StartOptions {
    let mut overrides: Vec<ConfigOverride> = vec![format!("consensus.timeout_commit_ms={FAST_COMMIT_MS}")
        .parse()
        .expect("valid override")];
    overrides.extend(extra.iter().map(|o| o.parse().expect("valid override")));
    StartOptions {
        overrides,
        init_logging: false,
        fatal_handler: fatal,
        ..StartOptions::default()
    }
}

/// Wait until the node has committed `height`.
pub async fn wait_for_height<G>(node: &NodeRuntime<G>, height: BlockHeight)
where
    G: ExecutionGateway + 'static,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        while node.last_committed_height() < height {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("node did not reach height in time");
}
