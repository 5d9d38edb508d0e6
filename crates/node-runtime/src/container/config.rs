//! # Node Configuration
//!
//! Everything the node reads from `<home>/config/config.toml`.
//!
//! ## Lifecycle
//!
//! 1. [`NodeConfig::load`] reads the file (a missing file yields defaults)
//! 2. [`NodeConfig::apply_overrides`] applies `key=value` overrides
//! 3. [`NodeConfig::validate_basic`] rejects unusable values
//! 4. [`NodeConfig::save`] writes the effective configuration back
//!
//! File paths inside the config are relative to the home directory, which is
//! the grandparent of the config file.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared_types::KeyType;
use thiserror::Error;

/// Name of the config directory under the home directory.
pub const CONFIG_DIR: &str = "config";
/// Name of the config file inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Config path {0} must look like <home>/config/config.toml")]
    InvalidPath(PathBuf),

    #[error("Malformed override {0:?}, expected key=value")]
    MalformedOverride(String),

    #[error("Unknown config key {0:?}")]
    UnknownKey(String),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// ENUMERATED SETTINGS
// =============================================================================

/// Role of the node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Holds a private validator key and produces blocks.
    #[default]
    Validator,
    Full,
    Seed,
}

impl NodeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeMode::Validator => "validator",
            NodeMode::Full => "full",
            NodeMode::Seed => "seed",
        }
    }
}

impl fmt::Display for NodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validator" => Ok(NodeMode::Validator),
            "full" => Ok(NodeMode::Full),
            "seed" => Ok(NodeMode::Seed),
            other => Err(format!("unknown mode {other:?} (validator|full|seed)")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?} (plain|json)")),
        }
    }
}

// =============================================================================
// CONFIG SECTIONS
// =============================================================================

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Home directory. Derived from the config path, never serialized.
    #[serde(skip)]
    pub home: PathBuf,
    #[serde(default)]
    pub base: BaseConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub mempool: MempoolConfig,
}

/// Identity, files and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    pub moniker: String,
    pub mode: NodeMode,
    /// Key type for a newly generated private validator.
    pub key: KeyType,
    /// Log filter directive, e.g. `info` or `abci_bridge=debug,info`.
    pub log_level: String,
    pub log_format: LogFormat,
    pub genesis_file: PathBuf,
    pub node_key_file: PathBuf,
    pub priv_validator_key_file: PathBuf,
    pub priv_validator_state_file: PathBuf,
    pub db_dir: PathBuf,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            moniker: "bridge-node".to_string(),
            mode: NodeMode::Validator,
            key: KeyType::Ed25519,
            log_level: "info".to_string(),
            log_format: LogFormat::Plain,
            genesis_file: PathBuf::from("config/genesis.json"),
            node_key_file: PathBuf::from("config/node_key.json"),
            priv_validator_key_file: PathBuf::from("config/priv_validator_key.json"),
            priv_validator_state_file: PathBuf::from("data/priv_validator_state.json"),
            db_dir: PathBuf::from("data"),
        }
    }
}

/// Local block production timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Pause between committing a block and proposing the next.
    pub timeout_commit_ms: u64,
    /// Produce blocks even when the mempool is empty.
    pub create_empty_blocks: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            timeout_commit_ms: 1000,
            create_empty_blocks: true,
        }
    }
}

/// Mempool limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Maximum number of pooled transactions.
    pub size: usize,
    /// Maximum size of a single transaction.
    pub max_tx_bytes: usize,
    /// Re-validate pooled transactions after every commit.
    pub recheck: bool,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            size: 5000,
            max_tx_bytes: 1024 * 1024,
            recheck: true,
        }
    }
}

// =============================================================================
// LOADING & OVERRIDES
// =============================================================================

/// A `key=value` configuration override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOverride {
    pub key: String,
    pub value: String,
}

impl FromStr for ConfigOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(ConfigError::MalformedOverride(s.to_string())),
        }
    }
}

impl NodeConfig {
    /// Default configuration rooted at `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            base: BaseConfig::default(),
            consensus: ConsensusConfig::default(),
            mempool: MempoolConfig::default(),
        }
    }

    /// Load `<home>/config/config.toml`. A missing file yields defaults.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let home = home_from_config_path(config_path)?;

        let mut config = match fs::read_to_string(config_path) {
            Ok(contents) => {
                toml::from_str::<NodeConfig>(&contents).map_err(|source| ConfigError::Parse {
                    path: config_path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::with_home(&home),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: config_path.to_path_buf(),
                    source,
                })
            }
        };
        config.home = home;
        Ok(config)
    }

    pub fn apply_overrides<'a>(
        &mut self,
        overrides: impl IntoIterator<Item = &'a ConfigOverride>,
    ) -> Result<(), ConfigError> {
        overrides
            .into_iter()
            .try_for_each(|o| self.apply_override(&o.key, &o.value))
    }

    /// Set one configuration key from its string form.
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };

        match key {
            "mode" => self.base.mode = value.parse().map_err(invalid)?,
            "key" => {
                self.base.key = value
                    .parse()
                    .map_err(|e: shared_types::UnknownKeyType| invalid(e.to_string()))?
            }
            "moniker" => self.base.moniker = value.to_string(),
            "log_level" => self.base.log_level = value.to_string(),
            "log_format" => self.base.log_format = value.parse().map_err(invalid)?,
            "genesis_file" => self.base.genesis_file = parse_path(value).map_err(invalid)?,
            "node_key_file" => self.base.node_key_file = parse_path(value).map_err(invalid)?,
            "priv_validator_key_file" => {
                self.base.priv_validator_key_file = parse_path(value).map_err(invalid)?
            }
            "priv_validator_state_file" => {
                self.base.priv_validator_state_file = parse_path(value).map_err(invalid)?
            }
            "db_dir" => self.base.db_dir = parse_path(value).map_err(invalid)?,
            "consensus.timeout_commit_ms" => {
                self.consensus.timeout_commit_ms = parse_number(value).map_err(invalid)?
            }
            "consensus.create_empty_blocks" => {
                self.consensus.create_empty_blocks =
                    value.parse().map_err(|e: std::str::ParseBoolError| invalid(e.to_string()))?
            }
            "mempool.size" => self.mempool.size = parse_number(value).map_err(invalid)?,
            "mempool.max_tx_bytes" => {
                self.mempool.max_tx_bytes = parse_number(value).map_err(invalid)?
            }
            "mempool.recheck" => {
                self.mempool.recheck =
                    value.parse().map_err(|e: std::str::ParseBoolError| invalid(e.to_string()))?
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Reject configurations the node cannot run with.
    pub fn validate_basic(&self) -> Result<(), ConfigError> {
        if self.base.moniker.trim().is_empty() {
            return Err(ConfigError::Invalid("moniker must not be empty".into()));
        }
        if self.base.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log_level must not be empty".into()));
        }
        if self.consensus.timeout_commit_ms == 0 {
            return Err(ConfigError::Invalid(
                "consensus.timeout_commit_ms must be positive".into(),
            ));
        }
        if self.mempool.size == 0 {
            return Err(ConfigError::Invalid("mempool.size must be positive".into()));
        }
        if self.mempool.max_tx_bytes == 0 {
            return Err(ConfigError::Invalid(
                "mempool.max_tx_bytes must be positive".into(),
            ));
        }
        for (name, path) in [
            ("genesis_file", &self.base.genesis_file),
            ("node_key_file", &self.base.node_key_file),
            ("priv_validator_key_file", &self.base.priv_validator_key_file),
            ("priv_validator_state_file", &self.base.priv_validator_state_file),
            ("db_dir", &self.base.db_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Write the configuration to `<home>/config/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.config_file();
        let contents = toml::to_string_pretty(self)?;
        let write = || -> io::Result<()> {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&path, contents)
        };
        write().map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })
    }

    // =========================================================================
    // Resolved paths
    // =========================================================================

    pub fn config_file(&self) -> PathBuf {
        self.home.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    pub fn genesis_file(&self) -> PathBuf {
        self.resolve(&self.base.genesis_file)
    }

    pub fn node_key_file(&self) -> PathBuf {
        self.resolve(&self.base.node_key_file)
    }

    pub fn priv_validator_key_file(&self) -> PathBuf {
        self.resolve(&self.base.priv_validator_key_file)
    }

    pub fn priv_validator_state_file(&self) -> PathBuf {
        self.resolve(&self.base.priv_validator_state_file)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.resolve(&self.base.db_dir)
    }

    pub fn block_log_file(&self) -> PathBuf {
        self.data_dir().join("blocks.jsonl")
    }

    /// State file of the reference execution engine.
    pub fn application_state_file(&self) -> PathBuf {
        self.data_dir().join("application.json")
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.home.join(path)
        }
    }
}

/// `<home>/config/config.toml` → `<home>`.
pub fn home_from_config_path(config_path: &Path) -> Result<PathBuf, ConfigError> {
    let invalid = || ConfigError::InvalidPath(config_path.to_path_buf());
    if config_path.file_name() != Some(OsStr::new(CONFIG_FILE)) {
        return Err(invalid());
    }
    let config_dir = config_path.parent().ok_or_else(invalid)?;
    if config_dir.file_name() != Some(OsStr::new(CONFIG_DIR)) {
        return Err(invalid());
    }
    match config_dir.parent() {
        Some(home) if !home.as_os_str().is_empty() => Ok(home.to_path_buf()),
        _ => Err(invalid()),
    }
}

fn parse_path(value: &str) -> Result<PathBuf, String> {
    if value.is_empty() {
        return Err("path must not be empty".to_string());
    }
    Ok(PathBuf::from(value))
}

fn parse_number<T: FromStr<Err = std::num::ParseIntError>>(value: &str) -> Result<T, String> {
    value.parse().map_err(|e: std::num::ParseIntError| e.to_string())
}
