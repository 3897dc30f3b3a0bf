//! TimeNode configuration

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::network::{NetworkDescriptor, NetworkRegistry};
use crate::supervisor::{PollIntervals, SupervisorConfig};
use crate::transactions::store::REQUEST_FACTORY_START_BLOCK;
use crate::transactions::{RegistryClient, TransactionStatistics, TransactionStore};
use crate::worker::WorkerTuning;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub polling: PollIntervals,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Added to, or replacing, the built-in networks by id
    #[serde(default)]
    pub networks: Vec<NetworkDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Ethereum JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Key used to encrypt secrets at rest (default: `<data_dir>/secret.key`)
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rpc_url: default_rpc_url(),
            key_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `session.db` in the data directory
    #[default]
    Sqlite,
    /// Nothing survives a restart
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker executable
    #[serde(default = "default_worker_program")]
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(flatten)]
    pub tuning: WorkerTuning,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: default_worker_program(),
            args: vec![],
            tuning: WorkerTuning::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// First block scanned for scheduled requests
    #[serde(default = "default_start_block")]
    pub start_block: u64,
    /// Efficiency look-back window
    #[serde(default = "default_window_hours")]
    pub past_hours: u64,
    #[serde(default = "default_window_hours")]
    pub next_hours: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            start_block: default_start_block(),
            past_hours: default_window_hours(),
            next_hours: default_window_hours(),
        }
    }
}

impl RegistryConfig {
    pub fn statistics(&self, registry: Arc<dyn RegistryClient>) -> TransactionStatistics {
        let store = Arc::new(TransactionStore::with_start_block(registry, self.start_block));
        TransactionStatistics::new(store).with_window(self.past_hours, self.next_hours)
    }
}

// Defaults
fn default_data_dir() -> PathBuf { PathBuf::from("/var/lib/timenode") }
fn default_rpc_url() -> String { "http://localhost:8545".to_string() }
fn default_worker_program() -> PathBuf { PathBuf::from("timenode-worker") }
fn default_start_block() -> u64 { REQUEST_FACTORY_START_BLOCK }
fn default_window_hours() -> u64 { 24 }

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn key_file(&self) -> PathBuf {
        self.node
            .key_file
            .clone()
            .unwrap_or_else(|| self.node.data_dir.join("secret.key"))
    }

    /// Built-in networks with configured ones layered on top
    pub fn network_registry(&self) -> NetworkRegistry {
        let mut networks = NetworkRegistry::default().descriptors();
        for configured in &self.networks {
            networks.retain(|n| n.id != configured.id);
            networks.push(configured.clone());
        }
        NetworkRegistry::from_descriptors(networks)
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            intervals: self.polling.clone(),
            tuning: self.worker.tuning.clone(),
        }
    }
}
