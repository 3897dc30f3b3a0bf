//! Worker wire vocabulary
//!
//! Outbound: `{"type": "...", "params": ...}`. Inbound: `{"type": "...", ...fields}`.
//! Type strings are stable and must round-trip unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::network::NetworkDescriptor;
use crate::supervisor::strategy::EconomicStrategy;

/// Supervisor → worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "kebab-case")]
pub enum WorkerCommand {
    Start(Box<WorkerOptions>),
    StartScanning,
    StopScanning,
    GetNetworkInfo,
    UpdateStats,
    UpdateBalances,
    ClearStats,
    GetClaimedNotExecutedTransactions,
    BountiesGraphData,
    #[serde(rename = "processed-transactions")]
    ProcessedTxs,
}

impl WorkerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerCommand::Start(_) => "start",
            WorkerCommand::StartScanning => "start-scanning",
            WorkerCommand::StopScanning => "stop-scanning",
            WorkerCommand::GetNetworkInfo => "get-network-info",
            WorkerCommand::UpdateStats => "update-stats",
            WorkerCommand::UpdateBalances => "update-balances",
            WorkerCommand::ClearStats => "clear-stats",
            WorkerCommand::GetClaimedNotExecutedTransactions => {
                "get-claimed-not-executed-transactions"
            }
            WorkerCommand::BountiesGraphData => "bounties-graph-data",
            WorkerCommand::ProcessedTxs => "processed-transactions",
        }
    }
}

/// Worker → supervisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerEvent {
    Started,
    Log {
        value: LogEntry,
    },
    UpdateStats(StatsUpdate),
    UpdateBalances(BalancesUpdate),
    ClearStats,
    GetNetworkInfo(NetworkInfo),
    ReceivedClaimedNotExecutedTransactions {
        #[serde(default)]
        transactions: Vec<Value>,
    },
    BountiesGraphData {
        #[serde(rename = "bountiesGraphData", default)]
        data: Value,
    },
    #[serde(rename = "processed-transactions")]
    ProcessedTxs {
        #[serde(rename = "processedTxs", default)]
        data: Value,
    },
}

/// Worker log severity. Unknown severities are kept as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    /// Internal cache chatter, never shown
    Cache,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub message: String,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub timestamp: u64,
}

/// Counters the worker reports. Missing fields leave the session value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounties: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_claims: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_claims: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_executions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_executions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovered: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancesUpdate {
    #[serde(rename = "balanceETH", skip_serializing_if = "Option::is_none")]
    pub balance_eth: Option<f64>,
    #[serde(rename = "balanceDAY", skip_serializing_if = "Option::is_none")]
    pub balance_day: Option<u64>,
    #[serde(rename = "isTimeMint", skip_serializing_if = "Option::is_none")]
    pub is_time_mint: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkInfo {
    pub provider_block_number: Option<u64>,
    pub net_id: Option<u64>,
}

/// Fixed tuning sent with every START
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerTuning {
    /// 1 = info and errors only
    pub log_level: u8,
    pub poll_interval_ms: u64,
    pub autostart: bool,
    pub scan_spacing_blocks: u64,
}

impl Default for WorkerTuning {
    fn default() -> Self {
        Self {
            log_level: 1,
            poll_interval_ms: 15_000,
            autostart: false,
            scan_spacing_blocks: 950,
        }
    }
}

/// START payload
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOptions {
    pub network: NetworkDescriptor,
    pub custom_provider_url: Option<String>,
    /// Decrypted keystore JSON
    pub keystore: Vec<String>,
    pub keystore_password: String,
    pub day_account_address: Option<String>,
    pub log_level: u8,
    pub poll_interval_ms: u64,
    pub autostart: bool,
    pub scan_spacing_blocks: u64,
    pub claiming: bool,
    pub economic_strategy: EconomicStrategy,
}

impl std::fmt::Debug for WorkerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerOptions")
            .field("network", &self.network.id)
            .field("custom_provider_url", &self.custom_provider_url)
            .field("keystore", &"<redacted>")
            .field("keystore_password", &"<redacted>")
            .field("day_account_address", &self.day_account_address)
            .field("claiming", &self.claiming)
            .finish_non_exhaustive()
    }
}
