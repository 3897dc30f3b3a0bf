//! Published session state
//!
//! Everything the presentation layer renders lives here. Worker replies are
//! applied last-write-wins.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;

use super::strategy::EconomicStrategy;
use crate::network::NetworkDescriptor;
use crate::tier::NodeTier;
use crate::worker::{BalancesUpdate, LogEntry, LogLevel, StatsUpdate};

/// Log entries kept in memory
pub const LOG_CAP: usize = 1000;

/// Counters mirrored from the worker
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub bounties: f64,
    pub costs: f64,
    pub profit: f64,
    pub successful_claims: u64,
    pub failed_claims: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub discovered: u64,
}

impl Stats {
    pub fn apply(&mut self, update: &StatsUpdate) {
        if let Some(v) = update.bounties {
            self.bounties = v;
        }
        if let Some(v) = update.costs {
            self.costs = v;
        }
        if let Some(v) = update.profit {
            self.profit = v;
        }
        if let Some(v) = update.successful_claims {
            self.successful_claims = v;
        }
        if let Some(v) = update.failed_claims {
            self.failed_claims = v;
        }
        if let Some(v) = update.successful_executions {
            self.successful_executions = v;
        }
        if let Some(v) = update.failed_executions {
            self.failed_executions = v;
        }
        if let Some(v) = update.discovered {
            self.discovered = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    #[serde(rename = "balanceETH")]
    pub balance_eth: Option<f64>,
    /// `None` until the first lookup
    #[serde(rename = "balanceDAY")]
    pub balance_day: Option<u64>,
    pub is_time_mint: bool,
}

impl Balances {
    pub fn apply(&mut self, update: &BalancesUpdate) {
        if update.balance_eth.is_some() {
            self.balance_eth = update.balance_eth;
        }
        if update.balance_day.is_some() {
            self.balance_day = update.balance_day;
        }
        if let Some(v) = update.is_time_mint {
            self.is_time_mint = v;
        }
    }

    pub fn tier(&self) -> NodeTier {
        NodeTier::classify(self.balance_day, self.is_time_mint)
    }
}

/// Which log entries are shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogView {
    /// Info and errors only
    #[default]
    Basic,
    Detailed,
}

impl LogView {
    pub fn shows(&self, level: LogLevel) -> bool {
        match self {
            LogView::Basic => matches!(level, LogLevel::Info | LogLevel::Error),
            LogView::Detailed => true,
        }
    }
}

/// Bounded FIFO of worker log entries
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(LOG_CAP)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn visible(&self, view: LogView) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|e| view.shows(e.level))
            .cloned()
            .collect()
    }
}

/// Supervisor-owned session state
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Encrypted keystore
    #[serde(skip)]
    pub wallet_keystore: Option<String>,
    /// Encrypted DAY account address
    #[serde(skip)]
    pub attached_account: Option<String>,
    pub scanning_active: bool,
    pub claiming_enabled: bool,
    pub network: Option<NetworkDescriptor>,
    pub economic_strategy: EconomicStrategy,
    pub stats: Stats,
    pub balances: Balances,
    #[serde(skip)]
    pub logs: LogBuffer,
    pub log_view: LogView,
    pub provider_block_number: Option<u64>,
    pub net_id: Option<u64>,
    pub bounties_graph_data: Option<Value>,
    pub processed_txs: Option<Value>,
    pub updating_bounties_graph_in_progress: bool,
    pub updating_processed_txs_in_progress: bool,
}

impl Session {
    /// Derived on every read
    pub fn node_tier(&self) -> NodeTier {
        self.balances.tier()
    }

    pub fn visible_logs(&self) -> Vec<LogEntry> {
        self.logs.visible(self.log_view)
    }
}
