//! Economic strategy parameters passed to the worker
//!
//! Each parameter is persisted under its own key. Amounts are entered in
//! ether and stored in wei; the rest are stored as given.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{KeyValueStore, StorageError};

const WEI_DECIMALS: usize = 18;

pub const MAX_DEPOSIT: &str = "maxDeposit";
pub const MIN_BALANCE: &str = "minBalance";
pub const MIN_PROFITABILITY: &str = "minProfitability";
pub const MAX_GAS_SUBSIDY: &str = "maxGasSubsidy";
pub const MIN_CLAIM_WINDOW: &str = "minClaimWindow";
pub const MIN_CLAIM_WINDOW_BLOCK: &str = "minClaimWindowBlock";
pub const MIN_EXECUTION_WINDOW: &str = "minExecutionWindow";
pub const MIN_EXECUTION_WINDOW_BLOCK: &str = "minExecutionWindowBlock";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Strategy as the worker sees it. Wei amounts travel as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicStrategy {
    #[serde(with = "wei_string")]
    pub max_deposit: u128,
    #[serde(with = "wei_string")]
    pub min_balance: u128,
    #[serde(with = "wei_string")]
    pub min_profitability: u128,
    /// Percent
    pub max_gas_subsidy: u64,
    /// Seconds
    pub min_claim_window: u64,
    pub min_claim_window_block: u64,
    /// Seconds
    pub min_execution_window: u64,
    pub min_execution_window_block: u64,
}

impl Default for EconomicStrategy {
    fn default() -> Self {
        Self {
            max_deposit: 0,
            min_balance: 0,
            min_profitability: 0,
            max_gas_subsidy: 100,
            min_claim_window: 30,
            min_claim_window_block: 2,
            min_execution_window: 150,
            min_execution_window_block: 10,
        }
    }
}

impl EconomicStrategy {
    /// Load every parameter, defaulting the ones that are missing or unreadable.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, StorageError> {
        let d = Self::default();
        Ok(Self {
            max_deposit: load_or(store, MAX_DEPOSIT, d.max_deposit)?,
            min_balance: load_or(store, MIN_BALANCE, d.min_balance)?,
            min_profitability: load_or(store, MIN_PROFITABILITY, d.min_profitability)?,
            max_gas_subsidy: load_or(store, MAX_GAS_SUBSIDY, d.max_gas_subsidy)?,
            min_claim_window: load_or(store, MIN_CLAIM_WINDOW, d.min_claim_window)?,
            min_claim_window_block: load_or(store, MIN_CLAIM_WINDOW_BLOCK, d.min_claim_window_block)?,
            min_execution_window: load_or(store, MIN_EXECUTION_WINDOW, d.min_execution_window)?,
            min_execution_window_block: load_or(
                store,
                MIN_EXECUTION_WINDOW_BLOCK,
                d.min_execution_window_block,
            )?,
        })
    }
}

/// Operator-entered strategy. `None` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyUpdate {
    /// Ether
    pub max_deposit: Option<String>,
    /// Ether
    pub min_balance: Option<String>,
    /// Ether
    pub min_profitability: Option<String>,
    pub max_gas_subsidy: Option<String>,
    pub min_claim_window: Option<String>,
    pub min_claim_window_block: Option<String>,
    pub min_execution_window: Option<String>,
    pub min_execution_window_block: Option<String>,
}

impl StrategyUpdate {
    /// Validate every value, then write each key separately.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StrategyError> {
        let entries = self.normalized()?;
        for (key, value) in entries {
            match value {
                Some(value) => store.save(key, &value)?,
                None => store.remove(key)?,
            }
        }
        Ok(())
    }

    fn normalized(&self) -> Result<Vec<(&'static str, Option<String>)>, StrategyError> {
        let ether = [
            (MAX_DEPOSIT, &self.max_deposit),
            (MIN_BALANCE, &self.min_balance),
            (MIN_PROFITABILITY, &self.min_profitability),
        ];
        let plain = [
            (MAX_GAS_SUBSIDY, &self.max_gas_subsidy),
            (MIN_CLAIM_WINDOW, &self.min_claim_window),
            (MIN_CLAIM_WINDOW_BLOCK, &self.min_claim_window_block),
            (MIN_EXECUTION_WINDOW, &self.min_execution_window),
            (MIN_EXECUTION_WINDOW_BLOCK, &self.min_execution_window_block),
        ];

        let mut entries = Vec::with_capacity(ether.len() + plain.len());

        for (key, value) in ether {
            let stored = match non_empty(value) {
                Some(v) => Some(
                    ether_to_wei(v)
                        .ok_or_else(|| StrategyError::InvalidValue { key, value: v.to_string() })?
                        .to_string(),
                ),
                None => None,
            };
            entries.push((key, stored));
        }

        for (key, value) in plain {
            let stored = match non_empty(value) {
                Some(v) => Some(
                    v.parse::<u64>()
                        .map_err(|_| StrategyError::InvalidValue { key, value: v.to_string() })?
                        .to_string(),
                ),
                None => None,
            };
            entries.push((key, stored));
        }

        Ok(entries)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn load_or<T: std::str::FromStr>(
    store: &dyn KeyValueStore,
    key: &str,
    default: T,
) -> Result<T, StorageError> {
    match store.load(key)? {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(key, value = %raw, "Unreadable strategy value, using default");
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

/// Convert a decimal ether amount to wei. Returns `None` for malformed input,
/// more than 18 fractional digits, or overflow.
pub fn ether_to_wei(amount: &str) -> Option<u128> {
    let amount = amount.trim();
    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > WEI_DECIMALS
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<width$}", width = WEI_DECIMALS).parse().ok()?
    };

    whole.checked_mul(10u128.pow(WEI_DECIMALS as u32))?.checked_add(frac)
}

mod wei_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
