//! Scheduling registry client contract
//!
//! The Ethereum Alarm Clock contracts are reached through these traits; the
//! RPC plumbing and contract bindings live outside this crate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Gas the registry charges on top of the scheduled call's own gas
pub const EXECUTION_GAS_OVERHEAD: u128 = 180_000;

/// Whether an execution window is measured in blocks or seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalUnit {
    Block,
    Timestamp,
}

impl TemporalUnit {
    /// Registry encoding (1 = block, 2 = timestamp)
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TemporalUnit::Block),
            2 => Some(TemporalUnit::Timestamp),
            _ => None,
        }
    }
}

/// End of a block range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    Number(u64),
    #[default]
    Latest,
}

impl std::fmt::Display for BlockTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockTag::Number(n) => write!(f, "{n}"),
            BlockTag::Latest => f.write_str("latest"),
        }
    }
}

/// Detail fields of a request, as returned by `fill_data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    pub temporal_unit: TemporalUnit,
    pub window_start: u64,
    pub window_size: u64,
    pub was_called: bool,
    pub was_successful: bool,
    pub is_cancelled: bool,
}

/// Sender parameters for a registry transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxParams {
    pub from: String,
    pub gas: u64,
    /// Wei attached to the transaction
    pub value: u128,
}

/// Arguments of a `blockSchedule`/`timestampSchedule` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleParams {
    pub to_address: String,
    pub call_data: Vec<u8>,
    pub call_gas: u128,
    pub call_value: u128,
    pub window_size: u64,
    pub window_start: u64,
    pub gas_price: u128,
    pub fee: u128,
    pub payment: u128,
    pub required_deposit: u128,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry network error: {0}")]
    Network(String),

    #[error("Malformed request record: {0}")]
    Malformed(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),
}

/// A single scheduled request on chain
#[async_trait]
pub trait TransactionRequest: Send + Sync {
    fn address(&self) -> &str;

    /// Fetch the request's detail fields.
    async fn fill_data(&self) -> Result<RequestData, RegistryError>;

    /// Whether the chain has moved past the execution window.
    async fn after_execution_window(&self) -> Result<bool, RegistryError>;

    /// Whether the request is inside its pre-execution freeze period.
    async fn in_freeze_period(&self) -> Result<bool, RegistryError>;

    /// Cancel the request, returning the transaction hash.
    async fn cancel(&self, params: &TxParams) -> Result<String, RegistryError>;
}

/// Entry points for creating new requests
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Set the sender used by the next schedule call.
    async fn init_sender(&self, params: TxParams) -> Result<(), RegistryError>;

    async fn block_schedule(&self, params: &ScheduleParams) -> Result<String, RegistryError>;

    async fn timestamp_schedule(&self, params: &ScheduleParams) -> Result<String, RegistryError>;

    /// Wei that must be escrowed with a new request.
    fn calc_endowment(
        &self,
        call_gas: u128,
        call_value: u128,
        gas_price: u128,
        fee: u128,
        payment: u128,
    ) -> u128 {
        payment
            .saturating_add(fee)
            .saturating_add(call_gas.saturating_mul(gas_price))
            .saturating_add(gas_price.saturating_mul(EXECUTION_GAS_OVERHEAD))
            .saturating_add(call_value)
    }
}

/// The request factory plus handle construction
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Addresses of all requests created in `[start_block, end_block]`.
    async fn get_requests(&self, start_block: u64, end_block: BlockTag) -> Result<Vec<String>, RegistryError>;

    /// Wrap an address into a lazily-filled handle.
    fn transaction_request(&self, address: &str) -> Arc<dyn TransactionRequest>;

    async fn latest_block(&self) -> Result<u64, RegistryError>;

    fn scheduler(&self) -> Arc<dyn Scheduler>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FormulaOnly;

    #[async_trait]
    impl Scheduler for FormulaOnly {
        async fn init_sender(&self, _params: TxParams) -> Result<(), RegistryError> {
            Ok(())
        }
        async fn block_schedule(&self, _params: &ScheduleParams) -> Result<String, RegistryError> {
            unreachable!()
        }
        async fn timestamp_schedule(&self, _params: &ScheduleParams) -> Result<String, RegistryError> {
            unreachable!()
        }
    }

    #[test]
    fn test_endowment_formula() {
        // payment + fee + callGas*gasPrice + gasPrice*overhead + callValue
        let endowment = FormulaOnly.calc_endowment(21_000, 5, 2, 7, 11);
        assert_eq!(endowment, 11 + 7 + 42_000 + 360_000 + 5);
    }

    #[test]
    fn test_endowment_saturates() {
        assert_eq!(FormulaOnly.calc_endowment(u128::MAX, 0, 2, 0, 0), u128::MAX);
    }

    #[test]
    fn test_temporal_unit_codes() {
        assert_eq!(TemporalUnit::from_code(1), Some(TemporalUnit::Block));
        assert_eq!(TemporalUnit::from_code(2), Some(TemporalUnit::Timestamp));
        assert_eq!(TemporalUnit::from_code(0), None);
    }
}
