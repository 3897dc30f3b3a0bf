//! Chain access used by the supervisor

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::NetworkDescriptor;

/// DAY holdings of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBalance {
    /// Whole DAY tokens
    pub balance: u64,
    /// Minting power, raw units
    pub minting_power: u128,
}

impl DayBalance {
    pub fn is_time_mint(&self) -> bool {
        self.minting_power > 0
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("Network {0} has no DAY token")]
    UnsupportedNetwork(u64),
}

/// The slice of the Ethereum client the supervisor talks to directly.
/// Scanning, claiming and execution go through the worker instead.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Connect and return the chain id.
    async fn init(&self) -> Result<u64, ChainError>;

    /// Endpoint this client is connected to
    fn endpoint(&self) -> &str;

    /// Whether `endpoint` answers as an Ethereum node.
    async fn test_provider(&self, endpoint: &str) -> bool;

    /// DAY balance and minting power of `address` on `network`.
    async fn day_balance(
        &self,
        network: &NetworkDescriptor,
        address: &str,
    ) -> Result<DayBalance, ChainError>;
}
