//! Node eligibility tiers derived from the DAY token balance

use serde::{Deserialize, Serialize};

/// Minimum DAY balance for the Master ChronoNode tier
pub const MASTER_CHRONONODE_MIN_BALANCE: u64 = 3333;

/// Minimum DAY balance for the ChronoNode tier
pub const CHRONONODE_MIN_BALANCE: u64 = 888;

/// Minimum DAY balance for the TimeNode tier (also reachable with minting power)
pub const TIMENODE_MIN_BALANCE: u64 = 333;

/// Eligibility class of a TimeNode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTier {
    /// Balance not known yet
    Loading,
    /// Top tier
    MasterChronoNode,
    /// Mid tier
    ChronoNode,
    /// Base tier
    TimeNode,
    /// Not allowed to scan
    Disabled,
}

impl NodeTier {
    /// Classify a DAY balance. Thresholds are checked from the highest down,
    /// the first match wins.
    pub fn classify(balance_day: Option<u64>, is_time_mint: bool) -> Self {
        let Some(balance) = balance_day else {
            return NodeTier::Loading;
        };

        if balance >= MASTER_CHRONONODE_MIN_BALANCE {
            NodeTier::MasterChronoNode
        } else if balance >= CHRONONODE_MIN_BALANCE {
            NodeTier::ChronoNode
        } else if balance >= TIMENODE_MIN_BALANCE || is_time_mint {
            NodeTier::TimeNode
        } else {
            NodeTier::Disabled
        }
    }

    /// Display name used in notifications and status output
    pub fn name(&self) -> &'static str {
        match self {
            NodeTier::Loading => "Loading",
            NodeTier::MasterChronoNode => "Master ChronoNode",
            NodeTier::ChronoNode => "ChronoNode",
            NodeTier::TimeNode => "TimeNode",
            NodeTier::Disabled => "Disabled",
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, NodeTier::Disabled)
    }
}

impl std::fmt::Display for NodeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
