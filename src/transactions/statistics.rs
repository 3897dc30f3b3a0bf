//! Execution statistics over the transaction store

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::registry::BlockTag;
use super::store::{QueryOptions, StoreError, TransactionStore};
use super::status::TransactionStatus;

/// Blocks per hour at a 15 second block time
pub const BLOCKS_PER_HOUR: u64 = 240;

/// Look back and ahead this many hours by default
pub const DEFAULT_WINDOW_HOURS: u64 = 24;

/// Executed share of resolved transactions, rounded up.
/// An empty history counts as fully efficient.
pub fn efficiency_percent(executed: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((executed * 100).div_ceil(total)) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub efficiency: u32,
    pub upcoming: usize,
    pub past_hours: u64,
    pub next_hours: u64,
}

pub struct TransactionStatistics {
    store: Arc<TransactionStore>,
    past_hours: u64,
    next_hours: u64,
    blocks_per_hour: u64,
}

impl TransactionStatistics {
    pub fn new(store: Arc<TransactionStore>) -> Self {
        Self {
            store,
            past_hours: DEFAULT_WINDOW_HOURS,
            next_hours: DEFAULT_WINDOW_HOURS,
            blocks_per_hour: BLOCKS_PER_HOUR,
        }
    }

    pub fn with_window(mut self, past_hours: u64, next_hours: u64) -> Self {
        self.past_hours = past_hours;
        self.next_hours = next_hours;
        self
    }

    /// Executed vs. resolved over the last `past_hours` of blocks.
    pub async fn efficiency(&self) -> Result<u32, StoreError> {
        let latest = self.store.latest_block().await?;
        let span = self.past_hours.saturating_mul(self.blocks_per_hour);
        let start_block = latest.saturating_sub(span).max(self.store.start_block());

        let page = self
            .store
            .query(&QueryOptions {
                start_block: Some(start_block),
                end_block: BlockTag::Number(latest),
                offset: 0,
                limit: usize::MAX,
                resolved: Some(true),
            })
            .await?;

        let executed = page
            .transactions
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Executed)
            .count();

        debug!(start_block, latest, executed, total = page.total, "Computed efficiency");
        Ok(efficiency_percent(executed, page.total))
    }

    /// Pending transactions created since the factory start block.
    pub async fn upcoming_count(&self) -> Result<usize, StoreError> {
        let page = self
            .store
            .query(&QueryOptions {
                resolved: Some(false),
                limit: 0,
                ..QueryOptions::default()
            })
            .await?;
        Ok(page.total)
    }

    pub async fn refresh(&self) -> Result<StatisticsSnapshot, StoreError> {
        Ok(StatisticsSnapshot {
            efficiency: self.efficiency().await?,
            upcoming: self.upcoming_count().await?,
            past_hours: self.past_hours,
            next_hours: self.next_hours,
        })
    }
}
