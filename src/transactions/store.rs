//! Scheduled transactions fetched from the registry
//!
//! Fetches requests in a block range, resolves each one's status and keeps
//! the last successful full load for the dashboard's filtered view.

use std::sync::Arc;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::registry::{
    BlockTag, RegistryClient, RegistryError, ScheduleParams, TemporalUnit, TransactionRequest,
    TxParams,
};
use super::status::{StatusFacts, TransactionStatus};

/// First block of the request factory deployment
pub const REQUEST_FACTORY_START_BLOCK: u64 = 5_555_500;

/// Page size when none is given
pub const DEFAULT_LIMIT: usize = 10;

/// Gas limit for schedule transactions
pub const SCHEDULE_GAS: u64 = 3_000_000;

/// A request with its details loaded and status resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTransaction {
    pub address: String,
    pub temporal_unit: TemporalUnit,
    pub window_start: u64,
    pub window_end: u64,
    pub was_called: bool,
    pub was_successful: bool,
    pub is_cancelled: bool,
    pub status: TransactionStatus,
}

impl ScheduledTransaction {
    /// Anything past `Scheduled` is final
    pub fn is_resolved(&self) -> bool {
        self.status != TransactionStatus::Scheduled
    }
}

/// Parameters of a paginated query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Defaults to the request factory start block
    pub start_block: Option<u64>,
    pub end_block: BlockTag,
    pub offset: usize,
    pub limit: usize,
    /// Keep only resolved (`Some(true)`) or pending (`Some(false)`) requests
    pub resolved: Option<bool>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            start_block: None,
            end_block: BlockTag::Latest,
            offset: 0,
            limit: DEFAULT_LIMIT,
            resolved: None,
        }
    }
}

/// One page of results plus the match count before slicing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPage {
    pub transactions: Vec<ScheduledTransaction>,
    pub total: usize,
}

/// A new request to schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub from: String,
    pub temporal_unit: TemporalUnit,
    pub params: ScheduleParams,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Fetch failed: {0}")]
    FetchFailed(RegistryError),

    #[error("Registry call failed: {0}")]
    Registry(RegistryError),

    #[error("Request {0} is in its freeze period")]
    InFreezePeriod(String),
}

pub struct TransactionStore {
    registry: Arc<dyn RegistryClient>,
    start_block: u64,
    transactions: RwLock<Vec<ScheduledTransaction>>,
}

impl TransactionStore {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self::with_start_block(registry, REQUEST_FACTORY_START_BLOCK)
    }

    pub fn with_start_block(registry: Arc<dyn RegistryClient>, start_block: u64) -> Self {
        Self {
            registry,
            start_block,
            transactions: RwLock::new(Vec::new()),
        }
    }

    pub fn start_block(&self) -> u64 {
        self.start_block
    }

    pub async fn latest_block(&self) -> Result<u64, StoreError> {
        self.registry.latest_block().await.map_err(StoreError::FetchFailed)
    }

    /// Handles for every request created in the range.
    pub async fn fetch_range(
        &self,
        start_block: u64,
        end_block: BlockTag,
    ) -> Result<Vec<Arc<dyn TransactionRequest>>, StoreError> {
        let addresses = self
            .registry
            .get_requests(start_block, end_block)
            .await
            .map_err(StoreError::FetchFailed)?;

        debug!(start_block, %end_block, count = addresses.len(), "Fetched request range");

        Ok(addresses
            .iter()
            .map(|address| self.registry.transaction_request(address))
            .collect())
    }

    /// Load details and resolve the status of one request.
    pub async fn resolve(
        &self,
        request: &dyn TransactionRequest,
    ) -> Result<ScheduledTransaction, RegistryError> {
        let data = request.fill_data().await?;
        let execution_window_closed = request.after_execution_window().await?;

        let facts = StatusFacts {
            was_called: data.was_called,
            was_successful: data.was_successful,
            is_cancelled: data.is_cancelled,
            execution_window_closed,
        };

        Ok(ScheduledTransaction {
            address: request.address().to_string(),
            temporal_unit: data.temporal_unit,
            window_start: data.window_start,
            window_end: data.window_start.saturating_add(data.window_size),
            was_called: data.was_called,
            was_successful: data.was_successful,
            is_cancelled: data.is_cancelled,
            status: facts.status(),
        })
    }

    /// Replace the published collection with every request since the
    /// factory start block. Requests whose details fail to load are skipped;
    /// a failed range fetch leaves the previous collection in place.
    pub async fn load_all(&self) -> Result<usize, StoreError> {
        let requests = self.fetch_range(self.start_block, BlockTag::Latest).await?;
        let loaded = self.resolve_all(&requests).await;
        let count = loaded.len();

        *self.transactions.write().await = loaded;

        info!(count, skipped = requests.len() - count, "Loaded scheduled transactions");
        Ok(count)
    }

    /// Snapshot of the last full load
    pub async fn transactions(&self) -> Vec<ScheduledTransaction> {
        self.transactions.read().await.clone()
    }

    /// Paginated query, optionally partitioned by resolution state.
    pub async fn query(&self, options: &QueryOptions) -> Result<QueryPage, StoreError> {
        let start_block = options.start_block.unwrap_or(self.start_block);
        let requests = self.fetch_range(start_block, options.end_block).await?;

        let Some(resolved) = options.resolved else {
            let total = requests.len();
            let page: Vec<_> = requests
                .into_iter()
                .skip(options.offset)
                .take(options.limit)
                .collect();
            return Ok(QueryPage {
                transactions: self.resolve_all(&page).await,
                total,
            });
        };

        let matching: Vec<_> = self
            .resolve_all(&requests)
            .await
            .into_iter()
            .filter(|tx| tx.is_resolved() == resolved)
            .collect();
        let total = matching.len();

        Ok(QueryPage {
            transactions: matching
                .into_iter()
                .skip(options.offset)
                .take(options.limit)
                .collect(),
            total,
        })
    }

    /// Last-loaded transactions whose address matches `pattern`
    /// (case-insensitive regex, or plain substring if it is not a valid regex).
    pub async fn filtered_view(&self, pattern: &str) -> Vec<ScheduledTransaction> {
        let transactions = self.transactions.read().await;
        if pattern.is_empty() {
            return transactions.clone();
        }

        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => transactions
                .iter()
                .filter(|tx| re.is_match(&tx.address))
                .cloned()
                .collect(),
            Err(_) => {
                let needle = pattern.to_lowercase();
                transactions
                    .iter()
                    .filter(|tx| tx.address.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            }
        }
    }

    pub fn transaction_by_address(&self, address: &str) -> Arc<dyn TransactionRequest> {
        self.registry.transaction_request(address)
    }

    /// Escrow the endowment and submit a new request, returning the tx hash.
    pub async fn schedule(&self, request: &ScheduleRequest) -> Result<String, StoreError> {
        let scheduler = self.registry.scheduler();
        let p = &request.params;
        let endowment =
            scheduler.calc_endowment(p.call_gas, p.call_value, p.gas_price, p.fee, p.payment);

        scheduler
            .init_sender(TxParams {
                from: request.from.clone(),
                gas: SCHEDULE_GAS,
                value: endowment,
            })
            .await
            .map_err(StoreError::Registry)?;

        let hash = match request.temporal_unit {
            TemporalUnit::Block => scheduler.block_schedule(p).await,
            TemporalUnit::Timestamp => scheduler.timestamp_schedule(p).await,
        }
        .map_err(StoreError::Registry)?;

        info!(
            to = %p.to_address,
            unit = ?request.temporal_unit,
            endowment,
            tx = %hash,
            "Scheduled transaction"
        );
        Ok(hash)
    }

    /// Cancel a request unless it is frozen.
    pub async fn cancel(&self, address: &str, params: &TxParams) -> Result<String, StoreError> {
        let request = self.registry.transaction_request(address);

        if request.in_freeze_period().await.map_err(StoreError::Registry)? {
            return Err(StoreError::InFreezePeriod(address.to_string()));
        }

        let hash = request.cancel(params).await.map_err(StoreError::Registry)?;
        info!(address, tx = %hash, "Cancelled scheduled transaction");
        Ok(hash)
    }

    async fn resolve_all(
        &self,
        requests: &[Arc<dyn TransactionRequest>],
    ) -> Vec<ScheduledTransaction> {
        let mut resolved = Vec::with_capacity(requests.len());
        for request in requests {
            match self.resolve(request.as_ref()).await {
                Ok(tx) => resolved.push(tx),
                Err(e) => {
                    warn!(address = %request.address(), error = %e, "Skipping request");
                }
            }
        }
        resolved
    }
}
