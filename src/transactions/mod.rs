//! Scheduled transaction browsing
//!
//! - `registry`: traits over the scheduling contracts
//! - `status`: status resolution rules
//! - `store`: fetch, partition and paginate requests
//! - `statistics`: efficiency and upcoming counts

pub mod registry;
pub mod statistics;
pub mod status;
pub mod store;

pub use registry::{
    BlockTag, RegistryClient, RegistryError, RequestData, ScheduleParams, Scheduler, TemporalUnit,
    TransactionRequest, TxParams,
};
pub use statistics::{StatisticsSnapshot, TransactionStatistics};
pub use status::{StatusFacts, TransactionStatus};
pub use store::{
    QueryOptions, QueryPage, ScheduleRequest, ScheduledTransaction, StoreError, TransactionStore,
};
