//! timenode: supervisor and scheduled-transaction engine for an Ethereum
//! Alarm Clock TimeNode
//!
//! - `supervisor`: worker lifecycle, polling, session state
//! - `worker`: command/event protocol and process transport
//! - `transactions`: registry browsing, status resolution, statistics
//! - `crypto`: secrets at rest, ownership proofs, keystore checks
//! - `network`: network selection and chain access
//! - `storage`: persisted session key-value store
//! - `tier`: eligibility tiers from the DAY balance

pub mod cli;
pub mod config;
pub mod crypto;
pub mod network;
pub mod storage;
pub mod supervisor;
pub mod tier;
pub mod transactions;
pub mod worker;

pub use config::Config;
pub use supervisor::{SupervisorError, SupervisorEvent, SupervisorState, TimeNodeSupervisor};
pub use tier::NodeTier;
