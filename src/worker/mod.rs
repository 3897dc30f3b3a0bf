//! Background worker boundary
//!
//! The worker does all chain scanning, claiming and execution. The
//! supervisor talks to it only through typed commands and events.

pub mod bridge;
pub mod protocol;

pub use bridge::{BridgeError, ProcessSpawner, WorkerChannels, WorkerHandle, WorkerSpawner};
pub use protocol::{
    BalancesUpdate, LogEntry, LogLevel, NetworkInfo, StatsUpdate, WorkerCommand, WorkerEvent,
    WorkerOptions, WorkerTuning,
};
