//! Periodic worker polls
//!
//! Five independent timers, each sending one fire-and-forget command.
//! Replies are matched by message type, so overlapping polls coalesce.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::worker::WorkerCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollKind {
    Stats,
    Balances,
    BountiesGraph,
    ProcessedTxs,
    NetworkInfo,
}

impl PollKind {
    pub const ALL: [PollKind; 5] = [
        PollKind::Stats,
        PollKind::Balances,
        PollKind::BountiesGraph,
        PollKind::ProcessedTxs,
        PollKind::NetworkInfo,
    ];

    pub fn command(&self) -> WorkerCommand {
        match self {
            PollKind::Stats => WorkerCommand::UpdateStats,
            PollKind::Balances => WorkerCommand::UpdateBalances,
            PollKind::BountiesGraph => WorkerCommand::BountiesGraphData,
            PollKind::ProcessedTxs => WorkerCommand::ProcessedTxs,
            PollKind::NetworkInfo => WorkerCommand::GetNetworkInfo,
        }
    }
}

/// Poll cadences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollIntervals {
    pub stats_ms: u64,
    pub balances_ms: u64,
    pub bounties_graph_ms: u64,
    pub processed_txs_ms: u64,
    pub network_info_ms: u64,
    /// Liveness signal while scanning
    pub liveness_ms: u64,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            stats_ms: 5_000,
            balances_ms: 15_000,
            bounties_graph_ms: 300_000,
            processed_txs_ms: 300_000,
            network_info_ms: 15_000,
            liveness_ms: 300_000,
        }
    }
}

impl PollIntervals {
    pub fn period(&self, kind: PollKind) -> Duration {
        let ms = match kind {
            PollKind::Stats => self.stats_ms,
            PollKind::Balances => self.balances_ms,
            PollKind::BountiesGraph => self.bounties_graph_ms,
            PollKind::ProcessedTxs => self.processed_txs_ms,
            PollKind::NetworkInfo => self.network_info_ms,
        };
        Duration::from_millis(ms.max(1))
    }

    pub fn liveness(&self) -> Duration {
        Duration::from_millis(self.liveness_ms.max(1))
    }
}

/// Called before each graph poll is sent
pub type PollHook = std::sync::Arc<dyn Fn(PollKind) + Send + Sync>;

/// The live set of polling tasks. At most one task per kind.
#[derive(Default)]
pub struct PollingLoops {
    tasks: Vec<(PollKind, JoinHandle<()>)>,
}

impl PollingLoops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every running poll, then start one task per kind. Each fires
    /// immediately and then on its period.
    pub fn restart(
        &mut self,
        commands: mpsc::Sender<WorkerCommand>,
        intervals: &PollIntervals,
        on_poll: Option<PollHook>,
    ) {
        self.cancel_all();

        for kind in PollKind::ALL {
            let period = intervals.period(kind);
            let commands = commands.clone();
            let on_poll = on_poll.clone();

            let handle = tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Some(hook) = &on_poll {
                        hook(kind);
                    }
                    if commands.send(kind.command()).await.is_err() {
                        debug!(?kind, "Worker gone, poll stopped");
                        break;
                    }
                }
            });
            self.tasks.push((kind, handle));
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain(..) {
            handle.abort();
        }
    }

    /// Number of polls not yet finished
    pub fn active(&self) -> usize {
        self.tasks.iter().filter(|(_, h)| !h.is_finished()).count()
    }
}

impl Drop for PollingLoops {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
