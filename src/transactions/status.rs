//! Lifecycle status of a scheduled transaction

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Scheduled,
    Executed,
    Failed,
    Cancelled,
    /// Execution window closed without the transaction being called
    #[serde(rename = "Not executed")]
    Missed,
}

impl TransactionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionStatus::Scheduled => "Scheduled",
            TransactionStatus::Executed => "Executed",
            TransactionStatus::Failed => "Failed",
            TransactionStatus::Cancelled => "Cancelled",
            TransactionStatus::Missed => "Not executed",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// On-chain facts the status is derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFacts {
    pub was_called: bool,
    /// Only meaningful when `was_called`
    pub was_successful: bool,
    pub is_cancelled: bool,
    /// Current block/time is past the end of the execution window
    pub execution_window_closed: bool,
}

impl StatusFacts {
    /// Later rules override earlier ones: called, then cancelled, then missed.
    pub fn status(&self) -> TransactionStatus {
        let mut status = TransactionStatus::Scheduled;

        if self.was_called {
            status = if self.was_successful {
                TransactionStatus::Executed
            } else {
                TransactionStatus::Failed
            };
        }

        if self.is_cancelled {
            status = TransactionStatus::Cancelled;
        }

        if self.is_missed() {
            status = TransactionStatus::Missed;
        }

        status
    }

    pub fn is_missed(&self) -> bool {
        self.execution_window_closed && !self.was_called
    }

    /// Whether the transaction reached a final state
    pub fn is_resolved(&self) -> bool {
        self.is_missed() || self.was_called || self.is_cancelled
    }
}
