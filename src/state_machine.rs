//! # Background Task State Machine
//!
//! Lifecycle states for persisted background tasks. The orchestrator only
//! ever creates rows in [`BackgroundTaskState::Pending`]; every other
//! transition is driven by the external worker that executes the queue. The
//! machine is modeled here so status read APIs report it faithfully and so
//! transition legality can be checked by workers and tests.
//!
//! ```text
//! pending ──(worker picks up)──▶ processing
//! processing ──(succeeds)──────▶ completed            [terminal]
//! processing ──(fails, budget)─▶ retry_scheduled ──▶ pending
//! processing ──(fails, spent)──▶ failed ──(ack)─────▶ notified  [terminal]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a persisted background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundTaskState {
    /// Enqueued and waiting for a worker
    Pending,
    /// A worker is currently executing the task
    Processing,
    /// Task completed successfully
    Completed,
    /// Task failed with retry budget remaining; re-enters pending at its
    /// next attempt time
    RetryScheduled,
    /// Task failed with no retry budget remaining
    Failed,
    /// Terminal failure acknowledged by an operator
    Notified,
}

impl BackgroundTaskState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Notified)
    }

    /// Check if this is an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed | Self::Notified)
    }

    /// Check if this is an active state (a worker owns the task)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing)
    }

    /// Check whether a transition from this state to `next` is legal
    pub fn can_transition_to(&self, next: BackgroundTaskState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::RetryScheduled)
                | (Self::Processing, Self::Failed)
                | (Self::RetryScheduled, Self::Pending)
                | (Self::Failed, Self::Notified)
        )
    }
}

impl fmt::Display for BackgroundTaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::RetryScheduled => write!(f, "retry_scheduled"),
            Self::Failed => write!(f, "failed"),
            Self::Notified => write!(f, "notified"),
        }
    }
}

impl std::str::FromStr for BackgroundTaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "retry_scheduled" => Ok(Self::RetryScheduled),
            "failed" => Ok(Self::Failed),
            "notified" => Ok(Self::Notified),
            _ => Err(format!("Invalid background task state: {s}")),
        }
    }
}

impl Default for BackgroundTaskState {
    fn default() -> Self {
        Self::Pending
    }
}
