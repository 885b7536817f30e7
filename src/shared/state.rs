//! Run state shared between the run loop and its observers

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use crate::career::TurnSnapshot;
use crate::engine::{Phase, StopReason};

/// Live view of a run
///
/// Only the run loop writes to this; other threads read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub session: Uuid,
    pub phase: Phase,
    /// Completed turn actions
    pub turn: u64,
    pub stop_reason: Option<StopReason>,
    /// Last error message (if any)
    pub last_error: Option<String>,
    pub started_at: SystemTime,
}

impl RunState {
    pub fn new(session: Uuid) -> Self {
        Self {
            session,
            phase: Phase::AwaitingTurn,
            turn: 0,
            stop_reason: None,
            last_error: None,
            started_at: SystemTime::now(),
        }
    }

    /// Whether the run reached its terminal phase
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Stopped
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}

/// Handle to the run state
pub type SharedRunState = Arc<RwLock<RunState>>;

/// Final summary of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub session: Uuid,
    pub phase: Phase,
    pub stop_reason: Option<StopReason>,
    pub turns: u64,
    /// Most recent snapshot, kept for diagnosing the stop
    pub last_snapshot: Option<TurnSnapshot>,
    pub last_error: Option<String>,
}

impl RunReport {
    /// Whether the run ended on an error rather than a stop condition
    pub fn is_failure(&self) -> bool {
        self.stop_reason.as_ref().map(|r| r.is_failure()).unwrap_or(false)
    }
}
