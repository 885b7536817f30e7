//! Observability stream for a run
//!
//! Every completed turn produces a [`TurnRecord`] with the full rationale of
//! the choice. Records and lifecycle events are broadcast to any number of
//! subscribers (session log, CLI, tests).

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::career::{ActionCandidate, ActionOutcome, Contribution, Decision, DegradeReason, SnapshotSummary};
use crate::engine::StopReason;

/// Everything needed to explain one issued decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub session: Uuid,
    pub turn: u64,
    pub snapshot: SnapshotSummary,
    /// Ranked candidate the decision came from, if any
    pub chosen: Option<ActionCandidate>,
    pub rationale: Vec<Contribution>,
    /// Number of candidates that survived the gates
    pub candidates: usize,
    pub decision: Decision,
    pub outcome: ActionOutcome,
}

/// Events emitted by the run loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    Started { session: Uuid },
    Turn(TurnRecord),
    /// A snapshot could not be trusted
    Degraded { sequence: u64, reason: DegradeReason, streak: u32 },
    Stopped { session: Uuid, reason: StopReason, turns: u64 },
}

/// Broadcasts events to all live subscribers
pub struct EventEmitter {
    subscribers: Mutex<Vec<Sender<TurnEvent>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber. Events emitted before this call are not
    /// replayed.
    pub fn subscribe(&self) -> Receiver<TurnEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Emit an event to all subscribers, dropping the ones that hung up
    pub fn emit(&self, event: TurnEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
