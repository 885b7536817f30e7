//! Candidate actions and issued decisions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use super::stats::StatKind;

/// Something the bot can do on its turn, or to get back to one
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum ActionKind {
    Train(StatKind),
    Race(String),
    Rest,
    /// Spend the turn curing a condition at the infirmary
    Infirmary,
    /// Pick an option on an event dialog (0-based)
    ResolveEvent(u8),
    /// Leave a menu that is not the lobby
    Back,
}

impl ActionKind {
    /// Takes the turn, as opposed to navigating between screens
    pub fn is_turn_action(&self) -> bool {
        matches!(
            self,
            ActionKind::Train(_) | ActionKind::Race(_) | ActionKind::Rest | ActionKind::Infirmary
        )
    }

    /// Relative cost of the UI path; lower is less disruptive
    pub fn ui_cost(&self) -> u8 {
        match self {
            ActionKind::Train(_) => 0,
            ActionKind::Rest | ActionKind::Infirmary => 1,
            ActionKind::Race(_) => 2,
            ActionKind::ResolveEvent(_) | ActionKind::Back => 3,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Train(stat) => write!(f, "train {}", stat),
            ActionKind::Race(id) => write!(f, "race {}", id),
            ActionKind::Rest => f.write_str("rest"),
            ActionKind::Infirmary => f.write_str("infirmary"),
            ActionKind::ResolveEvent(choice) => write!(f, "event choice {}", choice + 1),
            ActionKind::Back => f.write_str("back"),
        }
    }
}

/// One labelled term of a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub label: String,
    pub value: f64,
}

/// A scored option for the current turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub kind: ActionKind,
    pub raw_score: f64,
    pub penalty: f64,
    pub final_score: f64,
    /// Failure percentage used by the risk gate and tie-break
    pub failure_risk: u8,
    /// Score terms in the order they were applied
    pub rationale: Vec<Contribution>,
}

impl ActionCandidate {
    /// Candidate with a single fixed score term
    pub fn fixed(kind: ActionKind, label: &str, score: f64) -> Self {
        Self {
            kind,
            raw_score: score,
            penalty: 0.0,
            final_score: score,
            failure_risk: 0,
            rationale: vec![Contribution { label: label.to_string(), value: score }],
        }
    }

    pub fn is_training(&self) -> bool {
        matches!(self.kind, ActionKind::Train(_))
    }

    pub fn is_race(&self) -> bool {
        matches!(self.kind, ActionKind::Race(_))
    }
}

/// Why a decision was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Highest-ranked candidate
    TopCandidate,
    /// A preferred race from the schedule pre-empted training
    ScheduledRace,
    /// Strategy prefers racing a graded race when one is open
    GradePreference,
    /// Best training missed the strategy's score threshold
    BelowThreshold,
    /// Mandatory race on a race day
    RaceDay,
    /// The infirmary button was lit
    Infirmary,
    /// Snapshot stayed degraded past the retry budget
    DegradedFallback,
    /// Non-turn screen that has to be cleared first
    Interstitial,
}

/// The single action issued for a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: ActionKind,
    pub reason: DecisionReason,
    /// Turn counter value when the decision was issued
    pub turn: u64,
    pub issued_at: SystemTime,
}

impl Decision {
    pub fn new(action: ActionKind, reason: DecisionReason, turn: u64) -> Self {
        Self {
            action,
            reason,
            turn,
            issued_at: SystemTime::now(),
        }
    }
}

/// How the executor fared with a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ActionOutcome {
    Completed,
    /// Input path failed but the turn can be retried
    Recoverable(String),
    /// The UI is in a state the bot cannot recover from
    Fatal(String),
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ActionOutcome::Completed)
    }
}
