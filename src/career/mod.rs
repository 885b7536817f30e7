//! Career domain model
//!
//! Plain value types shared by perception, scoring and the decision engine.

pub mod action;
pub mod calendar;
pub mod mood;
pub mod race;
pub mod snapshot;
pub mod stage;
pub mod stats;

pub use action::{ActionCandidate, ActionKind, ActionOutcome, Contribution, Decision, DecisionReason};
pub use calendar::{CareerDate, CareerYear, Half, Month};
pub use mood::Mood;
pub use race::{DistanceCategory, GradeTable, RaceCatalog, RaceEntry, RaceGrade, Track};
pub use snapshot::{
    DegradeReason, ScreenContext, SnapshotStatus, SnapshotSummary, StatValue, SupportCards,
    TrainingOption, TurnSnapshot,
};
pub use stage::{Stage, StageTable, StageThresholds};
pub use stats::{StatKind, StatTable};
