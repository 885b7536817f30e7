//! Turn analysis
//!
//! Normalizes raw perception into snapshots, scores candidate actions and
//! broadcasts what was decided.

pub mod events;
pub mod normalizer;
pub mod penalty;
pub mod races;
pub mod scoring;

pub use events::{EventEmitter, TurnEvent, TurnRecord};
pub use normalizer::normalize;
pub use penalty::{stat_cap_penalty, CapPenalty};
pub use races::{available_races, race_day_options, RaceOption};
pub use scoring::{rank, score};
