//! Per-turn game state snapshot
//!
//! A [`TurnSnapshot`] is built once per perception pass by the state
//! normalizer and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::calendar::CareerDate;
use super::mood::Mood;
use super::stats::{StatKind, StatTable};

/// Which game screen is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenContext {
    Lobby,
    TrainingSelect,
    RaceSelect,
    EventChoice,
    RestConfirm,
    Unknown,
}

impl ScreenContext {
    /// Only the career lobby offers a turn decision
    pub fn is_turn_screen(&self) -> bool {
        matches!(self, ScreenContext::Lobby)
    }
}

/// Why a snapshot cannot drive a full decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    UnknownScreen,
    EnergyUnreadable,
    DateUnreadable,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DegradeReason::UnknownScreen => "active screen could not be classified",
            DegradeReason::EnergyUnreadable => "energy could not be read",
            DegradeReason::DateUnreadable => "career date could not be read",
        };
        f.write_str(text)
    }
}

/// Validation outcome of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SnapshotStatus {
    Valid,
    Degraded(DegradeReason),
}

/// A stat value with provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatValue {
    pub value: u32,
    /// Kept from the previous turn because the fresh read was lower and a
    /// re-read confirmed the drop. Missing or implausible reads leave the
    /// stat unknown instead.
    pub stale: bool,
}

impl StatValue {
    pub fn fresh(value: u32) -> Self {
        Self { value, stale: false }
    }

    pub fn stale(value: u32) -> Self {
        Self { value, stale: true }
    }
}

/// Support cards observed on one training option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportCards {
    /// All support cards on the option (NPCs excluded)
    pub count: u32,
    /// Cards whose type matches the trained stat
    pub rainbow_count: u32,
    pub friend_count: u32,
    pub npc_count: u32,
    pub hint_count: u32,
    pub spirit_explosion: bool,
    pub special_training: bool,
}

impl SupportCards {
    pub fn rainbow_present(&self) -> bool {
        self.rainbow_count > 0
    }

    pub fn friend_present(&self) -> bool {
        self.friend_count > 0
    }

    /// Cards that are neither rainbow nor friend
    pub fn other_count(&self) -> u32 {
        self.count
            .saturating_sub(self.rainbow_count)
            .saturating_sub(self.friend_count)
    }
}

/// One trainable option as seen on the training menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrainingOption {
    /// `None` when the failure percentage could not be read
    pub failure_risk: Option<u8>,
    pub support: SupportCards,
}

/// Immutable, validated view of one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    /// Perception pass counter, strictly increasing within a session
    pub sequence: u64,
    pub date: Option<CareerDate>,
    /// Elapsed career day; 0 when the date is unknown
    pub day: u32,
    pub mood: Mood,
    /// `None` means unreadable, which is distinct from an empty bar
    pub energy_percent: Option<u8>,
    pub stats: StatTable<Option<StatValue>>,
    pub training: StatTable<Option<TrainingOption>>,
    pub screen: ScreenContext,
    pub race_day: bool,
    pub is_pre_debut: bool,
    pub infirmary: bool,
    pub status: SnapshotStatus,
}

impl TurnSnapshot {
    /// An empty lobby snapshot, used as a starting point by builders and tests
    pub fn lobby(sequence: u64, date: CareerDate) -> Self {
        Self {
            sequence,
            date: Some(date),
            day: date.absolute_day(),
            mood: Mood::Normal,
            energy_percent: Some(100),
            stats: StatTable::default(),
            training: StatTable::default(),
            screen: ScreenContext::Lobby,
            race_day: false,
            is_pre_debut: date.is_pre_debut(),
            infirmary: false,
            status: SnapshotStatus::Valid,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, SnapshotStatus::Degraded(_))
    }

    pub fn degrade_reason(&self) -> Option<DegradeReason> {
        match self.status {
            SnapshotStatus::Degraded(reason) => Some(reason),
            SnapshotStatus::Valid => None,
        }
    }

    pub fn career_complete(&self) -> bool {
        self.date.map(|d| d.is_finale()).unwrap_or(false)
    }

    /// Current value of a stat, if known
    pub fn stat(&self, kind: StatKind) -> Option<u32> {
        self.stats[kind].map(|s| s.value)
    }

    /// Compact form for the observability stream
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            sequence: self.sequence,
            day: self.day,
            date: self.date.map(|d| d.to_string()),
            mood: self.mood,
            energy_percent: self.energy_percent,
            screen: self.screen,
            stats: self.stats.map(|_, s| s.map(|v| v.value)),
            race_day: self.race_day,
            status: self.status,
        }
    }
}

/// Loggable digest of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub sequence: u64,
    pub day: u32,
    pub date: Option<String>,
    pub mood: Mood,
    pub energy_percent: Option<u8>,
    pub screen: ScreenContext,
    pub stats: StatTable<Option<u32>>,
    pub race_day: bool,
    pub status: SnapshotStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::calendar::{CareerYear, Half, Month};

    #[test]
    fn test_other_count_never_underflows() {
        let cards = SupportCards { count: 1, rainbow_count: 1, friend_count: 1, ..Default::default() };
        assert_eq!(cards.other_count(), 0);
    }

    #[test]
    fn test_lobby_snapshot_defaults() {
        let date = CareerDate::Regular { year: CareerYear::Classic, month: Month::Mar, half: Half::Early };
        let snapshot = TurnSnapshot::lobby(3, date);
        assert_eq!(snapshot.day, 29);
        assert!(!snapshot.is_degraded());
        assert!(!snapshot.career_complete());
        assert_eq!(snapshot.summary().date.as_deref(), Some("Classic Year Early Mar"));
    }
}
