//! Stop conditions
//!
//! Checked on every lobby snapshot before anything is acted on. A stop
//! never interrupts an action that is already in flight.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::career::{Month, Mood, TurnSnapshot};
use crate::config::{ScoringConfig, StopConditionConfig};

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    LowMood { mood: Mood },
    NeedRest { energy_percent: Option<u8> },
    Infirmary,
    RaceDay,
    /// Race day with nothing in the catalog to enter
    NoRaceOnRaceDay,
    BeforeSummer,
    TargetDate,
    CareerComplete,
    LobbyNotFound { misses: u32 },
    /// Graceful stop requested by the user
    ExternalStop,
    /// Unsafe stop requested by the user
    ForceStop,
    PerceptionBudget { failures: u32 },
    FatalAction { message: String },
    SourceClosed,
    /// The engine refused an operation; indicates a bug in the caller
    Internal { message: String },
}

impl StopReason {
    /// Stops that end the run on an error rather than a condition
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StopReason::PerceptionBudget { .. } | StopReason::FatalAction { .. } | StopReason::Internal { .. }
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::LowMood { mood } => write!(f, "mood dropped to {:?}", mood),
            StopReason::NeedRest { energy_percent: Some(e) } => write!(f, "energy critical ({}%)", e),
            StopReason::NeedRest { energy_percent: None } => f.write_str("energy critical"),
            StopReason::Infirmary => f.write_str("infirmary needed"),
            StopReason::RaceDay => f.write_str("race day"),
            StopReason::NoRaceOnRaceDay => f.write_str("race day with no known race"),
            StopReason::BeforeSummer => f.write_str("summer camp ahead"),
            StopReason::TargetDate => f.write_str("target date reached"),
            StopReason::CareerComplete => f.write_str("career complete"),
            StopReason::LobbyNotFound { misses } => write!(f, "lobby not found after {} passes", misses),
            StopReason::ExternalStop => f.write_str("stop requested"),
            StopReason::ForceStop => f.write_str("force stop requested"),
            StopReason::PerceptionBudget { failures } => {
                write!(f, "perception failed {} times in a row", failures)
            }
            StopReason::FatalAction { message } => write!(f, "fatal action failure: {}", message),
            StopReason::SourceClosed => f.write_str("frame source closed"),
            StopReason::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

/// Evaluate the configured stop conditions against a lobby snapshot.
///
/// Career completion always stops. Everything else sits behind the master
/// switch.
pub fn check_stop_conditions(
    snapshot: &TurnSnapshot,
    stops: &StopConditionConfig,
    scoring: &ScoringConfig,
) -> Option<StopReason> {
    if snapshot.career_complete() {
        return Some(StopReason::CareerComplete);
    }
    if !stops.enabled {
        return None;
    }

    if stops.on_low_mood && snapshot.mood.at_or_below(stops.mood_threshold) {
        return Some(StopReason::LowMood { mood: snapshot.mood });
    }
    if stops.on_need_rest {
        let critical = snapshot
            .energy_percent
            .map(|e| e < scoring.critical_energy_percent)
            .unwrap_or(false);
        if critical {
            return Some(StopReason::NeedRest { energy_percent: snapshot.energy_percent });
        }
    }
    if stops.on_infirmary && snapshot.infirmary && snapshot.day > stops.infirmary_after_day {
        return Some(StopReason::Infirmary);
    }
    if stops.on_race_day && snapshot.race_day {
        return Some(StopReason::RaceDay);
    }

    let date = snapshot.date?;
    if stops.before_summer && date.month() == Some(Month::Jun) && snapshot.day > 24 {
        return Some(StopReason::BeforeSummer);
    }
    if let Some(target) = stops.target() {
        if date.absolute_day() >= target.absolute_day() {
            return Some(StopReason::TargetDate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::{CareerDate, CareerYear, Half};

    fn lobby(year: CareerYear, month: Month, half: Half) -> TurnSnapshot {
        TurnSnapshot::lobby(1, CareerDate::Regular { year, month, half })
    }

    fn enabled() -> StopConditionConfig {
        StopConditionConfig { enabled: true, before_summer: false, ..Default::default() }
    }

    #[test]
    fn test_master_switch() {
        let mut snap = lobby(CareerYear::Classic, Month::Mar, Half::Early);
        snap.mood = Mood::Awful;
        let scoring = ScoringConfig::default();
        assert_eq!(check_stop_conditions(&snap, &StopConditionConfig::default(), &scoring), None);
        assert_eq!(
            check_stop_conditions(&snap, &enabled(), &scoring),
            Some(StopReason::LowMood { mood: Mood::Awful })
        );
    }

    #[test]
    fn test_career_complete_ignores_master_switch() {
        let snap = TurnSnapshot::lobby(1, CareerDate::Finale);
        assert_eq!(
            check_stop_conditions(&snap, &StopConditionConfig::default(), &ScoringConfig::default()),
            Some(StopReason::CareerComplete)
        );
    }

    #[test]
    fn test_mood_threshold_is_inclusive() {
        let scoring = ScoringConfig::default();
        let mut snap = lobby(CareerYear::Classic, Month::Mar, Half::Early);
        snap.mood = Mood::Bad;
        assert!(check_stop_conditions(&snap, &enabled(), &scoring).is_some());
        snap.mood = Mood::Normal;
        assert!(check_stop_conditions(&snap, &enabled(), &scoring).is_none());
        snap.mood = Mood::Unknown;
        assert!(check_stop_conditions(&snap, &enabled(), &scoring).is_none());
    }

    #[test]
    fn test_infirmary_only_after_day() {
        let scoring = ScoringConfig::default();
        let mut early = lobby(CareerYear::Junior, Month::Nov, Half::Early);
        early.infirmary = true;
        assert!(early.day <= 24);
        assert_eq!(check_stop_conditions(&early, &enabled(), &scoring), None);

        let mut later = lobby(CareerYear::Classic, Month::Feb, Half::Early);
        later.infirmary = true;
        assert_eq!(check_stop_conditions(&later, &enabled(), &scoring), Some(StopReason::Infirmary));
    }

    #[test]
    fn test_need_rest_uses_critical_energy() {
        let scoring = ScoringConfig::default();
        let stops = StopConditionConfig { on_need_rest: true, ..enabled() };
        let mut snap = lobby(CareerYear::Classic, Month::Mar, Half::Early);
        snap.energy_percent = Some(scoring.critical_energy_percent - 1);
        assert!(matches!(check_stop_conditions(&snap, &stops, &scoring), Some(StopReason::NeedRest { .. })));
        snap.energy_percent = None;
        assert_eq!(check_stop_conditions(&snap, &stops, &scoring), None);
    }

    #[test]
    fn test_before_summer_skips_junior_year() {
        let scoring = ScoringConfig::default();
        let stops = StopConditionConfig { before_summer: true, ..enabled() };
        let junior = lobby(CareerYear::Junior, Month::Jun, Half::Late);
        assert_eq!(check_stop_conditions(&junior, &stops, &scoring), None);
        let classic = lobby(CareerYear::Classic, Month::Jun, Half::Early);
        assert_eq!(check_stop_conditions(&classic, &stops, &scoring), Some(StopReason::BeforeSummer));
    }

    #[test]
    fn test_target_date() {
        let scoring = ScoringConfig::default();
        let stops = StopConditionConfig {
            at_target_date: true,
            target_date: "Classic Year Early Apr".into(),
            ..enabled()
        };
        let before = lobby(CareerYear::Classic, Month::Mar, Half::Late);
        assert_eq!(check_stop_conditions(&before, &stops, &scoring), None);
        let on = lobby(CareerYear::Classic, Month::Apr, Half::Early);
        assert_eq!(check_stop_conditions(&on, &stops, &scoring), Some(StopReason::TargetDate));
    }
}
