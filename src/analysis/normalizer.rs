//! State normalizer
//!
//! Turns one pass of raw readings into an immutable [`TurnSnapshot`].
//! Missing data never fails the turn: fields become unknown and the
//! snapshot is marked degraded when it can no longer drive a decision.

use tracing::{debug, warn};

use crate::career::{
    CareerDate, DegradeReason, Mood, ScreenContext, SnapshotStatus, StatKind, StatTable, StatValue,
    TrainingOption, TurnSnapshot,
};
use crate::config::PerceptionConfig;
use crate::vision::{parse_number, parse_percent, RawReadings, TextRead};

/// Highest value any stat can show
pub const MAX_STAT_VALUE: u32 = 1200;

fn accepted_stat(read: Option<&TextRead>, floor: f32) -> Option<u32> {
    read.and_then(|r| r.accepted(floor))
        .and_then(parse_number)
        .filter(|value| *value <= MAX_STAT_VALUE)
}

/// Build the snapshot for one perception pass.
///
/// `previous` is the last snapshot of this session, used to reject stat
/// decreases. `reread` is called at most once per suspicious stat and must
/// return a fresh read of that stat's region.
pub fn normalize(
    raw: &RawReadings,
    previous: Option<&TurnSnapshot>,
    sequence: u64,
    config: &PerceptionConfig,
    mut reread: impl FnMut(StatKind) -> Option<TextRead>,
) -> TurnSnapshot {
    let floor = config.confidence_floor;
    let screen = raw.screen.unwrap_or(ScreenContext::Unknown);

    let date = raw
        .date
        .as_ref()
        .and_then(|r| r.accepted(floor))
        .and_then(CareerDate::parse);
    let mood = raw
        .mood
        .as_ref()
        .and_then(|r| r.accepted(floor))
        .map(|text| Mood::from_ocr(text, config.mood_similarity_floor))
        .unwrap_or(Mood::Unknown);

    let stats = StatTable::from_fn(|kind| {
        let last = previous.and_then(|p| p.stat(kind));
        let current = accepted_stat(raw.stats[kind].as_ref(), floor)?;
        match last {
            Some(last) if current < last => {
                debug!("{} read {} below previous {}, re-reading", kind, current, last);
                match accepted_stat(reread(kind).as_ref(), floor) {
                    Some(again) if again >= last => Some(StatValue::fresh(again)),
                    _ => {
                        warn!("{} still reads below {}, keeping previous value", kind, last);
                        Some(StatValue::stale(last))
                    }
                }
            }
            _ => Some(StatValue::fresh(current)),
        }
    });

    let training = StatTable::from_fn(|kind| {
        let failure_risk = raw.failure[kind]
            .as_ref()
            .and_then(|r| r.accepted(floor))
            .and_then(parse_percent);
        match (failure_risk, raw.support[kind]) {
            (None, None) => None,
            (failure_risk, support) => Some(TrainingOption {
                failure_risk,
                support: support.unwrap_or_default(),
            }),
        }
    });

    let status = if screen == ScreenContext::Unknown {
        SnapshotStatus::Degraded(DegradeReason::UnknownScreen)
    } else if screen.is_turn_screen() && raw.energy_percent.is_none() {
        SnapshotStatus::Degraded(DegradeReason::EnergyUnreadable)
    } else if screen.is_turn_screen() && date.is_none() {
        SnapshotStatus::Degraded(DegradeReason::DateUnreadable)
    } else {
        SnapshotStatus::Valid
    };

    TurnSnapshot {
        sequence,
        date,
        day: date.map(|d| d.absolute_day()).unwrap_or(0),
        mood,
        energy_percent: raw.energy_percent,
        stats,
        training,
        screen,
        race_day: raw.race_day,
        is_pre_debut: date.map(|d| d.is_pre_debut()).unwrap_or(false),
        infirmary: raw.infirmary,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::SupportCards;

    fn read(text: &str) -> Option<TextRead> {
        Some(TextRead::new(text, 0.95))
    }

    fn lobby() -> RawReadings {
        RawReadings {
            screen: Some(ScreenContext::Lobby),
            date: read("Classic Year Late Jun"),
            mood: read("GOOD"),
            energy_percent: Some(80),
            ..Default::default()
        }
    }

    fn no_reread(_: StatKind) -> Option<TextRead> {
        panic!("unexpected re-read")
    }

    #[test]
    fn test_valid_lobby_snapshot() {
        let mut raw = lobby();
        raw.stats.speed = read("512");
        raw.failure.speed = read("7%");
        raw.support.speed = Some(SupportCards { count: 2, ..Default::default() });

        let snap = normalize(&raw, None, 1, &PerceptionConfig::default(), no_reread);

        assert_eq!(snap.status, SnapshotStatus::Valid);
        assert_eq!(snap.day, 36);
        assert_eq!(snap.mood, Mood::Good);
        assert_eq!(snap.stat(StatKind::Speed), Some(512));
        assert_eq!(snap.stat(StatKind::Wit), None);
        let speed = snap.training.speed.unwrap();
        assert_eq!(speed.failure_risk, Some(7));
        assert_eq!(speed.support.count, 2);
        assert!(snap.training.power.is_none());
    }

    #[test]
    fn test_unknown_screen_is_degraded() {
        let raw = RawReadings::default();
        let snap = normalize(&raw, None, 1, &PerceptionConfig::default(), no_reread);
        assert_eq!(snap.degrade_reason(), Some(DegradeReason::UnknownScreen));
    }

    #[test]
    fn test_unknown_energy_is_not_zero() {
        let mut raw = lobby();
        raw.energy_percent = None;
        let snap = normalize(&raw, None, 1, &PerceptionConfig::default(), no_reread);
        assert_eq!(snap.energy_percent, None);
        assert_eq!(snap.degrade_reason(), Some(DegradeReason::EnergyUnreadable));

        raw.energy_percent = Some(0);
        let snap = normalize(&raw, None, 2, &PerceptionConfig::default(), no_reread);
        assert_eq!(snap.energy_percent, Some(0));
        assert!(!snap.is_degraded());
    }

    #[test]
    fn test_low_confidence_reads_are_unknown() {
        let mut raw = lobby();
        raw.mood = Some(TextRead::new("GREAT", 0.2));
        raw.stats.power = Some(TextRead::new("300", 0.2));
        raw.date = Some(TextRead::new("Classic Year Late Jun", 0.1));

        let snap = normalize(&raw, None, 1, &PerceptionConfig::default(), no_reread);
        assert_eq!(snap.mood, Mood::Unknown);
        assert_eq!(snap.stat(StatKind::Power), None);
        assert_eq!(snap.degrade_reason(), Some(DegradeReason::DateUnreadable));
    }

    #[test]
    fn test_non_lobby_screen_is_valid_without_readings() {
        let raw = RawReadings { screen: Some(ScreenContext::EventChoice), ..Default::default() };
        let snap = normalize(&raw, None, 1, &PerceptionConfig::default(), no_reread);
        assert!(!snap.is_degraded());
        assert_eq!(snap.screen, ScreenContext::EventChoice);
    }

    #[test]
    fn test_stat_decrease_is_reread_once() {
        let mut before = lobby();
        before.stats.stamina = read("400");
        let previous = normalize(&before, None, 1, &PerceptionConfig::default(), no_reread);

        let mut raw = lobby();
        raw.stats.stamina = read("100");
        let mut calls = 0;
        let snap = normalize(&raw, Some(&previous), 2, &PerceptionConfig::default(), |kind| {
            calls += 1;
            assert_eq!(kind, StatKind::Stamina);
            read("410")
        });
        assert_eq!(calls, 1);
        assert_eq!(snap.stats.stamina, Some(StatValue::fresh(410)));
    }

    #[test]
    fn test_persistent_decrease_keeps_previous_as_stale() {
        let mut before = lobby();
        before.stats.guts = read("250");
        let previous = normalize(&before, None, 1, &PerceptionConfig::default(), no_reread);

        let mut raw = lobby();
        raw.stats.guts = read("25");
        let snap = normalize(&raw, Some(&previous), 2, &PerceptionConfig::default(), |_| read("25"));
        assert_eq!(snap.stats.guts, Some(StatValue::stale(250)));
    }

    #[test]
    fn test_missing_stat_read_stays_unknown() {
        let mut before = lobby();
        before.stats.guts = read("250");
        let previous = normalize(&before, None, 1, &PerceptionConfig::default(), no_reread);

        let mut raw = lobby();
        raw.stats.guts = None;
        let snap = normalize(&raw, Some(&previous), 2, &PerceptionConfig::default(), no_reread);
        assert_eq!(snap.stats.guts, None);
    }

    #[test]
    fn test_implausible_stat_values_rejected() {
        let mut raw = lobby();
        raw.stats.wit = read("9999");
        let snap = normalize(&raw, None, 1, &PerceptionConfig::default(), no_reread);
        assert_eq!(snap.stat(StatKind::Wit), None);
    }
}
