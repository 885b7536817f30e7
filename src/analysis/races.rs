//! Race availability for a turn

use tracing::debug;

use crate::career::{CareerDate, RaceCatalog, RaceEntry};
use crate::config::RaceFilterConfig;

/// A race that can be entered this turn
#[derive(Debug, Clone, PartialEq)]
pub struct RaceOption {
    pub race: RaceEntry,
    /// Listed in the player's schedule
    pub scheduled: bool,
}

/// Races the player would accept on a normal turn.
///
/// Nothing is offered while racing is restricted. Scheduled races bypass
/// the track, distance and grade filters.
pub fn available_races(catalog: &RaceCatalog, date: Option<&CareerDate>, filters: &RaceFilterConfig) -> Vec<RaceOption> {
    let Some(date) = date else {
        return Vec::new();
    };
    if date.is_restricted_for_racing() {
        return Vec::new();
    }

    catalog
        .on_date(date)
        .into_iter()
        .filter_map(|race| {
            let scheduled = filters.is_scheduled(&race.id);
            let allowed = filters.allows_track(race.track)
                && filters.allows_distance(race.distance())
                && filters.allows_grade(race.grade);
            if scheduled || allowed {
                Some(RaceOption { race: race.clone(), scheduled })
            } else {
                debug!("Race {} filtered out", race.id);
                None
            }
        })
        .collect()
}

/// Races on a mandatory race day, ignoring filters, highest grade first
pub fn race_day_options(catalog: &RaceCatalog, date: Option<&CareerDate>, filters: &RaceFilterConfig) -> Vec<RaceOption> {
    let Some(date) = date else {
        return Vec::new();
    };
    if date.is_pre_debut() {
        return Vec::new();
    }
    catalog
        .on_date(date)
        .into_iter()
        .map(|race| RaceOption {
            scheduled: filters.is_scheduled(&race.id),
            race: race.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::{CareerYear, Half, Month, RaceGrade, Track};
    use crate::config::ScheduledRace;

    fn race(id: &str, grade: RaceGrade, track: Track, month: Month, half: Half) -> RaceEntry {
        RaceEntry {
            id: id.into(),
            name: id.into(),
            year: CareerYear::Classic,
            month,
            half,
            grade,
            track,
            distance_m: 1600,
            fans: 3000,
            skill_points: 30,
        }
    }

    fn catalog() -> RaceCatalog {
        RaceCatalog::new(vec![
            race("oka_sho", RaceGrade::G1, Track::Turf, Month::Apr, Half::Early),
            race("dirt_cup", RaceGrade::G3, Track::Dirt, Month::Apr, Half::Early),
            race("spring_op", RaceGrade::Open, Track::Turf, Month::Apr, Half::Early),
            race("summer_g2", RaceGrade::G2, Track::Turf, Month::Jul, Half::Early),
        ])
    }

    fn date(month: Month) -> CareerDate {
        CareerDate::Regular { year: CareerYear::Classic, month, half: Half::Early }
    }

    #[test]
    fn test_filters_apply() {
        let filters = RaceFilterConfig { dirt: false, ..Default::default() };
        let ids: Vec<String> = available_races(&catalog(), Some(&date(Month::Apr)), &filters)
            .into_iter()
            .map(|o| o.race.id)
            .collect();
        assert_eq!(ids, vec!["oka_sho"]);
    }

    #[test]
    fn test_scheduled_race_bypasses_filters() {
        let filters = RaceFilterConfig {
            schedule: vec![ScheduledRace { race_id: "spring_op".into() }],
            ..Default::default()
        };
        let options = available_races(&catalog(), Some(&date(Month::Apr)), &filters);
        let op = options.iter().find(|o| o.race.id == "spring_op").unwrap();
        assert!(op.scheduled);
    }

    #[test]
    fn test_restricted_period_offers_nothing() {
        let filters = RaceFilterConfig::default();
        assert!(available_races(&catalog(), Some(&date(Month::Jul)), &filters).is_empty());
        assert!(available_races(&catalog(), None, &filters).is_empty());
    }

    #[test]
    fn test_race_day_ignores_filters_and_restrictions() {
        let filters = RaceFilterConfig { turf: false, ..Default::default() };
        let options = race_day_options(&catalog(), Some(&date(Month::Jul)), &filters);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].race.id, "summer_g2");
    }
}
