//! Player preferences: strategy, stop conditions and race selection

use serde::{Deserialize, Serialize};

use crate::career::{CareerDate, DistanceCategory, GradeTable, Mood, RaceGrade, Track};

/// How races compete with training
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StrategyMode {
    /// Train when the best training reaches `threshold`, otherwise race if
    /// possible, otherwise rest
    ScoreThreshold { threshold: f64 },
    /// Race any open G1, otherwise follow the ranking
    PreferG1,
    /// Race any open G1 or G2, otherwise follow the ranking
    PreferG2,
}

impl StrategyMode {
    /// Lowest grade this mode races on sight
    pub fn preferred_grade(&self) -> Option<RaceGrade> {
        match self {
            StrategyMode::ScoreThreshold { .. } => None,
            StrategyMode::PreferG1 => Some(RaceGrade::G1),
            StrategyMode::PreferG2 => Some(RaceGrade::G2),
        }
    }
}

impl Default for StrategyMode {
    fn default() -> Self {
        StrategyMode::ScoreThreshold { threshold: 3.0 }
    }
}

/// Decision-level preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub mode: StrategyMode,
    /// Races in a row before racing is withheld (race days excepted)
    pub max_consecutive_races: u32,
    /// Option picked on event dialogs (0-based)
    pub default_event_choice: u8,
    /// Cure conditions at the infirmary when its button is lit
    pub visit_infirmary: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            mode: StrategyMode::default(),
            max_consecutive_races: 1,
            default_event_choice: 0,
            visit_infirmary: true,
        }
    }
}

/// Conditions that end a run gracefully
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopConditionConfig {
    /// Master switch for the optional conditions below
    pub enabled: bool,
    pub on_low_mood: bool,
    /// Stop when mood is at or below this
    pub mood_threshold: Mood,
    pub on_need_rest: bool,
    pub on_infirmary: bool,
    /// Infirmary is only honoured after this day
    pub infirmary_after_day: u32,
    pub on_race_day: bool,
    pub before_summer: bool,
    pub at_target_date: bool,
    /// Date banner text, e.g. "Classic Year Early Dec"
    pub target_date: String,
    /// Consecutive passes without the lobby before giving up
    pub max_lobby_misses: u32,
}

impl Default for StopConditionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            on_low_mood: true,
            mood_threshold: Mood::Bad,
            on_need_rest: false,
            on_infirmary: true,
            infirmary_after_day: 24,
            on_race_day: false,
            before_summer: true,
            at_target_date: false,
            target_date: "Junior Year Early Dec".to_string(),
            max_lobby_misses: 30,
        }
    }
}

impl StopConditionConfig {
    /// Parsed target date, if stopping at a date is configured
    pub fn target(&self) -> Option<CareerDate> {
        if self.at_target_date {
            CareerDate::parse(&self.target_date)
        } else {
            None
        }
    }
}

/// A race the player wants run when its date comes up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledRace {
    pub race_id: String,
}

/// Which races are acceptable outside race days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceFilterConfig {
    pub turf: bool,
    pub dirt: bool,
    pub sprint: bool,
    pub mile: bool,
    pub medium: bool,
    pub long: bool,
    pub grades: GradeTable<bool>,
    pub schedule: Vec<ScheduledRace>,
}

impl Default for RaceFilterConfig {
    fn default() -> Self {
        Self {
            turf: true,
            dirt: true,
            sprint: true,
            mile: true,
            medium: true,
            long: true,
            grades: GradeTable { g1: true, g2: true, g3: true, op: false },
            schedule: Vec::new(),
        }
    }
}

impl RaceFilterConfig {
    pub fn allows_track(&self, track: Track) -> bool {
        match track {
            Track::Turf => self.turf,
            Track::Dirt => self.dirt,
        }
    }

    pub fn allows_distance(&self, distance: DistanceCategory) -> bool {
        match distance {
            DistanceCategory::Sprint => self.sprint,
            DistanceCategory::Mile => self.mile,
            DistanceCategory::Medium => self.medium,
            DistanceCategory::Long => self.long,
        }
    }

    pub fn allows_grade(&self, grade: RaceGrade) -> bool {
        self.grades[grade]
    }

    pub fn is_scheduled(&self, race_id: &str) -> bool {
        self.schedule.iter().any(|s| s.race_id == race_id)
    }
}
