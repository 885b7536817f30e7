//! Career stages and stage-indexed tables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Coarse phase of the career, derived from the elapsed day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PreDebut,
    Early,
    Mid,
    Late,
}

impl Stage {
    /// Classify a day against the configured upper bounds.
    ///
    /// Each bound is inclusive, so with the defaults day 16 is still
    /// pre-debut and day 17 is early.
    pub fn classify(day: u32, thresholds: &StageThresholds) -> Stage {
        if day <= thresholds.pre_debut {
            Stage::PreDebut
        } else if day <= thresholds.early {
            Stage::Early
        } else if day <= thresholds.mid {
            Stage::Mid
        } else {
            Stage::Late
        }
    }

    /// Stages where WIT gets its early bonus
    pub fn is_early_game(&self) -> bool {
        matches!(self, Stage::PreDebut | Stage::Early)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::PreDebut => "pre-debut",
            Stage::Early => "early",
            Stage::Mid => "mid",
            Stage::Late => "late",
        };
        f.write_str(name)
    }
}

/// Inclusive last day of each stage except `Late`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageThresholds {
    pub pre_debut: u32,
    pub early: u32,
    pub mid: u32,
}

impl Default for StageThresholds {
    fn default() -> Self {
        Self {
            pre_debut: 16,
            early: 24,
            mid: 48,
        }
    }
}

impl StageThresholds {
    pub fn is_monotonic(&self) -> bool {
        self.pre_debut < self.early && self.early < self.mid
    }
}

/// One value per stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTable<T> {
    pub pre_debut: T,
    pub early: T,
    pub mid: T,
    pub late: T,
}

impl<T> StageTable<T> {
    pub fn new(pre_debut: T, early: T, mid: T, late: T) -> Self {
        Self { pre_debut, early, mid, late }
    }

    pub fn values(&self) -> [&T; 4] {
        [&self.pre_debut, &self.early, &self.mid, &self.late]
    }
}

impl<T> Index<Stage> for StageTable<T> {
    type Output = T;

    fn index(&self, stage: Stage) -> &T {
        match stage {
            Stage::PreDebut => &self.pre_debut,
            Stage::Early => &self.early,
            Stage::Mid => &self.mid,
            Stage::Late => &self.late,
        }
    }
}
