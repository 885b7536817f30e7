//! Race reference data
//!
//! The catalog is static per career: one entry per race with the slot of
//! the calendar it runs on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

use super::calendar::{CareerDate, CareerYear, Half, Month};

/// Race grade, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RaceGrade {
    G1,
    G2,
    G3,
    #[serde(rename = "OP")]
    Open,
}

impl fmt::Display for RaceGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RaceGrade::G1 => "G1",
            RaceGrade::G2 => "G2",
            RaceGrade::G3 => "G3",
            RaceGrade::Open => "OP",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Turf,
    Dirt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceCategory {
    Sprint,
    Mile,
    Medium,
    Long,
}

impl DistanceCategory {
    /// Sprint up to 1400 m, mile up to 1800 m, medium up to 2400 m
    pub fn from_metres(metres: u32) -> Self {
        match metres {
            0..=1400 => DistanceCategory::Sprint,
            1401..=1800 => DistanceCategory::Mile,
            1801..=2400 => DistanceCategory::Medium,
            _ => DistanceCategory::Long,
        }
    }
}

/// One value per race grade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeTable<T> {
    pub g1: T,
    pub g2: T,
    pub g3: T,
    pub op: T,
}

impl<T> Index<RaceGrade> for GradeTable<T> {
    type Output = T;

    fn index(&self, grade: RaceGrade) -> &T {
        match grade {
            RaceGrade::G1 => &self.g1,
            RaceGrade::G2 => &self.g2,
            RaceGrade::G3 => &self.g3,
            RaceGrade::Open => &self.op,
        }
    }
}

/// A race in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEntry {
    pub id: String,
    pub name: String,
    pub year: CareerYear,
    pub month: Month,
    pub half: Half,
    pub grade: RaceGrade,
    pub track: Track,
    pub distance_m: u32,
    #[serde(default)]
    pub fans: u32,
    #[serde(default)]
    pub skill_points: u32,
}

impl RaceEntry {
    pub fn distance(&self) -> DistanceCategory {
        DistanceCategory::from_metres(self.distance_m)
    }

    /// Whether the race runs on the given calendar slot
    pub fn runs_on(&self, date: &CareerDate) -> bool {
        match date {
            CareerDate::Regular { year, month, half } => {
                self.year == *year && self.month == *month && self.half == *half
            }
            _ => false,
        }
    }
}

/// All known races
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceCatalog {
    pub races: Vec<RaceEntry>,
}

impl RaceCatalog {
    pub fn new(races: Vec<RaceEntry>) -> Self {
        Self { races }
    }

    pub fn get(&self, id: &str) -> Option<&RaceEntry> {
        self.races.iter().find(|r| r.id == id)
    }

    /// Races on a calendar slot, highest grade first
    pub fn on_date(&self, date: &CareerDate) -> Vec<&RaceEntry> {
        let mut races: Vec<&RaceEntry> = self.races.iter().filter(|r| r.runs_on(date)).collect();
        races.sort_by(|a, b| a.grade.cmp(&b.grade).then_with(|| a.id.cmp(&b.id)));
        races
    }

    pub fn len(&self) -> usize {
        self.races.len()
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }
}
