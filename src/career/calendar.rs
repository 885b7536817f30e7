//! Career calendar
//!
//! A career runs three years of 24 half-month turns (days 1-72) followed by
//! the Finale Season. Dates are read from the on-screen banner, e.g.
//! "Classic Year Late Oct" or "Junior Year Pre-Debut".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Last regular career day
pub const CAREER_DAYS: u32 = 72;

/// Day index reported for the Finale Season
pub const FINALE_DAY: u32 = CAREER_DAYS + 1;

/// Career year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareerYear {
    Junior,
    Classic,
    Senior,
}

impl CareerYear {
    const ALL: [CareerYear; 3] = [CareerYear::Junior, CareerYear::Classic, CareerYear::Senior];

    fn index(self) -> u32 {
        self as u32
    }

    fn token(self) -> &'static str {
        match self {
            CareerYear::Junior => "junior",
            CareerYear::Classic => "classic",
            CareerYear::Senior => "senior",
        }
    }
}

/// Calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    /// 1-based month number
    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    fn token(self) -> String {
        format!("{:?}", self).to_ascii_lowercase()
    }
}

/// First or second half of a month; each half is one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Half {
    Early,
    Late,
}

/// A position on the career calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CareerDate {
    /// Before the debut race; counted as the first day of its year
    PreDebut { year: CareerYear },
    /// A regular turn
    Regular { year: CareerYear, month: Month, half: Half },
    /// Finale Season, after the last regular turn
    Finale,
}

impl CareerDate {
    /// Absolute day in `1..=72`, or [`FINALE_DAY`] for the finale
    pub fn absolute_day(&self) -> u32 {
        match *self {
            CareerDate::PreDebut { year } => year.index() * 24 + 1,
            CareerDate::Regular { year, month, half } => {
                let half_offset = match half {
                    Half::Early => 0,
                    Half::Late => 1,
                };
                year.index() * 24 + (month.number() - 1) * 2 + half_offset + 1
            }
            CareerDate::Finale => FINALE_DAY,
        }
    }

    pub fn is_pre_debut(&self) -> bool {
        matches!(self, CareerDate::PreDebut { .. })
    }

    pub fn is_finale(&self) -> bool {
        matches!(self, CareerDate::Finale)
    }

    pub fn month(&self) -> Option<Month> {
        match self {
            CareerDate::Regular { month, .. } => Some(*month),
            _ => None,
        }
    }

    pub fn year(&self) -> Option<CareerYear> {
        match self {
            CareerDate::PreDebut { year } | CareerDate::Regular { year, .. } => Some(*year),
            CareerDate::Finale => None,
        }
    }

    /// Racing is closed during pre-debut, the first 16 days and the summer
    /// camp window (all of July and early August).
    pub fn is_restricted_for_racing(&self) -> bool {
        match *self {
            CareerDate::PreDebut { .. } => true,
            CareerDate::Finale => false,
            CareerDate::Regular { month, half, .. } => {
                self.absolute_day() <= 16
                    || month == Month::Jul
                    || (month == Month::Aug && half == Half::Early)
            }
        }
    }

    /// Parse the date banner text, tolerating common OCR slips
    pub fn parse(text: &str) -> Option<CareerDate> {
        let cleaned = clean_banner(text);
        if cleaned.is_empty() {
            return None;
        }

        if cleaned.contains("finale") || cleaned.contains("finalseason") {
            return Some(CareerDate::Finale);
        }

        let (year, rest) = CareerYear::ALL
            .into_iter()
            .find_map(|year| cleaned.find(year.token()).map(|at| (year, &cleaned[at + year.token().len()..])))?;

        if rest.contains("predebut") || rest.contains("debut") {
            return Some(CareerDate::PreDebut { year });
        }

        let rest = rest.strip_prefix("year").unwrap_or(rest);
        let (half, rest) = if let Some(tail) = rest.strip_prefix("early") {
            (Half::Early, tail)
        } else if let Some(tail) = rest.strip_prefix("late") {
            (Half::Late, tail)
        } else if let Some(at) = rest.find("late") {
            (Half::Late, &rest[at + 4..])
        } else if let Some(at) = rest.find("early") {
            (Half::Early, &rest[at + 5..])
        } else {
            // Half unreadable, assume the early turn
            (Half::Early, rest)
        };

        let month = Month::ALL.into_iter().find(|month| rest.starts_with(&month.token()))
            .or_else(|| Month::ALL.into_iter().find(|month| rest.contains(&month.token())))?;

        Some(CareerDate::Regular { year, month, half })
    }
}

impl fmt::Display for CareerDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CareerDate::PreDebut { year } => write!(f, "{:?} Year Pre-Debut", year),
            CareerDate::Regular { year, month, half } => {
                write!(f, "{:?} Year {:?} {:?}", year, half, month)
            }
            CareerDate::Finale => f.write_str("Finale Season"),
        }
    }
}

/// Known banner misreads, applied after whitespace and symbols are removed
const BANNER_FIXES: &[(&str, &str)] = &[
    ("jlate", "late"),
    ("jearly", "early"),
    ("earlv", "early"),
    ("eariy", "early"),
    ("eary", "early"),
    ("latv", "late"),
    ("lale", "late"),
    ("classiv", "classic"),
    ("clasic", "classic"),
    ("ciassic", "classic"),
    ("glassic", "classic"),
    ("senlor", "senior"),
    ("seniom", "senior"),
    ("senor", "senior"),
    ("junlor", "junior"),
    ("yunior", "junior"),
    ("yean", "year"),
    ("pul", "jul"),
];

fn clean_banner(text: &str) -> String {
    let mut cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    for (typo, fix) in BANNER_FIXES {
        if cleaned.contains(typo) {
            cleaned = cleaned.replace(typo, fix);
        }
    }
    cleaned
}
