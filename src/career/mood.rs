//! Character mood and OCR mood recognition

use serde::{Deserialize, Serialize};
use std::fmt;
use strsim::normalized_levenshtein;

/// Mood shown on the career lobby, worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mood {
    Awful,
    Bad,
    Normal,
    Good,
    Great,
    Unknown,
}

/// Misreads that must resolve to a fixed mood regardless of edit distance.
/// GOOD and BAD are easily confused once a glyph drops out.
const CONFUSIONS: &[(&str, Mood)] = &[
    ("GOD", Mood::Good),
    ("OOD", Mood::Good),
    ("GOO", Mood::Good),
    ("GOOP", Mood::Good),
    ("GOOO", Mood::Good),
    ("COOO", Mood::Good),
    ("COOD", Mood::Good),
    ("GCOD", Mood::Good),
    ("G00D", Mood::Good),
    ("GO0D", Mood::Good),
    ("G0OD", Mood::Good),
    ("BD", Mood::Bad),
    ("B4D", Mood::Bad),
    ("BAO", Mood::Bad),
    ("BAP", Mood::Bad),
    ("BRD", Mood::Bad),
    ("BED", Mood::Bad),
    ("AVVFUL", Mood::Awful),
    ("NORMAI", Mood::Normal),
    ("CREAT", Mood::Great),
];

const NAMED: [(&str, Mood); 5] = [
    ("AWFUL", Mood::Awful),
    ("BAD", Mood::Bad),
    ("NORMAL", Mood::Normal),
    ("GOOD", Mood::Good),
    ("GREAT", Mood::Great),
];

impl Mood {
    /// Position on the worst-to-best scale, `None` for [`Mood::Unknown`]
    pub fn rank(&self) -> Option<u8> {
        match self {
            Mood::Awful => Some(0),
            Mood::Bad => Some(1),
            Mood::Normal => Some(2),
            Mood::Good => Some(3),
            Mood::Great => Some(4),
            Mood::Unknown => None,
        }
    }

    /// True when both moods are known and `self` is at or below `threshold`
    pub fn at_or_below(&self, threshold: Mood) -> bool {
        match (self.rank(), threshold.rank()) {
            (Some(current), Some(limit)) => current <= limit,
            _ => false,
        }
    }

    /// Resolve raw OCR text into a mood.
    ///
    /// Exact names win, then the confusion table, then the closest name by
    /// normalized Levenshtein similarity if it clears `similarity_floor`.
    pub fn from_ocr(text: &str, similarity_floor: f64) -> Mood {
        let cleaned: String = text
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if cleaned.len() < 2 {
            return Mood::Unknown;
        }

        if let Some((_, mood)) = NAMED.iter().find(|(name, _)| *name == cleaned) {
            return *mood;
        }

        if let Some((_, mood)) = CONFUSIONS.iter().find(|(typo, _)| *typo == cleaned) {
            return *mood;
        }

        let best = NAMED
            .iter()
            .map(|(name, mood)| (normalized_levenshtein(name, &cleaned), *mood))
            .max_by(|a, b| a.0.total_cmp(&b.0));

        match best {
            Some((similarity, mood)) if similarity >= similarity_floor => mood,
            _ => Mood::Unknown,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mood::Awful => "AWFUL",
            Mood::Bad => "BAD",
            Mood::Normal => "NORMAL",
            Mood::Good => "GOOD",
            Mood::Great => "GREAT",
            Mood::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_names() {
        assert_eq!(Mood::from_ocr("GREAT", 0.6), Mood::Great);
        assert_eq!(Mood::from_ocr(" normal\n", 0.6), Mood::Normal);
    }

    #[test]
    fn test_good_bad_confusions_never_cross() {
        assert_eq!(Mood::from_ocr("GOD", 0.6), Mood::Good);
        assert_eq!(Mood::from_ocr("G00D", 0.6), Mood::Good);
        assert_eq!(Mood::from_ocr("B4D", 0.6), Mood::Bad);
        assert_eq!(Mood::from_ocr("BRD", 0.6), Mood::Bad);
    }

    #[test]
    fn test_fuzzy_match_and_floor() {
        assert_eq!(Mood::from_ocr("NORMOL", 0.6), Mood::Normal);
        assert_eq!(Mood::from_ocr("GRFAT", 0.6), Mood::Great);
        assert_eq!(Mood::from_ocr("XYZQW", 0.6), Mood::Unknown);
        assert_eq!(Mood::from_ocr("", 0.6), Mood::Unknown);
    }

    #[test]
    fn test_at_or_below() {
        assert!(Mood::Awful.at_or_below(Mood::Bad));
        assert!(Mood::Bad.at_or_below(Mood::Bad));
        assert!(!Mood::Normal.at_or_below(Mood::Bad));
        assert!(!Mood::Unknown.at_or_below(Mood::Great));
    }
}
