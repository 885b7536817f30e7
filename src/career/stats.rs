//! Trainable stats and per-stat lookup tables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// One of the five trainable stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Speed,
    Stamina,
    Power,
    Guts,
    Wit,
}

impl StatKind {
    /// All stats in on-screen order (left to right on the training menu)
    pub const ALL: [StatKind; 5] = [
        StatKind::Speed,
        StatKind::Stamina,
        StatKind::Power,
        StatKind::Guts,
        StatKind::Wit,
    ];

    /// Short label used in logs and rationale entries
    pub fn short_name(&self) -> &'static str {
        match self {
            StatKind::Speed => "spd",
            StatKind::Stamina => "sta",
            StatKind::Power => "pwr",
            StatKind::Guts => "guts",
            StatKind::Wit => "wit",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A value for each stat, addressable by [`StatKind`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct StatTable<T> {
    pub speed: T,
    pub stamina: T,
    pub power: T,
    pub guts: T,
    pub wit: T,
}

impl<T> StatTable<T> {
    /// Build a table by evaluating `f` once per stat
    pub fn from_fn(mut f: impl FnMut(StatKind) -> T) -> Self {
        Self {
            speed: f(StatKind::Speed),
            stamina: f(StatKind::Stamina),
            power: f(StatKind::Power),
            guts: f(StatKind::Guts),
            wit: f(StatKind::Wit),
        }
    }

    /// Iterate `(stat, value)` pairs in on-screen order
    pub fn iter(&self) -> impl Iterator<Item = (StatKind, &T)> {
        StatKind::ALL.into_iter().map(move |kind| (kind, &self[kind]))
    }

    /// Map every value, keeping the stat association
    pub fn map<U>(&self, mut f: impl FnMut(StatKind, &T) -> U) -> StatTable<U> {
        StatTable::from_fn(|kind| f(kind, &self[kind]))
    }
}

impl<T> Index<StatKind> for StatTable<T> {
    type Output = T;

    fn index(&self, kind: StatKind) -> &T {
        match kind.slot() {
            0 => &self.speed,
            1 => &self.stamina,
            2 => &self.power,
            3 => &self.guts,
            _ => &self.wit,
        }
    }
}

impl<T> IndexMut<StatKind> for StatTable<T> {
    fn index_mut(&mut self, kind: StatKind) -> &mut T {
        match kind.slot() {
            0 => &mut self.speed,
            1 => &mut self.stamina,
            2 => &mut self.power,
            3 => &mut self.guts,
            _ => &mut self.wit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_field() {
        let mut table = StatTable::from_fn(|kind| kind.short_name().len());
        assert_eq!(table[StatKind::Guts], 4);
        table[StatKind::Wit] = 99;
        assert_eq!(table.wit, 99);
    }

    #[test]
    fn test_iter_is_screen_order() {
        let table = StatTable::from_fn(|kind| kind);
        let order: Vec<_> = table.iter().map(|(kind, _)| kind).collect();
        assert_eq!(order, StatKind::ALL.to_vec());
    }

    #[test]
    fn test_partial_table_deserializes_with_defaults() {
        let table: StatTable<u32> = serde_json::from_str(r#"{"speed": 600}"#).unwrap();
        assert_eq!(table.speed, 600);
        assert_eq!(table.wit, 0);
    }
}
