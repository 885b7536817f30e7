//! Scoring parameters
//!
//! Everything the scoring engine reads. Loaded once per run and never
//! mutated while a run is active.

use serde::{Deserialize, Serialize};

use crate::career::{GradeTable, StageTable, StageThresholds, StatKind, StatTable};

/// Weights and limits for ranking candidate actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub stage_thresholds: StageThresholds,
    /// Base score of any training, per stage
    pub base_score: StageTable<f64>,
    pub stage_multiplier: f64,
    pub bonuses: BonusWeights,
    pub energy_penalty: EnergyCurve,
    pub stat_caps: StatCapConfig,
    /// Trainings whose failure percentage exceeds this are never ranked
    pub failure_ceiling_percent: u8,
    /// Below this energy only WIT may be trained
    pub minimum_energy_percent: u8,
    /// Below this energy no training is offered at all
    pub critical_energy_percent: u8,
    /// Lowest score any candidate can end up with
    pub minimum_score: f64,
    /// Fixed score of the rest candidate
    pub rest_baseline: f64,
    /// Tie-break order, most preferred first
    pub priority_stats: Vec<StatKind>,
    pub races: RaceWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            stage_thresholds: StageThresholds::default(),
            base_score: StageTable::new(2.0, 2.0, 2.5, 3.0),
            stage_multiplier: 1.0,
            bonuses: BonusWeights::default(),
            energy_penalty: EnergyCurve::default(),
            stat_caps: StatCapConfig::default(),
            failure_ceiling_percent: 15,
            minimum_energy_percent: 40,
            critical_energy_percent: 20,
            minimum_score: 0.0,
            rest_baseline: 1.0,
            priority_stats: StatKind::ALL.to_vec(),
            races: RaceWeights::default(),
        }
    }
}

impl ScoringConfig {
    /// Position of a stat in the priority order; unlisted stats sort last
    pub fn priority_index(&self, kind: StatKind) -> usize {
        self.priority_stats
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.priority_stats.len())
    }
}

/// Additive bonuses from support cards and training flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusWeights {
    /// Per support card that is neither rainbow nor friend
    pub support_card: f64,
    /// Hint bonus before `hint_late_from_day`
    pub hint_early: f64,
    /// Hint bonus from `hint_late_from_day` on
    pub hint_late: f64,
    pub hint_late_from_day: u32,
    /// Per NPC card
    pub npc: f64,
    pub special_training: f64,
    pub spirit_explosion: f64,
    /// Per friend card
    pub friend: f64,
    /// Per rainbow card, per stage
    pub rainbow: StageTable<f64>,
    pub wit_early_stage: f64,
}

impl Default for BonusWeights {
    fn default() -> Self {
        Self {
            support_card: 1.0,
            hint_early: 1.0,
            hint_late: 0.5,
            hint_late_from_day: 36,
            npc: 0.5,
            special_training: 1.0,
            spirit_explosion: 1.5,
            friend: 0.75,
            rainbow: StageTable::new(1.0, 1.0, 2.0, 2.5),
            wit_early_stage: 0.5,
        }
    }
}

/// One knot of the energy penalty curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyPoint {
    pub energy: u8,
    pub penalty: f64,
}

/// Piecewise-linear penalty by energy percentage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyCurve {
    /// Knots ordered by strictly increasing energy
    pub points: Vec<EnergyPoint>,
}

impl Default for EnergyCurve {
    fn default() -> Self {
        Self {
            points: vec![
                EnergyPoint { energy: 0, penalty: 2.0 },
                EnergyPoint { energy: 30, penalty: 1.0 },
                EnergyPoint { energy: 50, penalty: 0.25 },
                EnergyPoint { energy: 70, penalty: 0.0 },
            ],
        }
    }
}

impl EnergyCurve {
    /// Interpolated penalty, clamped to the end knots
    pub fn penalty_at(&self, energy: u8) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if energy <= first.energy {
            return first.penalty;
        }
        if energy >= last.energy {
            return last.penalty;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if energy >= a.energy && energy <= b.energy {
                let span = f64::from(b.energy - a.energy);
                let t = f64::from(energy - a.energy) / span;
                return a.penalty + (b.penalty - a.penalty) * t;
            }
        }
        last.penalty
    }

    pub fn is_ordered(&self) -> bool {
        self.points.windows(2).all(|w| w[0].energy < w[1].energy)
    }
}

/// Cap reduction that applies from a given day onwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapAdjustment {
    pub from_day: u32,
    pub reduction: u32,
}

/// Fraction of training gain that spills into another stat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossTraining {
    pub from: StatKind,
    pub to: StatKind,
    pub coefficient: f64,
}

/// Stat-cap penalty parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatCapConfig {
    pub enabled: bool,
    /// Caps are ignored before this day
    pub threshold_day: u32,
    pub base_caps: StatTable<u32>,
    /// Step function over days; the entry with the largest `from_day` not
    /// after the current day wins
    pub day_adjustments: Vec<CapAdjustment>,
    /// Penalty starts at this fraction of the effective cap...
    pub start_penalty_percent: f64,
    /// ...or when the stat is within this many points of it
    pub start_penalty_gap: u32,
    /// Ceiling of the penalty as a fraction of the stage base score
    pub max_penalty_percent: f64,
    pub cross_training: Vec<CrossTraining>,
}

impl Default for StatCapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_day: 30,
            base_caps: StatTable {
                speed: 1120,
                stamina: 1120,
                power: 1120,
                guts: 500,
                wit: 500,
            },
            day_adjustments: vec![
                CapAdjustment { from_day: 1, reduction: 60 },
                CapAdjustment { from_day: 72, reduction: 45 },
                CapAdjustment { from_day: 73, reduction: 30 },
            ],
            start_penalty_percent: 0.8,
            start_penalty_gap: 200,
            max_penalty_percent: 0.4,
            cross_training: vec![
                CrossTraining { from: StatKind::Speed, to: StatKind::Power, coefficient: 0.3 },
                CrossTraining { from: StatKind::Stamina, to: StatKind::Guts, coefficient: 0.3 },
                CrossTraining { from: StatKind::Power, to: StatKind::Stamina, coefficient: 0.3 },
                CrossTraining { from: StatKind::Guts, to: StatKind::Speed, coefficient: 0.2 },
                CrossTraining { from: StatKind::Guts, to: StatKind::Power, coefficient: 0.2 },
                CrossTraining { from: StatKind::Wit, to: StatKind::Speed, coefficient: 0.2 },
            ],
        }
    }
}

impl StatCapConfig {
    /// Day-indexed cap reduction
    pub fn day_adjustment(&self, day: u32) -> u32 {
        self.day_adjustments
            .iter()
            .filter(|adj| adj.from_day <= day)
            .max_by_key(|adj| adj.from_day)
            .map(|adj| adj.reduction)
            .unwrap_or(0)
    }

    /// `base_cap - day_adjustment(day)`, never below zero
    pub fn effective_cap(&self, kind: StatKind, day: u32) -> u32 {
        self.base_caps[kind].saturating_sub(self.day_adjustment(day))
    }
}

/// Value weights for race candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceWeights {
    /// Per thousand fans
    pub fan_weight: f64,
    pub grade_weight: GradeTable<f64>,
    /// Per ten skill points
    pub skill_point_weight: f64,
    /// Added to races listed in the schedule
    pub scheduled_bonus: f64,
    /// Failure risk assumed for a race, per grade
    pub failure_risk_percent: GradeTable<u8>,
}

impl Default for RaceWeights {
    fn default() -> Self {
        Self {
            fan_weight: 0.1,
            grade_weight: GradeTable { g1: 3.0, g2: 2.2, g3: 1.6, op: 1.0 },
            skill_point_weight: 0.1,
            scheduled_bonus: 1.0,
            failure_risk_percent: GradeTable { g1: 0, g2: 0, g3: 0, op: 0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_curve_interpolates() {
        let curve = EnergyCurve::default();
        assert!((curve.penalty_at(0) - 2.0).abs() < 1e-9);
        assert!((curve.penalty_at(15) - 1.5).abs() < 1e-9);
        assert!((curve.penalty_at(40) - 0.625).abs() < 1e-9);
        assert_eq!(curve.penalty_at(70), 0.0);
        assert_eq!(curve.penalty_at(100), 0.0);
    }

    #[test]
    fn test_empty_energy_curve_is_neutral() {
        let curve = EnergyCurve { points: Vec::new() };
        assert_eq!(curve.penalty_at(10), 0.0);
    }

    #[test]
    fn test_effective_cap_steps() {
        let caps = StatCapConfig::default();
        assert_eq!(caps.day_adjustment(0), 0);
        assert_eq!(caps.effective_cap(StatKind::Speed, 40), 1060);
        assert_eq!(caps.effective_cap(StatKind::Speed, 72), 1075);
        assert_eq!(caps.effective_cap(StatKind::Wit, 73), 470);
    }

    #[test]
    fn test_priority_index_unlisted_sorts_last() {
        let config = ScoringConfig {
            priority_stats: vec![StatKind::Wit, StatKind::Speed],
            ..Default::default()
        };
        assert_eq!(config.priority_index(StatKind::Wit), 0);
        assert_eq!(config.priority_index(StatKind::Speed), 1);
        assert_eq!(config.priority_index(StatKind::Guts), 2);
    }
}
