//! Stat-cap penalty with cross-training

use crate::career::{StatKind, StatTable, StatValue};
use crate::config::StatCapConfig;

/// Penalty terms for training one stat
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CapPenalty {
    /// From the trained stat approaching its own cap
    pub direct: f64,
    /// Largest penalty from a stat the training spills into
    pub secondary: f64,
    pub secondary_stat: Option<StatKind>,
}

impl CapPenalty {
    /// Only the larger of the two terms is charged
    pub fn applied(&self) -> f64 {
        self.direct.max(self.secondary)
    }
}

/// Where on the penalty ramp a stat sits, from 0.0 (no penalty) to 1.0 (at cap).
///
/// The ramp starts at whichever trigger is reached first: the percentage of
/// the cap or the fixed gap below it.
pub fn ramp(current: u32, cap: u32, caps: &StatCapConfig) -> f64 {
    if cap == 0 {
        return 1.0;
    }
    let by_percent = caps.start_penalty_percent * f64::from(cap);
    let by_gap = f64::from(cap.saturating_sub(caps.start_penalty_gap));
    let trigger = by_percent.min(by_gap);
    let current = f64::from(current);
    let cap = f64::from(cap);

    if current < trigger {
        0.0
    } else if current >= cap || cap - trigger <= f64::EPSILON {
        1.0
    } else {
        (current - trigger) / (cap - trigger)
    }
}

/// Penalty for training `kind`, bounded by `max_penalty_percent * base_score`
pub fn stat_cap_penalty(
    kind: StatKind,
    stats: &StatTable<Option<StatValue>>,
    day: u32,
    base_score: f64,
    caps: &StatCapConfig,
) -> CapPenalty {
    if !caps.enabled || day < caps.threshold_day {
        return CapPenalty::default();
    }
    let ceiling = caps.max_penalty_percent * base_score.max(0.0);
    let ramp_of = |stat: StatKind| {
        stats[stat]
            .map(|v| ramp(v.value, caps.effective_cap(stat, day), caps))
            .unwrap_or(0.0)
    };

    let mut penalty = CapPenalty {
        direct: ramp_of(kind) * ceiling,
        ..Default::default()
    };
    for cross in caps.cross_training.iter().filter(|c| c.from == kind) {
        let secondary = cross.coefficient * ramp_of(cross.to) * ceiling;
        if secondary > penalty.secondary {
            penalty.secondary = secondary;
            penalty.secondary_stat = Some(cross.to);
        }
    }
    penalty
}

/// Whether the stat already sits at or above its effective cap
pub fn is_capped(kind: StatKind, stats: &StatTable<Option<StatValue>>, day: u32, caps: &StatCapConfig) -> bool {
    caps.enabled
        && stats[kind]
            .map(|v| v.value >= caps.effective_cap(kind, day))
            .unwrap_or(false)
}
