//! Candidate scoring
//!
//! Turns a snapshot into a ranked list of candidates. Pure: the same
//! snapshot, config and race list always give the same ranking.

use std::cmp::Reverse;

use tracing::debug;

use super::penalty::{is_capped, stat_cap_penalty};
use super::races::RaceOption;
use crate::career::{ActionCandidate, ActionKind, Contribution, Stage, StatKind, TrainingOption, TurnSnapshot};
use crate::config::ScoringConfig;

/// Tie resolution for scores. Ranking rounds every score to a multiple of
/// this; scores that round to the same multiple tie.
pub const SCORE_EPSILON: f64 = 1e-6;

/// Score every eligible action, best first.
///
/// Trainings over the failure ceiling, with an unreadable failure rate, or
/// for a stat at its cap never appear. Rest is always present.
pub fn score(snapshot: &TurnSnapshot, config: &ScoringConfig, races: &[RaceOption]) -> Vec<ActionCandidate> {
    let stage = Stage::classify(snapshot.day, &config.stage_thresholds);
    let mut candidates = Vec::new();

    for kind in StatKind::ALL {
        if !energy_allows(kind, snapshot.energy_percent, config) {
            continue;
        }
        let Some(option) = snapshot.training[kind] else {
            continue;
        };
        let Some(risk) = option.failure_risk else {
            debug!("Skipping {}: failure rate unknown", kind);
            continue;
        };
        if risk > config.failure_ceiling_percent {
            debug!("Skipping {}: failure {}% over ceiling", kind, risk);
            continue;
        }
        if is_capped(kind, &snapshot.stats, snapshot.day, &config.stat_caps) {
            debug!("Skipping {}: stat capped", kind);
            continue;
        }
        candidates.push(score_training(kind, &option, risk, stage, snapshot, config));
    }

    if !snapshot.is_pre_debut {
        for option in races {
            let risk = config.races.failure_risk_percent[option.race.grade];
            if risk > config.failure_ceiling_percent {
                debug!("Skipping race {}: failure {}% over ceiling", option.race.id, risk);
                continue;
            }
            candidates.push(score_race(option, risk, config));
        }
    }

    candidates.push(ActionCandidate::fixed(ActionKind::Rest, "baseline", config.rest_baseline));

    rank(&mut candidates, config);
    candidates
}

/// Sort best first, breaking ties by stat priority, then failure risk,
/// then UI path cost.
///
/// Scores are compared after rounding to [`SCORE_EPSILON`], which keeps the
/// key a total order. Two scores less than epsilon apart usually tie but can
/// straddle a rounding boundary.
pub fn rank(candidates: &mut [ActionCandidate], config: &ScoringConfig) {
    let last = config.priority_stats.len() + 1;
    candidates.sort_by_cached_key(|c| {
        let priority = match c.kind {
            ActionKind::Train(kind) => config.priority_index(kind),
            _ => last,
        };
        (
            Reverse(quantize(c.final_score)),
            priority,
            c.failure_risk,
            c.kind.ui_cost(),
            c.kind.to_string(),
        )
    });
}

fn quantize(score: f64) -> i64 {
    (score / SCORE_EPSILON).round() as i64
}

/// Energy bands: nothing below critical, only WIT below the minimum
fn energy_allows(kind: StatKind, energy: Option<u8>, config: &ScoringConfig) -> bool {
    match energy {
        None => false,
        Some(e) if e < config.critical_energy_percent => false,
        Some(e) if e < config.minimum_energy_percent => kind == StatKind::Wit,
        Some(_) => true,
    }
}

/// Ordered score terms
#[derive(Default)]
struct Terms(Vec<Contribution>);

impl Terms {
    fn add(&mut self, label: impl Into<String>, value: f64) {
        if value != 0.0 {
            self.0.push(Contribution { label: label.into(), value });
        }
    }

    fn total(&self) -> f64 {
        self.0.iter().map(|c| c.value).sum()
    }
}

fn score_training(
    kind: StatKind,
    option: &TrainingOption,
    risk: u8,
    stage: Stage,
    snapshot: &TurnSnapshot,
    config: &ScoringConfig,
) -> ActionCandidate {
    let bonuses = &config.bonuses;
    let support = &option.support;
    let base = config.base_score[stage];

    let mut terms = Terms::default();
    terms.add("base", base * config.stage_multiplier);

    let rainbow = f64::from(support.rainbow_count) * bonuses.rainbow[stage];
    terms.add("rainbow", rainbow);

    let friends = f64::from(support.friend_count);
    if stage.is_early_game() {
        // Friends are just another support card this early
        terms.add("friend", friends * bonuses.support_card);
    } else {
        terms.add("friend", friends * bonuses.friend);
    }
    terms.add("support", f64::from(support.other_count()) * bonuses.support_card);

    if support.hint_count > 0 {
        let hint = if snapshot.day < bonuses.hint_late_from_day {
            bonuses.hint_early
        } else {
            bonuses.hint_late
        };
        terms.add("hint", hint);
    }
    terms.add("npc", f64::from(support.npc_count) * bonuses.npc);
    if support.special_training {
        terms.add("special training", bonuses.special_training);
    }
    if support.spirit_explosion {
        terms.add("spirit explosion", bonuses.spirit_explosion);
    }
    if let Some(energy) = snapshot.energy_percent {
        terms.add("energy", -config.energy_penalty.penalty_at(energy));
    }
    if kind == StatKind::Wit && stage.is_early_game() {
        terms.add("wit early stage", bonuses.wit_early_stage);
    }

    let raw_score = terms.total();
    let cap = stat_cap_penalty(kind, &snapshot.stats, snapshot.day, base, &config.stat_caps);
    let penalty = cap.applied();
    if penalty > 0.0 {
        let label = match cap.secondary_stat {
            Some(secondary) if cap.secondary > cap.direct => format!("cap via {}", secondary.short_name()),
            _ => "cap".to_string(),
        };
        terms.add(label, -penalty);
    }

    ActionCandidate {
        kind: ActionKind::Train(kind),
        raw_score,
        penalty,
        final_score: (raw_score - penalty).max(config.minimum_score),
        failure_risk: risk,
        rationale: terms.0,
    }
}

fn score_race(option: &RaceOption, risk: u8, config: &ScoringConfig) -> ActionCandidate {
    let weights = &config.races;
    let race = &option.race;

    let mut terms = Terms::default();
    terms.add("fans", weights.fan_weight * f64::from(race.fans) / 1000.0);
    terms.add(format!("grade {}", race.grade), weights.grade_weight[race.grade]);
    terms.add("skill points", weights.skill_point_weight * f64::from(race.skill_points) / 10.0);
    if option.scheduled {
        terms.add("scheduled", weights.scheduled_bonus);
    }

    let raw_score = terms.total();
    ActionCandidate {
        kind: ActionKind::Race(race.id.clone()),
        raw_score,
        penalty: 0.0,
        final_score: raw_score.max(config.minimum_score),
        failure_risk: risk,
        rationale: terms.0,
    }
}
