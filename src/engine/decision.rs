//! Decision engine
//!
//! A small state machine on top of the scoring engine:
//!
//! ```text
//! AwaitingTurn -> Evaluating -> Acting -> AwaitingTurn
//!                     |            |
//!                     +-> Stopping <+ -> Stopped
//! ```
//!
//! At most one decision is pending at any time, and a turn action is never
//! chosen from a degraded snapshot except the rest fallback.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::stop::{check_stop_conditions, StopReason};
use crate::analysis::{available_races, race_day_options, score, RaceOption};
use crate::career::{
    ActionCandidate, ActionKind, ActionOutcome, Decision, DecisionReason, DegradeReason, RaceCatalog, ScreenContext,
    TurnSnapshot,
};
use crate::config::{AppConfig, StrategyMode};

/// Engine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingTurn,
    Evaluating,
    Acting,
    Stopping,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::AwaitingTurn => "awaiting turn",
            Phase::Evaluating => "evaluating",
            Phase::Acting => "acting",
            Phase::Stopping => "stopping",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Misuse of the engine by its driver
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("a decision for turn {turn} is still pending")]
    DecisionPending { turn: u64 },

    #[error("no decision is pending")]
    NoPendingDecision,

    #[error("snapshot {sequence} is not newer than {last}")]
    StaleSnapshot { sequence: u64, last: u64 },

    #[error("engine is {0}")]
    NotRunning(Phase),
}

/// Result of evaluating one snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// A decision was issued and must be executed, then reported back
    Act {
        decision: Decision,
        /// Candidate the decision came from, if it came from the ranking
        chosen: Option<ActionCandidate>,
        ranking: Vec<ActionCandidate>,
    },
    /// Snapshot was degraded; perceive again
    Retry { reason: DegradeReason, streak: u32 },
    Stop(StopReason),
}

/// Turn-by-turn decision maker
pub struct DecisionEngine {
    config: AppConfig,
    catalog: RaceCatalog,
    phase: Phase,
    turn: u64,
    pending: Option<Decision>,
    last_sequence: Option<u64>,
    degraded_streak: u32,
    lobby_misses: u32,
    consecutive_races: u32,
    /// Stop requested while an action was in flight
    deferred_stop: Option<StopReason>,
    stop_reason: Option<StopReason>,
}

impl DecisionEngine {
    pub fn new(config: AppConfig, catalog: RaceCatalog) -> Self {
        Self {
            config,
            catalog,
            phase: Phase::AwaitingTurn,
            turn: 0,
            pending: None,
            last_sequence: None,
            degraded_streak: 0,
            lobby_misses: 0,
            consecutive_races: 0,
            deferred_stop: None,
            stop_reason: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Completed turn actions
    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn pending(&self) -> Option<&Decision> {
        self.pending.as_ref()
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    pub fn is_stopping(&self) -> bool {
        matches!(self.phase, Phase::Stopping | Phase::Stopped)
    }

    /// Evaluate a fresh snapshot.
    ///
    /// Snapshots must arrive in sequence order and only while no decision
    /// is pending.
    pub fn evaluate(&mut self, snapshot: &TurnSnapshot) -> Result<Evaluation, EngineError> {
        if self.is_stopping() {
            return Err(EngineError::NotRunning(self.phase));
        }
        if let Some(pending) = &self.pending {
            return Err(EngineError::DecisionPending { turn: pending.turn });
        }
        if let Some(last) = self.last_sequence {
            if snapshot.sequence <= last {
                return Err(EngineError::StaleSnapshot { sequence: snapshot.sequence, last });
            }
        }
        self.last_sequence = Some(snapshot.sequence);
        self.phase = Phase::Evaluating;

        if snapshot.screen != ScreenContext::Lobby {
            self.lobby_misses += 1;
            if self.lobby_misses > self.config.stop_conditions.max_lobby_misses {
                return Ok(self.stop(StopReason::LobbyNotFound { misses: self.lobby_misses }));
            }
        }

        if let Some(reason) = snapshot.degrade_reason() {
            return Ok(self.on_degraded(reason));
        }
        self.degraded_streak = 0;

        if snapshot.screen != ScreenContext::Lobby {
            let action = match snapshot.screen {
                ScreenContext::EventChoice => ActionKind::ResolveEvent(self.config.strategy.default_event_choice),
                _ => ActionKind::Back,
            };
            debug!("Clearing {:?} screen with {}", snapshot.screen, action);
            return Ok(self.act(action, DecisionReason::Interstitial, None, Vec::new()));
        }
        self.lobby_misses = 0;

        if let Some(reason) = check_stop_conditions(snapshot, &self.config.stop_conditions, &self.config.scoring) {
            return Ok(self.stop(reason));
        }

        if snapshot.race_day {
            return Ok(self.decide_race_day(snapshot));
        }

        // Only pre-empts training; race days returned above
        if snapshot.infirmary && self.config.strategy.visit_infirmary {
            info!("Infirmary is lit, visiting it instead of training");
            return Ok(self.act(ActionKind::Infirmary, DecisionReason::Infirmary, None, Vec::new()));
        }

        let races = if self.consecutive_races >= self.config.strategy.max_consecutive_races {
            debug!("{} races in a row, not offering another", self.consecutive_races);
            Vec::new()
        } else {
            available_races(&self.catalog, snapshot.date.as_ref(), &self.config.races)
        };
        let ranking = score(snapshot, &self.config.scoring, &races);
        let (index, reason) = self.choose(snapshot, &ranking, &races);

        let chosen = ranking.get(index).cloned();
        let action = chosen.as_ref().map(|c| c.kind.clone()).unwrap_or(ActionKind::Rest);
        Ok(self.act(action, reason, chosen, ranking))
    }

    /// Pick the ranked candidate to act on
    fn choose(&self, snapshot: &TurnSnapshot, ranking: &[ActionCandidate], races: &[RaceOption]) -> (usize, DecisionReason) {
        let is_scheduled = |candidate: &ActionCandidate| match &candidate.kind {
            ActionKind::Race(id) => races.iter().any(|o| o.scheduled && &o.race.id == id),
            _ => false,
        };
        if let Some(index) = ranking.iter().position(is_scheduled) {
            return (index, DecisionReason::ScheduledRace);
        }

        match self.config.strategy.mode {
            StrategyMode::ScoreThreshold { threshold } => {
                let top_is_weak_training = ranking
                    .first()
                    .map(|c| c.is_training() && c.final_score < threshold)
                    .unwrap_or(false);
                if top_is_weak_training && !snapshot.is_pre_debut {
                    let fallback = ranking
                        .iter()
                        .position(|c| c.is_race())
                        .or_else(|| ranking.iter().position(|c| c.kind == ActionKind::Rest));
                    if let Some(index) = fallback {
                        return (index, DecisionReason::BelowThreshold);
                    }
                }
                (0, DecisionReason::TopCandidate)
            }
            StrategyMode::PreferG1 | StrategyMode::PreferG2 => {
                let preferred = self.config.strategy.mode.preferred_grade();
                let graded = ranking.iter().position(|c| match &c.kind {
                    ActionKind::Race(id) => races
                        .iter()
                        .find(|o| &o.race.id == id)
                        .zip(preferred)
                        .map(|(o, grade)| o.race.grade <= grade)
                        .unwrap_or(false),
                    _ => false,
                });
                match graded {
                    Some(index) => (index, DecisionReason::GradePreference),
                    None => {
                        let index = ranking.iter().position(|c| !c.is_race()).unwrap_or(0);
                        (index, DecisionReason::TopCandidate)
                    }
                }
            }
        }
    }

    fn decide_race_day(&mut self, snapshot: &TurnSnapshot) -> Evaluation {
        let options = race_day_options(&self.catalog, snapshot.date.as_ref(), &self.config.races);
        let ranking = score(snapshot, &self.config.scoring, &options);
        // Races over the failure ceiling never reach the ranking
        let Some(chosen) = ranking.iter().find(|c| c.is_race()).cloned() else {
            return self.stop(StopReason::NoRaceOnRaceDay);
        };
        let action = chosen.kind.clone();
        info!("Race day: entering {}", action);
        self.act(action, DecisionReason::RaceDay, Some(chosen), ranking)
    }

    fn on_degraded(&mut self, reason: DegradeReason) -> Evaluation {
        self.degraded_streak += 1;
        let budget = self.config.general.degraded_retry_budget;
        if self.degraded_streak > budget {
            warn!(
                "Snapshot degraded ({:?}) {} times in a row, falling back to rest",
                reason, self.degraded_streak
            );
            self.degraded_streak = 0;
            return self.act(ActionKind::Rest, DecisionReason::DegradedFallback, None, Vec::new());
        }
        warn!("Snapshot degraded ({:?}), retry {}/{}", reason, self.degraded_streak, budget);
        self.phase = Phase::AwaitingTurn;
        Evaluation::Retry { reason, streak: self.degraded_streak }
    }

    fn act(
        &mut self,
        action: ActionKind,
        reason: DecisionReason,
        chosen: Option<ActionCandidate>,
        ranking: Vec<ActionCandidate>,
    ) -> Evaluation {
        let decision = Decision::new(action, reason, self.turn);
        info!("Turn {}: {} ({:?})", self.turn, decision.action, reason);
        self.pending = Some(decision.clone());
        self.phase = Phase::Acting;
        Evaluation::Act { decision, chosen, ranking }
    }

    fn stop(&mut self, reason: StopReason) -> Evaluation {
        info!("Stopping: {}", reason);
        self.phase = Phase::Stopping;
        self.stop_reason = Some(reason.clone());
        Evaluation::Stop(reason)
    }

    /// Report how the pending decision went
    pub fn complete(&mut self, outcome: &ActionOutcome) -> Result<Phase, EngineError> {
        let decision = self.pending.take().ok_or(EngineError::NoPendingDecision)?;

        match outcome {
            ActionOutcome::Completed => {
                if decision.action.is_turn_action() {
                    self.turn += 1;
                    if matches!(decision.action, ActionKind::Race(_)) {
                        self.consecutive_races += 1;
                    } else {
                        self.consecutive_races = 0;
                    }
                }
                self.phase = Phase::AwaitingTurn;
            }
            ActionOutcome::Recoverable(message) => {
                warn!("{} did not go through: {}", decision.action, message);
                self.phase = Phase::AwaitingTurn;
            }
            ActionOutcome::Fatal(message) => {
                self.stop(StopReason::FatalAction { message: message.clone() });
                return Ok(self.phase);
            }
        }

        if let Some(reason) = self.deferred_stop.take() {
            self.stop(reason);
        }
        Ok(self.phase)
    }

    /// Graceful stop; an in-flight action is allowed to finish first
    pub fn request_stop(&mut self, reason: StopReason) {
        match self.phase {
            Phase::Stopping | Phase::Stopped => {}
            Phase::Acting => {
                if self.deferred_stop.is_none() {
                    debug!("Stop deferred until {} completes", self.phase);
                    self.deferred_stop = Some(reason);
                }
            }
            _ => {
                self.stop(reason);
            }
        }
    }

    /// Drop any pending decision and stop immediately
    pub fn abandon(&mut self, reason: StopReason) {
        if let Some(decision) = self.pending.take() {
            warn!("Abandoning pending {}", decision.action);
        }
        if !self.is_stopping() {
            self.stop(reason);
        }
    }

    /// Move to the terminal phase. Fails while an action is still pending.
    pub fn finish(&mut self) -> Result<Option<StopReason>, EngineError> {
        if let Some(pending) = &self.pending {
            return Err(EngineError::DecisionPending { turn: pending.turn });
        }
        if self.phase != Phase::Stopped {
            if self.stop_reason.is_none() {
                self.stop_reason = Some(StopReason::ExternalStop);
            }
            self.phase = Phase::Stopped;
        }
        Ok(self.stop_reason.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::{
        CareerDate, CareerYear, GradeTable, Half, Month, Mood, RaceEntry, RaceGrade, SnapshotStatus, StatKind, StatTable,
        SupportCards, Track, TrainingOption,
    };
    use crate::config::{ScheduledRace, StrategyConfig};

    fn date() -> CareerDate {
        CareerDate::Regular { year: CareerYear::Classic, month: Month::Apr, half: Half::Early }
    }

    fn snapshot(sequence: u64) -> TurnSnapshot {
        let mut snap = TurnSnapshot::lobby(sequence, date());
        snap.training = StatTable::from_fn(|_| {
            Some(TrainingOption { failure_risk: Some(0), support: SupportCards::default() })
        });
        snap
    }

    fn degraded(sequence: u64) -> TurnSnapshot {
        let mut snap = snapshot(sequence);
        snap.energy_percent = None;
        snap.status = SnapshotStatus::Degraded(DegradeReason::EnergyUnreadable);
        snap
    }

    fn race(id: &str, grade: RaceGrade) -> RaceEntry {
        RaceEntry {
            id: id.into(),
            name: id.into(),
            year: CareerYear::Classic,
            month: Month::Apr,
            half: Half::Early,
            grade,
            track: Track::Turf,
            distance_m: 1600,
            fans: 0,
            skill_points: 0,
        }
    }

    fn engine(config: AppConfig) -> DecisionEngine {
        let catalog = RaceCatalog::new(vec![race("oka_sho", RaceGrade::G1), race("spring_g3", RaceGrade::G3)]);
        DecisionEngine::new(config, catalog)
    }

    fn decision_of(evaluation: Evaluation) -> Decision {
        match evaluation {
            Evaluation::Act { decision, .. } => decision,
            other => panic!("expected a decision, got {:?}", other),
        }
    }

    #[test]
    fn test_one_pending_decision() {
        let mut engine = engine(AppConfig::default());
        decision_of(engine.evaluate(&snapshot(1)).unwrap());
        assert_eq!(engine.phase(), Phase::Acting);
        assert!(matches!(engine.evaluate(&snapshot(2)), Err(EngineError::DecisionPending { .. })));

        engine.complete(&ActionOutcome::Completed).unwrap();
        assert_eq!(engine.turn(), 1);
        assert!(engine.evaluate(&snapshot(2)).is_ok());
        assert_eq!(engine.complete(&ActionOutcome::Completed), Ok(Phase::AwaitingTurn));
        assert_eq!(engine.complete(&ActionOutcome::Completed), Err(EngineError::NoPendingDecision));
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let mut engine = engine(AppConfig::default());
        engine.evaluate(&snapshot(5)).unwrap();
        engine.complete(&ActionOutcome::Completed).unwrap();
        assert_eq!(
            engine.evaluate(&snapshot(5)),
            Err(EngineError::StaleSnapshot { sequence: 5, last: 5 })
        );
    }

    #[test]
    fn test_degraded_falls_back_to_rest_after_budget() {
        let mut config = AppConfig::default();
        config.general.degraded_retry_budget = 2;
        let mut engine = engine(config);

        assert!(matches!(engine.evaluate(&degraded(1)).unwrap(), Evaluation::Retry { streak: 1, .. }));
        assert_eq!(engine.phase(), Phase::AwaitingTurn);
        assert!(matches!(engine.evaluate(&degraded(2)).unwrap(), Evaluation::Retry { streak: 2, .. }));

        let decision = decision_of(engine.evaluate(&degraded(3)).unwrap());
        assert_eq!(decision.action, ActionKind::Rest);
        assert_eq!(decision.reason, DecisionReason::DegradedFallback);
    }

    #[test]
    fn test_degraded_never_acts_with_other_action() {
        let mut config = AppConfig::default();
        config.general.degraded_retry_budget = 0;
        let mut engine = engine(config);
        for sequence in 1..20 {
            if let Evaluation::Act { decision, .. } = engine.evaluate(&degraded(sequence)).unwrap() {
                assert_eq!(decision.action, ActionKind::Rest);
                engine.complete(&ActionOutcome::Completed).unwrap();
            }
        }
    }

    #[test]
    fn test_low_mood_stops_before_acting() {
        let mut config = AppConfig::default();
        config.stop_conditions.enabled = true;
        config.stop_conditions.on_low_mood = true;
        let mut engine = engine(config);

        let mut snap = snapshot(1);
        snap.mood = Mood::Awful;
        snap.training[StatKind::Speed] = Some(TrainingOption {
            failure_risk: Some(0),
            support: SupportCards { count: 5, rainbow_count: 3, ..Default::default() },
        });
        assert_eq!(
            engine.evaluate(&snap).unwrap(),
            Evaluation::Stop(StopReason::LowMood { mood: Mood::Awful })
        );
        assert_eq!(engine.phase(), Phase::Stopping);
        assert!(engine.pending().is_none());
        assert!(matches!(engine.evaluate(&snapshot(2)), Err(EngineError::NotRunning(Phase::Stopping))));
    }

    #[test]
    fn test_scheduled_race_preempts_training() {
        let mut config = AppConfig::default();
        config.races.schedule = vec![ScheduledRace { race_id: "spring_g3".into() }];
        let mut engine = engine(config);

        let mut snap = snapshot(1);
        snap.training[StatKind::Speed] = Some(TrainingOption {
            failure_risk: Some(0),
            support: SupportCards { count: 5, rainbow_count: 5, ..Default::default() },
        });
        let decision = decision_of(engine.evaluate(&snap).unwrap());
        assert_eq!(decision.action, ActionKind::Race("spring_g3".into()));
        assert_eq!(decision.reason, DecisionReason::ScheduledRace);
    }

    #[test]
    fn test_prefer_g1_races_when_available() {
        let mut config = AppConfig::default();
        config.strategy = StrategyConfig { mode: StrategyMode::PreferG1, ..Default::default() };
        let mut engine = engine(config);

        let decision = decision_of(engine.evaluate(&snapshot(1)).unwrap());
        assert_eq!(decision.action, ActionKind::Race("oka_sho".into()));
        assert_eq!(decision.reason, DecisionReason::GradePreference);
    }

    #[test]
    fn test_threshold_falls_back_to_race_then_rest() {
        let mut config = AppConfig::default();
        config.strategy.mode = StrategyMode::ScoreThreshold { threshold: 100.0 };
        config.scoring.races.grade_weight.g1 = 0.0;
        config.scoring.races.grade_weight.g3 = 0.0;
        let mut engine = engine(config);

        let decision = decision_of(engine.evaluate(&snapshot(1)).unwrap());
        assert!(matches!(decision.action, ActionKind::Race(_)));
        assert_eq!(decision.reason, DecisionReason::BelowThreshold);
    }

    #[test]
    fn test_consecutive_race_guard() {
        let mut config = AppConfig::default();
        config.strategy = StrategyConfig { mode: StrategyMode::PreferG1, max_consecutive_races: 1, ..Default::default() };
        let mut engine = engine(config);

        let first = decision_of(engine.evaluate(&snapshot(1)).unwrap());
        assert!(matches!(first.action, ActionKind::Race(_)));
        engine.complete(&ActionOutcome::Completed).unwrap();

        let second = decision_of(engine.evaluate(&snapshot(2)).unwrap());
        assert!(matches!(second.action, ActionKind::Train(_)));
    }

    #[test]
    fn test_race_day_forces_highest_grade() {
        let mut engine = engine(AppConfig::default());
        let mut snap = snapshot(1);
        snap.race_day = true;
        let decision = decision_of(engine.evaluate(&snap).unwrap());
        assert_eq!(decision.action, ActionKind::Race("oka_sho".into()));
        assert_eq!(decision.reason, DecisionReason::RaceDay);
    }

    #[test]
    fn test_race_day_without_race_stops() {
        let mut engine = DecisionEngine::new(AppConfig::default(), RaceCatalog::default());
        let mut snap = snapshot(1);
        snap.race_day = true;
        assert_eq!(engine.evaluate(&snap).unwrap(), Evaluation::Stop(StopReason::NoRaceOnRaceDay));
    }

    #[test]
    fn test_race_day_skips_races_over_failure_ceiling() {
        let mut config = AppConfig::default();
        config.scoring.failure_ceiling_percent = 30;
        config.scoring.races.failure_risk_percent = GradeTable { g1: 40, g2: 0, g3: 0, op: 0 };
        let mut engine = engine(config);

        let mut snap = snapshot(1);
        snap.race_day = true;
        let decision = decision_of(engine.evaluate(&snap).unwrap());
        assert_eq!(decision.action, ActionKind::Race("spring_g3".into()));
    }

    #[test]
    fn test_race_day_with_only_risky_races_stops() {
        let mut config = AppConfig::default();
        config.scoring.failure_ceiling_percent = 30;
        config.scoring.races.failure_risk_percent = GradeTable { g1: 40, g2: 40, g3: 40, op: 40 };
        let mut engine = engine(config);

        let mut snap = snapshot(1);
        snap.race_day = true;
        assert_eq!(engine.evaluate(&snap).unwrap(), Evaluation::Stop(StopReason::NoRaceOnRaceDay));
        assert!(engine.pending().is_none());
    }

    #[test]
    fn test_infirmary_visited_when_not_stopping() {
        let mut engine = engine(AppConfig::default());
        let mut snap = snapshot(1);
        snap.infirmary = true;
        snap.training[StatKind::Speed] = Some(TrainingOption {
            failure_risk: Some(0),
            support: SupportCards { count: 5, rainbow_count: 5, ..Default::default() },
        });

        let decision = decision_of(engine.evaluate(&snap).unwrap());
        assert_eq!(decision.action, ActionKind::Infirmary);
        assert_eq!(decision.reason, DecisionReason::Infirmary);
        engine.complete(&ActionOutcome::Completed).unwrap();
        assert_eq!(engine.turn(), 1);
    }

    #[test]
    fn test_race_day_beats_infirmary() {
        let mut engine = engine(AppConfig::default());
        let mut snap = snapshot(1);
        snap.race_day = true;
        snap.infirmary = true;
        let decision = decision_of(engine.evaluate(&snap).unwrap());
        assert_eq!(decision.action, ActionKind::Race("oka_sho".into()));
        assert_eq!(decision.reason, DecisionReason::RaceDay);
    }

    #[test]
    fn test_infirmary_stop_wins_over_visit() {
        let mut config = AppConfig::default();
        config.stop_conditions.enabled = true;
        let mut engine = engine(config);
        let mut snap = snapshot(1);
        snap.infirmary = true;
        assert!(snap.day > 24);
        assert_eq!(engine.evaluate(&snap).unwrap(), Evaluation::Stop(StopReason::Infirmary));
    }

    #[test]
    fn test_infirmary_visit_can_be_disabled() {
        let mut config = AppConfig::default();
        config.strategy.visit_infirmary = false;
        let mut engine = engine(config);
        let mut snap = snapshot(1);
        snap.infirmary = true;
        let decision = decision_of(engine.evaluate(&snap).unwrap());
        assert!(matches!(decision.action, ActionKind::Train(_)));
    }

    #[test]
    fn test_interstitial_does_not_advance_turn() {
        let mut engine = engine(AppConfig::default());
        let mut snap = snapshot(1);
        snap.screen = ScreenContext::EventChoice;
        let decision = decision_of(engine.evaluate(&snap).unwrap());
        assert_eq!(decision.action, ActionKind::ResolveEvent(0));
        engine.complete(&ActionOutcome::Completed).unwrap();
        assert_eq!(engine.turn(), 0);
    }

    #[test]
    fn test_lobby_miss_budget() {
        let mut config = AppConfig::default();
        config.stop_conditions.max_lobby_misses = 2;
        let mut engine = engine(config);
        for sequence in 1..=2 {
            let mut snap = snapshot(sequence);
            snap.screen = ScreenContext::RaceSelect;
            decision_of(engine.evaluate(&snap).unwrap());
            engine.complete(&ActionOutcome::Completed).unwrap();
        }
        let mut snap = snapshot(3);
        snap.screen = ScreenContext::RaceSelect;
        assert_eq!(
            engine.evaluate(&snap).unwrap(),
            Evaluation::Stop(StopReason::LobbyNotFound { misses: 3 })
        );
    }

    #[test]
    fn test_fatal_outcome_stops() {
        let mut engine = engine(AppConfig::default());
        engine.evaluate(&snapshot(1)).unwrap();
        let phase = engine.complete(&ActionOutcome::Fatal("window lost".into())).unwrap();
        assert_eq!(phase, Phase::Stopping);
        assert_eq!(engine.turn(), 0);
        assert!(matches!(engine.stop_reason(), Some(StopReason::FatalAction { .. })));
    }

    #[test]
    fn test_recoverable_outcome_reevaluates() {
        let mut engine = engine(AppConfig::default());
        engine.evaluate(&snapshot(1)).unwrap();
        assert_eq!(engine.complete(&ActionOutcome::Recoverable("no button".into())), Ok(Phase::AwaitingTurn));
        assert_eq!(engine.turn(), 0);
        assert!(engine.evaluate(&snapshot(2)).is_ok());
    }

    #[test]
    fn test_stop_deferred_while_acting() {
        let mut engine = engine(AppConfig::default());
        engine.evaluate(&snapshot(1)).unwrap();
        engine.request_stop(StopReason::ExternalStop);
        assert_eq!(engine.phase(), Phase::Acting);
        assert!(matches!(engine.finish(), Err(EngineError::DecisionPending { .. })));

        assert_eq!(engine.complete(&ActionOutcome::Completed), Ok(Phase::Stopping));
        assert_eq!(engine.finish(), Ok(Some(StopReason::ExternalStop)));
        assert_eq!(engine.phase(), Phase::Stopped);
    }

    #[test]
    fn test_abandon_drops_pending() {
        let mut engine = engine(AppConfig::default());
        engine.evaluate(&snapshot(1)).unwrap();
        engine.abandon(StopReason::ForceStop);
        assert!(engine.pending().is_none());
        assert_eq!(engine.finish(), Ok(Some(StopReason::ForceStop)));
    }
}
