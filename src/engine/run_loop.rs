//! The run loop
//!
//! One iteration per game turn: check control, perceive, normalize,
//! evaluate, execute, record, cool down. Runs on a single dedicated thread
//! and is the only writer of [`RunState`](crate::shared::RunState).

use crossbeam_channel::{never, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::decision::{DecisionEngine, Evaluation};
use super::executor::ActionExecutor;
use super::stop::StopReason;
use crate::analysis::{normalize, EventEmitter, TurnEvent, TurnRecord};
use crate::career::{ActionOutcome, RaceCatalog, StatKind, TurnSnapshot};
use crate::config::{AppConfig, GeneralConfig, PerceptionConfig};
use crate::shared::{CancelToken, ControlSignal, RunReport, RunState, SharedRunState};
use crate::vision::{observe, Perception, PerceptionError, ReadProfile, RegionId};

/// Longest stretch a wait goes without looking at the cancel token
const CANCEL_POLL: Duration = Duration::from_millis(50);

pub struct RunLoop<P: Perception, E: ActionExecutor> {
    session: Uuid,
    perception: P,
    executor: E,
    engine: DecisionEngine,
    general: GeneralConfig,
    perception_config: PerceptionConfig,
    state: SharedRunState,
    control: Receiver<ControlSignal>,
    cancel: CancelToken,
    events: Arc<EventEmitter>,
    sequence: u64,
    /// Last snapshot good enough to cross-check stats against
    previous: Option<TurnSnapshot>,
    last_snapshot: Option<TurnSnapshot>,
    perception_failures: u32,
}

impl<P: Perception, E: ActionExecutor> RunLoop<P, E> {
    pub fn new(
        config: AppConfig,
        catalog: RaceCatalog,
        perception: P,
        executor: E,
        control: Receiver<ControlSignal>,
    ) -> Self {
        let session = Uuid::new_v4();
        Self {
            session,
            perception,
            executor,
            general: config.general.clone(),
            perception_config: config.perception.clone(),
            engine: DecisionEngine::new(config, catalog),
            state: Arc::new(parking_lot::RwLock::new(RunState::new(session))),
            control,
            cancel: CancelToken::new(),
            events: Arc::new(EventEmitter::new()),
            sequence: 0,
            previous: None,
            last_snapshot: None,
            perception_failures: 0,
        }
    }

    /// Share an event emitter with observers created before the loop
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// Watch a token shared with the executor and the coordinator
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn state(&self) -> SharedRunState {
        Arc::clone(&self.state)
    }

    pub fn events(&self) -> Arc<EventEmitter> {
        Arc::clone(&self.events)
    }

    /// Drive the run to completion
    pub fn run(mut self) -> RunReport {
        info!("Session {} started", self.session);
        self.events.emit(TurnEvent::Started { session: self.session });

        while !self.engine.is_stopping() {
            self.poll_control();
            if self.engine.is_stopping() {
                break;
            }
            if let Some(snapshot) = self.perceive() {
                self.step(snapshot);
            }
            self.publish();
        }

        self.finish()
    }

    /// One perception pass. `None` when nothing usable came back.
    fn perceive(&mut self) -> Option<TurnSnapshot> {
        let pass = self
            .perception
            .refresh()
            .and_then(|_| observe(&mut self.perception, &self.perception_config));
        let raw = match pass {
            Ok(raw) => {
                self.perception_failures = 0;
                raw
            }
            Err(PerceptionError::SourceClosed) => {
                info!("Frame source closed");
                self.engine.request_stop(StopReason::SourceClosed);
                return None;
            }
            Err(e) => {
                self.perception_failures += 1;
                warn!("Perception failed ({}/{}): {}", self.perception_failures, self.general.perception_failure_budget, e);
                self.state.write().set_error(e.to_string());
                if self.perception_failures > self.general.perception_failure_budget {
                    error!("Perception failure budget exhausted");
                    self.engine.request_stop(StopReason::PerceptionBudget { failures: self.perception_failures });
                } else {
                    self.wait(self.general.retry_delay());
                }
                return None;
            }
        };

        self.sequence += 1;
        let perception = &mut self.perception;
        let snapshot = normalize(
            &raw,
            self.previous.as_ref(),
            self.sequence,
            &self.perception_config,
            |kind| perception.read_text(RegionId::Stat(kind), ReadProfile::Digits).ok(),
        );
        debug!("Snapshot {}: {:?}", snapshot.sequence, snapshot.summary());
        Some(snapshot)
    }

    /// Keep the last known value of every stat for the next cross-check.
    /// Only lobby reads carry stats; a stat missing this pass keeps its
    /// earlier value.
    fn remember_stats(&mut self, snapshot: &TurnSnapshot) {
        if !snapshot.screen.is_turn_screen() || snapshot.is_degraded() {
            return;
        }
        let mut baseline = snapshot.clone();
        if let Some(previous) = &self.previous {
            for kind in StatKind::ALL {
                if baseline.stats[kind].is_none() {
                    baseline.stats[kind] = previous.stats[kind];
                }
            }
        }
        self.previous = Some(baseline);
    }

    fn step(&mut self, snapshot: TurnSnapshot) {
        self.remember_stats(&snapshot);
        self.last_snapshot = Some(snapshot.clone());

        match self.engine.evaluate(&snapshot) {
            Ok(Evaluation::Retry { reason, streak }) => {
                self.events.emit(TurnEvent::Degraded { sequence: snapshot.sequence, reason, streak });
                self.wait(self.general.retry_delay());
            }
            Ok(Evaluation::Stop(reason)) => {
                debug!("Engine stopped on snapshot {}: {}", snapshot.sequence, reason);
            }
            Ok(Evaluation::Act { decision, chosen, ranking }) => {
                // Last chance to stop without anything in flight
                if let Some(signal) = self.next_signal().or_else(|| self.token_signal()) {
                    let reason = match signal {
                        ControlSignal::Stop => StopReason::ExternalStop,
                        ControlSignal::ForceStop => StopReason::ForceStop,
                    };
                    self.engine.abandon(reason);
                    return;
                }
                self.publish();

                let outcome = match self.executor.execute(&decision.action) {
                    Ok(()) => ActionOutcome::Completed,
                    Err(e) => {
                        if e.is_fatal() {
                            error!("{}", e);
                        } else {
                            warn!("{}", e);
                        }
                        self.state.write().set_error(e.to_string());
                        e.outcome()
                    }
                };
                if let Err(e) = self.engine.complete(&outcome) {
                    error!("Engine rejected outcome: {}", e);
                    self.engine.abandon(StopReason::Internal { message: e.to_string() });
                }

                self.events.emit(TurnEvent::Turn(TurnRecord {
                    session: self.session,
                    turn: decision.turn,
                    snapshot: snapshot.summary(),
                    rationale: chosen.as_ref().map(|c| c.rationale.clone()).unwrap_or_default(),
                    chosen,
                    candidates: ranking.len(),
                    decision,
                    outcome,
                }));

                if !self.engine.is_stopping() {
                    self.wait(self.general.cooldown());
                }
            }
            Err(e) => {
                error!("Engine refused snapshot {}: {}", snapshot.sequence, e);
                self.engine.abandon(StopReason::Internal { message: e.to_string() });
            }
        }
    }

    /// Non-blocking read of the control channel
    fn next_signal(&mut self) -> Option<ControlSignal> {
        match self.control.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                debug!("Control channel closed");
                self.control = never();
                None
            }
        }
    }

    fn poll_control(&mut self) {
        while let Some(signal) = self.next_signal() {
            self.handle_signal(signal);
        }
        self.check_cancel();
    }

    fn handle_signal(&mut self, signal: ControlSignal) {
        info!("Control signal: {:?}", signal);
        match signal {
            ControlSignal::Stop => self.engine.request_stop(StopReason::ExternalStop),
            ControlSignal::ForceStop => self.engine.abandon(StopReason::ForceStop),
        }
    }

    /// Sleep that returns early on a control signal or a cancelled token
    fn wait(&mut self, duration: Duration) {
        if duration.is_zero() {
            self.poll_control();
            return;
        }
        let deadline = Instant::now() + duration;
        loop {
            self.check_cancel();
            let now = Instant::now();
            if self.engine.is_stopping() || now >= deadline {
                return;
            }
            match self.control.recv_timeout((deadline - now).min(CANCEL_POLL)) {
                Ok(signal) => {
                    self.handle_signal(signal);
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Control channel closed, watching the cancel token only");
                    self.control = never();
                }
            }
        }
    }

    /// Stop requested on the token rather than the channel
    fn token_signal(&self) -> Option<ControlSignal> {
        if self.cancel.is_forced() {
            Some(ControlSignal::ForceStop)
        } else if self.cancel.is_stopped() {
            Some(ControlSignal::Stop)
        } else {
            None
        }
    }

    fn check_cancel(&mut self) {
        if self.engine.is_stopping() {
            return;
        }
        if let Some(signal) = self.token_signal() {
            self.handle_signal(signal);
        }
    }

    fn publish(&self) {
        let mut state = self.state.write();
        state.phase = self.engine.phase();
        state.turn = self.engine.turn();
        state.stop_reason = self.engine.stop_reason().cloned();
    }

    fn finish(mut self) -> RunReport {
        if self.engine.pending().is_some() {
            self.engine.abandon(StopReason::Internal { message: "decision pending at shutdown".to_string() });
        }
        let stop_reason = self.engine.finish().unwrap_or_else(|e| {
            error!("Engine did not finish cleanly: {}", e);
            Some(StopReason::Internal { message: e.to_string() })
        });
        self.publish();

        let turns = self.engine.turn();
        match &stop_reason {
            Some(reason) if reason.is_failure() => error!("Session {} stopped: {}", self.session, reason),
            Some(reason) => info!("Session {} stopped: {}", self.session, reason),
            None => info!("Session {} stopped", self.session),
        }
        if let Some(reason) = stop_reason.clone() {
            self.events.emit(TurnEvent::Stopped { session: self.session, reason, turns });
        }

        let state = self.state.read();
        RunReport {
            session: self.session,
            phase: state.phase,
            stop_reason,
            turns,
            last_snapshot: self.last_snapshot.clone(),
            last_error: state.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::executor::{FailureKind, RecordingExecutor};
    use crate::engine::Phase;
    use crate::career::{ActionKind, StatValue};
    use crate::vision::ScriptedPerception;
    use crossbeam_channel::unbounded;

    const LOBBY: &str = r#"{
        "screen": "lobby",
        "texts": {
            "date": "Classic Year Early Apr",
            "mood": "GOOD",
            "stat.spd": "400", "stat.sta": "300", "stat.pwr": "300", "stat.guts": "200", "stat.wit": "250",
            "failure.spd": "0%", "failure.sta": "0%", "failure.pwr": "0%", "failure.guts": "0%", "failure.wit": "0%"
        },
        "energy_percent": 90,
        "support": {"wit": [{"card": "wit"}, {"card": "wit"}, "friend"]}
    }"#;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.general.cooldown_ms = 0;
        config.general.retry_delay_ms = 0;
        config
    }

    fn perception(frames: &[&str]) -> ScriptedPerception {
        let json = format!(r#"{{"frames":[{}]}}"#, frames.join(","));
        ScriptedPerception::new(serde_json::from_str(&json).unwrap())
    }

    fn no_energy_lobby() -> String {
        LOBBY.replace(r#""energy_percent": 90,"#, "")
    }

    #[test]
    fn test_runs_until_source_closes() {
        let (_tx, rx) = unbounded();
        let executor = RecordingExecutor::new();
        let run = RunLoop::new(config(), RaceCatalog::default(), perception(&[LOBBY, LOBBY]), executor.clone(), rx);
        let events = run.events().subscribe();

        let report = run.run();

        assert_eq!(report.phase, Phase::Stopped);
        assert_eq!(report.stop_reason, Some(StopReason::SourceClosed));
        assert_eq!(report.turns, 2);
        assert_eq!(executor.executed(), vec![ActionKind::Train(StatKind::Wit); 2]);

        let records: Vec<TurnRecord> = events
            .try_iter()
            .filter_map(|e| match e {
                TurnEvent::Turn(record) => Some(record),
                _ => None,
            })
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].turn, 0);
        assert!(!records[0].rationale.is_empty());
        assert!(records[0].outcome.is_completed());
    }

    #[test]
    fn test_degraded_energy_rests_on_third_pass() {
        let (_tx, rx) = unbounded();
        let executor = RecordingExecutor::new();
        let frame = no_energy_lobby();
        let mut config = config();
        config.general.degraded_retry_budget = 2;
        let run = RunLoop::new(config, RaceCatalog::default(), perception(&[&frame, &frame, &frame]), executor.clone(), rx);
        let events = run.events().subscribe();

        let report = run.run();

        assert_eq!(executor.executed(), vec![ActionKind::Rest]);
        assert_eq!(report.turns, 1);
        let degraded = events.try_iter().filter(|e| matches!(e, TurnEvent::Degraded { .. })).count();
        assert_eq!(degraded, 2);
    }

    #[test]
    fn test_stat_drop_after_event_screen_is_cross_checked() {
        let (_tx, rx) = unbounded();
        let event = r#"{"screen": "event_choice"}"#;
        let dropped = LOBBY.replace(r#""stat.spd": "400""#, r#""stat.spd": "100""#);
        let executor = RecordingExecutor::new();
        let report = RunLoop::new(
            config(),
            RaceCatalog::default(),
            perception(&[LOBBY, event, &dropped]),
            executor.clone(),
            rx,
        )
        .run();

        assert_eq!(executor.executed()[1], ActionKind::ResolveEvent(0));
        let last = report.last_snapshot.unwrap();
        assert_eq!(last.stats[StatKind::Speed], Some(StatValue::stale(400)));
    }

    #[test]
    fn test_unread_stat_keeps_last_known_value() {
        let (_tx, rx) = unbounded();
        let missing = LOBBY.replace(r#""stat.spd": "400", "#, "");
        let dropped = LOBBY.replace(r#""stat.spd": "400""#, r#""stat.spd": "100""#);
        let report = RunLoop::new(
            config(),
            RaceCatalog::default(),
            perception(&[LOBBY, &missing, &dropped]),
            RecordingExecutor::new(),
            rx,
        )
        .run();

        let last = report.last_snapshot.unwrap();
        assert_eq!(last.stats[StatKind::Speed], Some(StatValue::stale(400)));
    }

    #[test]
    fn test_force_on_token_ends_cooldown_without_control_channel() {
        let (tx, rx) = unbounded();
        drop(tx);
        let mut config = config();
        config.general.cooldown_ms = 10_000;
        let cancel = CancelToken::new();
        let executor = RecordingExecutor::new();
        let run = RunLoop::new(config, RaceCatalog::default(), perception(&[LOBBY, LOBBY]), executor.clone(), rx)
            .with_cancel(cancel.clone());

        let forcer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            cancel.force();
        });
        let started = Instant::now();
        let report = run.run();
        forcer.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.stop_reason, Some(StopReason::ForceStop));
        assert_eq!(executor.executed().len(), 1);
    }

    #[test]
    fn test_stopped_token_prevents_first_action() {
        let (_tx, rx) = unbounded();
        let cancel = CancelToken::new();
        cancel.stop();
        let executor = RecordingExecutor::new();
        let report = RunLoop::new(config(), RaceCatalog::default(), perception(&[LOBBY]), executor.clone(), rx)
            .with_cancel(cancel)
            .run();

        assert_eq!(report.stop_reason, Some(StopReason::ExternalStop));
        assert!(executor.executed().is_empty());
    }

    #[test]
    fn test_stop_before_first_turn() {
        let (tx, rx) = unbounded();
        tx.send(ControlSignal::Stop).unwrap();
        let executor = RecordingExecutor::new();
        let report = RunLoop::new(config(), RaceCatalog::default(), perception(&[LOBBY]), executor.clone(), rx).run();

        assert_eq!(report.stop_reason, Some(StopReason::ExternalStop));
        assert!(executor.executed().is_empty());
        assert!(report.last_snapshot.is_none());
    }

    #[test]
    fn test_fatal_action_stops_run() {
        let (_tx, rx) = unbounded();
        let executor = RecordingExecutor::new();
        executor.push_reply(Err(FailureKind::WindowLost));
        let report = RunLoop::new(config(), RaceCatalog::default(), perception(&[LOBBY, LOBBY]), executor.clone(), rx).run();

        assert!(matches!(report.stop_reason, Some(StopReason::FatalAction { .. })));
        assert_eq!(executor.executed().len(), 1);
        assert_eq!(report.turns, 0);
        assert!(report.is_failure());
        assert!(report.last_error.is_some());
    }

    #[test]
    fn test_recoverable_failure_reevaluates() {
        let (_tx, rx) = unbounded();
        let executor = RecordingExecutor::new();
        executor.push_reply(Err(FailureKind::TargetNotFound));
        let report = RunLoop::new(config(), RaceCatalog::default(), perception(&[LOBBY, LOBBY]), executor.clone(), rx).run();

        assert_eq!(executor.executed().len(), 2);
        assert_eq!(report.turns, 1);
    }

    #[test]
    fn test_perception_budget_stops_run() {
        let (_tx, rx) = unbounded();
        let mut config = config();
        config.general.perception_failure_budget = 2;
        let down = r#"{"unreachable": true}"#;
        let report = RunLoop::new(
            config,
            RaceCatalog::default(),
            perception(&[down, down, down, LOBBY]),
            RecordingExecutor::new(),
            rx,
        )
        .run();

        assert_eq!(report.stop_reason, Some(StopReason::PerceptionBudget { failures: 3 }));
    }

    #[test]
    fn test_low_mood_stops_without_acting() {
        let (_tx, rx) = unbounded();
        let mut config = config();
        config.stop_conditions.enabled = true;
        let executor = RecordingExecutor::new();
        let frame = LOBBY.replace("GOOD", "AWFUL");
        let report = RunLoop::new(config, RaceCatalog::default(), perception(&[&frame]), executor.clone(), rx).run();

        assert!(matches!(report.stop_reason, Some(StopReason::LowMood { .. })));
        assert!(executor.executed().is_empty());
        assert!(report.last_snapshot.is_some());
    }
}
