//! Application Coordinator
//!
//! Owns the run loop thread and the control surface around it: start,
//! graceful stop, forced stop and join.

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{EventEmitter, TurnEvent};
use crate::career::RaceCatalog;
use crate::config::AppConfig;
use crate::engine::{ActionExecutor, RunLoop};
use crate::shared::{CancelToken, ControlSignal, RunReport, SharedRunState};
use crate::vision::Perception;

/// Main application coordinator
pub struct BotApp {
    config: AppConfig,
    catalog: RaceCatalog,
    events: Arc<EventEmitter>,
    cancel: CancelToken,
    control: Sender<ControlSignal>,
    control_rx: Option<Receiver<ControlSignal>>,
    run: Option<RunHandle>,
}

struct RunHandle {
    session: Uuid,
    state: SharedRunState,
    thread: JoinHandle<RunReport>,
}

impl BotApp {
    pub fn new(config: AppConfig, catalog: RaceCatalog) -> Self {
        let (control, control_rx) = unbounded();
        Self {
            config,
            catalog,
            events: Arc::new(EventEmitter::new()),
            cancel: CancelToken::new(),
            control,
            control_rx: Some(control_rx),
            run: None,
        }
    }

    /// Token the executor should watch for force stops
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Subscribe to turn events; call before `start` to see every event
    pub fn subscribe(&self) -> Receiver<TurnEvent> {
        self.events.subscribe()
    }

    /// Spawn the run loop on its own thread. A bot runs at most once.
    pub fn start<P, E>(&mut self, perception: P, executor: E) -> Result<Uuid>
    where
        P: Perception + Send + 'static,
        E: ActionExecutor + 'static,
    {
        let control_rx = self
            .control_rx
            .take()
            .ok_or_else(|| anyhow!("Bot has already been started"))?;

        let run_loop = RunLoop::new(self.config.clone(), self.catalog.clone(), perception, executor, control_rx)
            .with_events(Arc::clone(&self.events))
            .with_cancel(self.cancel.clone());
        let session = run_loop.session();
        let state = run_loop.state();

        let thread = std::thread::Builder::new()
            .name("run-loop".to_string())
            .spawn(move || run_loop.run())?;

        info!("Run loop started for session {}", session);
        self.run = Some(RunHandle { session, state, thread });
        Ok(session)
    }

    pub fn session(&self) -> Option<Uuid> {
        self.run.as_ref().map(|r| r.session)
    }

    pub fn state(&self) -> Option<SharedRunState> {
        self.run.as_ref().map(|r| Arc::clone(&r.state))
    }

    /// Forward a control signal from any source
    pub fn signal(&self, signal: ControlSignal) {
        match signal {
            ControlSignal::Stop => self.request_stop(),
            ControlSignal::ForceStop => self.force_stop(),
        }
    }

    /// Stop after the in-flight action, if any, completes
    pub fn request_stop(&self) {
        info!("Graceful stop requested");
        self.cancel.stop();
        if self.control.send(ControlSignal::Stop).is_err() {
            warn!("Run loop is not listening");
        }
    }

    /// Unsafe stop: a click sequence in progress is cut short and may
    /// leave the game mid-menu
    pub fn force_stop(&self) {
        warn!("Force stop requested");
        self.cancel.force();
        if self.control.send(ControlSignal::ForceStop).is_err() {
            warn!("Run loop is not listening");
        }
    }

    /// Whether the run loop thread has exited
    pub fn is_finished(&self) -> bool {
        self.run.as_ref().map(|r| r.thread.is_finished()).unwrap_or(true)
    }

    /// Wait for the run loop and return its report
    pub fn join(&mut self) -> Result<RunReport> {
        let run = self.run.take().ok_or_else(|| anyhow!("Bot was never started"))?;
        run.thread
            .join()
            .map_err(|_| anyhow!("Run loop thread panicked"))
    }
}

impl Drop for BotApp {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            // Make sure the worker does not outlive the coordinator
            let _ = self.control.send(ControlSignal::Stop);
            let _ = run.thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::ActionKind;
    use crate::engine::{Phase, RecordingExecutor, StopReason};
    use crate::vision::ScriptedPerception;
    use crate::vision::replay::{Script, ScriptedFrame};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.general.cooldown_ms = 0;
        config.general.retry_delay_ms = 0;
        config
    }

    /// Frames on the event screen, long enough to outlast the test
    fn event_screens(count: usize) -> ScriptedPerception {
        let frame = ScriptedFrame {
            screen: Some(crate::career::ScreenContext::EventChoice),
            ..Default::default()
        };
        ScriptedPerception::new(Script { frames: vec![frame; count] })
    }

    #[test]
    fn test_start_and_join() {
        let mut app = BotApp::new(config(), RaceCatalog::default());
        let events = app.subscribe();
        let executor = RecordingExecutor::new();

        let session = app.start(event_screens(3), executor.clone()).unwrap();
        let report = app.join().unwrap();

        assert_eq!(report.session, session);
        assert_eq!(report.phase, Phase::Stopped);
        assert_eq!(report.stop_reason, Some(StopReason::SourceClosed));
        assert_eq!(executor.executed(), vec![ActionKind::ResolveEvent(0); 3]);
        assert!(matches!(events.try_recv(), Ok(TurnEvent::Started { .. })));
    }

    #[test]
    fn test_cannot_start_twice() {
        let mut app = BotApp::new(config(), RaceCatalog::default());
        app.start(event_screens(1), RecordingExecutor::new()).unwrap();
        assert!(app.start(event_screens(1), RecordingExecutor::new()).is_err());
        app.join().unwrap();
    }

    #[test]
    fn test_request_stop_ends_run() {
        let mut config = config();
        config.general.cooldown_ms = 50;
        config.stop_conditions.max_lobby_misses = u32::MAX;
        let mut app = BotApp::new(config, RaceCatalog::default());
        app.start(event_screens(100_000), RecordingExecutor::new()).unwrap();

        app.request_stop();
        let report = app.join().unwrap();
        assert!(matches!(
            report.stop_reason,
            Some(StopReason::ExternalStop) | Some(StopReason::SourceClosed)
        ));
        assert!(app.cancel_token().is_stopped());
    }

    #[test]
    fn test_join_without_start() {
        let mut app = BotApp::new(config(), RaceCatalog::default());
        assert!(app.join().is_err());
        assert!(app.is_finished());
    }
}
