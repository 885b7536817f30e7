//! Action execution
//!
//! Turns a decided [`ActionKind`] into a sequence of UI clicks. The actual
//! input injection sits behind [`InputDriver`]; this module only knows the
//! click paths and how to classify failures.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::career::{ActionKind, ActionOutcome, StatKind};
use crate::shared::CancelToken;

/// Clickable UI element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target", content = "value", rename_all = "snake_case")]
pub enum UiTarget {
    TrainingButton,
    TrainingOption(StatKind),
    RestButton,
    InfirmaryButton,
    RacesButton,
    RaceListing(String),
    RaceStart,
    Ok,
    EventOption(u8),
    BackButton,
}

impl fmt::Display for UiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiTarget::TrainingOption(stat) => write!(f, "training {}", stat),
            UiTarget::RaceListing(id) => write!(f, "race listing {}", id),
            UiTarget::EventOption(choice) => write!(f, "event option {}", choice + 1),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Why an input step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Button not found within the driver's attempts
    TargetNotFound,
    /// UI did not respond in time
    Timeout,
    /// Game window lost focus or disappeared
    WindowLost,
    GameClosed,
    /// Navigation cut short by a force stop
    Aborted,
}

impl FailureKind {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FailureKind::WindowLost | FailureKind::GameClosed | FailureKind::Aborted)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::TargetNotFound => "target not found",
            FailureKind::Timeout => "timed out",
            FailureKind::WindowLost => "window lost",
            FailureKind::GameClosed => "game closed",
            FailureKind::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Low-level input capability
pub trait InputDriver: Send {
    fn click(&mut self, target: &UiTarget) -> Result<(), FailureKind>;

    /// Click through a sequence, stopping at the first failure
    fn navigate(&mut self, sequence: &[UiTarget]) -> Result<(), FailureKind> {
        for target in sequence {
            self.click(target)?;
        }
        Ok(())
    }
}

/// Failure of a whole action
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    #[error("{action} failed at {target}: {kind}")]
    Recoverable {
        action: ActionKind,
        target: UiTarget,
        kind: FailureKind,
    },

    #[error("{action} failed fatally at {target}: {kind}")]
    Fatal {
        action: ActionKind,
        target: UiTarget,
        kind: FailureKind,
    },
}

impl ActionError {
    fn classify(action: &ActionKind, target: &UiTarget, kind: FailureKind) -> Self {
        let (action, target) = (action.clone(), target.clone());
        if kind.is_fatal() {
            ActionError::Fatal { action, target, kind }
        } else {
            ActionError::Recoverable { action, target, kind }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::Fatal { .. })
    }

    pub fn outcome(&self) -> ActionOutcome {
        if self.is_fatal() {
            ActionOutcome::Fatal(self.to_string())
        } else {
            ActionOutcome::Recoverable(self.to_string())
        }
    }
}

/// Performs decided actions
pub trait ActionExecutor: Send {
    fn execute(&mut self, action: &ActionKind) -> Result<(), ActionError>;
}

impl<E: ActionExecutor + ?Sized> ActionExecutor for Box<E> {
    fn execute(&mut self, action: &ActionKind) -> Result<(), ActionError> {
        (**self).execute(action)
    }
}

/// One click of a plan
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub target: UiTarget,
    /// A missing target is skipped, e.g. confirmation dialogs that only
    /// show up sometimes
    pub optional: bool,
}

impl Step {
    fn required(target: UiTarget) -> Self {
        Self { target, optional: false }
    }

    fn optional(target: UiTarget) -> Self {
        Self { target, optional: true }
    }
}

/// Click path for an action, starting from the screen it was decided on
pub fn plan(action: &ActionKind) -> Vec<Step> {
    match action {
        ActionKind::Train(stat) => vec![
            Step::required(UiTarget::TrainingButton),
            Step::required(UiTarget::TrainingOption(*stat)),
        ],
        ActionKind::Rest => vec![Step::required(UiTarget::RestButton), Step::optional(UiTarget::Ok)],
        ActionKind::Infirmary => vec![Step::required(UiTarget::InfirmaryButton), Step::optional(UiTarget::Ok)],
        ActionKind::Race(id) => vec![
            Step::required(UiTarget::RacesButton),
            // Warning shown after several races in a row
            Step::optional(UiTarget::Ok),
            Step::required(UiTarget::RaceListing(id.clone())),
            Step::required(UiTarget::RaceStart),
            Step::optional(UiTarget::RaceStart),
        ],
        ActionKind::ResolveEvent(choice) => vec![Step::required(UiTarget::EventOption(*choice))],
        ActionKind::Back => vec![Step::required(UiTarget::BackButton)],
    }
}

/// Executes plans through an [`InputDriver`]
pub struct InputExecutor<D: InputDriver> {
    driver: D,
    cancel: CancelToken,
    /// Tries per required step for non-fatal failures
    attempts: u32,
}

impl<D: InputDriver> InputExecutor<D> {
    pub fn new(driver: D, cancel: CancelToken) -> Self {
        Self { driver, cancel, attempts: 2 }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn run_step(&mut self, step: &Step) -> Result<(), FailureKind> {
        let mut last = FailureKind::TargetNotFound;
        for attempt in 1..=self.attempts {
            match self.driver.click(&step.target) {
                Ok(()) => return Ok(()),
                Err(kind) if kind.is_fatal() => return Err(kind),
                Err(_) if step.optional => return Ok(()),
                Err(kind) => {
                    debug!("Click on {} failed ({}), attempt {}/{}", step.target, kind, attempt, self.attempts);
                    last = kind;
                }
            }
        }
        Err(last)
    }
}

impl<D: InputDriver> ActionExecutor for InputExecutor<D> {
    fn execute(&mut self, action: &ActionKind) -> Result<(), ActionError> {
        info!("Executing {}", action);
        for step in plan(action) {
            // Force stop may land between clicks and leave the UI mid-path
            if self.cancel.is_forced() {
                warn!("Force stop during {}, abandoning at {}", action, step.target);
                return Err(ActionError::classify(action, &step.target, FailureKind::Aborted));
            }
            self.run_step(&step)
                .map_err(|kind| ActionError::classify(action, &step.target, kind))?;
        }
        Ok(())
    }
}

/// Driver that only logs, for dry runs and replays
#[derive(Debug, Default)]
pub struct DryRunDriver {
    clicks: Vec<UiTarget>,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clicks(&self) -> &[UiTarget] {
        &self.clicks
    }
}

impl InputDriver for DryRunDriver {
    fn click(&mut self, target: &UiTarget) -> Result<(), FailureKind> {
        info!("[dry run] click {}", target);
        self.clicks.push(target.clone());
        Ok(())
    }
}

/// Executor that records actions and replies from a scripted queue.
///
/// Once the queue is empty every action succeeds.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    executed: Arc<Mutex<Vec<ActionKind>>>,
    replies: Arc<Mutex<VecDeque<Result<(), FailureKind>>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next execution
    pub fn push_reply(&self, reply: Result<(), FailureKind>) {
        self.replies.lock().push_back(reply);
    }

    /// Actions executed so far, shared with clones of this executor
    pub fn executed(&self) -> Vec<ActionKind> {
        self.executed.lock().clone()
    }
}

impl ActionExecutor for RecordingExecutor {
    fn execute(&mut self, action: &ActionKind) -> Result<(), ActionError> {
        self.executed.lock().push(action.clone());
        match self.replies.lock().pop_front() {
            Some(Err(kind)) => {
                let target = plan(action)
                    .first()
                    .map(|s| s.target.clone())
                    .unwrap_or(UiTarget::BackButton);
                Err(ActionError::classify(action, &target, kind))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Driver that fails chosen targets a fixed number of times
    #[derive(Default)]
    struct FlakyDriver {
        failures: Vec<(UiTarget, FailureKind, u32)>,
        clicks: Vec<UiTarget>,
    }

    impl InputDriver for FlakyDriver {
        fn click(&mut self, target: &UiTarget) -> Result<(), FailureKind> {
            self.clicks.push(target.clone());
            for (t, kind, remaining) in self.failures.iter_mut() {
                if t == target && *remaining > 0 {
                    *remaining -= 1;
                    return Err(*kind);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_training_plan() {
        let mut executor = InputExecutor::new(DryRunDriver::new(), CancelToken::new());
        executor.execute(&ActionKind::Train(StatKind::Guts)).unwrap();
        assert_eq!(
            executor.driver().clicks(),
            &[UiTarget::TrainingButton, UiTarget::TrainingOption(StatKind::Guts)]
        );
    }

    #[test]
    fn test_infirmary_plan() {
        let mut executor = InputExecutor::new(DryRunDriver::new(), CancelToken::new());
        executor.execute(&ActionKind::Infirmary).unwrap();
        assert_eq!(executor.driver().clicks(), &[UiTarget::InfirmaryButton, UiTarget::Ok]);
    }

    #[test]
    fn test_optional_step_is_skipped() {
        let driver = FlakyDriver {
            failures: vec![(UiTarget::Ok, FailureKind::TargetNotFound, 5)],
            ..Default::default()
        };
        let mut executor = InputExecutor::new(driver, CancelToken::new());
        assert!(executor.execute(&ActionKind::Rest).is_ok());
    }

    #[test]
    fn test_required_step_is_retried() {
        let driver = FlakyDriver {
            failures: vec![(UiTarget::RestButton, FailureKind::Timeout, 1)],
            ..Default::default()
        };
        let mut executor = InputExecutor::new(driver, CancelToken::new()).with_attempts(2);
        assert!(executor.execute(&ActionKind::Rest).is_ok());
        assert_eq!(executor.driver().clicks.len(), 3);
    }

    #[test]
    fn test_missing_button_is_recoverable() {
        let driver = FlakyDriver {
            failures: vec![(UiTarget::BackButton, FailureKind::TargetNotFound, 10)],
            ..Default::default()
        };
        let mut executor = InputExecutor::new(driver, CancelToken::new());
        let err = executor.execute(&ActionKind::Back).unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err.outcome(), ActionOutcome::Recoverable(_)));
    }

    #[test]
    fn test_window_loss_is_fatal_without_retry() {
        let driver = FlakyDriver {
            failures: vec![(UiTarget::TrainingButton, FailureKind::WindowLost, 10)],
            ..Default::default()
        };
        let mut executor = InputExecutor::new(driver, CancelToken::new()).with_attempts(3);
        let err = executor.execute(&ActionKind::Train(StatKind::Speed)).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(executor.driver().clicks.len(), 1);
    }

    #[test]
    fn test_force_stop_aborts_between_clicks() {
        let cancel = CancelToken::new();
        cancel.force();
        let mut executor = InputExecutor::new(DryRunDriver::new(), cancel);
        let err = executor.execute(&ActionKind::Race("derby".into())).unwrap_err();
        assert!(matches!(err, ActionError::Fatal { kind: FailureKind::Aborted, .. }));
        assert!(executor.driver().clicks().is_empty());
    }

    #[test]
    fn test_recording_executor_replies_in_order() {
        let recorder = RecordingExecutor::new();
        recorder.push_reply(Err(FailureKind::TargetNotFound));
        let mut executor = recorder.clone();

        assert!(executor.execute(&ActionKind::Rest).is_err());
        assert!(executor.execute(&ActionKind::Rest).is_ok());
        assert_eq!(recorder.executed(), vec![ActionKind::Rest, ActionKind::Rest]);
    }
}
