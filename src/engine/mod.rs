//! Decision engine and run loop

pub mod decision;
pub mod executor;
pub mod run_loop;
pub mod stop;

pub use decision::{DecisionEngine, EngineError, Evaluation, Phase};
pub use executor::{
    ActionError, ActionExecutor, DryRunDriver, FailureKind, InputDriver, InputExecutor, RecordingExecutor, UiTarget,
};
pub use run_loop::RunLoop;
pub use stop::{check_stop_conditions, StopReason};
