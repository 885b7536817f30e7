//! Shared state and messaging between the run loop and its controllers
//!
//! The run loop owns the state; controllers (CLI, hotkeys) only send
//! signals.

pub mod messages;
pub mod state;

pub use messages::{CancelToken, ControlSignal};
pub use state::{RunReport, RunState, SharedRunState};
