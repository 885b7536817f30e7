//! Control messages for a running bot

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Requests sent to the run loop over the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Finish the in-flight action, then stop
    Stop,
    /// Abandon at the next checkpoint; may leave a click pending
    ForceStop,
}

const RUNNING: u8 = 0;
const STOP: u8 = 1;
const FORCE: u8 = 2;

/// Flag visible inside long-running calls that cannot poll the channel,
/// such as a click sequence in the executor
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<AtomicU8>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        // Never downgrade a force stop
        let _ = self
            .state
            .compare_exchange(RUNNING, STOP, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn force(&self) {
        self.state.store(FORCE, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::SeqCst) != RUNNING
    }

    pub fn is_forced(&self) -> bool {
        self.state.load(Ordering::SeqCst) == FORCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_is_sticky() {
        let token = CancelToken::new();
        assert!(!token.is_stopped());
        token.force();
        token.stop();
        assert!(token.is_forced());
        assert!(token.is_stopped());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        other.stop();
        assert!(token.is_stopped());
        assert!(!token.is_forced());
    }
}
