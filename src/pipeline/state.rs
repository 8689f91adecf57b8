//! Run state tracking.

use tracing::{debug, warn};

use crate::models::RunState;

/// Follows one flow of control through the run state machine.
#[derive(Debug, Clone)]
pub struct StateTracker {
    state: RunState,
    history: Vec<RunState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::resume(RunState::Idle)
    }

    /// Start from an intermediate state, e.g. a worker picking up after the search.
    pub fn resume(state: RunState) -> Self {
        Self {
            state,
            history: vec![state],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state visited, oldest first.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn advance(&mut self, next: RunState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected run state transition");
            debug_assert!(false, "illegal transition {} -> {}", self.state, next);
        }
        debug!(from = %self.state, to = %next, "Run state");
        self.state = next;
        self.history.push(next);
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
