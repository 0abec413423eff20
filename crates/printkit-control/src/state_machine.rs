//! Controller state machine
//!
//! Holds the single authoritative [`State`] for one controller and fires a
//! `state_change` callback on every transition. Legality of a transition is
//! the calling operation's responsibility: each state-gated operation checks
//! its precondition and fails fast before touching hardware, so this
//! component applies transitions unconditionally.

use crate::callbacks::PrinterCallbacks;
use parking_lot::RwLock;
use printkit_core::State;
use std::sync::Arc;

/// Shared read handle onto a controller's current state.
pub type SharedState = Arc<RwLock<State>>;

/// The authoritative state for one printer controller.
pub struct StateMachine {
    state: SharedState,
    callbacks: Arc<dyn PrinterCallbacks>,
}

impl StateMachine {
    /// Create a state machine starting in [`State::Disconnected`].
    pub fn new(callbacks: Arc<dyn PrinterCallbacks>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::Disconnected)),
            callbacks,
        }
    }

    /// Current state.
    pub fn current(&self) -> State {
        *self.state.read()
    }

    /// Shared handle for observing the state from outside the controller
    /// task.
    pub fn shared(&self) -> SharedState {
        self.state.clone()
    }

    /// Set the state and fire `state_change(old, new)`.
    ///
    /// Self-transitions are applied and reported like any other, so the
    /// emitted chain of `(old, new)` pairs stays gapless.
    pub fn transition(&self, new_state: State) {
        let old_state = {
            let mut guard = self.state.write();
            std::mem::replace(&mut *guard, new_state)
        };
        tracing::debug!("printer state {} -> {}", old_state, new_state);
        self.callbacks.state_change(old_state, new_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallbacks {
        changes: Mutex<Vec<(State, State)>>,
    }

    impl PrinterCallbacks for RecordingCallbacks {
        fn state_change(&self, old: State, new: State) {
            self.changes.lock().unwrap().push((old, new));
        }
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let machine = StateMachine::new(Arc::new(RecordingCallbacks::default()));
        assert_eq!(machine.current(), State::Disconnected);
    }

    #[test]
    fn test_transition_fires_callback_with_old_and_new() {
        let callbacks = Arc::new(RecordingCallbacks::default());
        let machine = StateMachine::new(callbacks.clone());

        machine.transition(State::Ready);
        machine.transition(State::Executing);

        let changes = callbacks.changes.lock().unwrap();
        assert_eq!(
            *changes,
            vec![
                (State::Disconnected, State::Ready),
                (State::Ready, State::Executing),
            ]
        );
    }

    #[test]
    fn test_state_change_chain_is_gapless() {
        let callbacks = Arc::new(RecordingCallbacks::default());
        let machine = StateMachine::new(callbacks.clone());

        for state in [
            State::Ready,
            State::Executing,
            State::Paused,
            State::Executing,
            State::Ready,
            State::Error,
        ] {
            machine.transition(state);
        }

        let changes = callbacks.changes.lock().unwrap();
        assert_eq!(changes[0].0, State::Disconnected);
        for pair in changes.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn test_shared_handle_tracks_transitions() {
        let machine = StateMachine::new(Arc::new(RecordingCallbacks::default()));
        let shared = machine.shared();
        machine.transition(State::Ready);
        assert_eq!(*shared.read(), State::Ready);
    }
}
