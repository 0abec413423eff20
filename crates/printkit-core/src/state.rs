//! Printer state enumeration
//!
//! The discriminants are part of the wire protocol: `state_change` events
//! carry them as integers and consumers rely on numeric comparison
//! (`Error` orders above every operational state). They must not change.

use std::fmt;

/// Operational state of a printer controller.
///
/// Exactly one value is active per controller at any instant. Transitions
/// are driven by the controller only; observers see them as `state_change`
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    /// No transport connection established.
    Disconnected = 10,
    /// Connected and idle; accepts commands.
    Ready = 20,
    /// Dispatching a G-code program.
    Executing = 30,
    /// Program dispatch halted; program and cursor retained.
    Paused = 40,
    /// Faulted; requires an external reconnect/reset.
    Error = 100,
}

impl State {
    /// Wire ordinal of this state.
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Disconnected => write!(f, "DISCONNECTED"),
            State::Ready => write!(f, "READY"),
            State::Executing => write!(f, "EXECUTING"),
            State::Paused => write!(f, "PAUSED"),
            State::Error => write!(f, "ERROR"),
        }
    }
}

impl TryFrom<u8> for State {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            10 => Ok(State::Disconnected),
            20 => Ok(State::Ready),
            30 => Ok(State::Executing),
            40 => Ok(State::Paused),
            100 => Ok(State::Error),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_ordinals() {
        assert_eq!(State::Disconnected.value(), 10);
        assert_eq!(State::Ready.value(), 20);
        assert_eq!(State::Executing.value(), 30);
        assert_eq!(State::Paused.value(), 40);
        assert_eq!(State::Error.value(), 100);
    }

    #[test]
    fn test_error_orders_above_operational_states() {
        for state in [
            State::Disconnected,
            State::Ready,
            State::Executing,
            State::Paused,
        ] {
            assert!(State::Error.value() > state.value());
        }
    }

    #[test]
    fn test_round_trip_from_ordinal() {
        for state in [
            State::Disconnected,
            State::Ready,
            State::Executing,
            State::Paused,
            State::Error,
        ] {
            assert_eq!(State::try_from(state.value()), Ok(state));
        }
        assert_eq!(State::try_from(0), Err(0));
        assert_eq!(State::try_from(50), Err(50));
    }
}
