//! Error handling for PrintKit
//!
//! One unified error type covers the controller taxonomy:
//! - `NotReady`: a state-gated operation was invoked outside its
//!   precondition; rejected with no side effect
//! - `ConnectionFailure`: the transport could not be established or was lost
//! - `MalformedMessage`: a hardware message could not be parsed; logged and
//!   dropped, never fatal to the read loop
//! - `EventDeliveryFailure`: the outbound event queue rejected a publish

use crate::state::State;
use thiserror::Error;

/// Unified error type for printer control operations.
#[derive(Error, Debug, Clone)]
pub enum PrinterError {
    /// Operation invoked while the controller state did not satisfy its
    /// precondition. The operation performed no hardware side effect and
    /// the state is unchanged.
    #[error("printer not ready: {operation} is not valid while {state}")]
    NotReady {
        /// The rejected operation.
        operation: String,
        /// The state the controller was in.
        state: State,
    },

    /// Transport could not be established or was lost mid-operation.
    #[error("connection failure: {reason}")]
    ConnectionFailure {
        /// What went wrong on the link.
        reason: String,
    },

    /// A message from the printer could not be parsed.
    #[error("malformed printer message: {message}")]
    MalformedMessage {
        /// The raw message as received.
        message: String,
    },

    /// The outbound event queue rejected a publish.
    #[error("failed to deliver {event} event: {reason}")]
    EventDeliveryFailure {
        /// Name of the event that was not delivered.
        event: String,
        /// Why the queue rejected it.
        reason: String,
    },

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl PrinterError {
    /// Build a `NotReady` rejection for an operation.
    pub fn not_ready(operation: impl Into<String>, state: State) -> Self {
        PrinterError::NotReady {
            operation: operation.into(),
            state,
        }
    }

    /// Build a `ConnectionFailure` from a reason.
    pub fn connection(reason: impl Into<String>) -> Self {
        PrinterError::ConnectionFailure {
            reason: reason.into(),
        }
    }

    /// Create an error from a string message.
    pub fn other(msg: impl Into<String>) -> Self {
        PrinterError::Other(msg.into())
    }

    /// Check if this is a `NotReady` rejection.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PrinterError::NotReady { .. })
    }

    /// Check if this is a connection failure.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, PrinterError::ConnectionFailure { .. })
    }
}

impl From<std::io::Error> for PrinterError {
    fn from(err: std::io::Error) -> Self {
        PrinterError::ConnectionFailure {
            reason: err.to_string(),
        }
    }
}

/// Result type using `PrinterError`.
pub type Result<T> = std::result::Result<T, PrinterError>;
