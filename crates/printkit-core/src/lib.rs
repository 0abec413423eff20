//! # PrintKit Core
//!
//! Core types for PrintKit. Provides the printer state enumeration,
//! the event wire model published to observers, and the error taxonomy
//! shared by the controller and transport layers.

pub mod error;
pub mod event;
pub mod state;

pub use error::{PrinterError, Result};
pub use event::{log_level, PrinterEvent};
pub use state::State;
