//! # PrintKit Control
//!
//! The printer controller: owns the exclusive transport link to the
//! hardware, consumes commands from an inbound queue, and reports
//! telemetry and lifecycle events through a pluggable callback sink.
//!
//! The controller runs as its own tokio task (see [`spawn_printer`]) so a
//! slow serial link never stalls command producers or event consumers.

pub mod callbacks;
pub mod command;
pub mod controller;
pub mod marlin;
pub mod service;
pub mod state_machine;
pub mod transport;

pub use callbacks::{NoOpCallbacks, PrinterCallbacks, QueuedPrinterCallbacks};
pub use command::PrinterCommand;
pub use controller::{GcodeProgram, MarlinPrinter, Printer, TempTargets};
pub use service::{spawn_printer, PrinterHandle};
pub use state_machine::{SharedState, StateMachine};
pub use transport::{SerialConfig, SerialTransport, Transport};
