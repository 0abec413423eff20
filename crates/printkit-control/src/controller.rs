//! Printer controller
//!
//! [`MarlinPrinter`] is the concrete driver behind the [`Printer`]
//! capability trait: it owns the state machine, the transport, and the
//! active G-code program, enforces each operation's state precondition,
//! and converts raw hardware messages into callback events.
//!
//! All state-gated operations fail fast with `NotReady` before touching
//! hardware; they never transition speculatively and never queue a
//! rejected command for later.

use crate::callbacks::PrinterCallbacks;
use crate::marlin::{self, PrinterMessage};
use crate::state_machine::{SharedState, StateMachine};
use crate::transport::Transport;
use printkit_core::{log_level, PrinterError, Result, State};
use std::sync::Arc;

/// Target temperatures for `set_temp`. Omitted axes are untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TempTargets {
    /// Bed target temperature.
    pub bed: Option<f64>,
    /// Nozzle #1 target temperature.
    pub nozzle1: Option<f64>,
    /// Nozzle #2 target temperature.
    pub nozzle2: Option<f64>,
}

/// An executing G-code program with its dispatch cursor.
#[derive(Debug, Clone)]
pub struct GcodeProgram {
    lines: Vec<String>,
    current_line: usize,
}

impl GcodeProgram {
    /// Create a program with the cursor at line 0.
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            current_line: 0,
        }
    }

    /// Lines dispatched and acknowledged so far.
    pub fn current_line(&self) -> usize {
        self.current_line
    }

    /// Total number of lines.
    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    /// The next line to dispatch, or `None` past the end.
    pub fn next_line(&self) -> Option<&str> {
        self.lines.get(self.current_line).map(String::as_str)
    }

    /// Advance the cursor by one acknowledged line; returns the new cursor.
    pub fn advance(&mut self) -> usize {
        if self.current_line < self.lines.len() {
            self.current_line += 1;
        }
        self.current_line
    }

    /// Whether every line has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.current_line >= self.lines.len()
    }
}

/// The printer controller operation set.
///
/// Concrete hardware drivers implement this; the service loop in
/// [`crate::service`] drives any implementation.
pub trait Printer: Send {
    /// Current controller state.
    fn state(&self) -> State;

    /// Shared handle for observing state from outside the controller task.
    fn shared_state(&self) -> SharedState;

    /// Establish the transport connection. Valid only while DISCONNECTED;
    /// a failure is reported and leaves the state DISCONNECTED.
    fn connect(&mut self) -> Result<()>;

    /// Ask the printer for a temperature report; the reply surfaces
    /// asynchronously as a `temp_update` event.
    fn request_printer_temperature(&mut self) -> Result<()>;

    /// Ask the printer for a position report; the reply surfaces
    /// asynchronously as a `position_update` event.
    fn request_printer_position(&mut self) -> Result<()>;

    /// Set any subset of target temperatures.
    fn set_temp(&mut self, targets: TempTargets) -> Result<()>;

    /// Move the head relative to its current position.
    fn move_head_relative(&mut self, x: f64, y: f64, z: f64) -> Result<()>;

    /// Move the head to an absolute position.
    fn move_head_absolute(&mut self, x: f64, y: f64, z: f64) -> Result<()>;

    /// Home the selected axes.
    fn home_head(&mut self, x: bool, y: bool, z: bool) -> Result<()>;

    /// Begin executing a G-code program.
    fn execute_gcode(&mut self, commands: Vec<String>) -> Result<()>;

    /// Halt dispatch after the in-flight line; program and cursor retained.
    fn pause_execution(&mut self) -> Result<()>;

    /// Resume dispatch from the retained cursor.
    fn resume_execution(&mut self) -> Result<()>;

    /// Discard the program and cursor and return to READY.
    fn stop_execution(&mut self) -> Result<()>;

    /// Halt everything immediately, in any state.
    fn emergency_stop(&mut self) -> Result<()>;

    /// Run one controller step: drain pending hardware messages, then
    /// dispatch at most one program line.
    fn poll(&mut self);
}

/// Controller for Marlin-family firmware over a line-oriented transport.
pub struct MarlinPrinter<T: Transport> {
    transport: T,
    state: StateMachine,
    callbacks: Arc<dyn PrinterCallbacks>,
    program: Option<GcodeProgram>,
    awaiting_ack: bool,
}

impl<T: Transport> MarlinPrinter<T> {
    /// Create a controller in DISCONNECTED over an unopened transport.
    pub fn new(transport: T, callbacks: Arc<dyn PrinterCallbacks>) -> Self {
        Self {
            transport,
            state: StateMachine::new(callbacks.clone()),
            callbacks,
            program: None,
            awaiting_ack: false,
        }
    }

    /// Check an operation's state precondition, rejecting with `NotReady`
    /// before any side effect.
    fn require(&self, operation: &'static str, allowed: &[State]) -> Result<()> {
        let state = self.state.current();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(PrinterError::not_ready(operation, state))
        }
    }

    /// Write a batch of lines, converting a failed write into a
    /// connection-loss transition.
    fn send_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<()> {
        for line in lines {
            if let Err(e) = self.transport.write_line(line.as_ref()) {
                self.handle_connection_loss(&e.to_string());
                return Err(e);
            }
        }
        Ok(())
    }

    /// React to a lost link: discard the program, report, and transition.
    fn handle_connection_loss(&mut self, reason: &str) {
        tracing::error!("printer connection lost: {}", reason);
        self.callbacks
            .log(log_level::ERROR, &format!("connection lost: {}", reason));
        self.program = None;
        self.awaiting_ack = false;
        let target = if self.transport.is_connected() {
            State::Error
        } else {
            State::Disconnected
        };
        self.state.transition(target);
    }

    fn drain_messages(&mut self) {
        while self.transport.is_connected() {
            match self.transport.read_line() {
                Ok(Some(line)) => self.process_message(&line),
                Ok(None) => break,
                Err(e) => {
                    self.handle_connection_loss(&e.to_string());
                    break;
                }
            }
        }
    }

    /// Route one raw hardware message to the matching callback(s).
    /// Unparseable messages are logged and dropped.
    fn process_message(&mut self, line: &str) {
        match marlin::parse_message(line) {
            Ok(PrinterMessage::Ack { temps }) => {
                match temps {
                    // Acks carrying a report are M105 replies, not program
                    // line acknowledgements.
                    Some(t) => self.emit_temps(t),
                    None => self.handle_ack(),
                }
            }
            Ok(PrinterMessage::Temperature(t)) => self.emit_temps(t),
            Ok(PrinterMessage::Position { x, y, z }) => {
                self.callbacks.position_update(x, y, z);
            }
            Ok(PrinterMessage::HardwareError(msg)) => {
                tracing::error!("printer reported error: {}", msg);
                self.callbacks
                    .log(log_level::ERROR, &format!("printer error: {}", msg));
            }
            Ok(PrinterMessage::Info(msg)) => {
                self.callbacks.log(log_level::DEBUG, &msg);
            }
            Err(_) => {
                tracing::warn!("dropping unparseable printer message: {:?}", line);
                self.callbacks.log(
                    log_level::WARNING,
                    &format!("unparseable printer message: {}", line),
                );
            }
        }
    }

    fn emit_temps(&self, t: marlin::TempReading) {
        self.callbacks.temp_update(
            t.bed_current,
            t.bed_target,
            t.nozzle1_current,
            t.nozzle1_target,
            t.nozzle2_current,
            t.nozzle2_target,
        );
    }

    /// Consume a bare `ok` for the in-flight program line, advancing the
    /// cursor and reporting progress. Stray acks from immediate commands
    /// are ignored.
    fn handle_ack(&mut self) {
        if !self.awaiting_ack {
            return;
        }
        self.awaiting_ack = false;

        let Some(program) = self.program.as_mut() else {
            return;
        };
        let current = program.advance();
        let total = program.total_lines();
        self.callbacks.progress_update(current, total);

        if program.is_complete() {
            self.program = None;
            self.state.transition(State::Ready);
        }
    }

    /// Dispatch the next program line if one is due.
    fn dispatch_next_line(&mut self) {
        let next = self
            .program
            .as_ref()
            .and_then(|p| p.next_line())
            .map(str::to_string);
        let Some(line) = next else {
            // Program vanished or ran out without a final ack path;
            // settle back to READY rather than spin in EXECUTING.
            self.program = None;
            self.state.transition(State::Ready);
            return;
        };

        if let Some(z) = marlin::z_axis_target(&line) {
            self.callbacks.z_change(z);
        }

        match self.transport.write_line(&line) {
            Ok(()) => self.awaiting_ack = true,
            Err(e) => self.handle_connection_loss(&e.to_string()),
        }
    }
}

impl<T: Transport> Printer for MarlinPrinter<T> {
    fn state(&self) -> State {
        self.state.current()
    }

    fn shared_state(&self) -> SharedState {
        self.state.shared()
    }

    fn connect(&mut self) -> Result<()> {
        self.require("connect", &[State::Disconnected])?;
        match self.transport.connect() {
            Ok(()) => {
                self.callbacks.log(log_level::INFO, "printer connected");
                self.state.transition(State::Ready);
                Ok(())
            }
            Err(e) => {
                // Never partially READY: state stays DISCONNECTED.
                self.callbacks
                    .log(log_level::ERROR, &format!("connect failed: {}", e));
                Err(e)
            }
        }
    }

    fn request_printer_temperature(&mut self) -> Result<()> {
        self.require(
            "request_printer_temperature",
            &[State::Ready, State::Executing, State::Paused],
        )?;
        self.send_lines(&[marlin::TEMPERATURE_QUERY])
    }

    fn request_printer_position(&mut self) -> Result<()> {
        self.require(
            "request_printer_position",
            &[State::Ready, State::Executing, State::Paused],
        )?;
        self.send_lines(&[marlin::POSITION_QUERY])
    }

    fn set_temp(&mut self, targets: TempTargets) -> Result<()> {
        self.require("set_temp", &[State::Ready, State::Paused])?;
        let commands = marlin::set_temp_commands(&targets);
        self.send_lines(&commands)
    }

    fn move_head_relative(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        // Motion while PAUSED would execute immediately, out of order with
        // the paused program, so it is rejected rather than forwarded.
        self.require("move_head_relative", &[State::Ready])?;
        self.send_lines(&marlin::move_relative_commands(x, y, z))
    }

    fn move_head_absolute(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        self.require("move_head_absolute", &[State::Ready])?;
        self.send_lines(&marlin::move_absolute_commands(x, y, z))
    }

    fn home_head(&mut self, x: bool, y: bool, z: bool) -> Result<()> {
        self.require("home_head", &[State::Ready])?;
        match marlin::home_command(x, y, z) {
            Some(cmd) => self.send_lines(&[cmd]),
            None => Ok(()),
        }
    }

    fn execute_gcode(&mut self, commands: Vec<String>) -> Result<()> {
        self.require("execute_gcode", &[State::Ready])?;
        self.program = Some(GcodeProgram::new(commands));
        self.awaiting_ack = false;
        self.state.transition(State::Executing);
        Ok(())
    }

    fn pause_execution(&mut self) -> Result<()> {
        self.require("pause_execution", &[State::Executing])?;
        self.state.transition(State::Paused);
        Ok(())
    }

    fn resume_execution(&mut self) -> Result<()> {
        self.require("resume_execution", &[State::Paused])?;
        self.state.transition(State::Executing);
        Ok(())
    }

    fn stop_execution(&mut self) -> Result<()> {
        match self.state.current() {
            State::Executing | State::Paused => {
                self.program = None;
                self.awaiting_ack = false;
                self.state.transition(State::Ready);
                Ok(())
            }
            // Already READY with no program: nothing to discard.
            State::Ready => Ok(()),
            state => Err(PrinterError::not_ready("stop_execution", state)),
        }
    }

    fn emergency_stop(&mut self) -> Result<()> {
        if self.transport.is_connected() {
            if let Err(e) = self.transport.write_line(marlin::EMERGENCY_STOP) {
                tracing::warn!("emergency stop write failed: {}", e);
            }
        }
        self.program = None;
        self.awaiting_ack = false;
        self.callbacks.log(log_level::ERROR, "emergency stop");
        let target = if self.transport.is_connected() {
            State::Error
        } else {
            State::Disconnected
        };
        self.state.transition(target);
        Ok(())
    }

    fn poll(&mut self) {
        self.drain_messages();
        if self.state.current() == State::Executing && !self.awaiting_ack {
            self.dispatch_next_line();
        }
    }
}
