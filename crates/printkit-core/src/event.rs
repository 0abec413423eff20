//! Printer event wire model
//!
//! Events are published to observers as self-contained JSON-RPC 2.0 records:
//!
//! ```json
//! {"jsonrpc": "2.0", "event": "temp_update", "params": {"bed_current": 58.2, ...}}
//! ```
//!
//! One historical quirk is preserved for consumer compatibility: `z_change`
//! carries its payload flat on the record instead of under `params`:
//!
//! ```json
//! {"jsonrpc": "2.0", "event": "z_change", "position": 0.3}
//! ```

use crate::state::State;
use serde_json::json;

/// Log level ordinals carried by `log` events.
///
/// Numeric values follow the classic logging convention observers already
/// speak (DEBUG=10 .. ERROR=40).
pub mod log_level {
    /// Verbose diagnostics.
    pub const DEBUG: u8 = 10;
    /// Routine operational messages.
    pub const INFO: u8 = 20;
    /// Recoverable anomalies, e.g. an unparseable hardware message.
    pub const WARNING: u8 = 30;
    /// Failures, e.g. a lost connection.
    pub const ERROR: u8 = 40;
}

/// A lifecycle or telemetry event emitted by the printer controller.
///
/// Events are immutable once emitted, ordered by emission time, and
/// delivered at most once per occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterEvent {
    /// Operator-facing log line.
    Log {
        /// Level ordinal, see [`log_level`].
        level: u8,
        /// Log message.
        msg: String,
    },
    /// The controller state changed.
    StateChange {
        /// Previous state.
        old: State,
        /// New state.
        new: State,
    },
    /// Temperature report from the printer.
    TempUpdate {
        /// Current bed temperature.
        bed_current: f64,
        /// Target bed temperature.
        bed_target: f64,
        /// Current nozzle #1 temperature.
        nozzle1_current: f64,
        /// Target nozzle #1 temperature.
        nozzle1_target: f64,
        /// Current nozzle #2 temperature.
        nozzle2_current: f64,
        /// Target nozzle #2 temperature.
        nozzle2_target: f64,
    },
    /// Absolute print head position report.
    PositionUpdate {
        /// X position in mm.
        x: f64,
        /// Y position in mm.
        y: f64,
        /// Z position in mm.
        z: f64,
    },
    /// Program execution progress.
    ProgressUpdate {
        /// Lines dispatched and acknowledged so far.
        current_line: usize,
        /// Total lines in the program.
        total_lines: usize,
    },
    /// A dispatched line moved the Z axis.
    ZChange {
        /// New Z position in mm.
        position: f64,
    },
}

impl PrinterEvent {
    /// Wire name of this event kind.
    pub fn name(&self) -> &'static str {
        match self {
            PrinterEvent::Log { .. } => "log",
            PrinterEvent::StateChange { .. } => "state_change",
            PrinterEvent::TempUpdate { .. } => "temp_update",
            PrinterEvent::PositionUpdate { .. } => "position_update",
            PrinterEvent::ProgressUpdate { .. } => "progress_update",
            PrinterEvent::ZChange { .. } => "z_change",
        }
    }

    /// Serialize to the JSON-RPC 2.0 wire record.
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            PrinterEvent::Log { level, msg } => json!({
                "jsonrpc": "2.0",
                "event": "log",
                "params": {
                    "level": level,
                    "msg": msg,
                },
            }),
            PrinterEvent::StateChange { old, new } => json!({
                "jsonrpc": "2.0",
                "event": "state_change",
                "params": {
                    "old": old.value(),
                    "new": new.value(),
                },
            }),
            PrinterEvent::TempUpdate {
                bed_current,
                bed_target,
                nozzle1_current,
                nozzle1_target,
                nozzle2_current,
                nozzle2_target,
            } => json!({
                "jsonrpc": "2.0",
                "event": "temp_update",
                "params": {
                    "bed_current": bed_current,
                    "bed_target": bed_target,
                    "nozzle1_current": nozzle1_current,
                    "nozzle1_target": nozzle1_target,
                    "nozzle2_current": nozzle2_current,
                    "nozzle2_target": nozzle2_target,
                },
            }),
            PrinterEvent::PositionUpdate { x, y, z } => json!({
                "jsonrpc": "2.0",
                "event": "position_update",
                "params": {
                    "x": x,
                    "y": y,
                    "z": z,
                },
            }),
            PrinterEvent::ProgressUpdate {
                current_line,
                total_lines,
            } => json!({
                "jsonrpc": "2.0",
                "event": "progress_update",
                "params": {
                    "current_line": current_line,
                    "total_lines": total_lines,
                },
            }),
            // z_change is published flat, without a params wrapper.
            PrinterEvent::ZChange { position } => json!({
                "jsonrpc": "2.0",
                "event": "z_change",
                "position": position,
            }),
        }
    }

    /// Serialize to a wire string, one record per event.
    pub fn to_wire_string(&self) -> String {
        self.to_wire().to_string()
    }
}

impl std::fmt::Display for PrinterEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrinterEvent::Log { level, msg } => write!(f, "log[{}]: {}", level, msg),
            PrinterEvent::StateChange { old, new } => write!(f, "state {} -> {}", old, new),
            PrinterEvent::TempUpdate {
                bed_current,
                nozzle1_current,
                nozzle2_current,
                ..
            } => write!(
                f,
                "temps bed={} n1={} n2={}",
                bed_current, nozzle1_current, nozzle2_current
            ),
            PrinterEvent::PositionUpdate { x, y, z } => {
                write!(f, "position X{} Y{} Z{}", x, y, z)
            }
            PrinterEvent::ProgressUpdate {
                current_line,
                total_lines,
            } => write!(f, "progress {}/{}", current_line, total_lines),
            PrinterEvent::ZChange { position } => write!(f, "z change {}", position),
        }
    }
}
