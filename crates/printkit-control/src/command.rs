//! Command queue input schema
//!
//! Commands arrive on the inbound queue as tagged records:
//!
//! ```json
//! {"method": "set_temp", "params": {"bed": 60.0, "nozzle1": 210.0}}
//! {"method": "execute_gcode", "params": {"commands": ["G28", "G1 Z0.3"]}}
//! {"method": "pause_execution"}
//! ```
//!
//! Each variant maps 1:1 onto a controller operation. `emergency_stop` is
//! also accepted here for completeness, but producers that need bounded
//! latency should use the dedicated preemptive path on
//! [`PrinterHandle`](crate::service::PrinterHandle).

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// One printer operation, as carried on the command queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum PrinterCommand {
    /// Establish the transport connection.
    Connect,
    /// Set any subset of target temperatures; omitted axes are untouched.
    SetTemp {
        /// Bed target temperature.
        #[serde(default)]
        bed: Option<f64>,
        /// Nozzle #1 target temperature.
        #[serde(default)]
        nozzle1: Option<f64>,
        /// Nozzle #2 target temperature.
        #[serde(default)]
        nozzle2: Option<f64>,
    },
    /// Move the head relative to the current position.
    MoveHeadRelative {
        /// Millimeters along X.
        #[serde(default)]
        x: f64,
        /// Millimeters along Y.
        #[serde(default)]
        y: f64,
        /// Millimeters along Z.
        #[serde(default)]
        z: f64,
    },
    /// Move the head to an absolute position.
    MoveHeadAbsolute {
        /// X position.
        #[serde(default)]
        x: f64,
        /// Y position.
        #[serde(default)]
        y: f64,
        /// Z position.
        #[serde(default)]
        z: f64,
    },
    /// Home a subset of axes; all axes when omitted.
    HomeHead {
        /// Home the X axis.
        #[serde(default = "default_true")]
        x: bool,
        /// Home the Y axis.
        #[serde(default = "default_true")]
        y: bool,
        /// Home the Z axis.
        #[serde(default = "default_true")]
        z: bool,
    },
    /// Execute a sequence of G-code lines.
    ExecuteGcode {
        /// The program, one G-code command per entry.
        commands: Vec<String>,
    },
    /// Pause program execution, retaining the program and cursor.
    PauseExecution,
    /// Resume a paused program from the retained cursor.
    ResumeExecution,
    /// Stop execution, discarding the program and cursor.
    StopExecution,
    /// Halt everything immediately.
    EmergencyStop,
    /// Ask the printer for a temperature report.
    RequestPrinterTemperature,
    /// Ask the printer for a position report.
    RequestPrinterPosition,
}

impl PrinterCommand {
    /// Wire name of this command, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            PrinterCommand::Connect => "connect",
            PrinterCommand::SetTemp { .. } => "set_temp",
            PrinterCommand::MoveHeadRelative { .. } => "move_head_relative",
            PrinterCommand::MoveHeadAbsolute { .. } => "move_head_absolute",
            PrinterCommand::HomeHead { .. } => "home_head",
            PrinterCommand::ExecuteGcode { .. } => "execute_gcode",
            PrinterCommand::PauseExecution => "pause_execution",
            PrinterCommand::ResumeExecution => "resume_execution",
            PrinterCommand::StopExecution => "stop_execution",
            PrinterCommand::EmergencyStop => "emergency_stop",
            PrinterCommand::RequestPrinterTemperature => "request_printer_temperature",
            PrinterCommand::RequestPrinterPosition => "request_printer_position",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_temp_omitted_axes_deserialize_to_none() {
        let cmd: PrinterCommand =
            serde_json::from_str(r#"{"method": "set_temp", "params": {"bed": 60.0}}"#).unwrap();
        assert_eq!(
            cmd,
            PrinterCommand::SetTemp {
                bed: Some(60.0),
                nozzle1: None,
                nozzle2: None,
            }
        );
    }

    #[test]
    fn test_move_defaults_to_zero() {
        let cmd: PrinterCommand =
            serde_json::from_str(r#"{"method": "move_head_relative", "params": {"z": 5.0}}"#)
                .unwrap();
        assert_eq!(
            cmd,
            PrinterCommand::MoveHeadRelative {
                x: 0.0,
                y: 0.0,
                z: 5.0,
            }
        );
    }

    #[test]
    fn test_home_defaults_to_all_axes() {
        let cmd: PrinterCommand =
            serde_json::from_str(r#"{"method": "home_head", "params": {}}"#).unwrap();
        assert_eq!(
            cmd,
            PrinterCommand::HomeHead {
                x: true,
                y: true,
                z: true,
            }
        );
    }

    #[test]
    fn test_bare_method_commands() {
        for (json, expected) in [
            (r#"{"method": "connect"}"#, PrinterCommand::Connect),
            (
                r#"{"method": "pause_execution"}"#,
                PrinterCommand::PauseExecution,
            ),
            (
                r#"{"method": "emergency_stop"}"#,
                PrinterCommand::EmergencyStop,
            ),
            (
                r#"{"method": "request_printer_temperature"}"#,
                PrinterCommand::RequestPrinterTemperature,
            ),
        ] {
            let cmd: PrinterCommand = serde_json::from_str(json).unwrap();
            assert_eq!(cmd, expected);
        }
    }

    #[test]
    fn test_execute_gcode_round_trip() {
        let cmd = PrinterCommand::ExecuteGcode {
            commands: vec!["G28".to_string(), "G1 Z0.3 F1200".to_string()],
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: PrinterCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let result: Result<PrinterCommand, _> =
            serde_json::from_str(r#"{"method": "reticulate_splines"}"#);
        assert!(result.is_err());
    }
}
