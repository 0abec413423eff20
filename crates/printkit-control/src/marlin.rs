//! Marlin protocol handling
//!
//! Parses the line-oriented responses Marlin-family firmware sends over
//! serial and builds the G-code the controller writes back.
//!
//! Response shapes handled:
//! - `ok` acknowledgements, optionally carrying a temperature report as
//!   `M105` replies do: `ok T:201.4 /210.0 B:58.2 /60.0`
//! - auto-reported temperature lines: `T:201.4 /210.0 B:58.2 /60.0 T1:...`
//! - `M114` position reports: `X:1.00 Y:2.00 Z:0.30 E:12.1 Count X:...`
//! - `Error:` / `!!` fault lines
//! - routine chatter (`start`, `echo:...`) passed through as info

use crate::controller::TempTargets;
use printkit_core::{PrinterError, Result};

/// Query the printer for a temperature report.
pub const TEMPERATURE_QUERY: &str = "M105";
/// Query the printer for a position report.
pub const POSITION_QUERY: &str = "M114";
/// Immediate full shutdown.
pub const EMERGENCY_STOP: &str = "M112";

/// A parsed temperature report. Sensors absent from the report read 0.0,
/// matching single-nozzle machines that never mention `T1`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TempReading {
    /// Current bed temperature.
    pub bed_current: f64,
    /// Target bed temperature.
    pub bed_target: f64,
    /// Current nozzle #1 temperature.
    pub nozzle1_current: f64,
    /// Target nozzle #1 temperature.
    pub nozzle1_target: f64,
    /// Current nozzle #2 temperature.
    pub nozzle2_current: f64,
    /// Target nozzle #2 temperature.
    pub nozzle2_target: f64,
}

/// One parsed message from the printer.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterMessage {
    /// Command acknowledged; `M105` replies carry their report here.
    Ack {
        /// Temperature report attached to the ack, if any.
        temps: Option<TempReading>,
    },
    /// Auto-reported temperatures.
    Temperature(TempReading),
    /// Absolute head position.
    Position {
        /// X position in mm.
        x: f64,
        /// Y position in mm.
        y: f64,
        /// Z position in mm.
        z: f64,
    },
    /// Firmware-reported fault.
    HardwareError(String),
    /// Routine firmware chatter (`start`, `echo:...`).
    Info(String),
}

/// Parse one response line from the printer.
///
/// Returns a `MalformedMessage` error for lines matching no known shape;
/// callers log and drop those, the read loop never dies on them.
pub fn parse_message(line: &str) -> Result<PrinterMessage> {
    let line = line.trim();
    if line.is_empty() {
        return Err(PrinterError::MalformedMessage {
            message: String::new(),
        });
    }

    if let Some(rest) = line.strip_prefix("ok") {
        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(PrinterMessage::Ack { temps: None });
        }
        return Ok(PrinterMessage::Ack {
            temps: parse_temps(rest),
        });
    }

    if let Some(msg) = line.strip_prefix("Error:") {
        return Ok(PrinterMessage::HardwareError(msg.trim().to_string()));
    }
    if let Some(msg) = line.strip_prefix("!!") {
        return Ok(PrinterMessage::HardwareError(msg.trim().to_string()));
    }

    if line == "start" || line.starts_with("echo:") || line.starts_with("//") {
        return Ok(PrinterMessage::Info(line.to_string()));
    }

    if line.starts_with("T:") {
        if let Some(temps) = parse_temps(line) {
            return Ok(PrinterMessage::Temperature(temps));
        }
    }

    if let Some((x, y, z)) = parse_position(line) {
        return Ok(PrinterMessage::Position { x, y, z });
    }

    Err(PrinterError::MalformedMessage {
        message: line.to_string(),
    })
}

/// Parse a `T:cur /target B:cur /target T1:cur /target` report.
///
/// `T:` and `T0:` both name nozzle #1. Returns `None` if no sensor could
/// be extracted.
fn parse_temps(s: &str) -> Option<TempReading> {
    let mut reading = TempReading::default();
    let mut found = false;

    let tokens: Vec<&str> = s.split_whitespace().collect();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let (sensor, value) = match token.split_once(':') {
            Some(pair) => pair,
            None => {
                i += 1;
                continue;
            }
        };

        let current: f64 = match value.parse() {
            Ok(v) => v,
            Err(_) => {
                i += 1;
                continue;
            }
        };

        // The target rides in the following "/NNN" token.
        let target = tokens
            .get(i + 1)
            .and_then(|t| t.strip_prefix('/'))
            .and_then(|t| t.parse::<f64>().ok());

        match sensor {
            "T" | "T0" => {
                reading.nozzle1_current = current;
                reading.nozzle1_target = target.unwrap_or(0.0);
                found = true;
            }
            "T1" => {
                reading.nozzle2_current = current;
                reading.nozzle2_target = target.unwrap_or(0.0);
                found = true;
            }
            "B" => {
                reading.bed_current = current;
                reading.bed_target = target.unwrap_or(0.0);
                found = true;
            }
            _ => {}
        }

        i += if target.is_some() { 2 } else { 1 };
    }

    found.then_some(reading)
}

/// Parse an `M114`-style `X:.. Y:.. Z:..` position report. Only the
/// logical position before `Count` is used.
fn parse_position(s: &str) -> Option<(f64, f64, f64)> {
    let logical = s.split("Count").next().unwrap_or(s);

    let mut x = None;
    let mut y = None;
    let mut z = None;
    for token in logical.split_whitespace() {
        if let Some((axis, value)) = token.split_once(':') {
            let value: f64 = value.parse().ok()?;
            match axis {
                "X" => x = Some(value),
                "Y" => y = Some(value),
                "Z" => z = Some(value),
                _ => {}
            }
        }
    }
    Some((x?, y?, z?))
}

/// Extract the Z target of a motion line, if the line moves the Z axis.
pub fn z_axis_target(line: &str) -> Option<f64> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let opcode = words.next()?.to_ascii_uppercase();
    if !matches!(opcode.as_str(), "G0" | "G00" | "G1" | "G01") {
        return None;
    }
    for word in words {
        if let Some(rest) = word.strip_prefix(['Z', 'z']) {
            return rest.parse().ok();
        }
    }
    None
}

/// G-code to apply a set of target temperatures. Omitted targets produce
/// no command.
pub fn set_temp_commands(targets: &TempTargets) -> Vec<String> {
    let mut commands = Vec::new();
    if let Some(bed) = targets.bed {
        commands.push(format!("M140 S{}", bed));
    }
    if let Some(nozzle1) = targets.nozzle1 {
        commands.push(format!("M104 T0 S{}", nozzle1));
    }
    if let Some(nozzle2) = targets.nozzle2 {
        commands.push(format!("M104 T1 S{}", nozzle2));
    }
    commands
}

/// G-code for a relative move. Switches to relative positioning for the
/// move and restores absolute mode afterwards.
pub fn move_relative_commands(x: f64, y: f64, z: f64) -> Vec<String> {
    vec![
        "G91".to_string(),
        format!("G0 X{} Y{} Z{}", x, y, z),
        "G90".to_string(),
    ]
}

/// G-code for an absolute move.
pub fn move_absolute_commands(x: f64, y: f64, z: f64) -> Vec<String> {
    vec!["G90".to_string(), format!("G0 X{} Y{} Z{}", x, y, z)]
}

/// G-code to home the selected axes, or `None` when no axis is selected.
/// All axes selected homes everything with a bare `G28`.
pub fn home_command(x: bool, y: bool, z: bool) -> Option<String> {
    if !x && !y && !z {
        return None;
    }
    if x && y && z {
        return Some("G28".to_string());
    }
    let mut cmd = String::from("G28");
    if x {
        cmd.push_str(" X");
    }
    if y {
        cmd.push_str(" Y");
    }
    if z {
        cmd.push_str(" Z");
    }
    Some(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_ack() {
        assert_eq!(
            parse_message("ok").unwrap(),
            PrinterMessage::Ack { temps: None }
        );
    }

    #[test]
    fn test_parse_ack_with_temperature_report() {
        let msg = parse_message("ok T:201.4 /210.0 B:58.2 /60.0").unwrap();
        match msg {
            PrinterMessage::Ack { temps: Some(t) } => {
                assert_eq!(t.nozzle1_current, 201.4);
                assert_eq!(t.nozzle1_target, 210.0);
                assert_eq!(t.bed_current, 58.2);
                assert_eq!(t.bed_target, 60.0);
                assert_eq!(t.nozzle2_current, 0.0);
            }
            other => panic!("expected ack with temps, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_auto_reported_temps_dual_nozzle() {
        let msg = parse_message("T:19.4 /0.0 B:18.9 /0.0 T0:19.4 /0.0 T1:23.7 /0.0").unwrap();
        match msg {
            PrinterMessage::Temperature(t) => {
                assert_eq!(t.nozzle1_current, 19.4);
                assert_eq!(t.nozzle2_current, 23.7);
                assert_eq!(t.bed_current, 18.9);
            }
            other => panic!("expected temperature, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_position_report() {
        let msg =
            parse_message("X:1.00 Y:2.50 Z:0.30 E:12.10 Count X:80 Y:200 Z:120").unwrap();
        assert_eq!(
            msg,
            PrinterMessage::Position {
                x: 1.0,
                y: 2.5,
                z: 0.3,
            }
        );
    }

    #[test]
    fn test_parse_error_lines() {
        assert_eq!(
            parse_message("Error:MINTEMP triggered").unwrap(),
            PrinterMessage::HardwareError("MINTEMP triggered".to_string())
        );
        assert_eq!(
            parse_message("!! heater decoupled").unwrap(),
            PrinterMessage::HardwareError("heater decoupled".to_string())
        );
    }

    #[test]
    fn test_parse_chatter_is_info() {
        assert!(matches!(
            parse_message("start").unwrap(),
            PrinterMessage::Info(_)
        ));
        assert!(matches!(
            parse_message("echo:busy: processing").unwrap(),
            PrinterMessage::Info(_)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = parse_message("\x02\x7fnonsense").unwrap_err();
        assert!(matches!(err, PrinterError::MalformedMessage { .. }));
    }

    #[test]
    fn test_z_axis_target_detection() {
        assert_eq!(z_axis_target("G1 Z0.3 F1200"), Some(0.3));
        assert_eq!(z_axis_target("G0 X10 Y10 Z5"), Some(5.0));
        assert_eq!(z_axis_target("g1 x1 z-0.5"), Some(-0.5));
        assert_eq!(z_axis_target("G1 X10 Y10"), None);
        assert_eq!(z_axis_target("G28 Z"), None);
        assert_eq!(z_axis_target("M104 S210"), None);
    }

    #[test]
    fn test_set_temp_commands_subset() {
        let commands = set_temp_commands(&TempTargets {
            bed: Some(60.0),
            nozzle1: Some(210.0),
            nozzle2: None,
        });
        assert_eq!(commands, vec!["M140 S60", "M104 T0 S210"]);

        assert!(set_temp_commands(&TempTargets::default()).is_empty());
    }

    #[test]
    fn test_move_builders() {
        assert_eq!(
            move_relative_commands(0.0, 0.0, 5.0),
            vec!["G91", "G0 X0 Y0 Z5", "G90"]
        );
        assert_eq!(
            move_absolute_commands(10.0, 20.0, 0.3),
            vec!["G90", "G0 X10 Y20 Z0.3"]
        );
    }

    #[test]
    fn test_home_command_axis_subsets() {
        assert_eq!(home_command(true, true, true), Some("G28".to_string()));
        assert_eq!(home_command(true, false, false), Some("G28 X".to_string()));
        assert_eq!(home_command(false, true, true), Some("G28 Y Z".to_string()));
        assert_eq!(home_command(false, false, false), None);
    }
}
