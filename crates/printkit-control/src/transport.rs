//! Serial transport to printer hardware
//!
//! The controller owns its transport exclusively; nothing outside the
//! printer task ever touches the link. Reads are non-blocking from the
//! controller's point of view: the port is opened with a short timeout so
//! `read_line` returns `None` when no complete line has arrived yet.

use printkit_core::{PrinterError, Result};
use std::io::{Read, Write};
use std::time::Duration;

/// Byte stream the transport drives.
pub trait ReadWrite: Read + Write + Send {}
impl<T: Read + Write + Send> ReadWrite for T {}

/// Line-oriented link to printer hardware.
pub trait Transport: Send {
    /// Establish the connection.
    fn connect(&mut self) -> Result<()>;

    /// Tear the connection down. Safe to call when already disconnected.
    fn disconnect(&mut self);

    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;

    /// Send one command line (terminator appended by the transport).
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Fetch the next complete line from the printer, or `None` if no
    /// full line has arrived.
    fn read_line(&mut self) -> Result<Option<String>>;
}

/// Connection parameters for a serial link.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name, e.g. `/dev/ttyACM0` or `COM3`.
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout; kept short so the controller loop spins freely.
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            timeout_ms: 10,
        }
    }
}

/// Serial transport backed by the `serialport` crate, 8N1.
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn ReadWrite>>,
    rx_buffer: String,
}

impl SerialTransport {
    /// Create a transport for the given parameters. The port is not opened
    /// until [`Transport::connect`].
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            rx_buffer: String::new(),
        }
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        let newline = self.rx_buffer.find('\n')?;
        let line = self.rx_buffer[..newline].trim_end_matches('\r').to_string();
        self.rx_buffer.drain(..=newline);
        Some(line)
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let builder = serialport::new(&self.config.port, self.config.baud_rate)
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None);

        match builder.open_native() {
            Ok(port) => {
                self.rx_buffer.clear();
                self.port = Some(Box::new(port));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("failed to open serial port {}: {}", self.config.port, e);
                Err(PrinterError::connection(format!(
                    "failed to open port {}: {}",
                    self.config.port, e
                )))
            }
        }
    }

    fn disconnect(&mut self) {
        self.port = None;
        self.rx_buffer.clear();
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| PrinterError::connection("serial port not open"))?;

        let result = port
            .write_all(line.as_bytes())
            .and_then(|()| port.write_all(b"\n"))
            .and_then(|()| port.flush());

        if let Err(e) = result {
            self.disconnect();
            return Err(PrinterError::connection(format!(
                "write to {} failed: {}",
                self.config.port, e
            )));
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.take_buffered_line() {
            return Ok(Some(line));
        }

        let port = self
            .port
            .as_mut()
            .ok_or_else(|| PrinterError::connection("serial port not open"))?;

        let mut chunk = [0u8; 256];
        match port.read(&mut chunk) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.rx_buffer
                    .push_str(&String::from_utf8_lossy(&chunk[..n]));
                Ok(self.take_buffered_line())
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(e) => {
                self.disconnect();
                Err(PrinterError::connection(format!(
                    "read from {} failed: {}",
                    self.config.port, e
                )))
            }
        }
    }
}
