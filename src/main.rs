//! PrintKit daemon
//!
//! Owns the serial link to one printer. Commands arrive on stdin as one
//! JSON record per line; events leave on stdout as one JSON-RPC record
//! per line. Diagnostics go to stderr via `tracing`.
//!
//! Usage: `printkit [PORT] [BAUD]` (defaults: /dev/ttyACM0, 115200)

use anyhow::Context;
use printkit_control::{
    spawn_printer, MarlinPrinter, PrinterCommand, QueuedPrinterCallbacks, SerialConfig,
    SerialTransport,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const EVENT_QUEUE_DEPTH: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let port = args.next().unwrap_or_else(|| "/dev/ttyACM0".to_string());
    let baud_rate: u32 = match args.next() {
        Some(raw) => raw.parse().context("invalid baud rate")?,
        None => 115_200,
    };

    let (event_tx, mut event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let callbacks = Arc::new(QueuedPrinterCallbacks::new(event_tx));
    let transport = SerialTransport::new(SerialConfig {
        port: port.clone(),
        baud_rate,
        ..Default::default()
    });
    let printer = MarlinPrinter::new(transport, callbacks);
    let (handle, task) = spawn_printer(printer);

    tracing::info!("printkit starting on {} at {} baud", port, baud_rate);

    // Command reader: one JSON command per stdin line. Emergency stops are
    // routed through the preemptive path so they are never stuck behind
    // queued work.
    let command_handle = handle.clone();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<PrinterCommand>(&line) {
                Ok(PrinterCommand::EmergencyStop) => {
                    if let Err(e) = command_handle.emergency_stop() {
                        tracing::error!("emergency stop not delivered: {}", e);
                        break;
                    }
                }
                Ok(command) => {
                    if command_handle.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("ignoring malformed command {:?}: {}", line, e);
                }
            }
        }
    });

    // Event pump: forward every printer event record to stdout.
    while let Some(event) = event_rx.recv().await {
        println!("{}", event);
    }

    reader.abort();
    drop(handle);
    task.await.ok();
    Ok(())
}
