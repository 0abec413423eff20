//! Printer event callbacks
//!
//! The controller reports everything it observes through a
//! [`PrinterCallbacks`] sink. Two implementations are provided:
//!
//! - [`NoOpCallbacks`]: discards every event; the default when no observer
//!   is registered
//! - [`QueuedPrinterCallbacks`]: serializes each event as a JSON-RPC 2.0
//!   record and places it on a bounded queue for an external consumer
//!
//! The queued sink must never block the controller: a full or closed queue
//! fails the publish loudly (error log + drop counter) instead of stalling
//! hardware I/O.

use printkit_core::{PrinterError, PrinterEvent, State};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Callbacks fired by the controller when printer events occur.
///
/// Default method bodies discard the event, so implementations only
/// override what they observe.
pub trait PrinterCallbacks: Send + Sync {
    /// Publish a log event.
    fn log(&self, _level: u8, _message: &str) {}

    /// Publish a state change event.
    fn state_change(&self, _old: State, _new: State) {}

    /// Publish a temperature update event.
    fn temp_update(
        &self,
        _bed_current: f64,
        _bed_target: f64,
        _nozzle1_current: f64,
        _nozzle1_target: f64,
        _nozzle2_current: f64,
        _nozzle2_target: f64,
    ) {
    }

    /// Publish a position update event.
    fn position_update(&self, _x: f64, _y: f64, _z: f64) {}

    /// Publish an execution progress update event.
    fn progress_update(&self, _current_line: usize, _total_lines: usize) {}

    /// Publish a Z axis change event.
    fn z_change(&self, _position: f64) {}
}

/// Callback sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCallbacks;

impl PrinterCallbacks for NoOpCallbacks {}

/// Callback sink that publishes JSON-RPC 2.0 event records to a bounded
/// queue.
///
/// Publishing uses `try_send` so a saturated consumer can never stall the
/// controller; rejected publishes are logged at error level and counted.
pub struct QueuedPrinterCallbacks {
    from_printer: mpsc::Sender<String>,
    dropped: AtomicU64,
}

impl QueuedPrinterCallbacks {
    /// Create a sink publishing to `from_printer`.
    pub fn new(from_printer: mpsc::Sender<String>) -> Self {
        Self {
            from_printer,
            dropped: AtomicU64::new(0),
        }
    }

    /// Number of events dropped because the queue rejected them.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn publish(&self, event: PrinterEvent) {
        let name = event.name();
        if let Err(err) = self.from_printer.try_send(event.to_wire_string()) {
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "queue closed",
            };
            self.dropped.fetch_add(1, Ordering::Relaxed);
            let failure = PrinterError::EventDeliveryFailure {
                event: name.to_string(),
                reason: reason.to_string(),
            };
            tracing::error!("{}", failure);
        }
    }
}

impl PrinterCallbacks for QueuedPrinterCallbacks {
    fn log(&self, level: u8, message: &str) {
        self.publish(PrinterEvent::Log {
            level,
            msg: message.to_string(),
        });
    }

    fn state_change(&self, old: State, new: State) {
        self.publish(PrinterEvent::StateChange { old, new });
    }

    fn temp_update(
        &self,
        bed_current: f64,
        bed_target: f64,
        nozzle1_current: f64,
        nozzle1_target: f64,
        nozzle2_current: f64,
        nozzle2_target: f64,
    ) {
        self.publish(PrinterEvent::TempUpdate {
            bed_current,
            bed_target,
            nozzle1_current,
            nozzle1_target,
            nozzle2_current,
            nozzle2_target,
        });
    }

    fn position_update(&self, x: f64, y: f64, z: f64) {
        self.publish(PrinterEvent::PositionUpdate { x, y, z });
    }

    fn progress_update(&self, current_line: usize, total_lines: usize) {
        self.publish(PrinterEvent::ProgressUpdate {
            current_line,
            total_lines,
        });
    }

    fn z_change(&self, position: f64) {
        self.publish(PrinterEvent::ZChange { position });
    }
}
