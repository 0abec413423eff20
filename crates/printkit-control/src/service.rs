//! Printer task and handle
//!
//! [`spawn_printer`] moves a [`Printer`] onto its own tokio task so slow
//! hardware I/O never stalls command producers or event consumers. The
//! task communicates through two paths:
//!
//! - an ordinary bounded command channel, consumed strictly in arrival
//!   order, one command fully processed before the next
//! - a dedicated capacity-1 emergency channel, drained before anything
//!   else each iteration, so `emergency_stop` lands within one dispatch
//!   step no matter what is queued
//!
//! Events flow out through whatever [`PrinterCallbacks`](crate::callbacks::PrinterCallbacks)
//! sink the printer was built with.

use crate::command::PrinterCommand;
use crate::controller::{Printer, TempTargets};
use crate::state_machine::SharedState;
use printkit_core::{PrinterError, Result, State};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

const COMMAND_QUEUE_DEPTH: usize = 64;
const LOOP_DELAY: Duration = Duration::from_millis(10);

/// Handle to a running printer task.
#[derive(Clone)]
pub struct PrinterHandle {
    commands: mpsc::Sender<PrinterCommand>,
    emergency: mpsc::Sender<()>,
    state: SharedState,
}

impl PrinterHandle {
    /// Queue a command for in-order processing.
    pub async fn send(&self, command: PrinterCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PrinterError::other("printer task has stopped"))
    }

    /// Queue a command without awaiting; fails if the queue is full.
    pub fn try_send(&self, command: PrinterCommand) -> Result<()> {
        self.commands.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PrinterError::other("command queue is full"),
            mpsc::error::TrySendError::Closed(_) => {
                PrinterError::other("printer task has stopped")
            }
        })
    }

    /// Trigger an emergency stop through the preemptive path, bypassing
    /// the command queue. Returns immediately; a stop already pending
    /// counts as delivered.
    pub fn emergency_stop(&self) -> Result<()> {
        match self.emergency.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(())) => {
                Err(PrinterError::other("printer task has stopped"))
            }
        }
    }

    /// Snapshot of the controller's current state.
    pub fn state(&self) -> State {
        *self.state.read()
    }
}

/// Spawn a printer onto its own task and return the handle driving it.
///
/// The task exits when every handle (and thus the command channel) has
/// been dropped.
pub fn spawn_printer<P: Printer + 'static>(mut printer: P) -> (PrinterHandle, JoinHandle<()>) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<PrinterCommand>(COMMAND_QUEUE_DEPTH);
    let (estop_tx, mut estop_rx) = mpsc::channel::<()>(1);
    let state = printer.shared_state();

    let task = tokio::spawn(async move {
        loop {
            // Emergency first: it preempts anything already queued.
            if estop_rx.try_recv().is_ok() {
                report_outcome("emergency_stop", printer.emergency_stop());
            }

            match cmd_rx.try_recv() {
                Ok(command) => apply_command(&mut printer, command),
                Err(mpsc::error::TryRecvError::Empty) => {}
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }

            printer.poll();
            tokio::time::sleep(LOOP_DELAY).await;
        }
        tracing::debug!("printer task stopped");
    });

    (
        PrinterHandle {
            commands: cmd_tx,
            emergency: estop_tx,
            state,
        },
        task,
    )
}

/// Dispatch one queued command to the controller, reporting rejections.
fn apply_command<P: Printer>(printer: &mut P, command: PrinterCommand) {
    let name = command.name();
    let result = match command {
        PrinterCommand::Connect => printer.connect(),
        PrinterCommand::SetTemp {
            bed,
            nozzle1,
            nozzle2,
        } => printer.set_temp(TempTargets {
            bed,
            nozzle1,
            nozzle2,
        }),
        PrinterCommand::MoveHeadRelative { x, y, z } => printer.move_head_relative(x, y, z),
        PrinterCommand::MoveHeadAbsolute { x, y, z } => printer.move_head_absolute(x, y, z),
        PrinterCommand::HomeHead { x, y, z } => printer.home_head(x, y, z),
        PrinterCommand::ExecuteGcode { commands } => printer.execute_gcode(commands),
        PrinterCommand::PauseExecution => printer.pause_execution(),
        PrinterCommand::ResumeExecution => printer.resume_execution(),
        PrinterCommand::StopExecution => printer.stop_execution(),
        PrinterCommand::EmergencyStop => printer.emergency_stop(),
        PrinterCommand::RequestPrinterTemperature => printer.request_printer_temperature(),
        PrinterCommand::RequestPrinterPosition => printer.request_printer_position(),
    };
    report_outcome(name, result);
}

fn report_outcome(operation: &str, result: Result<()>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_not_ready() => {
            tracing::warn!("{} rejected: {}", operation, e);
        }
        Err(e) => {
            tracing::error!("{} failed: {}", operation, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::NoOpCallbacks;
    use crate::controller::MarlinPrinter;
    use crate::transport::Transport;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// Transport that acknowledges every written line on the next read.
    struct AckingTransport {
        connected: bool,
        pending_acks: VecDeque<String>,
        written: Arc<Mutex<Vec<String>>>,
    }

    impl AckingTransport {
        fn new(written: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                connected: false,
                pending_acks: VecDeque::new(),
                written,
            }
        }
    }

    impl Transport for AckingTransport {
        fn connect(&mut self) -> printkit_core::Result<()> {
            self.connected = true;
            Ok(())
        }

        fn disconnect(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn write_line(&mut self, line: &str) -> printkit_core::Result<()> {
            self.written.lock().unwrap().push(line.to_string());
            self.pending_acks.push_back("ok".to_string());
            Ok(())
        }

        fn read_line(&mut self) -> printkit_core::Result<Option<String>> {
            Ok(self.pending_acks.pop_front())
        }
    }

    async fn wait_for_state(handle: &PrinterHandle, state: State) {
        for _ in 0..200 {
            if handle.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("printer never reached {}, stuck in {}", state, handle.state());
    }

    #[tokio::test]
    async fn test_queued_commands_run_in_order() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let printer = MarlinPrinter::new(
            AckingTransport::new(written.clone()),
            Arc::new(NoOpCallbacks),
        );
        let (handle, task) = spawn_printer(printer);

        handle.send(PrinterCommand::Connect).await.unwrap();
        handle
            .send(PrinterCommand::SetTemp {
                bed: Some(60.0),
                nozzle1: None,
                nozzle2: None,
            })
            .await
            .unwrap();
        handle
            .send(PrinterCommand::ExecuteGcode {
                commands: vec!["G28".to_string(), "G1 X5".to_string()],
            })
            .await
            .unwrap();

        // The program settles back to READY once both lines are acked.
        for _ in 0..200 {
            if written.lock().unwrap().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        wait_for_state(&handle, State::Ready).await;
        assert_eq!(
            *written.lock().unwrap(),
            vec!["M140 S60", "G28", "G1 X5"]
        );

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_emergency_stop_preempts_queued_work() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let printer = MarlinPrinter::new(
            AckingTransport::new(written.clone()),
            Arc::new(NoOpCallbacks),
        );
        let (handle, task) = spawn_printer(printer);

        handle.send(PrinterCommand::Connect).await.unwrap();
        let long_program: Vec<String> = (0..500).map(|i| format!("G1 X{}", i)).collect();
        handle
            .send(PrinterCommand::ExecuteGcode {
                commands: long_program,
            })
            .await
            .unwrap();

        wait_for_state(&handle, State::Executing).await;
        handle.emergency_stop().unwrap();
        wait_for_state(&handle, State::Error).await;

        // Dispatch halted: nothing further is written after the stop lands.
        let count_at_stop = written.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(written.lock().unwrap().len(), count_at_stop);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_task_exits_when_handles_drop() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let printer = MarlinPrinter::new(AckingTransport::new(written), Arc::new(NoOpCallbacks));
        let (handle, task) = spawn_printer(printer);
        drop(handle);
        task.await.unwrap();
    }
}
