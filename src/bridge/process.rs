//! Child-process plumbing shared by both reasoner backends.
//!
//! The reasoner runs as a separate process speaking the line protocol over
//! stdin/stdout. A dedicated reader thread pumps stdout lines into an mpsc
//! channel so the single-threaded agent cycle can read with a per-call
//! timeout bound — a silent reasoner can never stall the caller
//! indefinitely. Teardown is guaranteed on every exit path via `Drop`.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{BridgeError, FatalBridgeError};

/// An owned reasoner process with timeout-bounded line I/O.
pub struct ProcessChannel {
    child: Child,
    stdin: ChildStdin,
    rx: Receiver<String>,
    reader: Option<JoinHandle<()>>,
    command_display: String,
}

impl ProcessChannel {
    /// Spawn the command with piped stdin/stdout and start the reader thread.
    pub fn spawn(mut command: Command) -> Result<Self, BridgeError> {
        let command_display = format!("{command:?}");
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = command.spawn().map_err(|e| BridgeError::Spawn {
            command: command_display.clone(),
            source: e,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| BridgeError::Spawn {
            command: command_display.clone(),
            source: std::io::Error::other("child stdin was not piped"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| BridgeError::Spawn {
            command: command_display.clone(),
            source: std::io::Error::other("child stdout was not piped"),
        })?;

        let (tx, rx) = mpsc::channel();
        let reader = std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            // Sender drops here; the agent side observes a disconnect.
        });

        tracing::info!(command = %command_display, "spawned reasoner process");
        Ok(Self {
            child,
            stdin,
            rx,
            reader: Some(reader),
            command_display,
        })
    }

    /// The command line this channel was spawned with.
    pub fn command_display(&self) -> &str {
        &self.command_display
    }

    /// Write one protocol line.
    ///
    /// The write blocks at most until the pipe buffer drains; a dead peer
    /// surfaces as an I/O error. There is no retry — the protocol cannot
    /// detect a torn message.
    pub fn send_line(&mut self, line: &str) -> Result<(), FatalBridgeError> {
        tracing::trace!(line, "-> reasoner");
        writeln!(self.stdin, "{line}")
            .and_then(|()| self.stdin.flush())
            .map_err(|e| FatalBridgeError::WriteFailed { source: e })
    }

    /// Read one line, waiting up to `timeout`.
    ///
    /// `Ok(None)` means the reasoner stayed silent; a disconnected reader
    /// means the process died.
    pub fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, FatalBridgeError> {
        match self.rx.recv_timeout(timeout) {
            Ok(line) => {
                tracing::trace!(line = %line, "<- reasoner");
                Ok(Some(line))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.death_reason()),
        }
    }

    /// Drain every line currently buffered, without waiting.
    pub fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(line) => lines.push(line),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        lines
    }

    /// Collect lines until the reasoner stays quiet for `quiet`.
    pub fn drain_for(&mut self, quiet: Duration) -> Result<Vec<String>, FatalBridgeError> {
        let mut lines = Vec::new();
        loop {
            match self.read_line(quiet) {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => break,
                // Report what was read before death; the next write faults.
                Err(_) if !lines.is_empty() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(lines)
    }

    /// Whether the child is still running.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn death_reason(&mut self) -> FatalBridgeError {
        if self.is_alive() {
            FatalBridgeError::ChannelClosed
        } else {
            FatalBridgeError::ProcessExited
        }
    }

    /// Terminate the process and join the reader thread.
    ///
    /// Idempotent; also invoked by `Drop` so the process is released on
    /// every exit path, including abnormal termination of the caller.
    pub fn shutdown(&mut self) {
        if self.is_alive() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        tracing::debug!(command = %self.command_display, "reasoner process released");
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ProcessChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessChannel")
            .field("command", &self.command_display)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn cat() -> ProcessChannel {
        ProcessChannel::spawn(Command::new("cat")).unwrap()
    }

    #[test]
    fn echo_round_trip() {
        let mut chan = cat();
        chan.send_line("<event_0 --> seen>. :|:").unwrap();
        let line = chan.read_line(Duration::from_secs(2)).unwrap();
        assert_eq!(line.as_deref(), Some("<event_0 --> seen>. :|:"));
    }

    #[test]
    fn silent_peer_times_out_without_error() {
        let mut chan = cat();
        let line = chan.read_line(Duration::from_millis(50)).unwrap();
        assert_eq!(line, None);
    }

    #[test]
    fn dead_process_faults_on_write() {
        let mut chan = ProcessChannel::spawn(Command::new("true")).unwrap();
        // Wait for exit.
        std::thread::sleep(Duration::from_millis(200));
        assert!(!chan.is_alive());

        // Either the first or a subsequent write must report the broken pipe.
        let mut faulted = false;
        for _ in 0..8 {
            if chan.send_line("line").is_err() {
                faulted = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(25));
        }
        assert!(faulted, "writes to a dead process must fail");
    }

    #[test]
    fn dead_process_reported_on_read() {
        let mut chan = ProcessChannel::spawn(Command::new("true")).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        let err = loop {
            match chan.read_line(Duration::from_millis(50)) {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert!(matches!(err, FatalBridgeError::ProcessExited));
    }

    #[test]
    fn drain_collects_buffered_lines() {
        let mut chan = cat();
        chan.send_line("a").unwrap();
        chan.send_line("b").unwrap();
        std::thread::sleep(Duration::from_millis(200));
        let lines = chan.drain();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut chan = cat();
        chan.shutdown();
        chan.shutdown();
        assert!(!chan.is_alive());
    }
}
