//! The reasoning bridge: ownership of the external NARS process and the
//! translation between symbol/action domain objects and its wire protocol.
//!
//! The two backend protocols — the native OpenNARS-for-Applications shell
//! and the JVM OpenNARS jar — are polymorphic over one capability set:
//! assert, query, step, shutdown. They are modeled as the [`Reasoner`]
//! trait with two concrete variants, [`OnaBridge`] and [`OpenNarsBridge`],
//! sharing the [`process::ProcessChannel`] plumbing.
//!
//! Lifecycle: `Starting → Ready` on a successful handshake read,
//! `Ready → AwaitingResponse` while a query is in flight, back to `Ready`
//! on a parsed decision or timeout, and any state `→ Faulted` on process
//! exit or a failed write. `Faulted` is terminal until an explicit
//! `restart`.

pub mod ona;
pub mod opennars;
pub mod process;

use std::time::{Duration, Instant};

use crate::error::{BridgeError, FatalBridgeError};
use crate::narsese::{self, Anticipation, DerivedImplication, Truth};

pub use ona::OnaBridge;
pub use opennars::OpenNarsBridge;
pub use process::ProcessChannel;

/// Bridge lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Starting,
    Ready,
    AwaitingResponse,
    Faulted,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BridgeState::Starting => "Starting",
            BridgeState::Ready => "Ready",
            BridgeState::AwaitingResponse => "AwaitingResponse",
            BridgeState::Faulted => "Faulted",
        };
        f.write_str(name)
    }
}

/// Timeout bounds for bridge I/O.
#[derive(Debug, Clone, Copy)]
pub struct BridgeTimeouts {
    /// Maximum wait for the first output line after spawn.
    pub handshake: Duration,
    /// Maximum wait for a decision after a query.
    pub decision: Duration,
    /// Poll granularity and drain quiet-period.
    pub poll: Duration,
}

impl Default for BridgeTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(5),
            decision: Duration::from_millis(1000),
            poll: Duration::from_millis(50),
        }
    }
}

/// Output of a [`Reasoner::step`] drain: everything the reasoner derived
/// since the last call, for introspection by analysis tooling.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Parsed causal rules (`<A> =/> <B>. %f;c%`).
    pub derived: Vec<DerivedImplication>,
    /// Raw derived/answer payloads that did not parse as implications.
    pub raw_derived: Vec<String>,
    /// Anticipations the reasoner committed to.
    pub anticipations: Vec<Anticipation>,
    /// Reasoner-side surprise: nonzero when a confident revision or
    /// derivation appeared in the drained output.
    pub prediction_error: f32,
}

/// The capability set both reasoner backends provide.
pub trait Reasoner {
    /// Backend name for logs and diagnostics.
    fn backend(&self) -> &'static str;

    /// Current lifecycle state.
    fn state(&self) -> BridgeState;

    /// Serialize and write one belief/event statement.
    fn assert_statement(
        &mut self,
        term: &str,
        truth: Truth,
        is_event: bool,
    ) -> Result<(), BridgeError>;

    /// Write a goal the reasoner should work toward.
    fn inject_goal(&mut self, term: &str) -> Result<(), BridgeError>;

    /// Feed back an executed operation as a self-event.
    fn operation_feedback(&mut self, op: &str) -> Result<(), BridgeError>;

    /// Emit the distinguished novelty event for a surprise-refined symbol.
    fn novelty_event(&mut self, term: &str) -> Result<(), BridgeError>;

    /// Ask for a decision toward `goal`; wait until a decision line arrives
    /// or the decision timeout elapses. A timeout is not an error: it is
    /// `Ok(None)`, "no decision", and the bridge returns to `Ready`.
    fn query(&mut self, goal: &str) -> Result<Option<String>, BridgeError>;

    /// Advance the reasoner by `cycles` and drain buffered output into a
    /// [`StepReport`].
    fn step(&mut self, cycles: u32) -> Result<StepReport, BridgeError>;

    /// Terminate the process and release the channel. Idempotent.
    fn shutdown(&mut self);

    /// Tear down a faulted (or live) process and spawn a fresh one.
    fn restart(&mut self) -> Result<(), BridgeError>;
}

/// State, channel, and timeout bookkeeping shared by both backends.
#[derive(Debug)]
pub(crate) struct BridgeCore {
    backend: &'static str,
    channel: Option<ProcessChannel>,
    state: BridgeState,
    timeouts: BridgeTimeouts,
}

impl BridgeCore {
    pub(crate) fn new(backend: &'static str, timeouts: BridgeTimeouts) -> Self {
        Self {
            backend,
            channel: None,
            state: BridgeState::Starting,
            timeouts,
        }
    }

    pub(crate) fn state(&self) -> BridgeState {
        self.state
    }

    /// Adopt a freshly spawned channel and wait for the handshake line.
    pub(crate) fn attach(&mut self, channel: ProcessChannel) -> Result<(), BridgeError> {
        self.channel = Some(channel);
        self.state = BridgeState::Starting;
        Ok(())
    }

    /// Transition `Starting → Ready` once the process speaks.
    pub(crate) fn await_handshake(&mut self) -> Result<(), BridgeError> {
        let timeout = self.timeouts.handshake;
        let channel = self.channel_mut("handshake")?;
        match channel.read_line(timeout) {
            Ok(Some(line)) => {
                tracing::debug!(backend = self.backend, line = %line, "handshake");
                self.state = BridgeState::Ready;
                Ok(())
            }
            Ok(None) => {
                self.state = BridgeState::Faulted;
                Err(BridgeError::Handshake {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(fatal) => Err(self.fault(fatal)),
        }
    }

    fn channel_mut(&mut self, op: &'static str) -> Result<&mut ProcessChannel, BridgeError> {
        if self.state == BridgeState::Faulted {
            return Err(BridgeError::BadState {
                op,
                state: self.state.to_string(),
            });
        }
        self.channel.as_mut().ok_or(BridgeError::BadState {
            op,
            state: "Detached".into(),
        })
    }

    /// Record a fatal failure: log, mark `Faulted`, release the process.
    pub(crate) fn fault(&mut self, fatal: FatalBridgeError) -> BridgeError {
        tracing::error!(backend = self.backend, error = %fatal, "bridge faulted");
        self.state = BridgeState::Faulted;
        if let Some(mut channel) = self.channel.take() {
            channel.shutdown();
        }
        BridgeError::Fatal(fatal)
    }

    /// Write one line, faulting on failure. Requires a non-faulted bridge.
    pub(crate) fn send(&mut self, op: &'static str, line: &str) -> Result<(), BridgeError> {
        let channel = self.channel_mut(op)?;
        match channel.send_line(line) {
            Ok(()) => Ok(()),
            Err(fatal) => Err(self.fault(fatal)),
        }
    }

    /// Run the query read loop: poll output lines until `parse_decision`
    /// yields an operator or the decision timeout elapses.
    pub(crate) fn await_decision<F>(
        &mut self,
        mut parse_decision: F,
    ) -> Result<Option<String>, BridgeError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        self.state = BridgeState::AwaitingResponse;
        let deadline = Instant::now() + self.timeouts.decision;
        let poll = self.timeouts.poll;

        loop {
            let channel = match self.channel_mut("query") {
                Ok(c) => c,
                Err(e) => return Err(e),
            };
            match channel.read_line(poll) {
                Ok(Some(line)) => {
                    if let Some(op) = parse_decision(&line) {
                        tracing::debug!(backend = self.backend, operator = %op, "decision");
                        self.state = BridgeState::Ready;
                        return Ok(Some(op));
                    }
                    // Not a decision line; anything unparseable is noise at
                    // this layer, logged at trace level by the channel.
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        self.state = BridgeState::Ready;
                        return Ok(None);
                    }
                }
                Err(fatal) => return Err(self.fault(fatal)),
            }
        }
    }

    /// Drain buffered output until the reasoner stays quiet for one poll
    /// period.
    pub(crate) fn drain_quiet(&mut self, op: &'static str) -> Result<Vec<String>, BridgeError> {
        let poll = self.timeouts.poll;
        let channel = self.channel_mut(op)?;
        match channel.drain_for(poll) {
            Ok(lines) => Ok(lines),
            Err(fatal) => Err(self.fault(fatal)),
        }
    }

    /// Release the process, entering `Faulted` so further use is rejected
    /// until `restart`.
    pub(crate) fn shutdown(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.shutdown();
        }
        self.state = BridgeState::Faulted;
    }
}

/// Shared implementation of the three write-side operations; the formatting
/// is identical across backends.
pub(crate) fn write_assertion(
    core: &mut BridgeCore,
    term: &str,
    truth: Truth,
    is_event: bool,
) -> Result<(), BridgeError> {
    core.send("assert", &narsese::assertion(term, truth, is_event))
}

pub(crate) fn write_goal(core: &mut BridgeCore, term: &str) -> Result<(), BridgeError> {
    core.send("goal", &narsese::goal(term))
}

pub(crate) fn write_operation(core: &mut BridgeCore, op: &str) -> Result<(), BridgeError> {
    core.send("operation", &narsese::operation_event(op))
}

pub(crate) fn write_novelty(core: &mut BridgeCore, term: &str) -> Result<(), BridgeError> {
    core.send("novelty", &narsese::novelty_event(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display_names() {
        assert_eq!(BridgeState::Starting.to_string(), "Starting");
        assert_eq!(BridgeState::Faulted.to_string(), "Faulted");
    }

    #[test]
    fn default_timeouts_are_bounded() {
        let t = BridgeTimeouts::default();
        assert!(t.decision >= t.poll);
        assert!(t.handshake > Duration::ZERO);
    }

    #[test]
    fn detached_core_rejects_operations() {
        let mut core = BridgeCore::new("test", BridgeTimeouts::default());
        let err = core.send("assert", "<a --> b>.").unwrap_err();
        assert!(matches!(err, BridgeError::BadState { .. }));
    }

    #[test]
    fn faulted_core_stays_faulted() {
        let mut core = BridgeCore::new("test", BridgeTimeouts::default());
        core.shutdown();
        assert_eq!(core.state(), BridgeState::Faulted);
        assert!(core.send("assert", "x").is_err());
    }
}
