//! OpenNARS-for-Applications backend: the native `NAR shell` process.
//!
//! ONA is spawned in interactive shell mode and told to report everything
//! (`*volume=100`). Decisions appear as `OUT:` lines carrying an operator
//! tuple, and on some builds as `… executed with args` or `Selected: ^op`
//! lines. Derived statements and anticipations ride the same stream.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::BridgeError;
use crate::narsese::{self, Truth};

use super::{
    process::ProcessChannel, write_assertion, write_goal, write_novelty, write_operation,
    BridgeCore, BridgeState, BridgeTimeouts, Reasoner, StepReport,
};

/// Confidence floor above which a drained output line counts as a
/// reasoner-side surprise signal.
const SURPRISE_CONFIDENCE_FLOOR: f32 = 0.3;

/// Bridge to a native ONA process.
#[derive(Debug)]
pub struct OnaBridge {
    core: BridgeCore,
    executable: PathBuf,
}

impl OnaBridge {
    /// Spawn `<executable> shell` and perform the handshake.
    pub fn spawn(executable: &Path, timeouts: BridgeTimeouts) -> Result<Self, BridgeError> {
        let mut command = Command::new(executable);
        command.arg("shell");

        let mut bridge = Self {
            core: BridgeCore::new("ona", timeouts),
            executable: executable.to_path_buf(),
        };
        bridge.boot(command)?;
        Ok(bridge)
    }

    /// Spawn an arbitrary command speaking the ONA dialect.
    ///
    /// Intended for harnesses that substitute a scripted process for the
    /// real reasoner.
    pub fn spawn_with(command: Command, timeouts: BridgeTimeouts) -> Result<Self, BridgeError> {
        let executable = PathBuf::from(command.get_program());
        let mut bridge = Self {
            core: BridgeCore::new("ona", timeouts),
            executable,
        };
        bridge.boot(command)?;
        Ok(bridge)
    }

    fn boot(&mut self, command: Command) -> Result<(), BridgeError> {
        let channel = ProcessChannel::spawn(command)?;
        self.core.attach(channel)?;
        // Raise the output volume so decisions and derivations are visible,
        // then let the first echoed/answered line complete the handshake.
        self.core.send("handshake", "*volume=100")?;
        self.core.await_handshake()
    }

    /// Parse a decision operator from one ONA output line.
    fn parse_decision(line: &str) -> Option<String> {
        if let Some((prefix, _)) = line.split_once(" executed with args") {
            let candidate = prefix.trim();
            if candidate.starts_with('^') {
                return Some(candidate.to_string());
            }
        }
        if line.contains("Selected: ") {
            return narsese::parse_operator(line);
        }
        if let Some(content) = line.strip_prefix("OUT:") {
            return narsese::parse_operator(content);
        }
        None
    }

    /// Fold one drained line into the step report.
    fn collect(report: &mut StepReport, line: &str) {
        let content = if let Some(content) = line.strip_prefix("OUT:") {
            content.trim()
        } else if let Some(content) = line.strip_prefix("Derived:") {
            content.trim()
        } else {
            if let Some(anticipation) = narsese::parse_expectation(line) {
                report.anticipations.push(anticipation);
            } else if line.contains("Anticipating:") {
                report.anticipations.push(narsese::Anticipation {
                    score: 0.5,
                    implication: line.trim().to_string(),
                });
            }
            return;
        };

        if let Some(confidence) = narsese::parse_confidence(content) {
            if confidence > SURPRISE_CONFIDENCE_FLOOR {
                report.prediction_error = report.prediction_error.max(SURPRISE_CONFIDENCE_FLOOR);
            }
        }
        match narsese::parse_implication(content) {
            Some(implication) => report.derived.push(implication),
            None => report.raw_derived.push(content.to_string()),
        }
    }
}

impl Reasoner for OnaBridge {
    fn backend(&self) -> &'static str {
        "ona"
    }

    fn state(&self) -> BridgeState {
        self.core.state()
    }

    fn assert_statement(
        &mut self,
        term: &str,
        truth: Truth,
        is_event: bool,
    ) -> Result<(), BridgeError> {
        write_assertion(&mut self.core, term, truth, is_event)
    }

    fn inject_goal(&mut self, term: &str) -> Result<(), BridgeError> {
        write_goal(&mut self.core, term)
    }

    fn operation_feedback(&mut self, op: &str) -> Result<(), BridgeError> {
        write_operation(&mut self.core, op)
    }

    fn novelty_event(&mut self, term: &str) -> Result<(), BridgeError> {
        write_novelty(&mut self.core, term)
    }

    fn query(&mut self, goal: &str) -> Result<Option<String>, BridgeError> {
        write_goal(&mut self.core, goal)?;
        self.core.await_decision(Self::parse_decision)
    }

    fn step(&mut self, cycles: u32) -> Result<StepReport, BridgeError> {
        self.core.send("step", &narsese::cycles(cycles))?;
        let lines = self.core.drain_quiet("step")?;
        let mut report = StepReport::default();
        for line in &lines {
            Self::collect(&mut report, line);
        }
        Ok(report)
    }

    fn shutdown(&mut self) {
        self.core.shutdown();
    }

    fn restart(&mut self) -> Result<(), BridgeError> {
        self.core.shutdown();
        let mut command = Command::new(&self.executable);
        command.arg("shell");
        self.boot(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_from_out_tuple() {
        assert_eq!(
            OnaBridge::parse_decision("OUT: (^left,{SELF})!"),
            Some("^left".into())
        );
    }

    #[test]
    fn decision_from_executed_line() {
        assert_eq!(
            OnaBridge::parse_decision("^forward executed with args ({SELF})"),
            Some("^forward".into())
        );
    }

    #[test]
    fn decision_from_selected_line() {
        assert_eq!(
            OnaBridge::parse_decision("Selected: ^toggle. :|:"),
            Some("^toggle".into())
        );
    }

    #[test]
    fn non_decision_lines_are_ignored() {
        assert_eq!(OnaBridge::parse_decision("Input: <event_0 --> seen>."), None);
        assert_eq!(OnaBridge::parse_decision("OUT: <event_0 --> seen>."), None);
    }

    #[test]
    fn collect_parses_implications_and_noise() {
        let mut report = StepReport::default();
        OnaBridge::collect(
            &mut report,
            "OUT: <event_0 --> seen> =/> <goal --> seen>. %0.9;0.85%",
        );
        OnaBridge::collect(&mut report, "OUT: <event_1 --> seen>. %1.00;0.58%");
        OnaBridge::collect(
            &mut report,
            "decision expectation=0.55 implication: <<event_0 --> seen> =/> <goal --> seen>>",
        );
        OnaBridge::collect(&mut report, "performing 10 inference steps:");

        assert_eq!(report.derived.len(), 1);
        assert_eq!(report.derived[0].term, "event_0");
        assert_eq!(report.raw_derived.len(), 1);
        assert_eq!(report.anticipations.len(), 1);
        assert!(report.prediction_error >= SURPRISE_CONFIDENCE_FLOOR);
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::time::Duration;

        fn fast_timeouts() -> BridgeTimeouts {
            BridgeTimeouts {
                handshake: Duration::from_secs(2),
                decision: Duration::from_millis(200),
                poll: Duration::from_millis(20),
            }
        }

        #[test]
        fn echo_process_completes_handshake() {
            // `cat` echoes the volume command straight back, which is enough
            // to satisfy Starting → Ready.
            let bridge = OnaBridge::spawn_with(Command::new("cat"), fast_timeouts()).unwrap();
            assert_eq!(bridge.state(), BridgeState::Ready);
        }

        #[test]
        fn silent_query_is_no_decision() {
            let mut bridge =
                OnaBridge::spawn_with(Command::new("cat"), fast_timeouts()).unwrap();
            // cat echoes the goal line, which parses as no decision; the
            // timeout then yields Ok(None).
            let decision = bridge.query("goal").unwrap();
            assert_eq!(decision, None);
            assert_eq!(bridge.state(), BridgeState::Ready);
        }

        #[test]
        fn scripted_decision_is_parsed() {
            // A fake reasoner that answers every line with a decision tuple.
            let mut command = Command::new("sh");
            command.arg("-c").arg(
                r#"while read -r _line; do echo "OUT: (^left,{SELF})!"; done"#,
            );
            let mut bridge = OnaBridge::spawn_with(command, fast_timeouts()).unwrap();
            let decision = bridge.query("goal").unwrap();
            assert_eq!(decision.as_deref(), Some("^left"));
            assert_eq!(bridge.state(), BridgeState::Ready);
        }

        #[test]
        fn killed_process_faults_the_bridge() {
            let mut bridge =
                OnaBridge::spawn_with(Command::new("cat"), fast_timeouts()).unwrap();
            bridge.shutdown();
            let err = bridge
                .assert_statement("event_0", Truth::observed(), true)
                .unwrap_err();
            assert!(matches!(err, BridgeError::BadState { .. }));
            assert_eq!(bridge.state(), BridgeState::Faulted);
        }

        #[test]
        fn short_lived_process_raises_fatal() {
            // The process exits immediately after the handshake echo.
            let mut command = Command::new("sh");
            command.arg("-c").arg(r#"read -r _line; echo ok"#);
            let mut bridge = OnaBridge::spawn_with(command, fast_timeouts()).unwrap();
            assert_eq!(bridge.state(), BridgeState::Ready);

            // Writes race process teardown; within a few statements the
            // broken pipe must surface as a fatal fault.
            let mut fatal = false;
            for _ in 0..20 {
                match bridge.assert_statement("event_0", Truth::observed(), true) {
                    Ok(()) => std::thread::sleep(Duration::from_millis(25)),
                    Err(BridgeError::Fatal(_)) => {
                        fatal = true;
                        break;
                    }
                    Err(other) => panic!("expected fatal error, got {other}"),
                }
            }
            assert!(fatal, "dead reasoner must fault the bridge");
            assert_eq!(bridge.state(), BridgeState::Faulted);
        }

        #[test]
        fn restart_recovers_a_faulted_bridge() {
            let mut bridge =
                OnaBridge::spawn_with(Command::new("cat"), fast_timeouts()).unwrap();
            bridge.shutdown();
            assert_eq!(bridge.state(), BridgeState::Faulted);

            // Restart respawns `<executable> shell`; with `cat` as the
            // executable the extra argument is read as a (missing) file, so
            // expect either a working bridge or a clean handshake error —
            // never a panic or leaked process.
            let _ = bridge.restart();
        }
    }
}
