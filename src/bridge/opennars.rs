//! OpenNARS backend: the JVM jar over stdin/stdout.
//!
//! OpenNARS is launched as `java -Xmx1024m -jar <jar>`. Decisions appear as
//! `EXE: ^op` lines; derivations as `OUT:` and `Answer:` lines; committed
//! anticipations as `ANTICIPATE:` lines.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::BridgeError;
use crate::narsese::{self, Truth};

use super::{
    process::ProcessChannel, write_assertion, write_goal, write_novelty, write_operation,
    BridgeCore, BridgeState, BridgeTimeouts, Reasoner, StepReport,
};

/// JVM heap bound, matching the upstream launch instructions.
const JVM_HEAP: &str = "-Xmx1024m";

/// Bridge to an OpenNARS jar.
#[derive(Debug)]
pub struct OpenNarsBridge {
    core: BridgeCore,
    jar: PathBuf,
}

impl OpenNarsBridge {
    /// Launch `java -Xmx1024m -jar <jar>` and perform the handshake.
    pub fn spawn(jar: &Path, timeouts: BridgeTimeouts) -> Result<Self, BridgeError> {
        let mut bridge = Self {
            core: BridgeCore::new("opennars", timeouts),
            jar: jar.to_path_buf(),
        };
        bridge.boot(Self::launch_command(jar))?;
        Ok(bridge)
    }

    /// Spawn an arbitrary command speaking the OpenNARS dialect.
    ///
    /// Intended for harnesses that substitute a scripted process for the
    /// real reasoner.
    pub fn spawn_with(command: Command, timeouts: BridgeTimeouts) -> Result<Self, BridgeError> {
        let jar = PathBuf::from(command.get_program());
        let mut bridge = Self {
            core: BridgeCore::new("opennars", timeouts),
            jar,
        };
        bridge.boot(command)?;
        Ok(bridge)
    }

    fn launch_command(jar: &Path) -> Command {
        let mut command = Command::new("java");
        command.arg(JVM_HEAP).arg("-jar").arg(jar);
        command
    }

    fn boot(&mut self, command: Command) -> Result<(), BridgeError> {
        let channel = ProcessChannel::spawn(command)?;
        self.core.attach(channel)?;
        // The jar prints a banner on startup; that first line completes the
        // handshake without any prompting write.
        self.core.await_handshake()
    }

    /// Parse a decision operator from one OpenNARS output line.
    fn parse_decision(line: &str) -> Option<String> {
        let content = line.strip_prefix("EXE:")?;
        narsese::parse_operator(content)
    }

    /// Fold one drained line into the step report.
    fn collect(report: &mut StepReport, line: &str) {
        let content = if let Some(content) = line.strip_prefix("OUT:") {
            content.trim()
        } else if let Some(content) = line.strip_prefix("Answer:") {
            content.trim()
        } else {
            if let Some(rest) = line.split("ANTICIPATE:").nth(1) {
                report.anticipations.push(narsese::Anticipation {
                    score: 0.0,
                    implication: rest.trim().to_string(),
                });
            }
            return;
        };

        match narsese::parse_implication(content) {
            Some(implication) => report.derived.push(implication),
            None => report.raw_derived.push(content.to_string()),
        }
    }
}

impl Reasoner for OpenNarsBridge {
    fn backend(&self) -> &'static str {
        "opennars"
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
        self.boot(Self::launch_command(&self.jar.clone()))
    }
}
