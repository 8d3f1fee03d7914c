//! The perception-action cycle: grounding facade over all subsystems.
//!
//! One [`Agent`] owns one quantizer, one symbol mapper, one action map, one
//! surprise monitor, and one reasoning bridge — the full pipeline from
//! embedding vector to environment action. Each live episode must own its
//! own agent; nothing here is shared between threads.
//!
//! The cycle per step: ground the observation into a symbol, assert it as
//! an event, ask the reasoner for a decision toward the goal, translate the
//! decision to an action index (falling back to motor babbling when the
//! reasoner is silent or picks an unknown operator), act, feed back the
//! executed operation and any reward, then grant the reasoner its cycles.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::action::ActionMap;
use crate::bridge::Reasoner;
use crate::config::BrocaConfig;
use crate::error::{BrocaError, BrocaResult};
use crate::narsese::{DerivedImplication, Truth};
use crate::quantizer::{GrowingGas, NodeId, Snapshot};
use crate::surprise::SurpriseMonitor;
use crate::symbol::SymbolMapper;
use crate::world::World;

/// The goal term injected at every episode start.
const GOAL_TERM: &str = "goal";

/// Weak prior truth used when re-introducing a restored vocabulary.
const BOOTSTRAP_TRUTH: Truth = Truth {
    frequency: 1.0,
    confidence: 0.1,
};

/// Statistics of one completed episode.
#[derive(Debug, Clone, Default)]
pub struct EpisodeOutcome {
    pub steps: usize,
    pub total_reward: f32,
    /// Steps where the reasoner's decision drove the action.
    pub decided: usize,
    /// Steps that fell back to motor babbling.
    pub babbled: usize,
    /// Surprise-driven novelty events emitted.
    pub novelty_events: usize,
    /// Symbols retired by the end-of-episode pruning pass.
    pub retired: usize,
    /// Causal rules drained from the reasoner during the episode.
    pub derived: Vec<DerivedImplication>,
}

/// Owns the whole grounding pipeline for one episode stream.
pub struct Agent {
    gas: GrowingGas,
    mapper: SymbolMapper,
    actions: ActionMap,
    monitor: SurpriseMonitor,
    reasoner: Box<dyn Reasoner>,
    cycles_per_step: u32,
    rng: StdRng,
    /// Winner prototype from the previous step, used as the predicted
    /// embedding when no external predictor is wired in.
    predicted: Option<Vec<f32>>,
}

impl Agent {
    /// Build an agent with a fresh vocabulary.
    pub fn new(
        config: &BrocaConfig,
        actions: ActionMap,
        reasoner: Box<dyn Reasoner>,
    ) -> BrocaResult<Self> {
        config.validate()?;
        Ok(Self {
            gas: GrowingGas::new(config.gas_params()),
            mapper: SymbolMapper::new(),
            actions,
            monitor: SurpriseMonitor::new(config.surprise_threshold, config.trace_capacity),
            reasoner,
            cycles_per_step: config.cycles_per_step,
            rng: StdRng::seed_from_u64(0x6272_6f63_61),
            predicted: None,
        })
    }

    /// Build an agent resuming a persisted vocabulary.
    ///
    /// The restored symbols are re-asserted as weak standing beliefs so the
    /// reasoner knows the vocabulary before the first observation arrives.
    pub fn resume(
        config: &BrocaConfig,
        actions: ActionMap,
        reasoner: Box<dyn Reasoner>,
        snapshot: &Snapshot,
    ) -> BrocaResult<Self> {
        config.validate()?;
        let gas = GrowingGas::restore(snapshot, config.dimension)?;
        let mapper = SymbolMapper::rebuild_from(&gas);
        tracing::info!(
            symbols = mapper.len(),
            step = gas.step_counter(),
            "resumed vocabulary from snapshot"
        );
        let mut agent = Self {
            gas,
            mapper,
            actions,
            monitor: SurpriseMonitor::new(config.surprise_threshold, config.trace_capacity),
            reasoner,
            cycles_per_step: config.cycles_per_step,
            rng: StdRng::seed_from_u64(0x6272_6f63_61),
            predicted: None,
        };
        agent.bootstrap_vocabulary()?;
        Ok(agent)
    }

    /// Introduce every known symbol to the reasoner as a weak belief.
    fn bootstrap_vocabulary(&mut self) -> Result<(), BrocaError> {
        let terms: Vec<String> = self
            .mapper
            .enumerate()
            .map(|(_, name)| name.to_string())
            .collect();
        for term in terms {
            self.reasoner
                .assert_statement(&term, BOOTSTRAP_TRUTH, false)?;
        }
        Ok(())
    }

    /// Ground one observation: surprise check, insert, name, assert.
    ///
    /// Returns the winning node and the count of novelty events emitted
    /// (0 or 1).
    pub fn perceive(&mut self, observation: &[f32]) -> BrocaResult<(NodeId, usize)> {
        let mut novelty = 0;

        if let Some(predicted) = self.predicted.take() {
            let (record, refined) =
                self.monitor
                    .observe_and_refine(&predicted, observation, &mut self.gas)?;
            if record.exceeded_threshold {
                if let Some(node) = refined {
                    let term = self
                        .mapper
                        .name_for(node, self.gas.step_counter())
                        .to_string();
                    self.reasoner.novelty_event(&term)?;
                    novelty = 1;
                }
            }
        }

        let winner = self.gas.insert(observation)?;
        let term = self
            .mapper
            .name_for(winner, self.gas.step_counter())
            .to_string();
        self.reasoner
            .assert_statement(&term, Truth::observed(), true)?;

        self.predicted = self.gas.node(winner).map(|n| n.vector.clone());
        Ok((winner, novelty))
    }

    /// Ask the reasoner for an action; babble when it has no answer.
    ///
    /// Returns the chosen index and whether it came from a decision.
    pub fn decide(&mut self) -> BrocaResult<(usize, bool)> {
        match self.reasoner.query(GOAL_TERM)? {
            Some(op) => match self.actions.index_for(&op) {
                Ok(index) => {
                    self.reasoner.operation_feedback(&op)?;
                    Ok((index, true))
                }
                Err(err) => {
                    // Unknown operator: absorbed locally with a log record,
                    // exploration takes over.
                    tracing::warn!(operator = %op, error = %err, "unmapped decision");
                    Ok((self.babble(), false))
                }
            },
            None => Ok((self.babble(), false)),
        }
    }

    fn babble(&mut self) -> usize {
        self.rng.gen_range(0..self.actions.len())
    }

    /// Run one full episode against a world.
    pub fn run_episode(&mut self, world: &mut dyn World) -> BrocaResult<EpisodeOutcome> {
        let mut outcome = EpisodeOutcome::default();
        let mut observation = world.reset();
        self.predicted = None;
        self.reasoner.inject_goal(GOAL_TERM)?;

        loop {
            outcome.steps += 1;
            let (_, novelty) = self.perceive(&observation)?;
            outcome.novelty_events += novelty;

            let (action, decided) = self.decide()?;
            if decided {
                outcome.decided += 1;
            } else {
                outcome.babbled += 1;
            }

            let step = world.step(action);
            if step.reward > 0.0 {
                outcome.total_reward += step.reward;
                // The critical feedback link: the goal was actually seen.
                self.reasoner
                    .assert_statement(GOAL_TERM, Truth::observed(), true)?;
            }

            let report = self.reasoner.step(self.cycles_per_step)?;
            outcome.derived.extend(report.derived);

            observation = step.observation;
            if step.done {
                break;
            }
        }

        let removed = self.gas.prune();
        for id in &removed {
            self.mapper.retire(*id);
        }
        outcome.retired = removed.len();

        tracing::info!(
            steps = outcome.steps,
            reward = outcome.total_reward,
            decided = outcome.decided,
            babbled = outcome.babbled,
            symbols = self.mapper.len(),
            "episode complete"
        );
        Ok(outcome)
    }

    /// Persist the vocabulary.
    pub fn save_snapshot(&self, path: &Path) -> BrocaResult<()> {
        self.gas.snapshot().save(path)?;
        tracing::info!(path = %path.display(), symbols = self.mapper.len(), "saved knowledge");
        Ok(())
    }

    /// Terminate the reasoner process. Also happens on drop.
    pub fn shutdown(&mut self) {
        self.reasoner.shutdown();
    }

    pub fn gas(&self) -> &GrowingGas {
        &self.gas
    }

    pub fn mapper(&self) -> &SymbolMapper {
        &self.mapper
    }

    pub fn monitor(&self) -> &SurpriseMonitor {
        &self.monitor
    }

    pub fn reasoner(&self) -> &dyn Reasoner {
        self.reasoner.as_ref()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::Duration;

    use crate::bridge::{BridgeTimeouts, OnaBridge};
    use crate::world::CyclicWorld;

    fn fast_timeouts() -> BridgeTimeouts {
        BridgeTimeouts {
            handshake: Duration::from_secs(2),
            decision: Duration::from_millis(100),
            poll: Duration::from_millis(20),
        }
    }

    fn echo_reasoner() -> Box<dyn Reasoner> {
        Box::new(OnaBridge::spawn_with(Command::new("cat"), fast_timeouts()).unwrap())
    }

    fn test_config() -> BrocaConfig {
        BrocaConfig {
            dimension: 2,
            cycles_per_step: 1,
            ..Default::default()
        }
    }

    #[test]
    fn episode_grounds_and_babbles_against_silent_reasoner() {
        let config = test_config();
        let mut agent =
            Agent::new(&config, ActionMap::minigrid(), echo_reasoner()).unwrap();
        let mut world = CyclicWorld::new(
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            9,
        );

        let outcome = agent.run_episode(&mut world).unwrap();
        assert_eq!(outcome.steps, 9);
        // cat never answers with a decision tuple, so every step babbles.
        assert_eq!(outcome.decided, 0);
        assert_eq!(outcome.babbled, 9);
        // The three latent states became symbols.
        assert!(agent.mapper().len() >= 3);
        assert!(!agent.gas().is_empty());
    }

    #[test]
    fn scripted_decisions_are_translated() {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(r#"while read -r _l; do echo "OUT: (^forward,{SELF})!"; done"#);
        let reasoner: Box<dyn Reasoner> =
            Box::new(OnaBridge::spawn_with(command, fast_timeouts()).unwrap());

        let config = test_config();
        let mut agent = Agent::new(&config, ActionMap::minigrid(), reasoner).unwrap();
        let mut world = CyclicWorld::new(vec![vec![0.0, 0.0], vec![1.0, 0.0]], 4);

        let outcome = agent.run_episode(&mut world).unwrap();
        assert!(outcome.decided > 0, "scripted ^forward decisions must land");
    }

    #[test]
    fn surprising_jumps_emit_novelty_events() {
        let config = BrocaConfig {
            dimension: 2,
            surprise_threshold: 0.5,
            cycles_per_step: 1,
            ..Default::default()
        };
        let mut agent =
            Agent::new(&config, ActionMap::minigrid(), echo_reasoner()).unwrap();
        // States far apart: every transition jumps more than the threshold.
        let mut world = CyclicWorld::new(vec![vec![0.0, 0.0], vec![5.0, 5.0]], 6);

        let outcome = agent.run_episode(&mut world).unwrap();
        assert!(
            outcome.novelty_events > 0,
            "large prediction errors must emit novelty events"
        );
    }

    #[test]
    fn resumed_agent_keeps_symbol_names() {
        let config = test_config();
        let mut agent =
            Agent::new(&config, ActionMap::minigrid(), echo_reasoner()).unwrap();
        let mut world = CyclicWorld::new(
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            10,
        );
        agent.run_episode(&mut world).unwrap();

        let names: Vec<(NodeId, String)> = agent
            .mapper()
            .enumerate()
            .map(|(id, name)| (id, name.to_string()))
            .collect();
        let snapshot = agent.gas().snapshot();

        let resumed =
            Agent::resume(&config, ActionMap::minigrid(), echo_reasoner(), &snapshot).unwrap();
        let resumed_names: Vec<(NodeId, String)> = resumed
            .mapper()
            .enumerate()
            .map(|(id, name)| (id, name.to_string()))
            .collect();
        assert_eq!(names, resumed_names);
    }

    #[test]
    fn dead_reasoner_fails_the_episode() {
        // Exits right after the handshake: the episode must fail with a
        // bridge error rather than hang or panic.
        let mut command = Command::new("sh");
        command.arg("-c").arg(r#"read -r _l; echo ok"#);
        let reasoner: Box<dyn Reasoner> =
            Box::new(OnaBridge::spawn_with(command, fast_timeouts()).unwrap());

        let config = test_config();
        let mut agent = Agent::new(&config, ActionMap::minigrid(), reasoner).unwrap();
        let mut world = CyclicWorld::new(vec![vec![0.0, 0.0], vec![1.0, 0.0]], 200);

        let err = agent.run_episode(&mut world).unwrap_err();
        assert!(matches!(err, BrocaError::Bridge(_)));
    }
}
