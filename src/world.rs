//! The environment contract, and two toy embedding sources.
//!
//! The real perception pipeline — environment observation through a neural
//! encoder — lives outside this crate. The bridge only ever sees the result:
//! one fixed-dimension embedding vector per step, and an integer action
//! index going the other way. [`World`] captures exactly that seam.
//!
//! Two built-in implementations exist for smoke tests and demos: a
//! deterministic cyclic latent world and a noisy clustered source.

use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Result of one environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// The next observation, already encoded as an embedding.
    pub observation: Vec<f32>,
    /// Reward signal; positive means the goal was reached.
    pub reward: f32,
    /// Episode finished.
    pub done: bool,
}

/// Environment + encoder seam: embeddings out, action indices in.
pub trait World {
    /// Embedding dimension of the observations this world emits.
    fn dimension(&self) -> usize;

    /// Reset to an initial state and return the first observation.
    fn reset(&mut self) -> Vec<f32>;

    /// Apply an action and observe the outcome.
    fn step(&mut self, action: usize) -> StepOutcome;
}

/// Deterministic latent world cycling through a fixed set of states.
///
/// Ignores actions; the observation sequence is purely time-driven, which is
/// exactly what a sequence-learning reasoner needs to latch onto.
#[derive(Debug, Clone)]
pub struct CyclicWorld {
    states: Vec<Vec<f32>>,
    current: usize,
    ticks_per_episode: usize,
    tick: usize,
}

impl CyclicWorld {
    /// A three-state cycle in a 2-dimensional latent space.
    pub fn standard() -> Self {
        Self::new(
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            60,
        )
    }

    pub fn new(states: Vec<Vec<f32>>, ticks_per_episode: usize) -> Self {
        assert!(!states.is_empty(), "cyclic world needs at least one state");
        Self {
            states,
            current: 0,
            ticks_per_episode,
            tick: 0,
        }
    }
}

impl World for CyclicWorld {
    fn dimension(&self) -> usize {
        self.states[0].len()
    }

    fn reset(&mut self) -> Vec<f32> {
        self.current = 0;
        self.tick = 0;
        self.states[0].clone()
    }

    fn step(&mut self, _action: usize) -> StepOutcome {
        self.tick += 1;
        self.current = (self.current + 1) % self.states.len();
        StepOutcome {
            observation: self.states[self.current].clone(),
            // Completing a full cycle counts as reaching the goal.
            reward: if self.current == 0 { 1.0 } else { 0.0 },
            done: self.tick >= self.ticks_per_episode,
        }
    }
}

/// Noisy embeddings drawn from a handful of hidden cluster centers.
///
/// Simulates an encoder watching a world with a few distinct situations; a
/// healthy quantizer should rediscover roughly one symbol per center.
#[derive(Debug, Clone)]
pub struct ClusteredWorld {
    centers: Vec<Vec<f32>>,
    noise: f32,
    ticks_per_episode: usize,
    tick: usize,
    rng: StdRng,
}

impl ClusteredWorld {
    /// Three well-separated centers in `dimension`-dimensional space.
    pub fn standard(dimension: usize, seed: u64) -> Self {
        let zeros = vec![0.0; dimension];
        let ones = vec![1.0; dimension];
        let alternating: Vec<f32> = (0..dimension)
            .map(|i| if i % 2 == 0 { 1.0 } else { 0.0 })
            .collect();
        Self {
            centers: vec![zeros, ones, alternating],
            noise: 0.1,
            ticks_per_episode: 50,
            tick: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn sample(&mut self) -> Vec<f32> {
        let which = self.rng.gen_range(0..self.centers.len());
        let noise = self.noise;
        let center = self.centers[which].clone();
        center
            .into_iter()
            .map(|c| c + self.rng.gen_range(-noise..=noise))
            .collect()
    }
}

impl World for ClusteredWorld {
    fn dimension(&self) -> usize {
        self.centers[0].len()
    }

    fn reset(&mut self) -> Vec<f32> {
        self.tick = 0;
        self.sample()
    }

    fn step(&mut self, _action: usize) -> StepOutcome {
        self.tick += 1;
        StepOutcome {
            observation: self.sample(),
            reward: 0.0,
            done: self.tick >= self.ticks_per_episode,
        }
    }
}
