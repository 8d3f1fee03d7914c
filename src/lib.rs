//! # broca
//!
//! A symbol grounding bridge between continuous perception and logical
//! reasoning. Embedding vectors stream in from an external encoder; an
//! online Growing Neural Gas quantizes them into a stable vocabulary of
//! discrete concept symbols; a stateful bridge translates those symbols
//! (and action operators) into the line-oriented Narsese protocol spoken
//! by an external NARS process, and prediction error decides when the
//! vocabulary must refine itself.
//!
//! ## Architecture
//!
//! - **Quantizer** (`quantizer`): online Growing Neural Gas with stable,
//!   never-reused node ids and exact snapshot persistence
//! - **Symbols** (`symbol`): immutable `event_<id>` naming of nodes
//! - **Actions** (`action`): fixed operator ↔ action-index bijection
//! - **Surprise** (`surprise`): prediction-error monitoring driving
//!   out-of-schedule vocabulary growth
//! - **Bridge** (`bridge`): owned NARS process (ONA or OpenNARS) behind one
//!   `Reasoner` trait, with timeout-bounded line I/O
//! - **Agent** (`agent`): the perception-action cycle tying it together
//!
//! ## Library usage
//!
//! ```no_run
//! use broca::action::ActionMap;
//! use broca::agent::Agent;
//! use broca::bridge::OnaBridge;
//! use broca::config::BrocaConfig;
//! use broca::world::CyclicWorld;
//! use std::path::Path;
//!
//! let config = BrocaConfig { dimension: 2, ..Default::default() };
//! let bridge = OnaBridge::spawn(Path::new("NAR"), config.bridge_timeouts()).unwrap();
//! let mut agent = Agent::new(&config, ActionMap::minigrid(), Box::new(bridge)).unwrap();
//! let mut world = CyclicWorld::standard();
//! let outcome = agent.run_episode(&mut world).unwrap();
//! println!("reward: {}", outcome.total_reward);
//! ```

pub mod action;
pub mod agent;
pub mod bridge;
pub mod config;
pub mod error;
pub mod narsese;
pub mod quantizer;
pub mod surprise;
pub mod symbol;
pub mod world;
