//! Driver configuration, persisted as TOML.
//!
//! Everything tunable about a run lives here: quantizer parameters, the
//! surprise threshold, bridge timeouts, and the episode schedule. Fields
//! default individually so a config file only needs the overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridge::BridgeTimeouts;
use crate::error::ConfigError;
use crate::quantizer::GasParams;

/// Which reasoner implementation to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OpenNARS-for-Applications, the native shell binary.
    Ona,
    /// OpenNARS, the JVM jar.
    Opennars,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Ona => f.write_str("ona"),
            Backend::Opennars => f.write_str("opennars"),
        }
    }
}

/// Full driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrocaConfig {
    /// Embedding dimension shared by encoder, quantizer, and monitor.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Reasoner backend.
    #[serde(default = "default_backend")]
    pub backend: Backend,
    /// Path to the ONA `NAR` executable.
    #[serde(default = "default_nar_path")]
    pub nar_path: PathBuf,
    /// Path to the OpenNARS jar.
    #[serde(default = "default_jar_path")]
    pub jar_path: PathBuf,
    /// Knowledge snapshot location.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// Episodes per run.
    #[serde(default = "default_episodes")]
    pub episodes: usize,
    /// Reasoning cycles granted after each perception step.
    #[serde(default = "default_cycles_per_step")]
    pub cycles_per_step: u32,
    /// Prediction-error magnitude above which the vocabulary refines.
    #[serde(default = "default_surprise_threshold")]
    pub surprise_threshold: f32,
    /// Rolling error-trace capacity of the surprise monitor.
    #[serde(default = "default_trace_capacity")]
    pub trace_capacity: usize,
    /// Decision wait per query, in milliseconds.
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,
    /// Handshake wait at spawn, in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Quantizer parameters.
    #[serde(default)]
    pub gas: GasTable,
}

/// Quantizer parameter table as it appears in TOML; dimension lives at the
/// top level so the whole pipeline shares one value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasTable {
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "default_min_nodes")]
    pub min_nodes: usize,
    #[serde(default = "default_growth_interval")]
    pub growth_interval: u64,
    #[serde(default = "default_eps_winner")]
    pub eps_winner: f32,
    #[serde(default = "default_eps_neighbor")]
    pub eps_neighbor: f32,
    #[serde(default = "default_max_edge_age")]
    pub max_edge_age: u32,
    #[serde(default = "default_error_decay")]
    pub error_decay: f64,
    #[serde(default = "default_usage_floor")]
    pub usage_floor: u64,
    #[serde(default = "default_prune_window")]
    pub prune_window: u64,
}

fn default_dimension() -> usize {
    64
}
fn default_backend() -> Backend {
    Backend::Ona
}
fn default_nar_path() -> PathBuf {
    PathBuf::from("OpenNARS-for-Applications/NAR")
}
fn default_jar_path() -> PathBuf {
    PathBuf::from("opennars.jar")
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("knowledge.bin")
}
fn default_episodes() -> usize {
    10
}
fn default_cycles_per_step() -> u32 {
    5
}
fn default_surprise_threshold() -> f32 {
    0.5
}
fn default_trace_capacity() -> usize {
    128
}
fn default_decision_timeout_ms() -> u64 {
    1000
}
fn default_handshake_timeout_ms() -> u64 {
    5000
}
fn default_max_nodes() -> usize {
    64
}
fn default_min_nodes() -> usize {
    2
}
fn default_growth_interval() -> u64 {
    50
}
fn default_eps_winner() -> f32 {
    0.1
}
fn default_eps_neighbor() -> f32 {
    0.01
}
fn default_max_edge_age() -> u32 {
    50
}
fn default_error_decay() -> f64 {
    0.995
}
fn default_usage_floor() -> u64 {
    2
}
fn default_prune_window() -> u64 {
    200
}

impl Default for GasTable {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            min_nodes: default_min_nodes(),
            growth_interval: default_growth_interval(),
            eps_winner: default_eps_winner(),
            eps_neighbor: default_eps_neighbor(),
            max_edge_age: default_max_edge_age(),
            error_decay: default_error_decay(),
            usage_floor: default_usage_floor(),
            prune_window: default_prune_window(),
        }
    }
}

impl Default for BrocaConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            backend: default_backend(),
            nar_path: default_nar_path(),
            jar_path: default_jar_path(),
            snapshot_path: default_snapshot_path(),
            episodes: default_episodes(),
            cycles_per_step: default_cycles_per_step(),
            surprise_threshold: default_surprise_threshold(),
            trace_capacity: default_trace_capacity(),
            decision_timeout_ms: default_decision_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            gas: GasTable::default(),
        }
    }
}

impl BrocaConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension == 0 {
            return Err(ConfigError::Invalid {
                message: "dimension must be > 0".into(),
            });
        }
        if self.gas.min_nodes > self.gas.max_nodes {
            return Err(ConfigError::Invalid {
                message: format!(
                    "min_nodes {} exceeds max_nodes {}",
                    self.gas.min_nodes, self.gas.max_nodes
                ),
            });
        }
        if self.gas.growth_interval == 0 {
            return Err(ConfigError::Invalid {
                message: "growth_interval must be > 0".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.gas.eps_winner)
            || !(0.0..=1.0).contains(&self.gas.eps_neighbor)
        {
            return Err(ConfigError::Invalid {
                message: "learning rates must lie in [0, 1]".into(),
            });
        }
        Ok(())
    }

    /// The quantizer parameters implied by this config.
    pub fn gas_params(&self) -> GasParams {
        GasParams {
            dimension: self.dimension,
            max_nodes: self.gas.max_nodes,
            min_nodes: self.gas.min_nodes,
            growth_interval: self.gas.growth_interval,
            eps_winner: self.gas.eps_winner,
            eps_neighbor: self.gas.eps_neighbor,
            max_edge_age: self.gas.max_edge_age,
            error_decay: self.gas.error_decay,
            usage_floor: self.gas.usage_floor,
            prune_window: self.gas.prune_window,
        }
    }

    /// The bridge timeouts implied by this config.
    pub fn bridge_timeouts(&self) -> BridgeTimeouts {
        BridgeTimeouts {
            handshake: Duration::from_millis(self.handshake_timeout_ms),
            decision: Duration::from_millis(self.decision_timeout_ms),
            ..Default::default()
        }
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        BrocaConfig::default().validate().unwrap();
    }

    #[test]
    fn config_roundtrip_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broca.toml");

        let config = BrocaConfig {
            dimension: 2,
            backend: Backend::Opennars,
            episodes: 3,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = BrocaConfig::load(&path).unwrap();
        assert_eq!(loaded.dimension, 2);
        assert_eq!(loaded.backend, Backend::Opennars);
        assert_eq!(loaded.episodes, 3);
        assert_eq!(loaded.gas.max_nodes, 64);
    }

    #[test]
    fn partial_file_uses_field_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broca.toml");
        std::fs::write(&path, "dimension = 8\n[gas]\nmax_nodes = 16\n").unwrap();

        let loaded = BrocaConfig::load(&path).unwrap();
        assert_eq!(loaded.dimension, 8);
        assert_eq!(loaded.gas.max_nodes, 16);
        assert_eq!(loaded.gas.min_nodes, 2);
        assert_eq!(loaded.backend, Backend::Ona);
    }

    #[test]
    fn invalid_constraints_are_rejected() {
        let config = BrocaConfig {
            dimension: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BrocaConfig {
            gas: GasTable {
                min_nodes: 100,
                max_nodes: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn gas_params_carry_the_shared_dimension() {
        let config = BrocaConfig {
            dimension: 32,
            ..Default::default()
        };
        assert_eq!(config.gas_params().dimension, 32);
    }

    #[test]
    fn backend_serializes_lowercase() {
        let toml = toml::to_string(&BrocaConfig::default()).unwrap();
        assert!(toml.contains("backend = \"ona\""));
    }
}
