//! Knowledge snapshot: exact save/restore of the quantizer state.
//!
//! Symbol meaning is only stable across sessions if node ids, prototype
//! vectors, and parameters survive a restart bit-for-bit. The snapshot is a
//! single bincode record; loading rejects any file whose embedding dimension
//! differs from the active configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

use super::{GasParams, GrowingGas, NodeId, PrototypeNode};

/// One prototype node in wire form. Neighbor ids and edge ages are parallel
/// lists, ordered by neighbor id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub vector: Vec<f32>,
    pub error_accumulator: f64,
    pub usage_count: u64,
    pub age_since_reinforced: u64,
    pub neighbor_ids: Vec<NodeId>,
    pub edge_ages: Vec<u32>,
}

impl From<&PrototypeNode> for NodeRecord {
    fn from(node: &PrototypeNode) -> Self {
        Self {
            id: node.id,
            vector: node.vector.clone(),
            error_accumulator: node.error_accumulator,
            usage_count: node.usage_count,
            age_since_reinforced: node.age_since_reinforced,
            neighbor_ids: node.edges.keys().copied().collect(),
            edge_ages: node.edges.values().copied().collect(),
        }
    }
}

/// Serialized quantizer state. Round-trips exactly: same ids, vectors,
/// parameters, and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub dimension: usize,
    pub next_id: u64,
    pub step_counter: u64,
    pub params: GasParams,
    /// Nodes ordered by id.
    pub nodes: Vec<NodeRecord>,
}

impl Snapshot {
    /// Write the snapshot to `path` as bincode.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let bytes = bincode::serialize(self).map_err(|e| SnapshotError::Codec {
            message: format!("failed to encode snapshot: {e}"),
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SnapshotError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }
        std::fs::write(path, bytes).map_err(|e| SnapshotError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Read a snapshot from `path`.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let bytes = std::fs::read(path).map_err(|e| SnapshotError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        bincode::deserialize(&bytes).map_err(|e| SnapshotError::Codec {
            message: format!("failed to decode snapshot: {e}"),
        })
    }
}

impl GrowingGas {
    /// Capture the full state as a [`Snapshot`].
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            dimension: self.params.dimension,
            next_id: self.next_id,
            step_counter: self.step_counter,
            params: self.params.clone(),
            nodes: self.nodes.values().map(NodeRecord::from).collect(),
        }
    }

    /// Rebuild a gas from a snapshot, rejecting a dimension mismatch against
    /// the active configuration.
    pub fn restore(
        snapshot: &Snapshot,
        configured_dimension: usize,
    ) -> Result<Self, SnapshotError> {
        if snapshot.dimension != configured_dimension {
            return Err(SnapshotError::DimensionMismatch {
                snapshot: snapshot.dimension,
                configured: configured_dimension,
            });
        }

        let mut nodes = BTreeMap::new();
        for record in &snapshot.nodes {
            if record.vector.len() != snapshot.dimension {
                return Err(SnapshotError::Codec {
                    message: format!(
                        "node {} has vector length {}, expected {}",
                        record.id,
                        record.vector.len(),
                        snapshot.dimension
                    ),
                });
            }
            if record.neighbor_ids.len() != record.edge_ages.len() {
                return Err(SnapshotError::Codec {
                    message: format!(
                        "node {} has {} neighbors but {} edge ages",
                        record.id,
                        record.neighbor_ids.len(),
                        record.edge_ages.len()
                    ),
                });
            }
            let edges: BTreeMap<NodeId, u32> = record
                .neighbor_ids
                .iter()
                .copied()
                .zip(record.edge_ages.iter().copied())
                .collect();
            nodes.insert(
                record.id,
                PrototypeNode {
                    id: record.id,
                    vector: record.vector.clone(),
                    error_accumulator: record.error_accumulator,
                    usage_count: record.usage_count,
                    age_since_reinforced: record.age_since_reinforced,
                    edges,
                },
            );
        }

        Ok(Self {
            nodes,
            next_id: snapshot.next_id,
            step_counter: snapshot.step_counter,
            params: snapshot.params.clone(),
        })
    }
}
