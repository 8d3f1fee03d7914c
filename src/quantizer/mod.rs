//! Online vector quantization: a Growing Neural Gas over embedding vectors.
//!
//! The quantizer discovers a discrete vocabulary of "concept" prototypes from
//! a stream of embeddings. Each prototype is a [`PrototypeNode`] in an arena
//! keyed by a stable [`NodeId`]; topology is kept as neighbor id sets with
//! per-edge ages, never as object pointers. Ids are assigned monotonically
//! and never reused, even after pruning — downstream symbol names depend on
//! that invariant.

pub mod snapshot;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::QuantizerError;

pub use snapshot::Snapshot;

/// Stable identifier of a prototype node.
///
/// Ids start at 0 (the first discovered concept is `event_0`) and grow
/// monotonically for the lifetime of the vocabulary, across save/load.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Tunable parameters of the gas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasParams {
    /// Embedding dimension. All inputs must match.
    pub dimension: usize,
    /// Hard ceiling on the node count. Growth stops here; not an error.
    pub max_nodes: usize,
    /// Floor below which pruning never drops the vocabulary.
    pub min_nodes: usize,
    /// Insertions between scheduled growth steps.
    pub growth_interval: u64,
    /// Learning rate applied to the winner.
    pub eps_winner: f32,
    /// Learning rate applied to the winner's topological neighbors.
    pub eps_neighbor: f32,
    /// Edges older than this are removed.
    pub max_edge_age: u32,
    /// Multiplicative error-accumulator decay applied each insertion.
    pub error_decay: f64,
    /// Usage count below which a node is a pruning candidate.
    pub usage_floor: u64,
    /// Insertions without reinforcement before a low-usage node is pruned.
    pub prune_window: u64,
}

impl Default for GasParams {
    fn default() -> Self {
        Self {
            dimension: 64,
            max_nodes: 64,
            min_nodes: 2,
            growth_interval: 50,
            eps_winner: 0.1,
            eps_neighbor: 0.01,
            max_edge_age: 50,
            error_decay: 0.995,
            usage_floor: 2,
            prune_window: 200,
        }
    }
}

impl GasParams {
    /// Params for a given embedding dimension, everything else default.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }
}

/// One prototype in the gas: a position in embedding space plus the
/// bookkeeping the growth and pruning rules need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrototypeNode {
    /// Stable id, never reused.
    pub id: NodeId,
    /// Prototype position.
    pub vector: Vec<f32>,
    /// Accumulated squared quantization error, decayed each insertion.
    pub error_accumulator: f64,
    /// How many times this node won an insertion.
    pub usage_count: u64,
    /// Insertions since this node last won.
    pub age_since_reinforced: u64,
    /// Topological neighbors and the age of the connecting edge.
    pub edges: BTreeMap<NodeId, u32>,
}

impl PrototypeNode {
    fn new(id: NodeId, vector: Vec<f32>) -> Self {
        Self {
            id,
            vector,
            error_accumulator: 0.0,
            usage_count: 1,
            age_since_reinforced: 0,
            edges: BTreeMap::new(),
        }
    }
}

/// Euclidean distance between two equal-length vectors.
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Online Growing Neural Gas.
///
/// Node lookup is a linear scan; the node count is bounded by
/// [`GasParams::max_nodes`], which keeps the scan acceptable and the
/// code free of index structures.
#[derive(Debug, Clone)]
pub struct GrowingGas {
    nodes: BTreeMap<NodeId, PrototypeNode>,
    next_id: u64,
    step_counter: u64,
    params: GasParams,
}

impl GrowingGas {
    /// Create an empty gas with the given parameters.
    pub fn new(params: GasParams) -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 0,
            step_counter: 0,
            params,
        }
    }

    /// Number of live prototype nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no prototypes exist yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The configured parameters.
    pub fn params(&self) -> &GasParams {
        &self.params
    }

    /// Total insertions processed so far.
    pub fn step_counter(&self) -> u64 {
        self.step_counter
    }

    /// The id the next created node will receive.
    pub fn peek_next_id(&self) -> u64 {
        self.next_id
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&PrototypeNode> {
        self.nodes.get(&id)
    }

    /// Iterate nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &PrototypeNode> {
        self.nodes.values()
    }

    fn check_dim(&self, vector: &[f32]) -> Result<(), QuantizerError> {
        if vector.len() != self.params.dimension {
            return Err(QuantizerError::DimensionMismatch {
                expected: self.params.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn spawn(&mut self, vector: Vec<f32>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, PrototypeNode::new(id, vector));
        id
    }

    fn link(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        if let Some(node) = self.nodes.get_mut(&a) {
            node.edges.insert(b, 0);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            node.edges.insert(a, 0);
        }
    }

    fn unlink(&mut self, a: NodeId, b: NodeId) {
        if let Some(node) = self.nodes.get_mut(&a) {
            node.edges.remove(&b);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            node.edges.remove(&a);
        }
    }

    /// Winner and runner-up by Euclidean distance. Requires two nodes.
    fn nearest_two(&self, vector: &[f32]) -> ((NodeId, f32), (NodeId, f32)) {
        let mut best: Option<(NodeId, f32)> = None;
        let mut second: Option<(NodeId, f32)> = None;
        for node in self.nodes.values() {
            let d = euclidean(&node.vector, vector);
            match best {
                Some((_, bd)) if d >= bd => match second {
                    Some((_, sd)) if d >= sd => {}
                    _ => second = Some((node.id, d)),
                },
                _ => {
                    second = best;
                    best = Some((node.id, d));
                }
            }
        }
        (
            best.expect("nearest_two requires at least two nodes"),
            second.expect("nearest_two requires at least two nodes"),
        )
    }

    /// Classify without mutation: nearest node and its distance.
    ///
    /// The distance doubles as a novelty score for the caller.
    pub fn classify(&self, vector: &[f32]) -> Result<(NodeId, f32), QuantizerError> {
        self.check_dim(vector)?;
        self.nodes
            .values()
            .map(|n| (n.id, euclidean(&n.vector, vector)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or(QuantizerError::Empty)
    }

    /// Adapt the gas to one observation and return the winning node.
    ///
    /// Until two nodes exist the input vector is adopted verbatim as a new
    /// prototype; afterwards the usual winner/runner-up rule applies:
    /// error accumulation on the winner, prototype movement, edge refresh
    /// and aging, orphan removal, scheduled growth, and error decay.
    pub fn insert(&mut self, vector: &[f32]) -> Result<NodeId, QuantizerError> {
        self.check_dim(vector)?;
        self.step_counter += 1;

        if self.nodes.len() < 2 {
            let id = self.spawn(vector.to_vec());
            let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
            if let &[a, b] = ids.as_slice() {
                self.link(a, b);
            }
            return Ok(id);
        }

        let ((winner, dist), (runner, _)) = self.nearest_two(vector);

        // Error decay and reinforcement aging apply to everyone; the winner
        // is reset below.
        for node in self.nodes.values_mut() {
            node.error_accumulator *= self.params.error_decay;
            node.age_since_reinforced += 1;
        }

        let neighbor_ids: Vec<NodeId> = {
            let node = self.nodes.get_mut(&winner).expect("winner exists");
            node.error_accumulator += f64::from(dist) * f64::from(dist);
            node.usage_count += 1;
            node.age_since_reinforced = 0;
            let eps = self.params.eps_winner;
            for (w, v) in node.vector.iter_mut().zip(vector) {
                *w += eps * (v - *w);
            }
            for age in node.edges.values_mut() {
                *age += 1;
            }
            node.edges.keys().copied().collect()
        };

        let eps_n = self.params.eps_neighbor;
        for nid in &neighbor_ids {
            if let Some(neighbor) = self.nodes.get_mut(nid) {
                for (w, v) in neighbor.vector.iter_mut().zip(vector) {
                    *w += eps_n * (v - *w);
                }
                // Edge ages are mirrored on both endpoints.
                if let Some(age) = neighbor.edges.get_mut(&winner) {
                    *age += 1;
                }
            }
        }

        self.link(winner, runner);

        let expired: Vec<NodeId> = self
            .nodes
            .get(&winner)
            .map(|n| {
                n.edges
                    .iter()
                    .filter(|(_, age)| **age > self.params.max_edge_age)
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default();
        for other in expired {
            self.unlink(winner, other);
        }
        self.drop_orphans();

        if self.step_counter % self.params.growth_interval == 0
            && self.nodes.len() < self.params.max_nodes
        {
            self.grow_from_errors();
        }

        Ok(winner)
    }

    /// Out-of-schedule growth: adopt `vector` as a new prototype now.
    ///
    /// Used by the surprise path for fast concept formation on novel input.
    /// Returns `None` once the gas is at capacity — saturation is not an
    /// error, the vocabulary just stops refining.
    pub fn grow_at(&mut self, vector: &[f32]) -> Result<Option<NodeId>, QuantizerError> {
        self.check_dim(vector)?;
        if self.nodes.len() >= self.params.max_nodes {
            return Ok(None);
        }
        let anchor = self
            .nodes
            .values()
            .map(|n| (n.id, euclidean(&n.vector, vector)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);
        let id = self.spawn(vector.to_vec());
        if let Some(anchor) = anchor {
            self.link(id, anchor);
        }
        tracing::debug!(node = %id, "surprise-driven node growth");
        Ok(Some(id))
    }

    /// Scheduled growth: split between the highest-error node and its
    /// highest-error neighbor, at their midpoint.
    fn grow_from_errors(&mut self) {
        let Some(q) = self
            .nodes
            .values()
            .max_by(|a, b| a.error_accumulator.total_cmp(&b.error_accumulator))
            .map(|n| n.id)
        else {
            return;
        };
        let Some(f) = self
            .nodes
            .get(&q)
            .into_iter()
            .flat_map(|n| n.edges.keys())
            .filter_map(|id| self.nodes.get(id))
            .max_by(|a, b| a.error_accumulator.total_cmp(&b.error_accumulator))
            .map(|n| n.id)
        else {
            return;
        };

        let midpoint: Vec<f32> = {
            let qv = &self.nodes[&q].vector;
            let fv = &self.nodes[&f].vector;
            qv.iter().zip(fv).map(|(a, b)| (a + b) * 0.5).collect()
        };

        for id in [q, f] {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.error_accumulator *= 0.5;
            }
        }
        let inherited =
            (self.nodes[&q].error_accumulator + self.nodes[&f].error_accumulator) * 0.5;

        let id = self.spawn(midpoint);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.error_accumulator = inherited;
        }
        self.unlink(q, f);
        self.link(id, q);
        self.link(id, f);
        tracing::debug!(node = %id, between = %q, and = %f, "scheduled node growth");
    }

    /// Remove nodes left without edges, respecting the `min_nodes` floor.
    fn drop_orphans(&mut self) {
        loop {
            if self.nodes.len() <= self.params.min_nodes {
                return;
            }
            let Some(orphan) = self
                .nodes
                .values()
                .find(|n| n.edges.is_empty())
                .map(|n| n.id)
            else {
                return;
            };
            self.nodes.remove(&orphan);
            tracing::debug!(node = %orphan, "removed edge-less node");
        }
    }

    /// Prune stale nodes: usage below the floor across a full window without
    /// reinforcement. Never drops below `min_nodes`. Returns the removed ids
    /// so dependent symbol entries can be retired.
    pub fn prune(&mut self) -> Vec<NodeId> {
        let mut removed = Vec::new();
        let candidates: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| {
                n.usage_count < self.params.usage_floor
                    && n.age_since_reinforced >= self.params.prune_window
            })
            .map(|n| n.id)
            .collect();

        for id in candidates {
            if self.nodes.len() <= self.params.min_nodes {
                break;
            }
            let neighbors: Vec<NodeId> = self
                .nodes
                .get(&id)
                .map(|n| n.edges.keys().copied().collect())
                .unwrap_or_default();
            for nid in neighbors {
                self.unlink(id, nid);
            }
            self.nodes.remove(&id);
            removed.push(id);
        }

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "pruned stale nodes");
            self.drop_orphans();
        }
        removed
    }
}
