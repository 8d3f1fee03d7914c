//! Stable naming of quantizer nodes as symbolic terms.
//!
//! The reasoner only ever sees term names. The mapper mints an immutable
//! `event_<id>` name the first time a node id is observed and never renames
//! or reuses it — not even after the node is pruned and the entry retired.
//! Because node ids are themselves monotone and never reused, a retired name
//! can never come back attached to a different concept.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SymbolError;
use crate::quantizer::{GrowingGas, NodeId};

/// One live node-to-term mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    /// The quantizer node this term names.
    pub node_id: NodeId,
    /// The immutable term name (`event_<id>`).
    pub term_name: String,
    /// Quantizer step at which the name was minted.
    pub created_at: u64,
}

/// Bidirectional, append-only node-id ↔ term-name mapping.
#[derive(Debug, Default, Clone)]
pub struct SymbolMapper {
    live: BTreeMap<NodeId, SymbolEntry>,
    by_name: BTreeMap<String, NodeId>,
    retired: Vec<SymbolEntry>,
}

impl SymbolMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruct the mapping for every live node of a restored gas.
    ///
    /// Names are a pure function of the node id, so a rebuilt mapper agrees
    /// with the one that ran in the original session.
    pub fn rebuild_from(gas: &GrowingGas) -> Self {
        let mut mapper = Self::new();
        for node in gas.nodes() {
            mapper.mint(node.id, gas.step_counter());
        }
        mapper
    }

    fn mint(&mut self, node_id: NodeId, created_at: u64) -> &SymbolEntry {
        self.live.entry(node_id).or_insert_with(|| {
            let term_name = format!("event_{}", node_id.0);
            self.by_name.insert(term_name.clone(), node_id);
            tracing::debug!(node = %node_id, term = %term_name, "minted symbol");
            SymbolEntry {
                node_id,
                term_name,
                created_at,
            }
        })
    }

    /// The term name for a node, minting it on first sight.
    ///
    /// All subsequent calls for the same id return the same name.
    pub fn name_for(&mut self, node_id: NodeId, step: u64) -> &str {
        &self.mint(node_id, step).term_name
    }

    /// Reverse lookup: the live node behind a term name.
    pub fn node_for(&self, term_name: &str) -> Result<NodeId, SymbolError> {
        self.by_name
            .get(term_name)
            .copied()
            .ok_or_else(|| SymbolError::UnknownSymbol {
                term: term_name.to_string(),
            })
    }

    /// Retire the mapping of a pruned node.
    ///
    /// The entry moves to the retired list; the name and id stay burned.
    pub fn retire(&mut self, node_id: NodeId) {
        if let Some(entry) = self.live.remove(&node_id) {
            self.by_name.remove(&entry.term_name);
            tracing::debug!(node = %node_id, term = %entry.term_name, "retired symbol");
            self.retired.push(entry);
        }
    }

    /// Live `(node_id, term_name)` pairs in node-id order.
    ///
    /// Used to bootstrap the reasoner's known vocabulary.
    pub fn enumerate(&self) -> impl Iterator<Item = (NodeId, &str)> {
        self.live
            .values()
            .map(|e| (e.node_id, e.term_name.as_str()))
    }

    /// All live entries, for JSON export.
    pub fn entries(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.live.values()
    }

    /// Entries retired by pruning, oldest first.
    pub fn retired(&self) -> &[SymbolEntry] {
        &self.retired
    }

    /// Number of live symbols.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantizer::GasParams;

    #[test]
    fn names_follow_node_ids() {
        let mut mapper = SymbolMapper::new();
        assert_eq!(mapper.name_for(NodeId(0), 1), "event_0");
        assert_eq!(mapper.name_for(NodeId(7), 2), "event_7");
    }

    #[test]
    fn names_are_never_reassigned() {
        let mut mapper = SymbolMapper::new();
        let first = mapper.name_for(NodeId(3), 1).to_string();
        // Intervening mints for other nodes must not disturb the mapping.
        mapper.name_for(NodeId(4), 2);
        mapper.name_for(NodeId(5), 3);
        assert_eq!(mapper.name_for(NodeId(3), 9), first);
        assert_eq!(mapper.node_for(&first).unwrap(), NodeId(3));
    }

    #[test]
    fn unknown_term_fails() {
        let mapper = SymbolMapper::new();
        let err = mapper.node_for("event_99").unwrap_err();
        assert!(matches!(err, SymbolError::UnknownSymbol { .. }));
    }

    #[test]
    fn retire_removes_live_mapping_but_burns_the_name() {
        let mut mapper = SymbolMapper::new();
        let name = mapper.name_for(NodeId(2), 1).to_string();
        mapper.retire(NodeId(2));

        assert!(mapper.node_for(&name).is_err());
        assert_eq!(mapper.retired().len(), 1);
        assert_eq!(mapper.retired()[0].term_name, name);

        // Re-minting the same id (a node id is never reused by the gas, but
        // the mapper itself also stays consistent) yields the same name.
        assert_eq!(mapper.name_for(NodeId(2), 5), name);
    }

    #[test]
    fn enumerate_is_ordered_by_node_id() {
        let mut mapper = SymbolMapper::new();
        mapper.name_for(NodeId(5), 1);
        mapper.name_for(NodeId(1), 2);
        mapper.name_for(NodeId(3), 3);

        let ids: Vec<u64> = mapper.enumerate().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn rebuild_matches_original_session() {
        let mut gas = GrowingGas::new(GasParams::with_dimension(2));
        let mut mapper = SymbolMapper::new();
        for i in 0..10 {
            let id = gas.insert(&[i as f32, 0.0]).unwrap();
            mapper.name_for(id, gas.step_counter());
        }

        let rebuilt = SymbolMapper::rebuild_from(&gas);
        let original: Vec<(NodeId, String)> = mapper
            .enumerate()
            .map(|(id, name)| (id, name.to_string()))
            .collect();
        let recovered: Vec<(NodeId, String)> = rebuilt
            .enumerate()
            .map(|(id, name)| (id, name.to_string()))
            .collect();
        assert_eq!(original, recovered);
    }
}
