//! Fixed bijection between Narsese operator names and environment actions.
//!
//! The reasoner decides in terms of operators (`^left`, `^forward`, …); the
//! environment consumes integer action indices. The map is declared once at
//! startup, validated for injectivity and totality, and never mutated.

use std::collections::BTreeMap;

use crate::error::ActionError;

/// One declared operator/index pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    pub name: String,
    pub index: usize,
}

/// Immutable operator ↔ index bijection, total over `0..len`.
#[derive(Debug, Clone)]
pub struct ActionMap {
    by_name: BTreeMap<String, usize>,
    by_index: Vec<String>,
}

impl ActionMap {
    /// Build and validate a map from declared `(name, index)` pairs.
    ///
    /// Fails with `InvalidActionMap` if any name or index repeats, or the
    /// indices do not cover `0..n` exactly.
    pub fn new<I, S>(declared: I) -> Result<Self, ActionError>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut by_name = BTreeMap::new();
        let mut pairs: Vec<(String, usize)> = Vec::new();
        for (name, index) in declared {
            let name = name.into();
            if by_name.insert(name.clone(), index).is_some() {
                return Err(ActionError::InvalidActionMap {
                    reason: format!("duplicate operator name {name}"),
                });
            }
            pairs.push((name, index));
        }
        if pairs.is_empty() {
            return Err(ActionError::InvalidActionMap {
                reason: "action space is empty".into(),
            });
        }

        let mut by_index: Vec<Option<String>> = vec![None; pairs.len()];
        for (name, index) in pairs {
            match by_index.get_mut(index) {
                Some(slot @ None) => *slot = Some(name),
                Some(Some(existing)) => {
                    return Err(ActionError::InvalidActionMap {
                        reason: format!(
                            "index {index} claimed by both {existing} and {name}"
                        ),
                    });
                }
                None => {
                    return Err(ActionError::InvalidActionMap {
                        reason: format!(
                            "index {index} is outside 0..{} — indices must be contiguous",
                            by_index.len()
                        ),
                    });
                }
            }
        }
        let by_index: Vec<String> = by_index
            .into_iter()
            .map(|slot| slot.expect("every slot filled by totality check"))
            .collect();

        Ok(Self { by_name, by_index })
    }

    /// The default MiniGrid-style action space.
    pub fn minigrid() -> Self {
        Self::new([
            ("^left", 0),
            ("^right", 1),
            ("^forward", 2),
            ("^pick", 3),
            ("^drop", 4),
            ("^toggle", 5),
            ("^say", 6),
            ("^wait", 7),
        ])
        .expect("built-in action table is bijective")
    }

    /// Translate an operator name to its environment index.
    pub fn index_for(&self, name: &str) -> Result<usize, ActionError> {
        self.by_name
            .get(name.trim())
            .copied()
            .ok_or_else(|| ActionError::UnknownAction {
                name: name.to_string(),
            })
    }

    /// Translate an environment index back to its operator name.
    pub fn name_for(&self, index: usize) -> Result<&str, ActionError> {
        self.by_index
            .get(index)
            .map(String::as_str)
            .ok_or(ActionError::UnknownIndex { index })
    }

    /// Size of the declared action space.
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Declared entries in index order.
    pub fn entries(&self) -> impl Iterator<Item = ActionEntry> + '_ {
        self.by_index.iter().enumerate().map(|(index, name)| ActionEntry {
            name: name.clone(),
            index,
        })
    }
}
