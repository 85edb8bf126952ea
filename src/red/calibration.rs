use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::core::tree::{NodeId, ReferenceTree};

/// Precomputed RED values for recognizable clades.
///
/// A key is either a node label (`g__Escherichia`) or two leaf names joined
/// by `|`, standing for their most recent common ancestor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    entries: BTreeMap<String, f64>,
}

impl CalibrationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, red: f64) {
        self.entries.insert(key.trim().to_string(), red);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.get(key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map every key that can be located in `tree` to its node.
    ///
    /// Keys naming clades absent from the tree are skipped; a reduced tree
    /// normally contains only a few calibrated clades.
    #[must_use]
    pub fn resolve(&self, tree: &ReferenceTree) -> HashMap<NodeId, f64> {
        let mut resolved = HashMap::new();
        let mut missing = 0usize;

        for (key, &red) in &self.entries {
            let node = match key.split_once('|') {
                Some((a, b)) => match (tree.find(a.trim()), tree.find(b.trim())) {
                    (Some(a), Some(b)) => tree.lca(&[a, b]),
                    _ => None,
                },
                None => tree.find(key),
            };
            match node {
                Some(id) if !tree.is_leaf(id) => {
                    resolved.insert(id, red);
                }
                _ => missing += 1,
            }
        }

        if missing > 0 {
            debug!("{missing} of {} calibrations not present in tree", self.entries.len());
        }
        resolved
    }
}

impl<'a> FromIterator<(&'a str, f64)> for CalibrationTable {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (key, red) in iter {
            table.insert(key, red);
        }
        table
    }
}
