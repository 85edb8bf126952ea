//! Placement classifier: RED at the insertion point to a rank-qualified lineage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::lineage::Lineage;
use crate::core::taxonomy::Taxonomy;
use crate::core::tree::{NodeId, ReferenceTree};
use crate::core::types::{GenomeId, Rank};
use crate::red::{RankBoundaries, RedTable};

/// Where a placement tool put a query on a reference tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub query: GenomeId,
    /// Post-order edge id, see [`ReferenceTree::node_for_edge`]
    pub edge: usize,
    pub distal_length: f64,
    pub pendant_length: f64,
    /// Likelihood weight ratio of the best placement, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Why the input row could not be read; such a record always fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect: Option<String>,
}

impl PlacementRecord {
    pub fn new(query: impl Into<String>, edge: usize, distal_length: f64, pendant_length: f64) -> Self {
        Self {
            query: GenomeId::new(query),
            edge,
            distal_length,
            pendant_length,
            confidence: None,
            defect: None,
        }
    }

    /// A record for a query whose input row was unreadable. Its edge never
    /// resolves, and classifying it reports `reason`.
    pub fn malformed(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            defect: Some(reason.into()),
            ..Self::new(query, usize::MAX, 0.0, 0.0)
        }
    }

    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.defect.is_some()
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Per-query placement failure; never aborts a batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    #[error("{query}: malformed placement ({reason})")]
    Malformed { query: GenomeId, reason: String },

    #[error("{query}: edge {edge} not found in tree of {edges} edges")]
    EdgeNotFound { query: GenomeId, edge: usize, edges: usize },

    #[error("{query}: invalid {field} {value}")]
    InvalidLength {
        query: GenomeId,
        field: &'static str,
        value: f64,
    },

    #[error("{query}: no RED value for node {node}")]
    MissingRed { query: GenomeId, node: NodeId },

    #[error("{query}: no reference taxonomy below the insertion point")]
    NoTaxonomy { query: GenomeId },
}

/// A classified placement
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub query: GenomeId,
    /// Insertion edge, as (parent, child) nodes of the tree it was placed on
    pub parent: NodeId,
    pub child: NodeId,
    pub red: f64,
    pub rank: Rank,
    /// Lineage down to at most genus
    pub lineage: Lineage,
}

/// Classifies placements against one tree and its RED table.
///
/// Clade lineages are precomputed once, so classifying a query costs a
/// constant number of lookups.
#[derive(Debug)]
pub struct PlacementClassifier<'a> {
    tree: &'a ReferenceTree,
    red: &'a RedTable,
    boundaries: &'a RankBoundaries,
    clades: Vec<Option<Lineage>>,
}

impl<'a> PlacementClassifier<'a> {
    #[must_use]
    pub fn new(
        tree: &'a ReferenceTree,
        red: &'a RedTable,
        boundaries: &'a RankBoundaries,
        taxonomy: &Taxonomy,
    ) -> Self {
        let mut clades: Vec<Option<Lineage>> = vec![None; tree.len()];
        for &id in tree.postorder() {
            clades[id.0] = if tree.is_leaf(id) {
                tree.name(id).and_then(|name| taxonomy.get(name)).cloned()
            } else {
                tree.children(id)
                    .iter()
                    .filter_map(|c| clades[c.0].as_ref())
                    .fold(None, |acc: Option<Lineage>, l| match acc {
                        None => Some(l.clone()),
                        Some(shared) => Some(shared.common_prefix(l)),
                    })
            };
        }
        Self {
            tree,
            red,
            boundaries,
            clades,
        }
    }

    #[must_use]
    pub fn tree(&self) -> &ReferenceTree {
        self.tree
    }

    /// Lineage shared by every classified leaf under a node
    #[must_use]
    pub fn clade_lineage(&self, id: NodeId) -> Option<&Lineage> {
        self.clades.get(id.0).and_then(Option::as_ref)
    }

    /// Insertion edge and the fraction of the way from parent to child
    ///
    /// # Errors
    ///
    /// Returns `PlacementError::Malformed`, `PlacementError::EdgeNotFound` or
    /// `PlacementError::InvalidLength`.
    pub fn locate(&self, record: &PlacementRecord) -> Result<(NodeId, NodeId, f64), PlacementError> {
        if let Some(reason) = &record.defect {
            return Err(PlacementError::Malformed {
                query: record.query.clone(),
                reason: reason.clone(),
            });
        }
        let child = self
            .tree
            .node_for_edge(record.edge)
            .ok_or_else(|| PlacementError::EdgeNotFound {
                query: record.query.clone(),
                edge: record.edge,
                edges: self.tree.edge_count(),
            })?;
        let parent = self.tree.parent(child).ok_or_else(|| PlacementError::EdgeNotFound {
            query: record.query.clone(),
            edge: record.edge,
            edges: self.tree.edge_count(),
        })?;

        for (field, value) in [
            ("distal length", record.distal_length),
            ("pendant length", record.pendant_length),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PlacementError::InvalidLength {
                    query: record.query.clone(),
                    field,
                    value,
                });
            }
        }

        let total = record.distal_length + record.pendant_length;
        let fraction = if total > 0.0 { record.distal_length / total } else { 0.0 };
        Ok((parent, child, fraction))
    }

    /// RED at the insertion point:
    /// `RED(parent) + distal / (distal + pendant) * (RED(child) - RED(parent))`
    ///
    /// # Errors
    ///
    /// Returns a [`PlacementError`] for malformed records.
    pub fn interpolate_red(&self, record: &PlacementRecord) -> Result<f64, PlacementError> {
        let (parent, child, fraction) = self.locate(record)?;
        let red_at = |node: NodeId| {
            self.red.get(node).ok_or_else(|| PlacementError::MissingRed {
                query: record.query.clone(),
                node,
            })
        };
        let (low, high) = (red_at(parent)?, red_at(child)?);
        Ok(low + fraction * (high - low))
    }

    /// Classify one placement.
    ///
    /// The lineage is the one shared by the reference leaves under the
    /// insertion edge, cut at the deeper of the rank the parent clade
    /// already fixes and the rank of the interpolated RED, never below genus.
    ///
    /// # Errors
    ///
    /// Returns a [`PlacementError`]; failures affect only this query.
    pub fn classify(&self, record: &PlacementRecord) -> Result<Placement, PlacementError> {
        let (parent, child, _) = self.locate(record)?;
        let red = self.interpolate_red(record)?;
        let rank = self.boundaries.rank_for(red);

        let below = self
            .clade_lineage(child)
            .ok_or_else(|| PlacementError::NoTaxonomy {
                query: record.query.clone(),
            })?;
        let fixed = self.clade_lineage(parent).map_or(0, Lineage::depth);
        let depth = fixed.max(rank.index() + 1).min(Rank::Genus.index() + 1);

        Ok(Placement {
            query: record.query.clone(),
            parent,
            child,
            red,
            rank,
            lineage: below.truncated_to_depth(depth),
        })
    }
}
