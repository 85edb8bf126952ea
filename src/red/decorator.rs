use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::core::tree::{NodeId, ReferenceTree};
use crate::red::{DecorationError, RedTable};
use crate::utils::validation::count_to_f64;

/// Assigns a RED value to every node of a tree.
///
/// Nodes that meet the support and child-count thresholds are *decorated*:
/// they take their calibrated value when one is known, otherwise
///
/// ```text
/// RED(anchor) + d / (d + mean_leaf_distance(node)) * (1 - RED(anchor))
/// ```
///
/// where the anchor is the nearest decorated ancestor and `d` the path length
/// from it. The root is decorated at the anchor RED passed to
/// [`RedDecorator::decorate`] and leaves are always 1.0.
///
/// Undecorated nodes are interpolated between their anchor and the
/// decorated nodes below them, snapped to the RED interval grid, and clamped
/// so that RED never decreases from the root towards the leaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedDecorator {
    min_support: f64,
    min_children: usize,
    interval: f64,
}

impl RedDecorator {
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min_support: config.red_min_support,
            min_children: config.red_min_children,
            interval: config.red_interval,
        }
    }

    fn is_decorated(&self, tree: &ReferenceTree, id: NodeId) -> bool {
        id == tree.root()
            || tree.is_leaf(id)
            || (tree.support(id).unwrap_or(0.0) >= self.min_support
                && tree.children(id).len() >= self.min_children)
    }

    /// Decorate `tree`, with the root at `root_red`.
    ///
    /// `calibration` holds known values for internal nodes (see
    /// [`CalibrationTable::resolve`](crate::red::CalibrationTable::resolve)).
    ///
    /// # Errors
    ///
    /// Returns a [`DecorationError`] if the tree is disconnected, a non-root
    /// node lacks a finite non-negative branch length, or a decorated node
    /// sits on a subtree with no length at all.
    pub fn decorate(
        &self,
        tree: &ReferenceTree,
        calibration: &HashMap<NodeId, f64>,
        root_red: f64,
    ) -> Result<RedTable, DecorationError> {
        if !(0.0..=1.0).contains(&root_red) {
            return Err(DecorationError::InvalidAnchor(root_red));
        }
        let unreachable = tree.unreachable_count();
        if unreachable > 0 {
            return Err(DecorationError::Disconnected { unreachable });
        }

        let root = tree.root();
        let mut lengths = vec![0.0; tree.len()];
        for &id in tree.postorder() {
            if id == root {
                continue;
            }
            let length = tree
                .branch_length(id)
                .ok_or_else(|| DecorationError::MissingBranchLength { node: describe(tree, id) })?;
            if !length.is_finite() || length < 0.0 {
                return Err(DecorationError::InvalidBranchLength {
                    node: describe(tree, id),
                    value: length,
                });
            }
            lengths[id.0] = length;
        }

        let decorated: Vec<bool> = (0..tree.len()).map(|i| self.is_decorated(tree, NodeId(i))).collect();

        // Post-order: mean distance to leaves, and mean distance to the
        // nearest decorated nodes below
        let mut leaf_dist = vec![0.0; tree.len()];
        let mut frontier_dist = vec![0.0; tree.len()];
        for &id in tree.postorder() {
            let children = tree.children(id);
            if children.is_empty() {
                continue;
            }
            let leaves = count_to_f64(tree.leaf_count(id));
            leaf_dist[id.0] = children
                .iter()
                .map(|c| (lengths[c.0] + leaf_dist[c.0]) * count_to_f64(tree.leaf_count(*c)))
                .sum::<f64>()
                / leaves;
            frontier_dist[id.0] = children
                .iter()
                .map(|c| lengths[c.0] + if decorated[c.0] { 0.0 } else { frontier_dist[c.0] })
                .sum::<f64>()
                / count_to_f64(children.len());
        }

        if !tree.is_leaf(root) && leaf_dist[root.0] <= 0.0 {
            return Err(DecorationError::ZeroLengthSubtree { node: describe(tree, root) });
        }

        // Pre-order: decorated nodes, measured from their anchor
        let order = tree.preorder();
        let mut red = vec![0.0; tree.len()];
        let mut anchor = vec![root; tree.len()];
        let mut anchor_dist = vec![0.0; tree.len()];
        red[root.0] = root_red;

        for &id in &order {
            let Some(parent) = tree.parent(id) else { continue };
            if decorated[parent.0] {
                anchor[id.0] = parent;
                anchor_dist[id.0] = lengths[id.0];
            } else {
                anchor[id.0] = anchor[parent.0];
                anchor_dist[id.0] = anchor_dist[parent.0] + lengths[id.0];
            }
            if !decorated[id.0] {
                continue;
            }

            let anchor_red = red[anchor[id.0].0];
            red[id.0] = if tree.is_leaf(id) {
                1.0
            } else if let Some(&calibrated) = calibration.get(&id) {
                clamp_calibrated(tree, id, calibrated, anchor_red)
            } else {
                let d = anchor_dist[id.0];
                let denom = d + leaf_dist[id.0];
                if denom <= 0.0 {
                    return Err(DecorationError::ZeroLengthSubtree { node: describe(tree, id) });
                }
                anchor_red + d / denom * (1.0 - anchor_red)
            };
        }

        // Lowest RED among the decorated nodes directly below each node
        let mut frontier_min = vec![1.0f64; tree.len()];
        for &id in tree.postorder() {
            frontier_min[id.0] = tree
                .children(id)
                .iter()
                .map(|c| if decorated[c.0] { red[c.0] } else { frontier_min[c.0] })
                .fold(1.0, f64::min);
        }

        let mut interpolated = 0usize;
        for &id in &order {
            if decorated[id.0] {
                continue;
            }
            let Some(parent) = tree.parent(id) else { continue };
            let lower = red[anchor[id.0].0];
            let upper = frontier_min[id.0];
            let d = anchor_dist[id.0];
            let span = d + frontier_dist[id.0];
            let t = if span > 0.0 { d / span } else { 0.0 };
            let raw = lower + t * (upper - lower);
            let snapped = (raw / self.interval).round() * self.interval;
            red[id.0] = snapped.clamp(red[parent.0], upper.max(red[parent.0]));
            interpolated += 1;
        }

        debug!(
            "Decorated {} nodes, interpolated {interpolated}",
            tree.postorder().len() - interpolated
        );
        Ok(RedTable::from_values(red))
    }
}

fn clamp_calibrated(tree: &ReferenceTree, id: NodeId, value: f64, anchor_red: f64) -> f64 {
    if value < anchor_red {
        warn!(
            "Calibrated RED {value} at {} is below its ancestor ({anchor_red}); clamping",
            describe(tree, id)
        );
        anchor_red
    } else if value > 1.0 {
        warn!("Calibrated RED {value} at {} exceeds 1.0; clamping", describe(tree, id));
        1.0
    } else {
        value
    }
}

fn describe(tree: &ReferenceTree, id: NodeId) -> String {
    match tree.name(id) {
        Some(name) => format!("'{name}'"),
        None => format!("node {id}"),
    }
}
