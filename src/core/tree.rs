//! Arena representation of a rooted reference tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TreeError {
    #[error("Tree has no nodes")]
    Empty,

    #[error("Node 0 must be the root but has parent {0}")]
    RootHasParent(usize),

    #[error("Node {node} references parent {parent} which does not exist")]
    InvalidParent { node: usize, parent: usize },
}

/// Index of a node in a [`ReferenceTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single node as supplied to [`ReferenceTree::from_nodes`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeNode {
    /// Leaf genome id, or internal node label
    pub name: Option<String>,
    pub parent: Option<NodeId>,
    /// Length of the branch above this node
    pub branch_length: Option<f64>,
    /// Bootstrap or other support value
    pub support: Option<f64>,
}

impl TreeNode {
    pub fn new(parent: Option<NodeId>, branch_length: Option<f64>) -> Self {
        Self {
            name: None,
            parent,
            branch_length,
            support: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_support(mut self, support: f64) -> Self {
        self.support = Some(support);
        self
    }
}

/// A rooted tree. Node 0 is the root; children are derived from parent
/// pointers, so nodes with no path to the root are kept but never traversed.
#[derive(Debug, Clone)]
pub struct ReferenceTree {
    nodes: Vec<TreeNode>,
    children: Vec<Vec<NodeId>>,
    /// Nodes reachable from the root, children before parents
    postorder: Vec<NodeId>,
    leaf_counts: Vec<usize>,
    /// Edge id -> node below the edge (post-order, root excluded)
    edges: Vec<NodeId>,
    edge_of: Vec<Option<usize>>,
    name_index: HashMap<String, NodeId>,
}

impl ReferenceTree {
    /// Build a tree from nodes whose parent pointers reference earlier or
    /// later entries of the same vector.
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Result<Self, TreeError> {
        if nodes.is_empty() {
            return Err(TreeError::Empty);
        }
        if let Some(parent) = nodes[0].parent {
            return Err(TreeError::RootHasParent(parent.0));
        }

        let mut children = vec![Vec::new(); nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                if parent.0 >= nodes.len() || parent.0 == i {
                    return Err(TreeError::InvalidParent {
                        node: i,
                        parent: parent.0,
                    });
                }
                children[parent.0].push(NodeId(i));
            }
        }

        // Iterative post-order from the root; every reachable node has a
        // single parent so it is visited exactly once
        let mut postorder = Vec::with_capacity(nodes.len());
        let mut stack = vec![(NodeId(0), false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                postorder.push(id);
            } else {
                stack.push((id, true));
                for &child in children[id.0].iter().rev() {
                    stack.push((child, false));
                }
            }
        }

        let mut leaf_counts = vec![0usize; nodes.len()];
        for &id in &postorder {
            leaf_counts[id.0] = if children[id.0].is_empty() {
                1
            } else {
                children[id.0].iter().map(|c| leaf_counts[c.0]).sum()
            };
        }

        let mut edges = Vec::with_capacity(postorder.len().saturating_sub(1));
        let mut edge_of = vec![None; nodes.len()];
        for &id in &postorder {
            if id.0 != 0 {
                edge_of[id.0] = Some(edges.len());
                edges.push(id);
            }
        }

        let mut name_index = HashMap::new();
        for &id in &postorder {
            if let Some(name) = &nodes[id.0].name {
                name_index.entry(name.clone()).or_insert(id);
            }
        }

        Ok(Self {
            nodes,
            children,
            postorder,
            leaf_counts,
            edges,
            edge_of,
            name_index,
        })
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Total number of nodes, including unreachable ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].name.as_deref()
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.children[id.0]
    }

    #[must_use]
    pub fn branch_length(&self, id: NodeId) -> Option<f64> {
        self.nodes[id.0].branch_length
    }

    #[must_use]
    pub fn support(&self, id: NodeId) -> Option<f64> {
        self.nodes[id.0].support
    }

    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.children[id.0].is_empty()
    }

    /// Number of leaves below (or at) a node
    #[must_use]
    pub fn leaf_count(&self, id: NodeId) -> usize {
        self.leaf_counts[id.0]
    }

    /// Reachable nodes, children before parents
    #[must_use]
    pub fn postorder(&self) -> &[NodeId] {
        &self.postorder
    }

    /// Reachable nodes, parents before children
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.postorder.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            for &child in self.children[id.0].iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Nodes that cannot be reached from the root
    #[must_use]
    pub fn unreachable_count(&self) -> usize {
        self.nodes.len() - self.postorder.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Node directly below an edge
    #[must_use]
    pub fn node_for_edge(&self, edge: usize) -> Option<NodeId> {
        self.edges.get(edge).copied()
    }

    #[must_use]
    pub fn edge_for_node(&self, id: NodeId) -> Option<usize> {
        self.edge_of.get(id.0).copied().flatten()
    }

    /// Look up a node by leaf name or internal label
    #[must_use]
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.name_index.get(name).copied()
    }

    /// Leaves below (or at) a node, in left-to-right order
    #[must_use]
    pub fn leaves_under(&self, id: NodeId) -> Vec<NodeId> {
        let mut leaves = Vec::with_capacity(self.leaf_counts[id.0]);
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if self.is_leaf(n) {
                leaves.push(n);
            } else {
                for &child in self.children[n.0].iter().rev() {
                    stack.push(child);
                }
            }
        }
        leaves
    }

    /// Ancestors of a node, nearest first, excluding the node itself
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Raise a node by up to `levels` ancestors, stopping at the root
    #[must_use]
    pub fn raise(&self, id: NodeId, levels: usize) -> NodeId {
        let mut node = id;
        for _ in 0..levels {
            match self.parent(node) {
                Some(parent) => node = parent,
                None => break,
            }
        }
        node
    }

    /// Sum of branch lengths from `ancestor` down to `descendant`.
    ///
    /// Returns `None` if `ancestor` is not an ancestor of `descendant` or a
    /// branch length on the path is missing.
    #[must_use]
    pub fn path_length(&self, ancestor: NodeId, descendant: NodeId) -> Option<f64> {
        let mut total = 0.0;
        let mut node = descendant;
        while node != ancestor {
            total += self.branch_length(node)?;
            node = self.parent(node)?;
        }
        Some(total)
    }

    /// Most recent common ancestor of a set of nodes
    #[must_use]
    pub fn lca(&self, nodes: &[NodeId]) -> Option<NodeId> {
        let (first, rest) = nodes.split_first()?;
        let mut path: Vec<NodeId> = std::iter::once(*first).chain(self.ancestors(*first)).collect();
        for &other in rest {
            let other_path: std::collections::HashSet<NodeId> =
                std::iter::once(other).chain(self.ancestors(other)).collect();
            let keep = path.iter().position(|n| other_path.contains(n))?;
            path.drain(..keep);
        }
        path.first().copied()
    }

    /// Tree induced on a set of leaves, rooted at their LCA.
    ///
    /// Unary internal nodes are collapsed and their branch lengths summed into
    /// the surviving child. Returns the new tree together with the mapping
    /// from new node ids to ids in `self`.
    pub fn induced_subtree(&self, leaves: &[NodeId]) -> Result<(ReferenceTree, Vec<NodeId>), TreeError> {
        let mut selected = vec![0usize; self.nodes.len()];
        for &leaf in leaves {
            if self.is_leaf(leaf) {
                selected[leaf.0] = 1;
            }
        }
        for &id in &self.postorder {
            if !self.is_leaf(id) {
                selected[id.0] = self.children[id.0].iter().map(|c| selected[c.0]).sum();
            }
        }
        if selected[self.root().0] == 0 {
            return Err(TreeError::Empty);
        }

        // Descend while only one child carries selected leaves
        let mut top = self.root();
        loop {
            let mut kept = self.children[top.0].iter().filter(|c| selected[c.0] > 0);
            match (kept.next(), kept.next()) {
                (Some(&only), None) => top = only,
                _ => break,
            }
        }

        let mut nodes = Vec::new();
        let mut mapping = Vec::new();
        // (original node, new parent, branch length accumulated from new parent)
        let mut stack: Vec<(NodeId, Option<NodeId>, Option<f64>)> = vec![(top, None, None)];
        while let Some((orig, new_parent, carried)) = stack.pop() {
            let kept: Vec<NodeId> = self.children[orig.0]
                .iter()
                .copied()
                .filter(|c| selected[c.0] > 0)
                .collect();

            if new_parent.is_some() && kept.len() == 1 {
                let child = kept[0];
                let length = carried.zip(self.branch_length(child)).map(|(a, b)| a + b);
                stack.push((child, new_parent, length));
                continue;
            }

            let new_id = NodeId(nodes.len());
            let source = &self.nodes[orig.0];
            nodes.push(TreeNode {
                name: source.name.clone(),
                parent: new_parent,
                branch_length: if new_parent.is_some() { carried } else { None },
                support: source.support,
            });
            mapping.push(orig);

            for &child in kept.iter().rev() {
                stack.push((child, Some(new_id), self.branch_length(child)));
            }
        }

        Ok((ReferenceTree::from_nodes(nodes)?, mapping))
    }
}
