//! Relative Evolutionary Divergence (RED).
//!
//! RED places every node of a rooted tree on a `[0, 1]` scale: the root is
//! 0, leaves are 1, and internal nodes sit in between in proportion to how
//! far they are from the root relative to the leaves below them. Taxonomic
//! ranks correspond to characteristic RED values, which is what makes a
//! placement's RED usable as a rank estimate.
//!
//! - [`RedDecorator`] computes a [`RedTable`] for a tree
//! - [`CalibrationTable`] holds precomputed values for known clades
//! - [`RankBoundaries`] maps a RED value to a rank

use thiserror::Error;

pub mod boundaries;
pub mod calibration;
pub mod decorator;
pub mod table;

pub use boundaries::RankBoundaries;
pub use calibration::CalibrationTable;
pub use decorator::RedDecorator;
pub use table::RedTable;

#[derive(Error, Debug, PartialEq)]
pub enum DecorationError {
    #[error("Tree is disconnected: {unreachable} nodes cannot be reached from the root")]
    Disconnected { unreachable: usize },

    #[error("Subtree at {node} has zero total branch length")]
    ZeroLengthSubtree { node: String },

    #[error("Node {node} has no branch length")]
    MissingBranchLength { node: String },

    #[error("Node {node} has invalid branch length {value}")]
    InvalidBranchLength { node: String, value: f64 },

    #[error("Anchor RED {0} is outside [0, 1]")]
    InvalidAnchor(f64),
}
