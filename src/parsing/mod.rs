//! Parsers for reference data and externally produced records.
//!
//! This module provides parsers for:
//!
//! - **Newick trees**: reference and reduced placement trees
//! - **Reference packages**: `CONTENTS.json` manifests naming the tree file
//! - **Tables**: taxonomy, type-strain radii, RED calibrations, placements,
//!   similarities and marker hits
//!
//! ## Tables
//!
//! All tables are tab-separated. Blank lines and lines starting with `#` are
//! skipped, an optional header line is detected and skipped, and files ending
//! in `.gz` are decompressed on the fly.
//!
//! | Table | Columns |
//! |-------|---------|
//! | taxonomy | genome, lineage |
//! | radii | genome, ANI radius |
//! | calibration | node key, RED |
//! | placements | query, edge, distal length, pendant length, \[confidence\] |
//! | similarities | query, reference, ANI, AF |
//! | marker hits | genome, locus, HMM, domain, bit score, start, end |

use thiserror::Error;

pub mod newick;
pub mod refpkg;
pub mod tsv;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid Newick at byte {position}: {message}")]
    Newick { position: usize, message: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Too many records: {0} exceeds maximum allowed")]
    TooManyRecords(usize),

    #[error(transparent)]
    Tree(#[from] crate::core::tree::TreeError),
}
