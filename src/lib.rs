//! # redtax
//!
//! A library for assigning rank-qualified taxonomy to prokaryotic genomes.
//!
//! A query genome's placement on a fixed reference tree says where it
//! branches off, but not at which rank: branch lengths vary wildly between
//! lineages. `redtax` normalizes the tree with Relative Evolutionary
//! Divergence (RED) so that a placement's depth can be compared against
//! empirical rank boundaries, then confirms species with ANI.
//!
//! ## Features
//!
//! - **Integrity gate**: reference data is verified (digests, release) before use
//! - **Marker resolution**: ambiguous multi-hit loci are excluded per genome
//! - **RED decoration**: calibrated and interpolated RED at every tree node
//! - **Two-tier batching**: confident placements in one pass, ambiguous ones
//!   refined iteratively on reduced trees, resumable from disk
//! - **Species calls**: ANI/AF against references of the assigned genus
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use redtax::classify::{DomainInputs, DomainPipeline, NoPlacer};
//! use redtax::config::{DomainDescriptor, PipelineConfig};
//! use redtax::parsing::tsv::{parse_file, parse_placements, parse_taxonomy};
//! use redtax::{integrity, Domain};
//!
//! let config = PipelineConfig::default();
//! let reference = integrity::verify(Path::new("/data/r207"), None, &config.min_ref_data_version).unwrap();
//! let descriptor = DomainDescriptor::load(&reference, Domain::Bacteria).unwrap();
//! let taxonomy = parse_file(&reference.layout().taxonomy_file(), parse_taxonomy).unwrap();
//!
//! let inputs = DomainInputs {
//!     placements: parse_file(Path::new("bac120.placements.tsv"), parse_placements).unwrap(),
//!     ..DomainInputs::default()
//! };
//! let run = DomainPipeline::new(&descriptor, &taxonomy, &config)
//!     .run(inputs, &NoPlacer)
//!     .unwrap();
//!
//! for a in &run.assignments {
//!     println!("{}\t{}", a.query, a.lineage);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`integrity`]: Reference data verification
//! - [`config`]: Thresholds, data layout and domain descriptors
//! - [`core`]: Lineages, trees and assignments
//! - [`markers`]: Marker hit resolution
//! - [`red`]: RED decoration
//! - [`classify`]: Placement classification, batching and species calls
//! - [`parsing`]: Newick, reference package and table parsers
//! - [`output`]: Summary tables and the iteration store
//! - [`cli`]: Command-line interface implementation

pub mod classify;
pub mod cli;
pub mod config;
pub mod core;
pub mod integrity;
pub mod markers;
pub mod output;
pub mod parsing;
pub mod red;
pub mod utils;

// Re-export commonly used types for convenience
pub use classify::{DomainPipeline, Placer};
pub use config::{DomainDescriptor, PipelineConfig};
pub use crate::core::assignment::TaxonomicAssignment;
pub use crate::core::lineage::Lineage;
pub use crate::core::tree::ReferenceTree;
pub use crate::core::types::*;
pub use integrity::VerifiedReference;
pub use red::RedTable;
