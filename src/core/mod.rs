//! Core data types for taxonomic assignment.
//!
//! - [`GenomeId`], [`Domain`], [`Rank`]: identifiers and taxonomic vocabulary
//! - [`Lineage`]: a rank-qualified lineage in GTDB notation
//! - [`ReferenceTree`]: arena-backed rooted reference tree
//! - [`Taxonomy`]: reference genome to lineage lookup
//! - [`TaxonomicAssignment`]: the final label produced for a query genome
//!
//! ## Lineage notation
//!
//! Lineages are rendered with one prefixed field per rank, keeping the prefix
//! for ranks that are not assigned:
//!
//! | Rank | Prefix | Example |
//! |------|--------|---------|
//! | domain | `d__` | `d__Bacteria` |
//! | phylum | `p__` | `p__Firmicutes` |
//! | genus | `g__` | `g__Bacillus` |
//! | species | `s__` | `s__Bacillus subtilis` |
//!
//! [`GenomeId`]: types::GenomeId
//! [`Domain`]: types::Domain
//! [`Rank`]: types::Rank
//! [`Lineage`]: lineage::Lineage
//! [`ReferenceTree`]: tree::ReferenceTree
//! [`Taxonomy`]: taxonomy::Taxonomy
//! [`TaxonomicAssignment`]: assignment::TaxonomicAssignment

pub mod assignment;
pub mod lineage;
pub mod taxonomy;
pub mod tree;
pub mod types;
