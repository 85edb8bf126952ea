//! Marker-gene hit resolution.
//!
//! HMM searches report every profile that matches a gene. Before the
//! per-genome marker alignment is built, hits are collapsed so that each
//! locus contributes at most one marker, and loci whose best two profiles
//! score too closely are dropped altogether:
//!
//! | Situation on one locus | Outcome |
//! |------------------------|---------|
//! | single hit | retained |
//! | overlapping hits, gap ≥ threshold | best hit retained |
//! | overlapping hits, gap < threshold | locus excluded, flagged ambiguous |
//!
//! A genome with fewer usable markers than its domain's floor is reported as
//! having insufficient markers and skipped by the rest of the pipeline.

use serde::{Deserialize, Serialize};

use crate::core::types::{Domain, GenomeId};

pub mod resolver;

pub use resolver::{identify_domain, usability_floor, MarkerHitResolver, MarkerStatus, MarkerSummary};

/// One profile-HMM hit on a gene of a genome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerHit {
    pub genome: GenomeId,
    /// Gene (or contig region) identifier the profile matched
    pub locus: String,
    pub hmm_id: String,
    /// Domain whose marker set the search was run against, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    pub bit_score: f64,
    pub start: u64,
    pub end: u64,
}

impl MarkerHit {
    pub fn new(
        genome: impl Into<String>,
        locus: impl Into<String>,
        hmm_id: impl Into<String>,
        bit_score: f64,
        start: u64,
        end: u64,
    ) -> Self {
        Self {
            genome: GenomeId::new(genome),
            locus: locus.into(),
            hmm_id: hmm_id.into(),
            domain: None,
            bit_score,
            start,
            end,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Do the two hits share any coordinate?
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}
