//! Query classification.
//!
//! - [`placement`]: placement record to RED and lineage
//! - [`species`]: ANI/AF species calls
//! - [`batch`]: high/low confidence split and iterative refinement
//! - [`placer`]: the seam to external placement tools
//! - [`pool`]: memory-bounded worker pool
//! - [`pipeline`]: one domain run end to end

use crate::core::taxonomy::Taxonomy;
use crate::core::tree::ReferenceTree;
use crate::core::types::Domain;
use crate::red::{CalibrationTable, RankBoundaries, RedTable};

pub mod batch;
pub mod pipeline;
pub mod placement;
pub mod placer;
pub mod pool;
pub mod species;

pub use batch::{BatchError, BatchIteration, BatchOutcome, BatchSplitter, IterationLedger};
pub use pipeline::{DomainInputs, DomainPipeline, DomainRun, PipelineError};
pub use placement::{Placement, PlacementClassifier, PlacementError, PlacementRecord};
pub use placer::{NoPlacer, Placer, TablePlacer};
pub use pool::WorkerPool;
pub use species::{RadiusTable, SimilarityRecord, SpeciesResolver};

/// Read-only reference state shared by every query of one domain
#[derive(Debug, Clone, Copy)]
pub struct ReferenceContext<'a> {
    pub domain: Domain,
    pub tree: &'a ReferenceTree,
    /// RED of the full reference tree
    pub red: &'a RedTable,
    pub calibration: &'a CalibrationTable,
    pub boundaries: &'a RankBoundaries,
    pub taxonomy: &'a Taxonomy,
}
