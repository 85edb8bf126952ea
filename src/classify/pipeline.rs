//! One domain run, end to end.
//!
//! The same pipeline serves both domains; everything domain-specific comes
//! from the [`DomainDescriptor`]:
//!
//! 1. fail queries placed more than once, then gate the rest on their
//!    marker hits (when supplied)
//! 2. decorate the reference tree with RED
//! 3. split placements by confidence; classify the confident ones in one pass
//! 4. refine the rest iteratively
//! 5. resolve species from ANI/AF and sort by query id

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::AtomicBool;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classify::batch::{duplicate_failure, partition, split_duplicates, BatchError, BatchSplitter};
use crate::classify::placement::{PlacementClassifier, PlacementRecord};
use crate::classify::placer::Placer;
use crate::classify::pool::{PoolError, WorkerPool};
use crate::classify::species::{RadiusTable, SimilarityRecord, SpeciesResolver};
use crate::classify::ReferenceContext;
use crate::config::markers::MarkerSet;
use crate::config::{ConfigError, DomainDescriptor, PipelineConfig};
use crate::core::assignment::TaxonomicAssignment;
use crate::core::taxonomy::Taxonomy;
use crate::core::types::{Domain, GenomeId};
use crate::markers::{identify_domain, MarkerHit, MarkerHitResolver, MarkerSummary};
use crate::output::store::{write_red_once, IterationStore};
use crate::red::{DecorationError, RedDecorator};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Decoration(#[from] DecorationError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Per-run query data for one domain
#[derive(Debug, Clone, Default)]
pub struct DomainInputs<'a> {
    pub placements: Vec<PlacementRecord>,
    pub similarities: &'a [SimilarityRecord],
    /// Raw HMM hits; when present, queries are gated on their markers
    pub marker_hits: Option<&'a [MarkerHit]>,
}

/// Result of one domain run
#[derive(Debug)]
pub struct DomainRun {
    pub domain: Domain,
    /// Sorted by query id
    pub assignments: Vec<TaxonomicAssignment>,
    pub high_confidence: usize,
    pub low_confidence: usize,
    /// Refinement iterations completed (or reused)
    pub iterations: usize,
    pub suspended_at: Option<usize>,
}

/// Drives a full classification of one domain's queries
pub struct DomainPipeline<'a> {
    descriptor: &'a DomainDescriptor,
    taxonomy: &'a Taxonomy,
    radii: Option<&'a RadiusTable>,
    config: &'a PipelineConfig,
    store: Option<&'a IterationStore>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> DomainPipeline<'a> {
    #[must_use]
    pub fn new(descriptor: &'a DomainDescriptor, taxonomy: &'a Taxonomy, config: &'a PipelineConfig) -> Self {
        Self {
            descriptor,
            taxonomy,
            radii: None,
            config,
            store: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_radii(mut self, radii: &'a RadiusTable) -> Self {
        self.radii = Some(radii);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: &'a IterationStore) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Classify every query in `inputs`.
    ///
    /// Every query gets exactly one assignment. Per-query problems (duplicate
    /// or malformed placements, too few markers, unstable refinement) become
    /// failed or unclassified assignments; only problems with the reference
    /// state abort the run.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Decoration` if the reference tree cannot be
    /// decorated, `PipelineError::Pool` if workers cannot be started, and
    /// `PipelineError::Batch` if refinement fails as a whole.
    pub fn run(&self, inputs: DomainInputs<'_>, placer: &dyn Placer) -> Result<DomainRun, PipelineError> {
        let domain = self.descriptor.domain();
        let tree = &self.descriptor.package().tree;
        let (placements, duplicates) = split_duplicates(inputs.placements);
        let mut assignments: Vec<TaxonomicAssignment> = duplicates
            .into_iter()
            .map(|(query, count)| duplicate_failure(query, domain, count))
            .collect();

        let placements = match inputs.marker_hits {
            Some(hits) => {
                let (kept, failed) = self.gate_on_markers(placements, hits);
                assignments.extend(failed);
                kept
            }
            None => placements,
        };

        let calibration = self.descriptor.calibration().resolve(tree);
        let red = RedDecorator::new(self.config).decorate(tree, &calibration, 0.0)?;
        if let Some(store) = self.store {
            write_red_once(&store.layout().high_red_file(domain), &red, tree)?;
        }

        let split = partition(placements, tree, self.config.high_confidence_threshold);
        let high_confidence = split.high.len();
        let low_confidence = split.low.len();
        info!("{domain}: {high_confidence} high-confidence and {low_confidence} low-confidence placements");

        let pool = WorkerPool::for_domain(self.descriptor.min_memory_gb(), self.config)?;
        let reference = ReferenceContext {
            domain,
            tree,
            red: &red,
            calibration: self.descriptor.calibration(),
            boundaries: self.descriptor.boundaries(),
            taxonomy: self.taxonomy,
        };

        let classifier = PlacementClassifier::new(tree, &red, reference.boundaries, self.taxonomy);
        let single_pass: Vec<TaxonomicAssignment> = pool.install(|| {
            split
                .high
                .par_iter()
                .map(|record| match classifier.classify(record) {
                    Ok(p) => TaxonomicAssignment::from_placement(record.query.clone(), domain, p.lineage, p.red),
                    Err(e) => {
                        warn!("{e}");
                        TaxonomicAssignment::failed(record.query.clone(), domain, e.to_string())
                    }
                })
                .collect()
        });
        assignments.extend(single_pass);

        let mut splitter = BatchSplitter::new(reference, self.config);
        if let Some(store) = self.store {
            splitter = splitter.with_store(store);
        }
        if let Some(flag) = self.cancel {
            splitter = splitter.with_cancellation(flag);
        }
        let refined = splitter.refine(&split.low, placer, &pool)?;
        assignments.extend(refined.assignments);

        let mut by_query: HashMap<&GenomeId, Vec<&SimilarityRecord>> = HashMap::new();
        for record in inputs.similarities {
            by_query.entry(&record.query).or_default().push(record);
        }
        let resolver = SpeciesResolver::new(self.taxonomy, self.radii, self.config);
        let mut assignments: Vec<TaxonomicAssignment> = assignments
            .into_iter()
            .map(|a| {
                let records = by_query.get(&a.query).map(Vec::as_slice).unwrap_or_default();
                resolver.resolve(a, records.iter().copied())
            })
            .collect();
        assignments.sort_by(|a, b| a.query.cmp(&b.query));

        Ok(DomainRun {
            domain,
            assignments,
            high_confidence,
            low_confidence,
            iterations: refined.ledger.len(),
            suspended_at: refined.suspended_at,
        })
    }

    /// Drop placements of genomes that belong to the other domain and fail
    /// those without enough markers for this one
    fn gate_on_markers(
        &self,
        placements: Vec<PlacementRecord>,
        hits: &[MarkerHit],
    ) -> (Vec<PlacementRecord>, Vec<TaxonomicAssignment>) {
        let domain = self.descriptor.domain();
        let other = match domain {
            Domain::Bacteria => Domain::Archaea,
            Domain::Archaea => Domain::Bacteria,
        };
        let other_markers = MarkerSet::for_domain(other);
        let own = MarkerHitResolver::new(domain, self.descriptor.markers(), self.config).resolve(hits);
        let theirs = MarkerHitResolver::new(other, &other_markers, self.config).resolve(hits);

        let mut summaries: BTreeMap<GenomeId, Vec<MarkerSummary>> = BTreeMap::new();
        for summary in own.into_iter().chain(theirs) {
            summaries.entry(summary.genome.clone()).or_default().push(summary);
        }

        let mut kept = Vec::new();
        let mut failed = Vec::new();
        let mut seen = HashSet::new();
        for record in placements {
            let Some(genome) = summaries.get(&record.query) else {
                if seen.insert(record.query.clone()) {
                    failed.push(TaxonomicAssignment::failed(record.query, domain, "no marker hits"));
                }
                continue;
            };
            match identify_domain(genome) {
                Some(d) if d == domain => kept.push(record),
                Some(d) => debug!("{} belongs to {d}; skipping", record.query),
                None => {
                    if seen.insert(record.query.clone()) {
                        let summary = genome.iter().find(|s| s.domain == domain);
                        let found = summary.map_or(0, MarkerSummary::usable_markers);
                        failed.push(TaxonomicAssignment::failed(
                            record.query,
                            domain,
                            format!("insufficient markers ({found} of {})", self.descriptor.markers().len()),
                        ));
                    }
                }
            }
        }
        if !failed.is_empty() {
            info!("{domain}: {} queries failed marker gating", failed.len());
        }
        (kept, failed)
    }
}
