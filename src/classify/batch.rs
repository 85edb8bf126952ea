//! Batch splitter: single-pass classification for confident placements,
//! iterative refinement for the rest.
//!
//! Low-confidence queries are refined in numbered iterations starting at 1.
//! Each iteration builds a reduced reference tree around the queries' current
//! clades, decorates it with RED (anchored at the global RED of its root),
//! asks a [`Placer`] to place the queries on it and classifies the result.
//! A query whose clade (its lineage string) is the same as in the previous
//! iteration is final; iteration 0 is the placement on the full tree.
//!
//! Iterations form an append-only [`IterationLedger`]. With an
//! [`IterationStore`] attached every iteration is persisted as it completes,
//! so a cancelled or suspended run resumes from the last persisted index.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classify::placement::{Placement, PlacementClassifier, PlacementRecord};
use crate::classify::placer::Placer;
use crate::classify::pool::WorkerPool;
use crate::classify::ReferenceContext;
use crate::config::PipelineConfig;
use crate::core::assignment::TaxonomicAssignment;
use crate::core::lineage::Lineage;
use crate::core::tree::{NodeId, ReferenceTree, TreeError};
use crate::core::types::{Domain, GenomeId};
use crate::output::store::IterationStore;
use crate::parsing::refpkg::{PackageContents, ReferencePackage};
use crate::parsing::ParseError;
use crate::red::{DecorationError, RedDecorator, RedTable};
use crate::utils::validation::compute_signature;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Placements for iteration {iteration} are not available yet")]
    PlacementsUnavailable { iteration: usize },

    #[error("Placement failed at iteration {iteration}: {message}")]
    Placer { iteration: usize, message: String },

    #[error("Persisted iteration {iteration} does not match this run: {reason}")]
    LedgerMismatch { iteration: usize, reason: String },

    #[error(transparent)]
    Decoration(#[from] DecorationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Placements split by confidence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Split {
    pub high: Vec<PlacementRecord>,
    pub low: Vec<PlacementRecord>,
}

/// Split placements into high- and low-confidence sets.
///
/// High confidence means the record is well formed, its edge exists in
/// `tree` and its confidence is at least `threshold`. Records without a
/// confidence score are taken as high confidence, since nothing could drive
/// their refinement. Everything else goes to the low set, where malformed
/// records fail before the first iteration.
#[must_use]
pub fn partition(records: Vec<PlacementRecord>, tree: &ReferenceTree, threshold: f64) -> Split {
    let (high, low) = records.into_iter().partition(|r: &PlacementRecord| {
        !r.is_malformed()
            && tree.node_for_edge(r.edge).is_some()
            && r.confidence.map_or(true, |c| c >= threshold)
    });
    Split { high, low }
}

/// Separate queries placed more than once.
///
/// A query with several records cannot be given a single label, so all of
/// its records are dropped; it is returned with its record count.
#[must_use]
pub fn split_duplicates(records: Vec<PlacementRecord>) -> (Vec<PlacementRecord>, Vec<(GenomeId, usize)>) {
    let mut counts: BTreeMap<GenomeId, usize> = BTreeMap::new();
    for record in &records {
        *counts.entry(record.query.clone()).or_default() += 1;
    }
    let unique = records
        .into_iter()
        .filter(|r| counts.get(&r.query) == Some(&1))
        .collect();
    let duplicates = counts.into_iter().filter(|&(_, n)| n > 1).collect();
    (unique, duplicates)
}

/// Failed assignment for a query placed `count` times
#[must_use]
pub fn duplicate_failure(query: GenomeId, domain: Domain, count: usize) -> TaxonomicAssignment {
    warn!("{query}: {count} placement records; the query is not classified");
    TaxonomicAssignment::failed(query, domain, format!("duplicate placement ({count} records)"))
}

/// Where a query currently sits, in reference tree coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CladeState {
    pub lineage: Lineage,
    pub red: f64,
    pub parent: NodeId,
    pub child: NodeId,
}

impl CladeState {
    /// Translate a placement on a (possibly reduced) tree; `mapping` maps
    /// reduced node ids to reference node ids
    fn from_placement(placement: &Placement, mapping: Option<&[NodeId]>) -> Self {
        let map = |id: NodeId| {
            mapping
                .and_then(|m| m.get(id.0).copied())
                .unwrap_or(id)
        };
        Self {
            lineage: placement.lineage.clone(),
            red: placement.red,
            parent: map(placement.parent),
            child: map(placement.child),
        }
    }

    /// Clade label used to detect convergence
    #[must_use]
    pub fn clade(&self) -> String {
        self.lineage.to_string()
    }
}

/// Result of one query in one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberOutcome {
    pub query: GenomeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<CladeState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MemberOutcome {
    fn placed(query: GenomeId, state: CladeState) -> Self {
        Self {
            query,
            state: Some(state),
            error: None,
        }
    }

    fn failed(query: GenomeId, error: String) -> Self {
        Self {
            query,
            state: None,
            error: Some(error),
        }
    }
}

/// One refinement iteration: its members, reduced package and RED table
#[derive(Debug, Clone)]
pub struct BatchIteration {
    pub index: usize,
    pub created_at: DateTime<Utc>,
    /// Sorted by id
    pub members: Vec<GenomeId>,
    pub package: ReferencePackage,
    pub red: RedTable,
    /// Reduced node id -> reference node id
    pub mapping: Vec<NodeId>,
    pub outcomes: Vec<MemberOutcome>,
}

/// Append-only sequence of iterations, indexed from 1
#[derive(Debug, Clone, Default)]
pub struct IterationLedger {
    iterations: Vec<BatchIteration>,
}

impl IterationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next iteration must carry
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.iterations.len() + 1
    }

    fn push(&mut self, iteration: BatchIteration) {
        debug_assert_eq!(iteration.index, self.next_index());
        self.iterations.push(iteration);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&BatchIteration> {
        index.checked_sub(1).and_then(|i| self.iterations.get(i))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchIteration> {
        self.iterations.iter()
    }

    /// Last iteration each query took part in
    #[must_use]
    pub fn query_iterations(&self) -> BTreeMap<GenomeId, usize> {
        let mut map = BTreeMap::new();
        for iteration in &self.iterations {
            for member in &iteration.members {
                map.insert(member.clone(), iteration.index);
            }
        }
        map
    }
}

/// Everything the refinement loop produced
#[derive(Debug)]
pub struct BatchOutcome {
    /// One assignment per distinct low-confidence query, sorted by query id
    pub assignments: Vec<TaxonomicAssignment>,
    pub ledger: IterationLedger,
    /// Iteration the run stopped before, when cancelled or waiting on placements
    pub suspended_at: Option<usize>,
}

struct Track {
    previous: Option<CladeState>,
    current: CladeState,
}

/// Drives iterative refinement of low-confidence placements
pub struct BatchSplitter<'a> {
    reference: ReferenceContext<'a>,
    config: &'a PipelineConfig,
    decorator: RedDecorator,
    store: Option<&'a IterationStore>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> BatchSplitter<'a> {
    #[must_use]
    pub fn new(reference: ReferenceContext<'a>, config: &'a PipelineConfig) -> Self {
        Self {
            reference,
            config,
            decorator: RedDecorator::new(config),
            store: None,
            cancel: None,
        }
    }

    /// Persist iterations to, and resume them from, `store`
    #[must_use]
    pub fn with_store(mut self, store: &'a IterationStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Stop before the next iteration once `flag` is set
    #[must_use]
    pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Refine low-confidence placements until every query is stable, the
    /// iteration bound is reached, or the run is suspended.
    ///
    /// Malformed placements fail only their own query. Queries still
    /// changing clade at the bound are reported unclassified with the
    /// lineage shared by their last two placements.
    ///
    /// # Errors
    ///
    /// Returns a [`BatchError`] if the reduced trees cannot be built or
    /// decorated, persisted iterations disagree with this run, or the placer
    /// fails.
    pub fn refine(
        &self,
        low: &[PlacementRecord],
        placer: &dyn Placer,
        pool: &WorkerPool,
    ) -> Result<BatchOutcome, BatchError> {
        let r = &self.reference;
        let (low, duplicates) = split_duplicates(low.to_vec());
        let mut assignments: Vec<TaxonomicAssignment> = duplicates
            .into_iter()
            .map(|(query, count)| duplicate_failure(query, r.domain, count))
            .collect();

        let classifier = PlacementClassifier::new(r.tree, r.red, r.boundaries, r.taxonomy);
        let initial: Vec<_> = pool.install(|| {
            low.par_iter()
                .map(|record| (record.query.clone(), classifier.classify(record)))
                .collect()
        });

        let mut active: BTreeMap<GenomeId, Track> = BTreeMap::new();
        for (query, result) in initial {
            match result {
                Ok(placement) => {
                    let current = CladeState::from_placement(&placement, None);
                    active.insert(query, Track { previous: None, current });
                }
                Err(e) => {
                    warn!("{e}");
                    assignments.push(TaxonomicAssignment::failed(query, r.domain, e.to_string()));
                }
            }
        }

        let mut ledger = IterationLedger::new();
        let mut suspended_at = None;

        while !active.is_empty() && ledger.next_index() <= self.config.max_iterations {
            let index = ledger.next_index();
            if self.cancelled() {
                info!("Cancelled before iteration {index}");
                suspended_at = Some(index);
                break;
            }

            let members: Vec<GenomeId> = active.keys().cloned().collect();
            let batch = match self.load_or_run(index, &members, &active, placer, pool) {
                Ok(batch) => batch,
                Err(BatchError::PlacementsUnavailable { iteration }) => {
                    info!("Suspending before iteration {iteration}: placements not available");
                    suspended_at = Some(iteration);
                    break;
                }
                Err(e) => return Err(e),
            };

            let mut stable = 0usize;
            for outcome in &batch.outcomes {
                let Some(track) = active.remove(&outcome.query) else {
                    continue;
                };
                match &outcome.state {
                    None => {
                        let reason = outcome.error.clone().unwrap_or_default();
                        assignments.push(
                            TaxonomicAssignment::failed(outcome.query.clone(), r.domain, reason)
                                .with_iteration(index),
                        );
                    }
                    Some(state) if state.clade() == track.current.clade() => {
                        stable += 1;
                        assignments.push(
                            TaxonomicAssignment::from_placement(
                                outcome.query.clone(),
                                r.domain,
                                state.lineage.clone(),
                                state.red,
                            )
                            .with_iteration(index),
                        );
                    }
                    Some(state) => {
                        active.insert(
                            outcome.query.clone(),
                            Track {
                                previous: Some(track.current),
                                current: state.clone(),
                            },
                        );
                    }
                }
            }
            info!(
                "Iteration {index}: {} members, {stable} stable, {} still changing",
                batch.members.len(),
                active.len()
            );
            ledger.push(batch);
        }

        let last = ledger.len();
        for (query, track) in active {
            let stable = match &track.previous {
                Some(previous) => previous.lineage.common_prefix(&track.current.lineage),
                None => track.current.lineage.clone(),
            };
            let mut assignment = TaxonomicAssignment::unclassified(query, r.domain, stable, last);
            if let Some(at) = suspended_at {
                assignment = assignment.with_note(format!("refinement suspended before iteration {at}"));
            }
            assignments.push(assignment);
        }

        if suspended_at.is_none() {
            if let Some(store) = self.store {
                store.write_tree_mapping(&ledger)?;
            }
        }

        assignments.sort_by(|a, b| a.query.as_str().cmp(b.query.as_str()));
        Ok(BatchOutcome {
            assignments,
            ledger,
            suspended_at,
        })
    }

    fn load_or_run(
        &self,
        index: usize,
        members: &[GenomeId],
        active: &BTreeMap<GenomeId, Track>,
        placer: &dyn Placer,
        pool: &WorkerPool,
    ) -> Result<BatchIteration, BatchError> {
        if let Some(store) = self.store {
            if let Some(batch) = store.load_completed(index)? {
                if batch.members != members {
                    return Err(BatchError::LedgerMismatch {
                        iteration: index,
                        reason: format!(
                            "{} persisted members, {} active queries",
                            batch.members.len(),
                            members.len()
                        ),
                    });
                }
                debug!("Reusing persisted iteration {index}");
                return Ok(batch);
            }
        }
        self.run_iteration(index, members, active, placer, pool)
    }

    fn run_iteration(
        &self,
        index: usize,
        members: &[GenomeId],
        active: &BTreeMap<GenomeId, Track>,
        placer: &dyn Placer,
        pool: &WorkerPool,
    ) -> Result<BatchIteration, BatchError> {
        let r = &self.reference;

        // Leaves of every member's ambiguous clade
        let mut leaves: Vec<NodeId> = members
            .iter()
            .filter_map(|q| active.get(q))
            .flat_map(|track| {
                let clade = r.tree.raise(track.current.parent, self.config.context_depth);
                r.tree.leaves_under(clade)
            })
            .collect();
        leaves.sort_unstable();
        leaves.dedup();

        let (reduced, mapping) = r.tree.induced_subtree(&leaves)?;
        let anchor = mapping.first().and_then(|&top| r.red.get(top)).unwrap_or(0.0);
        let signature = package_signature(&reduced, members);
        debug!(
            "Iteration {index}: {} members, reduced tree of {} leaves anchored at RED {anchor:.3}",
            members.len(),
            leaves.len()
        );

        let package = match self.store {
            Some(store) => store.open_or_create_package(index, &reduced, &signature)?,
            None => ReferencePackage {
                dir: PathBuf::new(),
                contents: PackageContents {
                    signature: Some(signature),
                    ..PackageContents::default()
                },
                tree: reduced,
            },
        };

        let calibration = r.calibration.resolve(&package.tree);
        let red = self.decorator.decorate(&package.tree, &calibration, anchor)?;
        if let Some(store) = self.store {
            store.persist_red(index, &red, &package.tree)?;
        }

        let records = placer.place(&package, members, index)?;
        let mut by_query: HashMap<&GenomeId, Vec<&PlacementRecord>> = HashMap::new();
        for record in &records {
            by_query.entry(&record.query).or_default().push(record);
        }

        let classifier = PlacementClassifier::new(&package.tree, &red, r.boundaries, r.taxonomy);
        let outcomes: Vec<MemberOutcome> = pool.install(|| {
            members
                .par_iter()
                .map(|query| match by_query.get(query).map(Vec::as_slice) {
                    None | Some([]) => MemberOutcome::failed(
                        query.clone(),
                        format!("no placement returned at iteration {index}"),
                    ),
                    Some([_, _, ..]) => MemberOutcome::failed(
                        query.clone(),
                        format!("duplicate placement returned at iteration {index}"),
                    ),
                    Some([record]) => match classifier.classify(record) {
                        Ok(placement) => MemberOutcome::placed(
                            query.clone(),
                            CladeState::from_placement(&placement, Some(&mapping)),
                        ),
                        Err(e) => MemberOutcome::failed(query.clone(), e.to_string()),
                    },
                })
                .collect()
        });

        let batch = BatchIteration {
            index,
            created_at: Utc::now(),
            members: members.to_vec(),
            package,
            red,
            mapping,
            outcomes,
        };
        if let Some(store) = self.store {
            store.persist_outcomes(&batch)?;
        }
        Ok(batch)
    }
}

/// Signature of a reduced package: its leaves and the queries placed on it
fn package_signature(tree: &ReferenceTree, members: &[GenomeId]) -> String {
    let items: Vec<String> = tree
        .leaves_under(tree.root())
        .into_iter()
        .filter_map(|leaf| tree.name(leaf).map(|name| format!("leaf:{name}")))
        .chain(members.iter().map(|q| format!("query:{q}")))
        .collect();
    compute_signature(items.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap as StdHashMap;

    use super::*;
    use crate::config::layout::OutputLayout;
    use crate::core::taxonomy::Taxonomy;
    use crate::core::types::{AssignmentStatus, Domain, Rank};
    use crate::parsing::newick::parse_newick;
    use crate::red::{CalibrationTable, RankBoundaries};

    const NEWICK: &str = "(((A1:0.1,A2:0.1)gA:0.4,(B1:0.1,B2:0.1)gB:0.4)F:0.5,\
                          ((C1:0.1,C2:0.1)gC:0.4,D1:0.5)G:0.5);";

    struct Fixture {
        tree: ReferenceTree,
        red: RedTable,
        calibration: CalibrationTable,
        boundaries: RankBoundaries,
        taxonomy: Taxonomy,
        config: PipelineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let tree = parse_newick(NEWICK).unwrap();
            let config = PipelineConfig::default();
            let red = RedDecorator::new(&config)
                .decorate(&tree, &StdHashMap::new(), 0.0)
                .unwrap();
            let taxonomy = [
                ("A1", "GA"),
                ("A2", "GA"),
                ("B1", "GB"),
                ("B2", "GB"),
                ("C1", "GC"),
                ("C2", "GC"),
                ("D1", "GD"),
            ]
            .into_iter()
            .map(|(leaf, genus)| {
                let family = if genus < "GC" { "F1" } else { "F2" };
                let lineage = format!("d__Bacteria;p__P;c__C;o__O;f__{family};g__{genus};s__{genus} sp");
                (GenomeId::new(leaf), Lineage::parse(&lineage).unwrap())
            })
            .collect();
            Self {
                tree,
                red,
                calibration: CalibrationTable::new(),
                boundaries: RankBoundaries::new([(Rank::Family, 0.6), (Rank::Genus, 0.8)]).unwrap(),
                taxonomy,
                config,
            }
        }

        fn context(&self) -> ReferenceContext<'_> {
            ReferenceContext {
                domain: Domain::Bacteria,
                tree: &self.tree,
                red: &self.red,
                calibration: &self.calibration,
                boundaries: &self.boundaries,
                taxonomy: &self.taxonomy,
            }
        }

        /// Global placement at the middle of the edge above `leaf`
        fn low(&self, query: &str, leaf: &str) -> PlacementRecord {
            let edge = self.tree.edge_for_node(self.tree.find(leaf).unwrap()).unwrap();
            PlacementRecord::new(query, edge, 0.05, 0.05).with_confidence(0.4)
        }
    }

    /// Places each query above a scripted leaf per iteration and counts calls
    struct ScriptedPlacer {
        script: fn(&str, usize) -> &'static str,
        calls: RefCell<Vec<usize>>,
        cancel_after: Option<(usize, &'static AtomicBool)>,
    }

    impl ScriptedPlacer {
        fn new(script: fn(&str, usize) -> &'static str) -> Self {
            Self {
                script,
                calls: RefCell::new(Vec::new()),
                cancel_after: None,
            }
        }
    }

    impl Placer for ScriptedPlacer {
        fn place(
            &self,
            package: &ReferencePackage,
            queries: &[GenomeId],
            iteration: usize,
        ) -> Result<Vec<PlacementRecord>, BatchError> {
            self.calls.borrow_mut().push(iteration);
            if let Some((at, flag)) = self.cancel_after {
                if at == iteration {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            let tree = &package.tree;
            Ok(queries
                .iter()
                .map(|q| {
                    let leaf = tree.find((self.script)(q.as_str(), iteration)).unwrap();
                    PlacementRecord::new(q.as_str(), tree.edge_for_node(leaf).unwrap(), 0.05, 0.05)
                })
                .collect())
        }
    }

    fn moves_once(query: &str, _iteration: usize) -> &'static str {
        // q1 starts on A1 and moves to B1; q2 stays on A2
        if query == "q1" {
            "B1"
        } else {
            "A2"
        }
    }

    #[test]
    fn test_partition() {
        let f = Fixture::new();
        let records = vec![
            f.low("q1", "A1").with_confidence(0.95),
            f.low("q2", "A1"),
            PlacementRecord::new("q3", 999, 0.1, 0.1).with_confidence(0.99),
            PlacementRecord::new("q4", 0, 0.1, 0.1),
            PlacementRecord::malformed("q5", "Invalid edge on line 5: 'x'"),
        ];
        let split = partition(records, &f.tree, 0.9);
        let high: Vec<&str> = split.high.iter().map(|r| r.query.as_str()).collect();
        let low: Vec<&str> = split.low.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(high, ["q1", "q4"]);
        assert_eq!(low, ["q2", "q3", "q5"]);
    }

    #[test]
    fn test_split_duplicates() {
        let f = Fixture::new();
        let records = vec![
            f.low("q2", "A1"),
            f.low("q1", "A1").with_confidence(0.95),
            f.low("q2", "B1"),
            f.low("q2", "C1"),
        ];
        let (unique, duplicates) = split_duplicates(records);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].query.as_str(), "q1");
        assert_eq!(duplicates, vec![(GenomeId::new("q2"), 3)]);
    }

    #[test]
    fn test_halts_when_clades_stabilize() {
        let f = Fixture::new();
        let pool = WorkerPool::new(2).unwrap();
        let placer = ScriptedPlacer::new(moves_once);
        let splitter = BatchSplitter::new(f.context(), &f.config);

        let low = vec![f.low("q1", "A1"), f.low("q2", "A2")];
        let outcome = splitter.refine(&low, &placer, &pool).unwrap();

        // q2 is stable at 1; q1 changes at 1 and is stable at 2
        assert_eq!(*placer.calls.borrow(), vec![1, 2]);
        assert_eq!(outcome.ledger.len(), 2);
        assert_eq!(outcome.ledger.get(2).unwrap().members, vec![GenomeId::new("q1")]);
        assert!(outcome.suspended_at.is_none());

        let q1 = &outcome.assignments[0];
        assert_eq!(q1.status, AssignmentStatus::Classified);
        assert_eq!(q1.iteration, Some(2));
        assert_eq!(q1.lineage.name(Rank::Genus), Some("GB"));
        let q2 = &outcome.assignments[1];
        assert_eq!(q2.iteration, Some(1));
        assert_eq!(q2.lineage.name(Rank::Genus), Some("GA"));
    }

    #[test]
    fn test_unstable_queries_become_unclassified() {
        fn flips(_query: &str, iteration: usize) -> &'static str {
            if iteration % 2 == 1 {
                "B1"
            } else {
                "A1"
            }
        }
        let f = Fixture::new();
        let config = PipelineConfig {
            max_iterations: 3,
            ..PipelineConfig::default()
        };
        let pool = WorkerPool::new(1).unwrap();
        let placer = ScriptedPlacer::new(flips);
        let outcome = BatchSplitter::new(f.context(), &config)
            .refine(&[f.low("q1", "A1")], &placer, &pool)
            .unwrap();

        assert_eq!(*placer.calls.borrow(), vec![1, 2, 3]);
        let q1 = &outcome.assignments[0];
        assert_eq!(q1.status, AssignmentStatus::Unclassified);
        assert_eq!(q1.iteration, Some(3));
        assert_eq!(q1.lineage.deepest_rank(), Some(Rank::Family));
        assert_eq!(q1.lineage.name(Rank::Family), Some("F1"));
    }

    #[test]
    fn test_reduced_tree_is_anchored_at_clade_red() {
        let f = Fixture::new();
        let pool = WorkerPool::new(1).unwrap();
        let placer = ScriptedPlacer::new(moves_once);
        let outcome = BatchSplitter::new(f.context(), &f.config)
            .refine(&[f.low("q2", "A2")], &placer, &pool)
            .unwrap();

        let first = outcome.ledger.get(1).unwrap();
        // Clade of A2 raised one level is F: four leaves rooted at F
        assert_eq!(first.package.tree.leaf_count(first.package.tree.root()), 4);
        let f_node = f.tree.find("F").unwrap();
        assert_eq!(first.mapping[0], f_node);
        assert_eq!(first.red.get(first.package.tree.root()), f.red.get(f_node));
    }

    #[test]
    fn test_malformed_records_fail_alone() {
        let f = Fixture::new();
        let pool = WorkerPool::new(1).unwrap();
        let placer = ScriptedPlacer::new(moves_once);
        let low = vec![
            PlacementRecord::new("bad", 999, 0.1, 0.1).with_confidence(0.1),
            f.low("q2", "A2"),
        ];
        let outcome = BatchSplitter::new(f.context(), &f.config)
            .refine(&low, &placer, &pool)
            .unwrap();
        assert_eq!(outcome.assignments[0].status, AssignmentStatus::Failed);
        assert_eq!(outcome.assignments[1].status, AssignmentStatus::Classified);
    }

    #[test]
    fn test_query_placed_twice_gets_one_failed_label() {
        let f = Fixture::new();
        let pool = WorkerPool::new(1).unwrap();
        let placer = ScriptedPlacer::new(moves_once);
        let low = vec![f.low("q1", "A1"), f.low("q2", "A2"), f.low("q1", "B1")];
        let outcome = BatchSplitter::new(f.context(), &f.config)
            .refine(&low, &placer, &pool)
            .unwrap();

        let queries: Vec<&str> = outcome.assignments.iter().map(|a| a.query.as_str()).collect();
        assert_eq!(queries, ["q1", "q2"]);
        assert_eq!(outcome.assignments[0].status, AssignmentStatus::Failed);
        assert_eq!(outcome.assignments[0].note.as_deref(), Some("duplicate placement (2 records)"));
        assert_eq!(outcome.assignments[1].status, AssignmentStatus::Classified);
        assert_eq!(outcome.ledger.get(1).unwrap().members, vec![GenomeId::new("q2")]);
    }

    #[test]
    fn test_cancel_and_resume_from_store() {
        static CANCEL: AtomicBool = AtomicBool::new(false);

        let f = Fixture::new();
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let store = IterationStore::new(layout.clone(), Domain::Bacteria);
        let pool = WorkerPool::new(1).unwrap();
        let low = vec![f.low("q1", "A1"), f.low("q2", "A2")];

        let mut placer = ScriptedPlacer::new(moves_once);
        placer.cancel_after = Some((1, &CANCEL));
        let first = BatchSplitter::new(f.context(), &f.config)
            .with_store(&store)
            .with_cancellation(&CANCEL)
            .refine(&low, &placer, &pool)
            .unwrap();
        assert_eq!(first.suspended_at, Some(2));
        assert_eq!(*placer.calls.borrow(), vec![1]);
        assert!(layout.low_package_dir(Domain::Bacteria, 1).join("tree.nwk").exists());
        assert!(layout.low_red_file(Domain::Bacteria, 1).exists());
        assert!(!layout.low_tree_mapping_file(Domain::Bacteria).exists());

        // Resume: iteration 1 comes from disk, only iteration 2 is placed
        let placer = ScriptedPlacer::new(moves_once);
        let resumed = BatchSplitter::new(f.context(), &f.config)
            .with_store(&store)
            .refine(&low, &placer, &pool)
            .unwrap();
        assert_eq!(*placer.calls.borrow(), vec![2]);
        assert!(resumed.suspended_at.is_none());
        assert_eq!(resumed.ledger.len(), 2);
        assert_eq!(resumed.assignments[0].lineage.name(Rank::Genus), Some("GB"));

        let mapping = std::fs::read_to_string(layout.low_tree_mapping_file(Domain::Bacteria)).unwrap();
        assert!(mapping.contains("q1\t2"));
        assert!(mapping.contains("q2\t1"));
    }
}
