//! End-to-end classification through the library API, from a verified
//! reference data directory to summary tables.

mod common;

use std::path::Path;

use redtax::classify::{DomainInputs, DomainPipeline, DomainRun, TablePlacer};
use redtax::config::{DomainDescriptor, OutputLayout, PipelineConfig};
use redtax::integrity::{verify, GateError, IntegrityError};
use redtax::output::{write_summary, IterationStore};
use redtax::parsing::refpkg::ReferencePackage;
use redtax::parsing::tsv::{parse_file, parse_placements, parse_radii, parse_similarities, parse_taxonomy};
use redtax::{AssignmentBasis, AssignmentStatus, Domain, Rank};

fn config() -> PipelineConfig {
    PipelineConfig {
        available_memory_gb: Some(1024.0),
        max_workers: Some(2),
        ..PipelineConfig::default()
    }
}

/// Classify the standard bacterial query set into `out`
fn classify(data: &Path, inputs_dir: &Path, iterations: &Path, out: &Path) -> DomainRun {
    let placements = common::bac_placements(inputs_dir);
    let similarities = common::similarities(inputs_dir);
    classify_file(data, &placements, &similarities, iterations, out)
}

fn classify_file(data: &Path, placements: &Path, similarities: &Path, iterations: &Path, out: &Path) -> DomainRun {
    let config = config();
    let reference = verify(data, None, &config.min_ref_data_version).unwrap();
    let descriptor = DomainDescriptor::load(&reference, Domain::Bacteria).unwrap();
    let taxonomy = parse_file(&reference.layout().taxonomy_file(), parse_taxonomy).unwrap();
    let radii = parse_file(&reference.layout().radii_file(), parse_radii).unwrap();
    let similarities = parse_file(similarities, parse_similarities).unwrap();

    let layout = OutputLayout::new(out);
    let store = IterationStore::new(layout.clone(), Domain::Bacteria);
    let inputs = DomainInputs {
        placements: parse_file(placements, parse_placements).unwrap(),
        similarities: &similarities,
        marker_hits: None,
    };
    let run = DomainPipeline::new(&descriptor, &taxonomy, &config)
        .with_radii(&radii)
        .with_store(&store)
        .run(inputs, &TablePlacer::new(iterations, Domain::Bacteria))
        .unwrap();
    write_summary(&layout.summary_file(Domain::Bacteria), &run.assignments).unwrap();
    run
}

#[test]
fn test_end_to_end_with_resume() {
    let data = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let out = work.path().join("out");
    let iterations = work.path().join("iterations");
    std::fs::create_dir_all(&iterations).unwrap();
    common::reference_data(data.path());

    // First pass: no placements for iteration 1 yet
    let first = classify(data.path(), work.path(), &iterations, &out);
    assert_eq!(first.high_confidence, 1);
    assert_eq!(first.low_confidence, 2);
    assert_eq!(first.suspended_at, Some(1));

    let queries: Vec<&str> = first.assignments.iter().map(|a| a.query.as_str()).collect();
    assert_eq!(queries, ["q_bad", "q_high", "q_low"]);

    let q_bad = &first.assignments[0];
    assert_eq!(q_bad.status, AssignmentStatus::Failed);

    let q_high = &first.assignments[1];
    assert_eq!(q_high.status, AssignmentStatus::Classified);
    assert_eq!(q_high.basis, AssignmentBasis::PlacementAndSpecies);
    assert_eq!(q_high.lineage.name(Rank::Species), Some("GA beta"));
    assert_eq!(q_high.species.as_ref().unwrap().reference.as_str(), "A2");

    let q_low = &first.assignments[2];
    assert_eq!(q_low.status, AssignmentStatus::Unclassified);

    // The reduced package for iteration 1 was written for the external tool
    let layout = OutputLayout::new(&out);
    let package = ReferencePackage::open(&layout.low_package_dir(Domain::Bacteria, 1)).unwrap();
    assert_eq!(package.tree.leaf_count(package.tree.root()), 4);
    assert!(layout.high_red_file(Domain::Bacteria).exists());
    assert!(!layout.low_tree_mapping_file(Domain::Bacteria).exists());

    std::fs::write(
        iterations.join("bac120.placements.1.tsv"),
        common::placement_line(&package.tree, "q_low", "A2", 0.7),
    )
    .unwrap();

    // Second pass resumes at iteration 1 and reuses its package
    let second = classify(data.path(), work.path(), &iterations, &out);
    assert!(second.suspended_at.is_none());
    assert_eq!(second.iterations, 1);
    let q_low = &second.assignments[2];
    assert_eq!(q_low.status, AssignmentStatus::Classified);
    assert_eq!(q_low.iteration, Some(1));
    assert_eq!(q_low.lineage.name(Rank::Genus), Some("GA"));

    let mapping = std::fs::read_to_string(layout.low_tree_mapping_file(Domain::Bacteria)).unwrap();
    assert_eq!(mapping, "user_genome\titeration\nq_low\t1\n");

    let summary = std::fs::read_to_string(layout.summary_file(Domain::Bacteria)).unwrap();
    assert_eq!(summary.lines().count(), 4);
    assert!(summary.contains("q_high\td__Bacteria;p__P1;c__C1;o__O1;f__F1;g__GA;s__GA beta"));
}

#[test]
fn test_unreadable_rows_fail_only_their_queries() {
    let data = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let out = work.path().join("out");
    let iterations = work.path().join("iterations");
    std::fs::create_dir_all(&iterations).unwrap();
    common::reference_data(data.path());

    let tree = common::bac_tree();
    let placements = work.path().join("placements.tsv");
    std::fs::write(
        &placements,
        [
            common::placement_line(&tree, "q_high", "A1", 0.99),
            "q_garbled\tNOT_AN_EDGE\t0.1\t0.1\t0.99\n".to_string(),
            common::placement_line(&tree, "q_low", "A2", 0.55),
            common::placement_line(&tree, "q_low2", "B1", 0.55),
        ]
        .concat(),
    )
    .unwrap();
    let similarities = common::similarities(work.path());

    let first = classify_file(data.path(), &placements, &similarities, &iterations, &out);
    assert_eq!(first.assignments.len(), 4);
    assert_eq!(first.suspended_at, Some(1));
    let garbled = &first.assignments[0];
    assert_eq!(garbled.query.as_str(), "q_garbled");
    assert_eq!(garbled.status, AssignmentStatus::Failed);
    assert!(garbled.note.as_deref().unwrap().contains("edge on line 2"));
    assert_eq!(first.assignments[1].status, AssignmentStatus::Classified);

    // One unreadable row in the iteration file
    let layout = OutputLayout::new(&out);
    let package = ReferencePackage::open(&layout.low_package_dir(Domain::Bacteria, 1)).unwrap();
    std::fs::write(
        iterations.join("bac120.placements.1.tsv"),
        format!(
            "{}q_low2\t-\t0.1\t0.1\n",
            common::placement_line(&package.tree, "q_low", "A2", 0.7)
        ),
    )
    .unwrap();

    let second = classify_file(data.path(), &placements, &similarities, &iterations, &out);
    assert!(second.suspended_at.is_none());
    let status: Vec<(&str, AssignmentStatus)> = second
        .assignments
        .iter()
        .map(|a| (a.query.as_str(), a.status))
        .collect();
    assert_eq!(
        status,
        [
            ("q_garbled", AssignmentStatus::Failed),
            ("q_high", AssignmentStatus::Classified),
            ("q_low", AssignmentStatus::Classified),
            ("q_low2", AssignmentStatus::Failed),
        ]
    );
    assert_eq!(second.assignments[3].iteration, Some(1));
}

#[test]
fn test_identical_inputs_give_identical_tables() {
    let data = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    common::reference_data(data.path());
    let iterations = work.path().join("iterations");
    std::fs::create_dir_all(&iterations).unwrap();

    classify(data.path(), work.path(), &iterations, &work.path().join("one"));
    classify(data.path(), work.path(), &iterations, &work.path().join("two"));

    let read = |dir: &str| {
        let layout = OutputLayout::new(work.path().join(dir));
        (
            std::fs::read_to_string(layout.summary_file(Domain::Bacteria)).unwrap(),
            std::fs::read_to_string(layout.high_red_file(Domain::Bacteria)).unwrap(),
        )
    };
    assert_eq!(read("one"), read("two"));
}

#[test]
fn test_modified_reference_data_is_rejected() {
    let data = tempfile::tempdir().unwrap();
    common::reference_data(data.path());
    assert!(verify(data.path(), None, "r202").is_ok());

    std::fs::write(data.path().join("radii").join("gtdb_radii.tsv"), "A1\t90.0\n").unwrap();
    assert!(matches!(
        verify(data.path(), None, "r202"),
        Err(GateError::Integrity(IntegrityError::DigestMismatch { .. }))
    ));

    common::write_manifest(data.path());
    assert!(matches!(verify(data.path(), None, "r300"), Err(GateError::Version(_))));
}
