//! Filesystem layout of the reference data and of produced artifacts.

use std::path::{Path, PathBuf};

use crate::core::types::Domain;

/// Top-level directories every reference data release must contain
pub const REQUIRED_DIRS: [&str; 9] = [
    "msa",
    "masks",
    "pplacer",
    "fastani",
    "taxonomy",
    "radii",
    "metadata",
    "mrca_red",
    "markers",
];

/// Paths inside a reference data directory.
///
/// The layout never writes: everything under `root` is treated as read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLayout {
    root: PathBuf,
}

impl ReferenceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    #[must_use]
    pub fn metadata_file(&self) -> PathBuf {
        self.dir("metadata").join("metadata.txt")
    }

    #[must_use]
    pub fn taxonomy_file(&self) -> PathBuf {
        self.dir("taxonomy").join("gtdb_taxonomy.tsv")
    }

    #[must_use]
    pub fn radii_file(&self) -> PathBuf {
        self.dir("radii").join("gtdb_radii.tsv")
    }

    /// Calibrated MRCA RED values for a domain
    #[must_use]
    pub fn mrca_red_file(&self, version: &str, domain: Domain) -> PathBuf {
        self.dir("mrca_red")
            .join(format!("gtdbtk_{version}_{}.tsv", domain.marker_set_name()))
    }

    /// Placement reference package directory for a domain
    #[must_use]
    pub fn reference_package(&self, version: &str, domain: Domain) -> PathBuf {
        self.dir("pplacer")
            .join(format!("gtdb_{version}_{}.refpkg", domain.marker_set_name()))
    }
}

/// Paths of artifacts written by a run, one tree per domain so that domains
/// never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn split_dir(&self, domain: Domain) -> PathBuf {
        self.root.join(domain.marker_set_name()).join("split")
    }

    #[must_use]
    pub fn high_dir(&self, domain: Domain) -> PathBuf {
        self.split_dir(domain).join("high")
    }

    #[must_use]
    pub fn low_dir(&self, domain: Domain) -> PathBuf {
        self.split_dir(domain).join("low")
    }

    /// Global RED table used for high-confidence queries
    #[must_use]
    pub fn high_red_file(&self, domain: Domain) -> PathBuf {
        self.high_dir(domain).join("red").join("high_red_value.tsv")
    }

    /// Reduced reference package of one refinement iteration
    #[must_use]
    pub fn low_package_dir(&self, domain: Domain, iteration: usize) -> PathBuf {
        self.low_dir(domain)
            .join("pplacer")
            .join(format!("package.{iteration}.refpkg"))
    }

    /// RED table of one refinement iteration
    #[must_use]
    pub fn low_red_file(&self, domain: Domain, iteration: usize) -> PathBuf {
        self.low_dir(domain)
            .join("red")
            .join(format!("red_value_{iteration}.tsv"))
    }

    /// Query -> iteration mapping table
    #[must_use]
    pub fn low_tree_mapping_file(&self, domain: Domain) -> PathBuf {
        self.low_dir(domain).join("tree_mapping.tsv")
    }

    /// Final assignment table for a domain
    #[must_use]
    pub fn summary_file(&self, domain: Domain) -> PathBuf {
        self.root
            .join(format!("redtax.{}.summary.tsv", domain.marker_set_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_paths() {
        let layout = ReferenceLayout::new("/data/release");
        assert_eq!(
            layout.mrca_red_file("r202", Domain::Bacteria),
            PathBuf::from("/data/release/mrca_red/gtdbtk_r202_bac120.tsv")
        );
        assert_eq!(
            layout.reference_package("r202", Domain::Archaea),
            PathBuf::from("/data/release/pplacer/gtdb_r202_ar122.refpkg")
        );
    }

    #[test]
    fn test_iteration_paths_are_distinct() {
        let out = OutputLayout::new("/out");
        assert_ne!(
            out.low_red_file(Domain::Bacteria, 1),
            out.low_red_file(Domain::Bacteria, 2)
        );
        assert_ne!(
            out.low_package_dir(Domain::Bacteria, 1),
            out.low_package_dir(Domain::Archaea, 1)
        );
        assert!(out
            .low_package_dir(Domain::Bacteria, 3)
            .ends_with("bac120/split/low/pplacer/package.3.refpkg"));
    }
}
