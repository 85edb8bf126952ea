use std::path::PathBuf;

use tracing::debug;

use crate::classify::batch::BatchError;
use crate::classify::placement::PlacementRecord;
use crate::core::types::{Domain, GenomeId};
use crate::parsing::refpkg::ReferencePackage;
use crate::parsing::tsv::{parse_file, parse_placements};

/// Places queries on a reduced reference package.
///
/// Implementations wrap an external placement tool. Edge ids in the returned
/// records refer to `package.tree`. Queries missing from the result are
/// reported as failed for that iteration.
pub trait Placer {
    /// # Errors
    ///
    /// Returns `BatchError::PlacementsUnavailable` when the placements cannot
    /// be produced yet (the run is suspended and can be resumed), or
    /// `BatchError::Placer` when the tool failed.
    fn place(
        &self,
        package: &ReferencePackage,
        queries: &[GenomeId],
        iteration: usize,
    ) -> Result<Vec<PlacementRecord>, BatchError>;
}

/// Reads placements produced offline, one file per iteration:
/// `<dir>/<marker set>.placements.<iteration>.tsv`.
///
/// A missing file suspends the run at that iteration; the reduced package it
/// needs has already been written, so the external tool can be run on it and
/// the run resumed.
#[derive(Debug, Clone)]
pub struct TablePlacer {
    dir: PathBuf,
    domain: Domain,
}

impl TablePlacer {
    pub fn new(dir: impl Into<PathBuf>, domain: Domain) -> Self {
        Self {
            dir: dir.into(),
            domain,
        }
    }

    #[must_use]
    pub fn path_for(&self, iteration: usize) -> PathBuf {
        self.dir.join(format!(
            "{}.placements.{iteration}.tsv",
            self.domain.marker_set_name()
        ))
    }
}

impl Placer for TablePlacer {
    fn place(
        &self,
        package: &ReferencePackage,
        queries: &[GenomeId],
        iteration: usize,
    ) -> Result<Vec<PlacementRecord>, BatchError> {
        let path = self.path_for(iteration);
        if !path.exists() {
            debug!(
                "No placements at {} for package {}",
                path.display(),
                package.dir.display()
            );
            return Err(BatchError::PlacementsUnavailable { iteration });
        }
        let records = parse_file(&path, parse_placements)?;
        Ok(records
            .into_iter()
            .filter(|r| queries.contains(&r.query))
            .collect())
    }
}

/// A placer for runs without a refinement tool: every iteration is unavailable
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlacer;

impl Placer for NoPlacer {
    fn place(
        &self,
        _package: &ReferencePackage,
        _queries: &[GenomeId],
        iteration: usize,
    ) -> Result<Vec<PlacementRecord>, BatchError> {
        Err(BatchError::PlacementsUnavailable { iteration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::newick::parse_newick;
    use crate::parsing::refpkg::PackageContents;

    fn package() -> ReferencePackage {
        ReferencePackage {
            dir: PathBuf::from("package.1.refpkg"),
            contents: PackageContents::default(),
            tree: parse_newick("(A:1,B:1);").unwrap(),
        }
    }

    #[test]
    fn test_table_placer_reads_iteration_file() {
        let dir = tempfile::tempdir().unwrap();
        let placer = TablePlacer::new(dir.path(), Domain::Archaea);
        std::fs::write(placer.path_for(1), "q1\t0\t0.1\t0.1\nq9\t1\t0.1\t0.1\n").unwrap();

        let records = placer.place(&package(), &[GenomeId::new("q1")], 1).unwrap();
        assert_eq!(records.len(), 1);
        assert!(placer.path_for(1).ends_with("ar122.placements.1.tsv"));
    }

    #[test]
    fn test_missing_iteration_file_suspends() {
        let dir = tempfile::tempdir().unwrap();
        let placer = TablePlacer::new(dir.path(), Domain::Bacteria);
        assert!(matches!(
            placer.place(&package(), &[GenomeId::new("q1")], 2),
            Err(BatchError::PlacementsUnavailable { iteration: 2 })
        ));
        assert!(matches!(
            NoPlacer.place(&package(), &[], 1),
            Err(BatchError::PlacementsUnavailable { iteration: 1 })
        ));
    }
}
