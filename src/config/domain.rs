use tracing::{info, warn};

use crate::config::markers::MarkerSet;
use crate::config::ConfigError;
use crate::core::types::Domain;
use crate::integrity::VerifiedReference;
use crate::parsing::refpkg::ReferencePackage;
use crate::parsing::tsv::{parse_calibration, parse_file};
use crate::red::{CalibrationTable, RankBoundaries};

/// Memory one bacterial placement worker needs, in GB
pub const BACTERIA_MIN_MEMORY_GB: f64 = 215.0;
/// Memory one archaeal placement worker needs, in GB
pub const ARCHAEA_MIN_MEMORY_GB: f64 = 13.0;

#[must_use]
pub fn min_memory_gb(domain: Domain) -> f64 {
    match domain {
        Domain::Bacteria => BACTERIA_MIN_MEMORY_GB,
        Domain::Archaea => ARCHAEA_MIN_MEMORY_GB,
    }
}

/// Everything that differs between the bacterial and archaeal runs
#[derive(Debug, Clone)]
pub struct DomainDescriptor {
    domain: Domain,
    markers: MarkerSet,
    boundaries: RankBoundaries,
    calibration: CalibrationTable,
    package: ReferencePackage,
    min_memory_gb: f64,
}

impl DomainDescriptor {
    /// Load a domain's reference state from verified reference data.
    ///
    /// Rank boundaries come from the metadata RED dictionary. The calibrated
    /// MRCA RED table is optional; without it every node is decorated from
    /// branch lengths alone.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingMetadata` if the metadata has no RED
    /// dictionary for the domain, or a parse error for the reference package
    /// or calibration table.
    pub fn load(reference: &VerifiedReference, domain: Domain) -> Result<Self, ConfigError> {
        let layout = reference.layout();
        let version = reference.version();

        let dist = reference.metadata().red_distribution(domain).ok_or_else(|| {
            ConfigError::MissingMetadata(format!("RED dictionary for {domain}"))
        })?;
        let boundaries = RankBoundaries::from_distribution(dist)?;

        let mrca = layout.mrca_red_file(version, domain);
        let calibration = if mrca.exists() {
            parse_file(&mrca, parse_calibration)?
        } else {
            warn!("No MRCA RED table at {}; decorating without calibration", mrca.display());
            CalibrationTable::new()
        };

        let package = ReferencePackage::open(&layout.reference_package(version, domain))?;
        info!(
            "{domain}: reference tree with {} leaves, {} calibrated nodes",
            package.tree.leaf_count(package.tree.root()),
            calibration.len()
        );

        Ok(Self::from_parts(reference, domain, boundaries, calibration, package))
    }

    /// Assemble a descriptor from already-loaded parts of a verified reference
    #[must_use]
    pub fn from_parts(
        _reference: &VerifiedReference,
        domain: Domain,
        boundaries: RankBoundaries,
        calibration: CalibrationTable,
        package: ReferencePackage,
    ) -> Self {
        Self {
            domain,
            markers: MarkerSet::for_domain(domain),
            boundaries,
            calibration,
            package,
            min_memory_gb: min_memory_gb(domain),
        }
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    #[must_use]
    pub fn boundaries(&self) -> &RankBoundaries {
        &self.boundaries
    }

    #[must_use]
    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    #[must_use]
    pub fn package(&self) -> &ReferencePackage {
        &self.package
    }

    #[must_use]
    pub fn min_memory_gb(&self) -> f64 {
        self.min_memory_gb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::metadata::ReferenceMetadata;
    use crate::core::tree::ReferenceTree;
    use crate::core::types::Rank;
    use crate::parsing::newick::parse_newick;

    fn reference(root: &std::path::Path) -> VerifiedReference {
        let metadata = ReferenceMetadata::parse(
            "VERSION_DATA=r202\nRED_DIST_ARC_DICT={\"p__\": 0.3, \"f__\": 0.7, \"g__\": 0.9}\n",
        );
        VerifiedReference::unchecked(root, "r202", metadata)
    }

    fn write_package(root: &std::path::Path, tree: &ReferenceTree) {
        let dir = reference(root).layout().reference_package("r202", Domain::Archaea);
        std::fs::create_dir_all(dir.parent().unwrap()).unwrap();
        ReferencePackage::create(&dir, tree, None).unwrap();
    }

    #[test]
    fn test_load_archaeal_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), &parse_newick("((A:1,B:1)gX:1,C:2);").unwrap());
        let mrca = reference(dir.path()).layout().mrca_red_file("r202", Domain::Archaea);
        std::fs::create_dir_all(mrca.parent().unwrap()).unwrap();
        std::fs::write(&mrca, "gX\t0.6\n").unwrap();

        let descriptor = DomainDescriptor::load(&reference(dir.path()), Domain::Archaea).unwrap();
        assert_eq!(descriptor.markers().len(), 122);
        assert_eq!(descriptor.calibration().get("gX"), Some(0.6));
        assert_eq!(descriptor.boundaries().boundary(Rank::Family), Some(0.7));
        assert!((descriptor.min_memory_gb() - 13.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_red_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DomainDescriptor::load(&reference(dir.path()), Domain::Bacteria),
            Err(ConfigError::MissingMetadata(_))
        ));
    }

    #[test]
    fn test_calibration_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), &parse_newick("(A:1,B:1);").unwrap());
        let descriptor = DomainDescriptor::load(&reference(dir.path()), Domain::Archaea).unwrap();
        assert!(descriptor.calibration().is_empty());
    }
}
