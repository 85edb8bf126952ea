use serde::{Deserialize, Serialize};

use crate::core::lineage::Lineage;
use crate::core::types::{AssignmentBasis, AssignmentStatus, Domain, GenomeId, Rank};

/// ANI/AF evidence backing a species-level call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesEvidence {
    pub reference: GenomeId,
    pub ani: f64,
    pub af: f64,
}

/// Final, immutable taxonomic label for one query genome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomicAssignment {
    pub query: GenomeId,
    pub domain: Domain,
    pub lineage: Lineage,
    pub basis: AssignmentBasis,
    pub status: AssignmentStatus,

    /// Low-confidence refinement iteration that produced this lineage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<usize>,

    /// Interpolated RED at the insertion point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<SpeciesEvidence>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TaxonomicAssignment {
    /// Placement-only assignment
    pub fn from_placement(query: GenomeId, domain: Domain, lineage: Lineage, red_value: f64) -> Self {
        Self {
            query,
            domain,
            lineage,
            basis: AssignmentBasis::Placement,
            status: AssignmentStatus::Classified,
            iteration: None,
            red_value: Some(red_value),
            species: None,
            note: None,
        }
    }

    /// Query whose refinement never stabilized
    pub fn unclassified(query: GenomeId, domain: Domain, stable: Lineage, iteration: usize) -> Self {
        Self {
            query,
            domain,
            lineage: stable,
            basis: AssignmentBasis::Placement,
            status: AssignmentStatus::Unclassified,
            iteration: Some(iteration),
            red_value: None,
            species: None,
            note: Some(format!("no stable placement after {iteration} iterations")),
        }
    }

    /// Query that could not be classified at all
    pub fn failed(query: GenomeId, domain: Domain, reason: impl Into<String>) -> Self {
        Self {
            query,
            domain,
            lineage: Lineage::empty(),
            basis: AssignmentBasis::Placement,
            status: AssignmentStatus::Failed,
            iteration: None,
            red_value: None,
            species: None,
            note: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn with_iteration(mut self, iteration: usize) -> Self {
        self.iteration = Some(iteration);
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attach a species call. Refused when the lineage lacks a genus.
    #[must_use]
    pub fn with_species(mut self, species_name: &str, evidence: SpeciesEvidence) -> Self {
        if self.lineage.set_species(species_name) {
            self.basis = AssignmentBasis::PlacementAndSpecies;
            self.species = Some(evidence);
        }
        self
    }

    #[must_use]
    pub fn has_species(&self) -> bool {
        self.lineage.has_rank(Rank::Species)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_requires_genus() {
        let lineage = Lineage::from_names(["Bacteria", "Firmicutes"]);
        let evidence = SpeciesEvidence {
            reference: GenomeId::new("GCF_1"),
            ani: 99.0,
            af: 0.9,
        };
        let assignment =
            TaxonomicAssignment::from_placement(GenomeId::new("q1"), Domain::Bacteria, lineage, 0.4)
                .with_species("Bacillus subtilis", evidence);
        assert!(!assignment.has_species());
        assert_eq!(assignment.basis, AssignmentBasis::Placement);
        assert!(assignment.species.is_none());
    }

    #[test]
    fn test_species_with_genus() {
        let lineage = Lineage::from_names([
            "Bacteria", "Firmicutes", "Bacilli", "Bacillales", "Bacillaceae", "Bacillus",
        ]);
        let evidence = SpeciesEvidence {
            reference: GenomeId::new("GCF_1"),
            ani: 99.0,
            af: 0.9,
        };
        let assignment =
            TaxonomicAssignment::from_placement(GenomeId::new("q1"), Domain::Bacteria, lineage, 0.97)
                .with_species("Bacillus subtilis", evidence);
        assert!(assignment.has_species());
        assert_eq!(assignment.basis, AssignmentBasis::PlacementAndSpecies);
        assert!(!assignment.lineage.name(Rank::Genus).unwrap_or("").is_empty());
    }
}
