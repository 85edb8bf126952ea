//! Species resolution from ANI/AF measurements against reference genomes.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::core::assignment::{SpeciesEvidence, TaxonomicAssignment};
use crate::core::taxonomy::Taxonomy;
use crate::core::types::{AssignmentStatus, GenomeId, Rank};

/// One query-vs-reference similarity measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub query: GenomeId,
    pub reference: GenomeId,
    /// Average nucleotide identity, percent
    pub ani: f64,
    /// Alignment fraction in [0, 1]
    pub af: f64,
}

impl SimilarityRecord {
    pub fn new(query: impl Into<String>, reference: impl Into<String>, ani: f64, af: f64) -> Self {
        Self {
            query: GenomeId::new(query),
            reference: GenomeId::new(reference),
            ani,
            af,
        }
    }
}

/// Species-specific ANI radius of each reference genome
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadiusTable {
    radii: HashMap<GenomeId, f64>,
}

impl RadiusTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, genome: GenomeId, radius: f64) {
        self.radii.insert(genome, radius);
    }

    #[must_use]
    pub fn get(&self, genome: &GenomeId) -> Option<f64> {
        self.radii.get(genome).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.radii.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }
}

/// A species call with the measurement that supports it
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesCall {
    pub species: String,
    pub evidence: SpeciesEvidence,
}

/// Assigns species to genus-level placements
#[derive(Debug, Clone, Copy)]
pub struct SpeciesResolver<'a> {
    taxonomy: &'a Taxonomy,
    radii: Option<&'a RadiusTable>,
    min_ani: f64,
    min_af: f64,
}

impl<'a> SpeciesResolver<'a> {
    #[must_use]
    pub fn new(taxonomy: &'a Taxonomy, radii: Option<&'a RadiusTable>, config: &PipelineConfig) -> Self {
        Self {
            taxonomy,
            radii,
            min_ani: config.species_ani_threshold,
            min_af: config.af_threshold,
        }
    }

    /// ANI a candidate must reach: the global threshold, or the reference's
    /// own radius when that is stricter
    fn ani_threshold(&self, reference: &GenomeId) -> f64 {
        self.radii
            .and_then(|r| r.get(reference))
            .map_or(self.min_ani, |radius| radius.max(self.min_ani))
    }

    /// Best qualifying reference of `genus` among `records`.
    ///
    /// Candidates need AF ≥ the AF threshold and ANI ≥ the ANI threshold,
    /// both inclusive. Ties are broken by higher ANI, then higher AF, then
    /// the smallest reference id.
    #[must_use]
    pub fn best_candidate<'r, I>(&self, genus: &str, records: I) -> Option<SpeciesCall>
    where
        I: IntoIterator<Item = &'r SimilarityRecord>,
    {
        records
            .into_iter()
            .filter(|r| r.ani.is_finite() && r.af.is_finite())
            .filter(|r| self.taxonomy.genus(&r.reference) == Some(genus))
            .filter(|r| r.af >= self.min_af && r.ani >= self.ani_threshold(&r.reference))
            .filter_map(|r| self.taxonomy.species(&r.reference).map(|s| (r, s)))
            .min_by(|(a, _), (b, _)| rank_candidates(a, b))
            .map(|(r, species)| SpeciesCall {
                species: species.to_string(),
                evidence: SpeciesEvidence {
                    reference: r.reference.clone(),
                    ani: r.ani,
                    af: r.af,
                },
            })
    }

    /// Add a species to a classified, genus-level assignment when the
    /// measurements support one. Anything else is returned unchanged.
    #[must_use]
    pub fn resolve<'r, I>(&self, assignment: TaxonomicAssignment, records: I) -> TaxonomicAssignment
    where
        I: IntoIterator<Item = &'r SimilarityRecord>,
    {
        if assignment.status != AssignmentStatus::Classified {
            return assignment;
        }
        let Some(genus) = assignment.lineage.name(Rank::Genus).map(str::to_string) else {
            return assignment;
        };
        match self.best_candidate(&genus, records) {
            Some(call) => {
                debug!("{}: {} via {}", assignment.query, call.species, call.evidence.reference);
                assignment.with_species(&call.species, call.evidence)
            }
            None => assignment,
        }
    }
}

/// Total order: best candidate first
fn rank_candidates(a: &SimilarityRecord, b: &SimilarityRecord) -> Ordering {
    b.ani
        .total_cmp(&a.ani)
        .then_with(|| b.af.total_cmp(&a.af))
        .then_with(|| a.reference.as_str().cmp(b.reference.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lineage::Lineage;
    use crate::core::types::Domain;

    fn taxonomy() -> Taxonomy {
        [
            ("R1", "d__Bacteria;p__P;c__C;o__O;f__F;g__G1;s__G1 alpha"),
            ("R2", "d__Bacteria;p__P;c__C;o__O;f__F;g__G1;s__G1 beta"),
            ("R3", "d__Bacteria;p__P;c__C;o__O;f__F;g__G2;s__G2 gamma"),
        ]
        .into_iter()
        .map(|(g, l)| (GenomeId::new(g), Lineage::parse(l).unwrap()))
        .collect()
    }

    fn genus_assignment() -> TaxonomicAssignment {
        let lineage = Lineage::parse("d__Bacteria;p__P;c__C;o__O;f__F;g__G1").unwrap();
        TaxonomicAssignment::from_placement(GenomeId::new("q1"), Domain::Bacteria, lineage, 0.8)
    }

    #[test]
    fn test_threshold_inclusivity() {
        let tax = taxonomy();
        let resolver = SpeciesResolver::new(&tax, None, &PipelineConfig::default());

        let at = [SimilarityRecord::new("q1", "R1", 95.0, 0.65)];
        assert!(resolver.best_candidate("G1", &at).is_some());

        let low_ani = [SimilarityRecord::new("q1", "R1", 94.999, 0.9)];
        assert!(resolver.best_candidate("G1", &low_ani).is_none());

        let low_af = [SimilarityRecord::new("q1", "R1", 99.0, 0.649)];
        assert!(resolver.best_candidate("G1", &low_af).is_none());
    }

    #[test]
    fn test_tie_break_order() {
        let tax = taxonomy();
        let resolver = SpeciesResolver::new(&tax, None, &PipelineConfig::default());

        let records = [
            SimilarityRecord::new("q1", "R2", 97.0, 0.8),
            SimilarityRecord::new("q1", "R1", 97.0, 0.8),
        ];
        let call = resolver.best_candidate("G1", &records).unwrap();
        assert_eq!(call.evidence.reference.as_str(), "R1");

        let records = [
            SimilarityRecord::new("q1", "R1", 97.0, 0.7),
            SimilarityRecord::new("q1", "R2", 97.0, 0.8),
        ];
        assert_eq!(resolver.best_candidate("G1", &records).unwrap().species, "G1 beta");

        let records = [
            SimilarityRecord::new("q1", "R1", 96.0, 0.99),
            SimilarityRecord::new("q1", "R2", 98.0, 0.70),
        ];
        assert_eq!(resolver.best_candidate("G1", &records).unwrap().species, "G1 beta");
    }

    #[test]
    fn test_other_genus_is_ignored() {
        let tax = taxonomy();
        let resolver = SpeciesResolver::new(&tax, None, &PipelineConfig::default());
        let records = [SimilarityRecord::new("q1", "R3", 99.9, 0.99)];
        let assignment = resolver.resolve(genus_assignment(), &records);
        assert!(!assignment.has_species());
        assert_eq!(assignment.lineage.name(Rank::Genus), Some("G1"));
    }

    #[test]
    fn test_radius_raises_threshold() {
        let tax = taxonomy();
        let mut radii = RadiusTable::new();
        radii.insert(GenomeId::new("R1"), 97.5);
        let resolver = SpeciesResolver::new(&tax, Some(&radii), &PipelineConfig::default());

        let records = [SimilarityRecord::new("q1", "R1", 96.0, 0.9)];
        assert!(resolver.best_candidate("G1", &records).is_none());
        let records = [SimilarityRecord::new("q1", "R1", 97.5, 0.9)];
        assert!(resolver.best_candidate("G1", &records).is_some());
    }

    #[test]
    fn test_resolve_adds_species() {
        let tax = taxonomy();
        let resolver = SpeciesResolver::new(&tax, None, &PipelineConfig::default());
        let records = [SimilarityRecord::new("q1", "R2", 98.2, 0.91)];
        let assignment = resolver.resolve(genus_assignment(), &records);
        assert!(assignment.has_species());
        assert_eq!(assignment.lineage.name(Rank::Species), Some("G1 beta"));
        assert_eq!(assignment.species.unwrap().reference.as_str(), "R2");
    }
}
