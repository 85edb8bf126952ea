use std::collections::HashMap;

use crate::core::lineage::Lineage;
use crate::core::types::{GenomeId, Rank};

/// Reference genome -> lineage lookup
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    lineages: HashMap<GenomeId, Lineage>,
}

impl Taxonomy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, genome: GenomeId, lineage: Lineage) {
        self.lineages.insert(genome, lineage);
    }

    #[must_use]
    pub fn get(&self, genome: &str) -> Option<&Lineage> {
        self.lineages.get(&GenomeId::new(genome))
    }

    #[must_use]
    pub fn lineage(&self, genome: &GenomeId) -> Option<&Lineage> {
        self.lineages.get(genome)
    }

    /// Genus name of a reference genome
    #[must_use]
    pub fn genus(&self, genome: &GenomeId) -> Option<&str> {
        self.lineages.get(genome).and_then(|l| l.name(Rank::Genus))
    }

    /// Species name of a reference genome
    #[must_use]
    pub fn species(&self, genome: &GenomeId) -> Option<&str> {
        self.lineages.get(genome).and_then(|l| l.name(Rank::Species))
    }

    /// Lineage shared by all of the given genomes.
    ///
    /// Genomes missing from the table are ignored; `None` if none are known.
    pub fn consensus<'a, I>(&self, genomes: I) -> Option<Lineage>
    where
        I: IntoIterator<Item = &'a str>,
    {
        genomes
            .into_iter()
            .filter_map(|g| self.get(g))
            .fold(None, |acc: Option<Lineage>, lineage| match acc {
                None => Some(lineage.clone()),
                Some(shared) => Some(shared.common_prefix(lineage)),
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lineages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }
}

impl FromIterator<(GenomeId, Lineage)> for Taxonomy {
    fn from_iter<T: IntoIterator<Item = (GenomeId, Lineage)>>(iter: T) -> Self {
        Self {
            lineages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> Taxonomy {
        [
            ("A", "d__Bacteria;p__P1;c__C1;o__O1;f__F1;g__G1;s__G1 alpha"),
            ("B", "d__Bacteria;p__P1;c__C1;o__O1;f__F1;g__G1;s__G1 beta"),
            ("C", "d__Bacteria;p__P2;c__C2;o__O2;f__F2;g__G2;s__G2 gamma"),
        ]
        .into_iter()
        .map(|(g, l)| (GenomeId::new(g), Lineage::parse(l).unwrap()))
        .collect()
    }

    #[test]
    fn test_consensus() {
        let tax = taxonomy();
        let shared = tax.consensus(["A", "B"]).unwrap();
        assert_eq!(shared.deepest_rank(), Some(Rank::Genus));
        let shared = tax.consensus(["A", "C"]).unwrap();
        assert_eq!(shared.deepest_rank(), Some(Rank::Domain));
        assert!(tax.consensus(["unknown"]).is_none());
    }

    #[test]
    fn test_genus_and_species_lookup() {
        let tax = taxonomy();
        assert_eq!(tax.genus(&GenomeId::new("A")), Some("G1"));
        assert_eq!(tax.species(&GenomeId::new("C")), Some("G2 gamma"));
    }
}
