use serde::{Deserialize, Serialize};

use crate::core::types::Rank;

/// A rank-qualified lineage: one optional taxon name per canonical rank.
///
/// Names are stored without their rank prefix. A lineage is always
/// contiguous from the domain down: if a rank is `None`, every deeper rank is
/// `None` too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lineage {
    ranks: [Option<String>; 7],
}

impl Lineage {
    /// An empty (unassigned) lineage
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a GTDB-style lineage such as `d__Bacteria;p__Firmicutes;...`.
    ///
    /// Empty ranks (`g__`) end the lineage. Fields without a recognised prefix
    /// are taken positionally.
    pub fn parse(text: &str) -> Option<Self> {
        let mut lineage = Self::empty();
        for (position, field) in text.split(';').enumerate() {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            let (rank, name) = match field.split_once("__") {
                Some((prefix, name)) => (Rank::parse(prefix)?, name.trim()),
                None => (Rank::from_index(position)?, field),
            };
            if name.is_empty() {
                break;
            }
            // Ranks must arrive in order without gaps
            if rank.index() != lineage.depth() {
                return None;
            }
            lineage.ranks[rank.index()] = Some(name.to_string());
        }
        Some(lineage)
    }

    /// Build a lineage from names ordered domain first
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lineage = Self::empty();
        for (i, name) in names.into_iter().take(7).enumerate() {
            let name = name.into();
            if name.is_empty() {
                break;
            }
            lineage.ranks[i] = Some(name);
        }
        lineage
    }

    /// Number of assigned ranks
    #[must_use]
    pub fn depth(&self) -> usize {
        self.ranks.iter().take_while(|r| r.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Deepest assigned rank
    #[must_use]
    pub fn deepest_rank(&self) -> Option<Rank> {
        self.depth().checked_sub(1).and_then(Rank::from_index)
    }

    /// Taxon name at a rank, without prefix
    #[must_use]
    pub fn name(&self, rank: Rank) -> Option<&str> {
        self.ranks[rank.index()].as_deref()
    }

    #[must_use]
    pub fn has_rank(&self, rank: Rank) -> bool {
        self.ranks[rank.index()].is_some()
    }

    /// Copy of this lineage keeping ranks down to and including `rank`
    #[must_use]
    pub fn truncated(&self, rank: Rank) -> Self {
        self.truncated_to_depth(rank.index() + 1)
    }

    /// Copy of this lineage keeping the first `depth` ranks
    #[must_use]
    pub fn truncated_to_depth(&self, depth: usize) -> Self {
        let mut out = Self::empty();
        for (i, slot) in self.ranks.iter().enumerate().take(depth) {
            out.ranks[i].clone_from(slot);
        }
        out
    }

    /// Longest shared prefix of two lineages
    #[must_use]
    pub fn common_prefix(&self, other: &Self) -> Self {
        let shared = self
            .ranks
            .iter()
            .zip(other.ranks.iter())
            .take_while(|(a, b)| a.is_some() && a == b)
            .count();
        self.truncated_to_depth(shared)
    }

    /// Set the species name. Ignored unless the genus is present.
    pub fn set_species(&mut self, name: impl Into<String>) -> bool {
        if !self.has_rank(Rank::Genus) {
            return false;
        }
        self.ranks[Rank::Species.index()] = Some(name.into());
        true
    }
}

impl std::fmt::Display for Lineage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, rank) in Rank::ALL.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{}{}", rank.prefix(), self.ranks[i].as_deref().unwrap_or(""))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "d__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae;g__Bacillus;s__Bacillus subtilis";

    #[test]
    fn test_parse_and_display() {
        let lineage = Lineage::parse(FULL).unwrap();
        assert_eq!(lineage.depth(), 7);
        assert_eq!(lineage.name(Rank::Genus), Some("Bacillus"));
        assert_eq!(lineage.to_string(), FULL);
    }

    #[test]
    fn test_parse_partial_lineage() {
        let lineage = Lineage::parse("d__Archaea;p__Thermoproteota;c__;o__;f__;g__;s__").unwrap();
        assert_eq!(lineage.depth(), 2);
        assert_eq!(lineage.deepest_rank(), Some(Rank::Phylum));
        assert_eq!(
            lineage.to_string(),
            "d__Archaea;p__Thermoproteota;c__;o__;f__;g__;s__"
        );
    }

    #[test]
    fn test_parse_rejects_gaps() {
        assert!(Lineage::parse("d__Bacteria;c__Bacilli").is_none());
    }

    #[test]
    fn test_common_prefix() {
        let a = Lineage::parse(FULL).unwrap();
        let b = Lineage::parse("d__Bacteria;p__Firmicutes;c__Clostridia").unwrap();
        let shared = a.common_prefix(&b);
        assert_eq!(shared.depth(), 2);
        assert_eq!(shared.name(Rank::Phylum), Some("Firmicutes"));
    }

    #[test]
    fn test_set_species_requires_genus() {
        let mut family = Lineage::from_names(["Bacteria", "Firmicutes", "Bacilli", "Bacillales", "Bacillaceae"]);
        assert!(!family.set_species("Bacillus subtilis"));
        assert!(!family.has_rank(Rank::Species));

        let mut genus = Lineage::parse(FULL).unwrap().truncated(Rank::Genus);
        assert!(genus.set_species("Bacillus subtilis"));
        assert_eq!(genus.name(Rank::Species), Some("Bacillus subtilis"));
    }
}
