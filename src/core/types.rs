use serde::{Deserialize, Serialize};

/// Identifier of a genome, either a query or a reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenomeId(pub String);

impl GenomeId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GenomeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GenomeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Prokaryotic domain a genome is classified under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Bacteria,
    Archaea,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Bacteria, Domain::Archaea];

    /// Short name of the domain's marker set (`bac120` / `ar122`)
    #[must_use]
    pub fn marker_set_name(self) -> &'static str {
        match self {
            Self::Bacteria => "bac120",
            Self::Archaea => "ar122",
        }
    }

    /// Parse a domain from a marker-set name or the domain name itself
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bacteria" | "bac" | "bac120" | "d__bacteria" => Some(Self::Bacteria),
            "archaea" | "arc" | "ar122" | "d__archaea" => Some(Self::Archaea),
            _ => None,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bacteria => write!(f, "Bacteria"),
            Self::Archaea => write!(f, "Archaea"),
        }
    }
}

/// Canonical taxonomic ranks, ordered from the root downwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Domain,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    pub const ALL: [Rank; 7] = [
        Rank::Domain,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
    ];

    /// Position of the rank in a lineage (domain = 0)
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// GTDB-style prefix, e.g. `g__`
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Domain => "d__",
            Self::Phylum => "p__",
            Self::Class => "c__",
            Self::Order => "o__",
            Self::Family => "f__",
            Self::Genus => "g__",
            Self::Species => "s__",
        }
    }

    /// Parse a rank from its prefix (`p__`, `p`) or full name (`phylum`)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let s = s.trim_end_matches('_');
        match s {
            "d" | "domain" => Some(Self::Domain),
            "p" | "phylum" => Some(Self::Phylum),
            "c" | "class" => Some(Self::Class),
            "o" | "order" => Some(Self::Order),
            "f" | "family" => Some(Self::Family),
            "g" | "genus" => Some(Self::Genus),
            "s" | "species" => Some(Self::Species),
            _ => None,
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Domain => "domain",
            Self::Phylum => "phylum",
            Self::Class => "class",
            Self::Order => "order",
            Self::Family => "family",
            Self::Genus => "genus",
            Self::Species => "species",
        };
        write!(f, "{name}")
    }
}

/// What evidence an assignment rests on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentBasis {
    /// Tree placement and RED only
    Placement,
    /// Tree placement confirmed by ANI/AF against a reference genome
    PlacementAndSpecies,
}

impl std::fmt::Display for AssignmentBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Placement => write!(f, "placement"),
            Self::PlacementAndSpecies => write!(f, "placement+species"),
        }
    }
}

/// Final state of a query after the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Classified,
    /// Refinement never stabilized; lineage is the deepest stable ancestor
    Unclassified,
    /// Excluded before or during placement (markers, malformed record)
    Failed,
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classified => write!(f, "classified"),
            Self::Unclassified => write!(f, "unclassified"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
