use serde::{Deserialize, Serialize};

use crate::config::metadata::RedDistribution;
use crate::config::ConfigError;
use crate::core::types::Rank;

/// RED value at which each rank begins.
///
/// Boundaries may be sparse; the domain rank is always present at 0.0. A
/// RED value maps to the deepest rank whose boundary does not exceed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankBoundaries {
    /// Ordered by rank, domain first
    bounds: Vec<(Rank, f64)>,
}

impl RankBoundaries {
    /// Build from `(rank, boundary)` pairs in any order
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a boundary lies outside
    /// `[0, 1]` or deeper ranks have smaller boundaries than shallower ones.
    pub fn new<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (Rank, f64)>,
    {
        let mut bounds: Vec<(Rank, f64)> = vec![(Rank::Domain, 0.0)];
        for (rank, value) in pairs {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue(format!(
                    "RED boundary for {rank} must be in [0, 1], got {value}"
                )));
            }
            match bounds.iter_mut().find(|(r, _)| *r == rank) {
                Some(slot) => slot.1 = value,
                None => bounds.push((rank, value)),
            }
        }
        bounds.sort_by_key(|(rank, _)| rank.index());

        for pair in bounds.windows(2) {
            if pair[1].1 < pair[0].1 {
                return Err(ConfigError::InvalidValue(format!(
                    "RED boundary for {} ({}) is below {} ({})",
                    pair[1].0, pair[1].1, pair[0].0, pair[0].1
                )));
            }
        }
        Ok(Self { bounds })
    }

    /// Build from a metadata RED dictionary keyed by rank prefix (`p__`)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unknown rank keys or invalid
    /// boundaries.
    pub fn from_distribution(dist: &RedDistribution) -> Result<Self, ConfigError> {
        let pairs = dist
            .iter()
            .map(|(key, &value)| {
                Rank::parse(key)
                    .map(|rank| (rank, value))
                    .ok_or_else(|| ConfigError::InvalidValue(format!("Unknown rank key '{key}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(pairs)
    }

    /// Deepest rank whose boundary is at or below `red`
    #[must_use]
    pub fn rank_for(&self, red: f64) -> Rank {
        self.bounds
            .iter()
            .rev()
            .find(|(_, boundary)| *boundary <= red)
            .map_or(Rank::Domain, |(rank, _)| *rank)
    }

    #[must_use]
    pub fn boundary(&self, rank: Rank) -> Option<f64> {
        self.bounds.iter().find(|(r, _)| *r == rank).map(|(_, b)| *b)
    }
}
