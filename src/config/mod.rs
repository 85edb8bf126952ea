//! Immutable run configuration.
//!
//! A run is parameterized by three things, all built once at startup and then
//! shared read-only:
//!
//! - [`PipelineConfig`]: empirical thresholds (RED interval, multi-hit gap,
//!   ANI/AF cut-offs, iteration bounds)
//! - [`ReferenceLayout`]: where the reference data lives
//! - [`DomainDescriptor`]: per-domain marker set, RED dictionaries, reference
//!   tree and memory floor
//!
//! Domain descriptors can only be constructed from a
//! [`VerifiedReference`](crate::integrity::VerifiedReference), so the
//! integrity gate always runs first.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod domain;
pub mod layout;
pub mod markers;
pub mod metadata;

pub use domain::DomainDescriptor;
pub use layout::{OutputLayout, ReferenceLayout};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Reference metadata is missing {0}")]
    MissingMetadata(String),

    #[error(transparent)]
    Parse(#[from] crate::parsing::ParseError),

    #[error(transparent)]
    Tree(#[from] crate::core::tree::TreeError),
}

/// Spacing of the RED grid undecorated nodes are snapped to
pub const DEFAULT_RED_INTERVAL: f64 = 0.1;
/// Minimum support for a node to be decorated
pub const DEFAULT_RED_MIN_SUPPORT: f64 = 0.0;
/// Minimum number of children for a node to be decorated
pub const DEFAULT_RED_MIN_CHILDREN: usize = 2;
/// Bit-score gap below which two hits on one locus are ambiguous
pub const DEFAULT_MULTIHIT_THRESHOLD: f64 = 10.0;
/// Percentage of a domain's markers a genome needs to be placed
pub const DEFAULT_DOMAIN_THRESHOLD: f64 = 10.0;
/// Minimum alignment fraction for a species call
pub const DEFAULT_AF_THRESHOLD: f64 = 0.65;
/// Minimum ANI for a species call
pub const DEFAULT_SPECIES_ANI_THRESHOLD: f64 = 95.0;
/// Oldest reference data release this build understands
pub const MIN_REF_DATA_VERSION: &str = "r202";

/// Thresholds and bounds for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub red_interval: f64,
    pub red_min_support: f64,
    pub red_min_children: usize,
    pub multihit_threshold: f64,
    /// Percent of markers required, see [`DEFAULT_DOMAIN_THRESHOLD`]
    pub domain_threshold: f64,
    pub af_threshold: f64,
    pub species_ani_threshold: f64,
    /// Placement confidence at or above which a query is classified in a single pass
    pub high_confidence_threshold: f64,
    /// Upper bound on low-confidence refinement iterations
    pub max_iterations: usize,
    /// Levels above the insertion point that define the ambiguous clade
    pub context_depth: usize,
    /// Memory available to placement workers, in GB
    pub available_memory_gb: Option<f64>,
    pub max_workers: Option<usize>,
    pub min_ref_data_version: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            red_interval: DEFAULT_RED_INTERVAL,
            red_min_support: DEFAULT_RED_MIN_SUPPORT,
            red_min_children: DEFAULT_RED_MIN_CHILDREN,
            multihit_threshold: DEFAULT_MULTIHIT_THRESHOLD,
            domain_threshold: DEFAULT_DOMAIN_THRESHOLD,
            af_threshold: DEFAULT_AF_THRESHOLD,
            species_ani_threshold: DEFAULT_SPECIES_ANI_THRESHOLD,
            high_confidence_threshold: 0.9,
            max_iterations: 5,
            context_depth: 1,
            available_memory_gb: None,
            max_workers: None,
            min_ref_data_version: MIN_REF_DATA_VERSION.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Check that every threshold is in range
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue(format!("{name} must be in [0, 1], got {v}")))
            }
        };

        if !(self.red_interval > 0.0 && self.red_interval <= 1.0) {
            return Err(ConfigError::InvalidValue(format!(
                "red_interval must be in (0, 1], got {}",
                self.red_interval
            )));
        }
        unit("af_threshold", self.af_threshold)?;
        unit("high_confidence_threshold", self.high_confidence_threshold)?;
        if !(0.0..=100.0).contains(&self.species_ani_threshold) {
            return Err(ConfigError::InvalidValue(format!(
                "species_ani_threshold must be a percentage, got {}",
                self.species_ani_threshold
            )));
        }
        if !(0.0..=100.0).contains(&self.domain_threshold) {
            return Err(ConfigError::InvalidValue(format!(
                "domain_threshold must be a percentage, got {}",
                self.domain_threshold
            )));
        }
        if !(self.multihit_threshold >= 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "multihit_threshold must be non-negative, got {}",
                self.multihit_threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if let Some(mem) = self.available_memory_gb {
            if !(mem > 0.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "available_memory_gb must be positive, got {mem}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.red_interval - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.red_min_children, 2);
        assert!((config.af_threshold - 0.65).abs() < f64::EPSILON);
        assert!((config.species_ani_threshold - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = PipelineConfig {
            af_threshold: 1.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let config = PipelineConfig {
            max_iterations: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            red_interval: 0.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
