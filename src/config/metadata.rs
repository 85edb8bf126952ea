//! Parser for the reference data's `metadata.txt`.
//!
//! The file holds `KEY=VALUE` lines:
//!
//! ```text
//! VERSION_DATA=r202
//! RED_DIST_BAC_DICT={"p__": 0.35, "c__": 0.52, "o__": 0.67, "f__": 0.79, "g__": 0.94}
//! RED_DIST_ARC_DICT={"p__": 0.30, "c__": 0.47, "o__": 0.64, "f__": 0.78, "g__": 0.93}
//! ```
//!
//! Unknown keys are ignored. Lines that cannot be parsed are skipped with a
//! warning so that a single bad line does not hide the rest of the file.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use crate::config::ConfigError;
use crate::core::types::Domain;

/// Rank prefix -> RED value, as stored in the metadata file
pub type RedDistribution = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceMetadata {
    /// Release tag, e.g. `r202`
    pub version: Option<String>,
    pub red_dist_bacteria: Option<RedDistribution>,
    pub red_dist_archaea: Option<RedDistribution>,
}

impl ReferenceMetadata {
    /// Read and parse a metadata file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Parse metadata text, skipping malformed lines
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut metadata = Self::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!("Skipping invalid metadata line {line:?}");
                continue;
            };

            match key.trim() {
                "VERSION_DATA" => metadata.version = Some(value.trim().to_string()),
                "RED_DIST_BAC_DICT" => match serde_json::from_str(value.trim()) {
                    Ok(dist) => metadata.red_dist_bacteria = Some(dist),
                    Err(e) => warn!("Skipping invalid metadata line {line:?}: {e}"),
                },
                "RED_DIST_ARC_DICT" => match serde_json::from_str(value.trim()) {
                    Ok(dist) => metadata.red_dist_archaea = Some(dist),
                    Err(e) => warn!("Skipping invalid metadata line {line:?}: {e}"),
                },
                _ => {}
            }
        }

        metadata
    }

    #[must_use]
    pub fn red_distribution(&self, domain: Domain) -> Option<&RedDistribution> {
        match domain {
            Domain::Bacteria => self.red_dist_bacteria.as_ref(),
            Domain::Archaea => self.red_dist_archaea.as_ref(),
        }
    }
}
