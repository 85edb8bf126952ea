//! Reference data integrity gate.
//!
//! Before anything is built from the reference data, every required
//! directory must exist, hash to its recorded digest, and the release must be
//! recent enough. Passing the gate yields a [`VerifiedReference`], the only
//! way to construct a [`DomainDescriptor`](crate::config::DomainDescriptor).
//!
//! ## Directory digests
//!
//! A directory's digest is the MD5 of the sorted lines
//! `relative/path<TAB>md5(file)` of every regular file below it. Recorded
//! digests come from a JSON manifest:
//!
//! ```json
//! { "msa": "0f3c...", "taxonomy": "8b1d..." }
//! ```
//!
//! Every required directory must have a recorded digest; data without a
//! complete manifest does not pass the gate. `redtax check --write-manifest`
//! records one for a new release.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::layout::{ReferenceLayout, REQUIRED_DIRS};
use crate::config::metadata::ReferenceMetadata;
use crate::config::ConfigError;
use crate::utils::validation::{md5_file, normalize_md5};

/// Default manifest location, relative to the data root
pub const MANIFEST_FILE: &str = "checksums.json";

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Required reference directory is missing: {0}")]
    MissingDirectory(PathBuf),

    #[error("Content of {dir} does not match its recorded digest (expected {expected}, found {actual})")]
    DigestMismatch {
        dir: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk reference directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid digest manifest: {0}")]
    Manifest(String),

    #[error("No digest manifest at {0}")]
    NoManifest(PathBuf),

    #[error("Digest manifest has no entry for required directory {0}/")]
    NoRecordedDigest(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum VersionError {
    #[error("Reference data does not declare a version")]
    Missing,

    #[error("Unrecognised reference data version '{0}'")]
    Unparseable(String),

    #[error("Reference data {found} is older than the minimum supported {minimum}")]
    TooOld { found: String, minimum: String },
}

/// Any failure of the pre-flight gate
#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Recorded directory digests, keyed by directory name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DigestManifest {
    digests: BTreeMap<String, String>,
}

impl DigestManifest {
    /// Load a manifest file
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::Io` if the file cannot be read, or
    /// `IntegrityError::Manifest` if it is not valid JSON or holds a value
    /// that is not an MD5 digest.
    pub fn load(path: &Path) -> Result<Self, IntegrityError> {
        let text = std::fs::read_to_string(path).map_err(|source| IntegrityError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: BTreeMap<String, String> =
            serde_json::from_str(&text).map_err(|e| IntegrityError::Manifest(e.to_string()))?;

        let mut digests = BTreeMap::new();
        for (dir, digest) in raw {
            let digest = normalize_md5(&digest).ok_or_else(|| {
                IntegrityError::Manifest(format!("digest for '{dir}' is not an MD5: '{digest}'"))
            })?;
            digests.insert(dir, digest);
        }
        Ok(Self { digests })
    }

    #[must_use]
    pub fn get(&self, dir: &str) -> Option<&str> {
        self.digests.get(dir).map(String::as_str)
    }

    pub fn insert(&mut self, dir: impl Into<String>, digest: impl Into<String>) {
        self.digests.insert(dir.into(), digest.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Content digest of a directory
///
/// # Errors
///
/// Returns `IntegrityError::Walk` or `IntegrityError::Io` if the directory
/// or one of its files cannot be read.
pub fn directory_digest(dir: &Path) -> Result<String, IntegrityError> {
    let mut lines = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let relative: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let digest = md5_file(path).map_err(|source| IntegrityError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        lines.push(format!("{}\t{digest}", relative.join("/")));
    }
    lines.sort_unstable();
    Ok(format!("{:x}", md5::compute(lines.join("\n"))))
}

/// Check that every required directory exists
///
/// # Errors
///
/// Returns `IntegrityError::MissingDirectory` for the first absent one.
pub fn verify_presence(layout: &ReferenceLayout) -> Result<(), IntegrityError> {
    for name in REQUIRED_DIRS {
        let dir = layout.dir(name);
        if !dir.is_dir() {
            return Err(IntegrityError::MissingDirectory(dir));
        }
    }
    Ok(())
}

/// Check every required directory against `manifest`
///
/// # Errors
///
/// Returns `IntegrityError::MissingDirectory` or
/// `IntegrityError::NoRecordedDigest` before any hashing, then the first
/// `IntegrityError` in [`REQUIRED_DIRS`] order.
pub fn verify_layout(layout: &ReferenceLayout, manifest: &DigestManifest) -> Result<(), IntegrityError> {
    verify_presence(layout)?;
    if let Some(name) = REQUIRED_DIRS.iter().find(|name| manifest.get(name).is_none()) {
        return Err(IntegrityError::NoRecordedDigest((*name).to_string()));
    }

    let checked: Vec<Result<(), IntegrityError>> = REQUIRED_DIRS
        .par_iter()
        .map(|name| {
            let dir = layout.dir(name);
            let expected = manifest
                .get(name)
                .ok_or_else(|| IntegrityError::NoRecordedDigest((*name).to_string()))?;
            let actual = directory_digest(&dir)?;
            if actual == expected {
                debug!("{name}/ digest ok");
                Ok(())
            } else {
                Err(IntegrityError::DigestMismatch {
                    dir,
                    expected: expected.to_string(),
                    actual,
                })
            }
        })
        .collect();
    checked.into_iter().collect()
}

/// Numeric part of an `r<number>` release tag
fn release_number(version: &str) -> Option<u32> {
    let digits = version.trim().trim_start_matches(['r', 'R']);
    let digits = digits.split('.').next()?;
    digits.parse().ok()
}

/// Check that `found` is at least `minimum`
///
/// # Errors
///
/// Returns `VersionError::Unparseable` for tags that are not `r<number>`,
/// or `VersionError::TooOld`.
pub fn verify_version(found: &str, minimum: &str) -> Result<(), VersionError> {
    let have = release_number(found).ok_or_else(|| VersionError::Unparseable(found.to_string()))?;
    let need = release_number(minimum).ok_or_else(|| VersionError::Unparseable(minimum.to_string()))?;
    if have < need {
        return Err(VersionError::TooOld {
            found: found.to_string(),
            minimum: minimum.to_string(),
        });
    }
    Ok(())
}

/// Reference data that passed the integrity gate
#[derive(Debug, Clone)]
pub struct VerifiedReference {
    layout: ReferenceLayout,
    version: String,
    metadata: ReferenceMetadata,
}

impl VerifiedReference {
    #[must_use]
    pub fn layout(&self) -> &ReferenceLayout {
        &self.layout
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn metadata(&self) -> &ReferenceMetadata {
        &self.metadata
    }

    #[cfg(test)]
    pub(crate) fn unchecked(root: &Path, version: &str, metadata: ReferenceMetadata) -> Self {
        Self {
            layout: ReferenceLayout::new(root),
            version: version.to_string(),
            metadata,
        }
    }
}

/// Run the integrity gate over the data directory at `root`.
///
/// `manifest` defaults to `<root>/checksums.json` and must record a digest
/// for every required directory.
///
/// # Errors
///
/// Returns `GateError::Integrity` for missing or modified directories or an
/// absent or incomplete manifest, `GateError::Version` for a missing or
/// outdated release, and `GateError::Config` if the metadata file cannot be
/// read.
pub fn verify(root: &Path, manifest: Option<&Path>, minimum_version: &str) -> Result<VerifiedReference, GateError> {
    let layout = ReferenceLayout::new(root);
    verify_presence(&layout)?;

    let manifest_path = manifest.map_or_else(|| root.join(MANIFEST_FILE), Path::to_path_buf);
    if !manifest_path.is_file() {
        return Err(IntegrityError::NoManifest(manifest_path).into());
    }
    let digests = DigestManifest::load(&manifest_path)?;
    verify_layout(&layout, &digests)?;

    let metadata = ReferenceMetadata::load(&layout.metadata_file())?;
    let version = metadata.version.clone().ok_or(VersionError::Missing)?;
    verify_version(&version, minimum_version)?;

    info!("Reference data {version} at {} verified", root.display());
    Ok(VerifiedReference {
        layout,
        version,
        metadata,
    })
}
