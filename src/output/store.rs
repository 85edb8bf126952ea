//! On-disk record of refinement iterations.
//!
//! Each iteration owns a reduced reference package directory:
//!
//! ```text
//! <out>/<marker set>/split/low/pplacer/package.<i>.refpkg/
//!     CONTENTS.json      manifest with the package signature
//!     tree.nwk           reduced tree
//!     members.json       written last; marks the iteration complete
//! <out>/<marker set>/split/low/red/red_value_<i>.tsv
//! ```
//!
//! Packages and RED tables are never overwritten. A package without
//! `members.json` is reused only when its signature matches the one the
//! current run computes.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::batch::{BatchError, BatchIteration, IterationLedger, MemberOutcome};
use crate::config::layout::OutputLayout;
use crate::core::tree::{NodeId, ReferenceTree};
use crate::core::types::{Domain, GenomeId};
use crate::parsing::refpkg::{write_new, ReferencePackage, CONTENTS_FILE};
use crate::parsing::tsv::read_text;
use crate::red::RedTable;

pub const MEMBERS_FILE: &str = "members.json";

/// Serialized form of a completed iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IterationRecord {
    iteration: usize,
    created_at: DateTime<Utc>,
    signature: Option<String>,
    members: Vec<GenomeId>,
    mapping: Vec<NodeId>,
    outcomes: Vec<MemberOutcome>,
}

/// Iteration artifacts of one domain
#[derive(Debug, Clone)]
pub struct IterationStore {
    layout: OutputLayout,
    domain: Domain,
}

impl IterationStore {
    #[must_use]
    pub fn new(layout: OutputLayout, domain: Domain) -> Self {
        Self { layout, domain }
    }

    #[must_use]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    #[must_use]
    pub fn package_dir(&self, iteration: usize) -> PathBuf {
        self.layout.low_package_dir(self.domain, iteration)
    }

    #[must_use]
    pub fn red_file(&self, iteration: usize) -> PathBuf {
        self.layout.low_red_file(self.domain, iteration)
    }

    #[must_use]
    pub fn members_file(&self, iteration: usize) -> PathBuf {
        self.package_dir(iteration).join(MEMBERS_FILE)
    }

    /// Load iteration `iteration` if a previous run completed it.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::LedgerMismatch` when the persisted files disagree
    /// with each other, or a parse/IO error when they cannot be read.
    pub fn load_completed(&self, iteration: usize) -> Result<Option<BatchIteration>, BatchError> {
        let members_file = self.members_file(iteration);
        if !members_file.exists() {
            return Ok(None);
        }
        let record: IterationRecord = serde_json::from_str(&std::fs::read_to_string(&members_file)?)?;
        let mismatch = |reason: String| BatchError::LedgerMismatch { iteration, reason };

        if record.iteration != iteration {
            return Err(mismatch(format!(
                "{} records iteration {}",
                members_file.display(),
                record.iteration
            )));
        }
        let package = ReferencePackage::open(&self.package_dir(iteration))?;
        if package.contents.signature != record.signature {
            return Err(mismatch("package signature differs from its members record".to_string()));
        }
        if record.mapping.len() != package.tree.len() {
            return Err(mismatch(format!(
                "node mapping has {} entries for a tree of {} nodes",
                record.mapping.len(),
                package.tree.len()
            )));
        }
        let red = RedTable::from_tsv(&read_text(&self.red_file(iteration))?, package.tree.len())?;

        Ok(Some(BatchIteration {
            index: iteration,
            created_at: record.created_at,
            members: record.members,
            package,
            red,
            mapping: record.mapping,
            outcomes: record.outcomes,
        }))
    }

    /// Reference package for `iteration`: reused when an earlier run wrote
    /// one with the same signature, created otherwise.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::LedgerMismatch` when an existing package has a
    /// different signature, or an IO/parse error.
    pub fn open_or_create_package(
        &self,
        iteration: usize,
        tree: &ReferenceTree,
        signature: &str,
    ) -> Result<ReferencePackage, BatchError> {
        let dir = self.package_dir(iteration);
        if dir.join(CONTENTS_FILE).exists() {
            let package = ReferencePackage::open(&dir)?;
            if package.contents.signature.as_deref() != Some(signature) {
                return Err(BatchError::LedgerMismatch {
                    iteration,
                    reason: format!("{} was built for different queries", dir.display()),
                });
            }
            debug!("Reusing package {}", dir.display());
            return Ok(package);
        }
        Ok(ReferencePackage::create(&dir, tree, Some(signature.to_string()))?)
    }

    /// Write the RED table of `iteration` unless one exists
    ///
    /// # Errors
    ///
    /// Returns an IO error if the table cannot be written.
    pub fn persist_red(&self, iteration: usize, red: &RedTable, tree: &ReferenceTree) -> Result<(), BatchError> {
        write_red_once(&self.red_file(iteration), red, tree)
    }

    /// Record a finished iteration. Written through a temporary file so that
    /// `members.json` only ever appears complete.
    ///
    /// # Errors
    ///
    /// Returns an IO or JSON error if the record cannot be written.
    pub fn persist_outcomes(&self, batch: &BatchIteration) -> Result<(), BatchError> {
        let record = IterationRecord {
            iteration: batch.index,
            created_at: batch.created_at,
            signature: batch.package.contents.signature.clone(),
            members: batch.members.clone(),
            mapping: batch.mapping.clone(),
            outcomes: batch.outcomes.clone(),
        };
        let path = self.members_file(batch.index);
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(&record)?.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Write the query to iteration table once refinement has finished.
    /// An existing table is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the table cannot be written.
    pub fn write_tree_mapping(&self, ledger: &IterationLedger) -> Result<(), BatchError> {
        let path = self.layout.low_tree_mapping_file(self.domain);
        if path.exists() {
            info!("{} exists; not rewriting", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let table = TreeMapping(ledger.query_iterations()).to_string();
        write_new(&path, table.as_bytes())?;
        Ok(())
    }
}

/// `user_genome<TAB>iteration` table of final iterations
struct TreeMapping(BTreeMap<GenomeId, usize>);

impl fmt::Display for TreeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "user_genome\titeration")?;
        for (query, iteration) in &self.0 {
            writeln!(f, "{query}\t{iteration}")?;
        }
        Ok(())
    }
}

/// Write a RED table unless the file already exists
///
/// # Errors
///
/// Returns an IO error if the table cannot be written.
pub fn write_red_once(path: &Path, red: &RedTable, tree: &ReferenceTree) -> Result<(), BatchError> {
    if path.exists() {
        debug!("{} exists; keeping it", path.display());
        return Ok(());
    }
    red.write_new(path, tree)?;
    Ok(())
}
