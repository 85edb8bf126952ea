//! Artifacts produced by a run.
//!
//! - [`store`]: per-iteration packages, RED tables and member records
//! - summary tables: one row per query genome, written per domain
//!
//! ## Summary table
//!
//! | Column | Content |
//! |--------|---------|
//! | `user_genome` | query id |
//! | `classification` | seven-rank lineage, empty ranks keep their prefix |
//! | `basis` | `placement` or `placement+species` |
//! | `status` | `classified`, `unclassified` or `failed` |
//! | `iteration` | refinement iteration, empty for single-pass queries |
//! | `red_value` | RED at the insertion point |
//! | `ani_reference`, `ani`, `af` | species evidence |
//! | `note` | reason for an unclassified or failed query |

use std::fmt;
use std::path::Path;

use crate::core::assignment::TaxonomicAssignment;

pub mod store;

pub use store::IterationStore;

pub const SUMMARY_COLUMNS: [&str; 10] = [
    "user_genome",
    "classification",
    "basis",
    "status",
    "iteration",
    "red_value",
    "ani_reference",
    "ani",
    "af",
    "note",
];

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One summary row, tab-separated, without a trailing newline
#[must_use]
pub fn summary_row(a: &TaxonomicAssignment) -> String {
    let (reference, ani, af) = match &a.species {
        Some(e) => (e.reference.to_string(), format!("{:.2}", e.ani), format!("{:.3}", e.af)),
        None => (String::new(), String::new(), String::new()),
    };
    let note = a
        .note
        .as_deref()
        .unwrap_or("")
        .replace(['\t', '\n'], " ");
    [
        a.query.to_string(),
        a.lineage.to_string(),
        a.basis.to_string(),
        a.status.to_string(),
        opt(a.iteration),
        opt(a.red_value.map(|r| format!("{r:.4}"))),
        reference,
        ani,
        af,
        note,
    ]
    .join("\t")
}

/// Summary table with header
#[must_use]
pub fn summary_tsv(assignments: &[TaxonomicAssignment]) -> String {
    SummaryTable(assignments).to_string()
}

struct SummaryTable<'a>(&'a [TaxonomicAssignment]);

impl fmt::Display for SummaryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", SUMMARY_COLUMNS.join("\t"))?;
        for a in self.0 {
            writeln!(f, "{}", summary_row(a))?;
        }
        Ok(())
    }
}

/// Write (or replace) a summary table
///
/// # Errors
///
/// Returns an IO error if the file cannot be written.
pub fn write_summary(path: &Path, assignments: &[TaxonomicAssignment]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, summary_tsv(assignments))
}

/// Human-readable listing, one block per query
#[must_use]
pub fn summary_text(assignments: &[TaxonomicAssignment]) -> String {
    SummaryText(assignments).to_string()
}

struct SummaryText<'a>(&'a [TaxonomicAssignment]);

impl fmt::Display for SummaryText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in self.0 {
            writeln!(f, "{} ({}, {})", a.query, a.domain, a.status)?;
            writeln!(f, "   {}", a.lineage)?;
            if let Some(red) = a.red_value {
                writeln!(f, "   RED: {red:.4}")?;
            }
            if let Some(i) = a.iteration {
                writeln!(f, "   Iteration: {i}")?;
            }
            if let Some(e) = &a.species {
                writeln!(f, "   Species evidence: {} (ANI {:.2}, AF {:.3})", e.reference, e.ani, e.af)?;
            }
            if let Some(note) = &a.note {
                writeln!(f, "   Note: {note}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assignment::SpeciesEvidence;
    use crate::core::lineage::Lineage;
    use crate::core::types::{Domain, GenomeId};

    fn assignments() -> Vec<TaxonomicAssignment> {
        let genus = Lineage::parse("d__Bacteria;p__P;c__C;o__O;f__F;g__G").unwrap();
        vec![
            TaxonomicAssignment::from_placement(GenomeId::new("q1"), Domain::Bacteria, genus, 0.95)
                .with_species(
                    "G alpha",
                    SpeciesEvidence {
                        reference: GenomeId::new("R1"),
                        ani: 97.123,
                        af: 0.8,
                    },
                ),
            TaxonomicAssignment::failed(GenomeId::new("q2"), Domain::Bacteria, "insufficient markers"),
        ]
    }

    #[test]
    fn test_summary_rows() {
        let tsv = summary_tsv(&assignments());
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("user_genome\tclassification"));

        let q1: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(q1.len(), SUMMARY_COLUMNS.len());
        assert_eq!(q1[1], "d__Bacteria;p__P;c__C;o__O;f__F;g__G;s__G alpha");
        assert_eq!(q1[2], "placement+species");
        assert_eq!(q1[6], "R1");
        assert_eq!(q1[7], "97.12");

        let q2: Vec<&str> = lines[2].split('\t').collect();
        assert_eq!(q2[1], "d__;p__;c__;o__;f__;g__;s__");
        assert_eq!(q2[3], "failed");
        assert_eq!(q2[9], "insufficient markers");
    }

    #[test]
    fn test_write_summary_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("summary.tsv");
        write_summary(&path, &assignments()).unwrap();
        write_summary(&path, &assignments()[..1]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
