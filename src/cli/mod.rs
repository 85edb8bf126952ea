//! Command-line interface for redtax.
//!
//! Available commands:
//!
//! - **check**: Run the reference data integrity gate
//! - **classify**: Classify query genomes from placement and similarity tables
//!
//! ## Usage
//!
//! ```text
//! # Verify the reference data (path from REDTAX_DATA_PATH)
//! redtax check
//!
//! # Record digests for a new data release
//! redtax check --data-path /data/release207 --write-manifest /data/release207/checksums.json
//!
//! # Classify bacterial placements, with species calls from ANI
//! redtax classify --bac120-placements bac.tsv --similarities ani.tsv --out-dir out/
//!
//! # JSON output for scripting
//! redtax classify --bac120-placements bac.tsv --out-dir out/ --format json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod check;
pub mod classify;

#[derive(Parser)]
#[command(name = "redtax")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Assign rank-qualified taxonomy to genomes from tree placements")]
#[command(
    long_about = "redtax turns a genome's placement on a reference tree, and its similarity to reference genomes, into a rank-qualified taxonomic label.\n\nPlacements are normalized with Relative Evolutionary Divergence (RED):\n- Confident placements are classified in a single pass\n- Ambiguous placements are refined on reduced reference trees\n- Genus-level calls are extended to species using ANI and alignment fraction"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify the reference data directory
    Check(check::CheckArgs),

    /// Classify query genomes
    Classify(classify::ClassifyArgs),
}

/// Location of the reference data, shared by every command
#[derive(clap::Args, Clone, Debug)]
pub struct DataArgs {
    /// Reference data directory
    #[arg(long, env = "REDTAX_DATA_PATH")]
    pub data_path: PathBuf,

    /// Digest manifest (defaults to <data-path>/checksums.json)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Oldest reference data release accepted
    #[arg(long, default_value = crate::config::MIN_REF_DATA_VERSION)]
    pub min_version: String,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
