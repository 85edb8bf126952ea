use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::cli::{DataArgs, OutputFormat};
use crate::config::layout::{ReferenceLayout, REQUIRED_DIRS};
use crate::integrity::{directory_digest, verify, DigestManifest};

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Compute the digest of every required directory and write them as a
    /// manifest instead of verifying
    #[arg(long)]
    pub write_manifest: Option<PathBuf>,
}

#[derive(Serialize)]
struct CheckReport {
    root: PathBuf,
    version: String,
    directories: Vec<&'static str>,
    status: &'static str,
}

/// Execute check subcommand
///
/// # Errors
///
/// Returns an error if the reference data fails the integrity gate or the
/// manifest cannot be written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: CheckArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    if let Some(path) = &args.write_manifest {
        return write_manifest(&args.data, path, verbose);
    }

    let verified = verify(&args.data.data_path, args.data.manifest.as_deref(), &args.data.min_version)?;
    let report = CheckReport {
        root: verified.layout().root().to_path_buf(),
        version: verified.version().to_string(),
        directories: REQUIRED_DIRS.to_vec(),
        status: "ok",
    };

    match format {
        OutputFormat::Text => {
            println!("Reference data {} at {}", report.version, report.root.display());
            println!("   {} required directories verified", report.directories.len());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Tsv => {
            println!("root\tversion\tstatus");
            println!("{}\t{}\t{}", report.root.display(), report.version, report.status);
        }
    }
    Ok(())
}

fn write_manifest(data: &DataArgs, path: &std::path::Path, verbose: bool) -> anyhow::Result<()> {
    let layout = ReferenceLayout::new(&data.data_path);
    let mut manifest = DigestManifest::default();
    for name in REQUIRED_DIRS {
        let digest = directory_digest(&layout.dir(name))?;
        if verbose {
            eprintln!("{name}/\t{digest}");
        }
        manifest.insert(name, digest);
    }
    std::fs::write(path, serde_json::to_string_pretty(&manifest)?)?;
    eprintln!("Wrote {} digests to {}", REQUIRED_DIRS.len(), path.display());
    Ok(())
}
