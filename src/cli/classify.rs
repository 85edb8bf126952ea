use std::path::PathBuf;

use clap::Args;

use crate::classify::pipeline::{DomainInputs, DomainPipeline, DomainRun};
use crate::classify::placer::{NoPlacer, Placer, TablePlacer};
use crate::classify::species::RadiusTable;
use crate::cli::{DataArgs, OutputFormat};
use crate::config::{DomainDescriptor, OutputLayout, PipelineConfig};
use crate::core::assignment::TaxonomicAssignment;
use crate::core::types::Domain;
use crate::integrity::verify;
use crate::markers::MarkerHit;
use crate::output::{summary_text, summary_tsv, write_summary, IterationStore};
use crate::parsing::tsv::{
    parse_file, parse_marker_hits, parse_placements, parse_radii, parse_similarities, parse_taxonomy,
};

#[derive(Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Placements of bacterial queries on the bac120 reference tree
    #[arg(long)]
    pub bac120_placements: Option<PathBuf>,

    /// Placements of archaeal queries on the ar122 reference tree
    #[arg(long)]
    pub ar122_placements: Option<PathBuf>,

    /// Query vs reference ANI/AF table
    #[arg(long)]
    pub similarities: Option<PathBuf>,

    /// HMM hits of the query genomes; enables marker gating
    #[arg(long)]
    pub marker_hits: Option<PathBuf>,

    /// Species ANI radii (defaults to the table in the reference data)
    #[arg(long)]
    pub radii: Option<PathBuf>,

    /// Directory holding `<marker set>.placements.<iteration>.tsv` for
    /// refinement iterations. Without it, refinement stops before iteration 1.
    #[arg(long)]
    pub iteration_placements: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, required = true)]
    pub out_dir: PathBuf,

    // === Threshold overrides ===
    /// Placement confidence for single-pass classification (0-1)
    #[arg(long)]
    pub high_confidence: Option<f64>,

    /// Maximum number of refinement iterations
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Minimum ANI for a species call (percent)
    #[arg(long)]
    pub min_ani: Option<f64>,

    /// Minimum alignment fraction for a species call (0-1)
    #[arg(long)]
    pub min_af: Option<f64>,

    /// Memory available to placement workers, in GB
    #[arg(long)]
    pub memory_gb: Option<f64>,

    /// Upper bound on worker threads
    #[arg(long)]
    pub max_workers: Option<usize>,
}

impl ClassifyArgs {
    fn config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = PipelineConfig {
            available_memory_gb: self.memory_gb,
            max_workers: self.max_workers,
            min_ref_data_version: self.data.min_version.clone(),
            ..PipelineConfig::default()
        };
        if let Some(v) = self.high_confidence {
            config.high_confidence_threshold = v;
        }
        if let Some(v) = self.max_iterations {
            config.max_iterations = v;
        }
        if let Some(v) = self.min_ani {
            config.species_ani_threshold = v;
        }
        if let Some(v) = self.min_af {
            config.af_threshold = v;
        }
        config.validate()?;
        Ok(config)
    }

    fn placements(&self, domain: Domain) -> Option<&PathBuf> {
        match domain {
            Domain::Bacteria => self.bac120_placements.as_ref(),
            Domain::Archaea => self.ar122_placements.as_ref(),
        }
    }
}

/// Execute classify subcommand
///
/// # Errors
///
/// Returns an error if the reference data fails the integrity gate, an input
/// table cannot be parsed, or a domain run fails as a whole.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ClassifyArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = args.config()?;
    if Domain::ALL.iter().all(|&d| args.placements(d).is_none()) {
        anyhow::bail!("Nothing to classify: pass --bac120-placements and/or --ar122-placements");
    }

    let reference = verify(&args.data.data_path, args.data.manifest.as_deref(), &config.min_ref_data_version)?;
    let layout = reference.layout();

    let taxonomy = parse_file(&layout.taxonomy_file(), parse_taxonomy)?;
    let radii_path = args.radii.clone().unwrap_or_else(|| layout.radii_file());
    let radii: Option<RadiusTable> = if radii_path.exists() {
        Some(parse_file(&radii_path, parse_radii)?)
    } else {
        None
    };
    let similarities = match &args.similarities {
        Some(path) => parse_file(path, parse_similarities)?,
        None => Vec::new(),
    };
    let marker_hits: Option<Vec<MarkerHit>> = match &args.marker_hits {
        Some(path) => Some(parse_file(path, parse_marker_hits)?),
        None => None,
    };

    if verbose {
        eprintln!(
            "Loaded {} reference lineages, {} radii, {} similarity records",
            taxonomy.len(),
            radii.as_ref().map_or(0, RadiusTable::len),
            similarities.len()
        );
    }

    let out = OutputLayout::new(&args.out_dir);
    let mut all: Vec<TaxonomicAssignment> = Vec::new();

    for domain in Domain::ALL {
        let Some(path) = args.placements(domain) else {
            continue;
        };
        let placements = parse_file(path, parse_placements)?;
        let descriptor = DomainDescriptor::load(&reference, domain)?;
        let store = IterationStore::new(out.clone(), domain);
        let placer: Box<dyn Placer> = match &args.iteration_placements {
            Some(dir) => Box::new(TablePlacer::new(dir, domain)),
            None => Box::new(NoPlacer),
        };

        let mut pipeline = DomainPipeline::new(&descriptor, &taxonomy, &config).with_store(&store);
        if let Some(radii) = &radii {
            pipeline = pipeline.with_radii(radii);
        }
        let inputs = DomainInputs {
            placements,
            similarities: &similarities,
            marker_hits: marker_hits.as_deref(),
        };
        let run = pipeline.run(inputs, placer.as_ref())?;

        write_summary(&out.summary_file(domain), &run.assignments)?;
        report(&run, verbose);
        all.extend(run.assignments);
    }

    match format {
        OutputFormat::Text => print!("{}", summary_text(&all)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&all)?),
        OutputFormat::Tsv => print!("{}", summary_tsv(&all)),
    }

    Ok(())
}

fn report(run: &DomainRun, verbose: bool) {
    if verbose {
        eprintln!(
            "{}: {} queries ({} single pass, {} refined over {} iterations)",
            run.domain,
            run.assignments.len(),
            run.high_confidence,
            run.low_confidence,
            run.iterations
        );
    }
    if let Some(iteration) = run.suspended_at {
        eprintln!(
            "Warning: {} refinement stopped before iteration {iteration}; \
             provide its placements with --iteration-placements and rerun to resume",
            run.domain
        );
    }
}
