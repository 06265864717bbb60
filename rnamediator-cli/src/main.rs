//! # RNAmediator CLI - genome-scale accessibility screens
//!
//! Command-line driver for constraint folding runs and the collection of their
//! window files.
//!
//! ## Usage
//!
//! ```bash
//! # Fold a sliding 7-mer constraint along every gene
//! rnamediator fold -s genes.fa -o windows --sliding 7 -w 240 -l 160 -u 7
//!
//! # Fold constraints from a BED file
//! rnamediator fold -s genes.fa -o windows --constraints sites.bed
//!
//! # Collect reacting positions into BED collections
//! rnamediator collect -g genes.bed -i windows -o results -c 0.5 -b 0.1 -u 7
//!
//! # Per-strand bedGraph tracks for a genome browser
//! rnamediator tracks -g genes.bed -i windows -o tracks --chromsizes hg38.chrom.sizes
//!
//! # Whole-window folds and cooperativity of two-site constraints
//! rnamediator ddg -s genes.fa -o folds --paired-constraints pairs.bed
//! ```
//!
//! ## Options
//!
//! - `--loglevel <LEVEL>`: error, warn, info, debug or trace (default: warn);
//!   `RUST_LOG` takes precedence
//! - `-z, --procs <N>`: worker threads (default: all cores)
//!
//! Gene FASTA headers follow `gene::chrom:start-end(strand)`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use rnamediator_core::annotation::{BedLayout, ChromSizes, read_gene_bed};
use rnamediator_core::config::{
    ConstraintSource, FoldDriverConfig, FoldingParameters, PipelineConfig, SelectionParams,
};
use rnamediator_core::coordinates::GeneCoordinates;
#[cfg(not(feature = "vienna-ffi"))]
use rnamediator_core::fold::command::CommandLineBackend;
use rnamediator_core::fold::{FoldingBackend, FoldingEngine};
use rnamediator_core::pipeline::fold_driver::{fold_genes, fold_pairs};
use rnamediator_core::pipeline::{RunSummary, collect_regions, collect_tracks};
use rnamediator_core::sequence::io::{GeneRecord, read_gene_sequences};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn folding_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("window")
                .short('w')
                .long("window")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("240")
                .help("Folding window size"),
        )
        .arg(
            Arg::new("span")
                .short('l')
                .long("span")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("160")
                .help("Maximal base pair span"),
        )
        .arg(
            Arg::new("temperature")
                .short('t')
                .long("temperature")
                .value_name("CELSIUS")
                .value_parser(value_parser!(f64))
                .default_value("37.0")
                .help("Folding temperature"),
        )
        .arg(
            Arg::new("region")
                .short('u')
                .long("region")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("1")
                .help("Length of the unpaired stretch evaluated per position"),
        )
        .arg(
            Arg::new("outdir")
                .short('o')
                .long("outdir")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .default_value(".")
                .help("Output directory"),
        )
}

fn driver_args(command: Command) -> Command {
    folding_args(command)
        .arg(
            Arg::new("sequence")
                .short('s')
                .long("sequence")
                .value_name("FASTA")
                .value_parser(value_parser!(PathBuf))
                .required(true)
                .help("Gene sequences, optionally gzipped"),
        )
        .arg(
            Arg::new("multiplier")
                .short('m')
                .long("multiplier")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("2")
                .help("Window is extended by window * multiplier around each constraint"),
        )
        .arg(
            Arg::new("rnaplfold")
                .long("rnaplfold")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .default_value("RNAplfold")
                .help("RNAplfold executable"),
        )
        .arg(
            Arg::new("rnafold")
                .long("rnafold")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .default_value("RNAfold")
                .help("RNAfold executable"),
        )
}

fn collection_args(command: Command) -> Command {
    folding_args(command)
        .arg(
            Arg::new("genes")
                .short('g')
                .long("genes")
                .value_name("BED")
                .value_parser(value_parser!(PathBuf))
                .required(true)
                .help("Genomic coordinates of the genes"),
        )
        .arg(
            Arg::new("annotated")
                .long("annotated")
                .action(ArgAction::SetTrue)
                .help("Gene BED uses the annotated layout (columns 10, 11 and 14)"),
        )
        .arg(
            Arg::new("indir")
                .short('i')
                .long("indir")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .default_value(".")
                .help("Directory with one subdirectory of window files per gene"),
        )
        .arg(
            Arg::new("cutoff")
                .short('c')
                .long("cutoff")
                .value_name("P")
                .value_parser(value_parser!(f64))
                .default_value("1.0")
                .help("Maximal mean unpaired probability of the constraint region"),
        )
        .arg(
            Arg::new("border")
                .short('b')
                .long("border")
                .value_name("DELTA")
                .value_parser(value_parser!(f64))
                .default_value("0.0")
                .help("Minimal absolute change in unpaired probability"),
        )
        .arg(
            Arg::new("padding")
                .long("padding")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .help("Positions this close to the constraint are not reported"),
        )
}

fn cli() -> Command {
    Command::new("rnamediator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Constraint folding and differential RNA accessibility")
        .subcommand_required(true)
        .arg(
            Arg::new("loglevel")
                .long("loglevel")
                .value_name("LEVEL")
                .global(true)
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("warn")
                .help("Log level, overridden by RUST_LOG"),
        )
        .arg(
            Arg::new("procs")
                .short('z')
                .long("procs")
                .value_name("N")
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Number of worker threads (default: all cores)"),
        )
        .subcommand(
            driver_args(Command::new("fold").about("Fold constraints and write window files"))
                .arg(
                    Arg::new("constraints")
                        .long("constraints")
                        .value_name("BED")
                        .value_parser(value_parser!(PathBuf))
                        .conflicts_with_all(["paired-constraints", "sliding"])
                        .help("Constraint sites in transcript coordinates"),
                )
                .arg(
                    Arg::new("paired-constraints")
                        .long("paired-constraints")
                        .value_name("BED")
                        .value_parser(value_parser!(PathBuf))
                        .conflicts_with("sliding")
                        .help("Two-site constraints, both halves on one line"),
                )
                .arg(
                    Arg::new("sliding")
                        .long("sliding")
                        .value_name("LENGTH")
                        .value_parser(value_parser!(usize))
                        .default_value("7")
                        .help("Length of a constraint slid along each gene"),
                )
                .arg(
                    Arg::new("step")
                        .long("step")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .default_value("1")
                        .help("Step of the sliding constraint"),
                ),
        )
        .subcommand(
            driver_args(Command::new("ddg").about("Whole-window folds of two-site constraints"))
                .arg(
                    Arg::new("paired-constraints")
                        .long("paired-constraints")
                        .value_name("BED")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .help("Two-site constraints, both halves on one line"),
                ),
        )
        .subcommand(collection_args(
            Command::new("collect").about("Collect reacting positions into BED collections"),
        ))
        .subcommand(
            collection_args(Command::new("tracks").about("Write per-strand bedGraph tracks"))
                .arg(
                    Arg::new("chromsizes")
                        .long("chromsizes")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .help("Chromosome sizes, defining track order"),
                )
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .value_name("NAME")
                        .default_value("RNAmediator")
                        .help("Base name of the track files"),
                ),
        )
}

fn value<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .with_context(|| format!("missing value for --{id}"))
}

fn folding_parameters(matches: &ArgMatches) -> Result<FoldingParameters> {
    Ok(FoldingParameters {
        window: value(matches, "window")?,
        span: value(matches, "span")?,
        region: value(matches, "region")?,
        temperature: value(matches, "temperature")?,
    })
}

fn driver_config(matches: &ArgMatches, constraints: ConstraintSource) -> Result<FoldDriverConfig> {
    Ok(FoldDriverConfig {
        folding: folding_parameters(matches)?,
        constraints,
        window_multiplier: value(matches, "multiplier")?,
        output_dir: value(matches, "outdir")?,
        threads: matches.get_one::<usize>("procs").copied(),
    })
}

fn pipeline_config(matches: &ArgMatches) -> Result<PipelineConfig> {
    let folding = folding_parameters(matches)?;
    Ok(PipelineConfig {
        folding,
        selection: SelectionParams {
            border: value(matches, "border")?,
            cutoff: value(matches, "cutoff")?,
            padding: value(matches, "padding")?,
            ulim: folding.region,
        },
        input_dir: value(matches, "indir")?,
        output_dir: value(matches, "outdir")?,
        track_name: matches
            .try_get_one::<String>("name")
            .ok()
            .flatten()
            .cloned()
            .unwrap_or_else(|| PipelineConfig::default().track_name),
        threads: matches.get_one::<usize>("procs").copied(),
    })
}

fn engine(matches: &ArgMatches) -> Result<FoldingEngine<Box<dyn FoldingBackend>>> {
    #[cfg(feature = "vienna-ffi")]
    {
        let _ = matches;
        Ok(FoldingEngine::new(Box::new(
            rnamediator_core::fold::vienna::ViennaBackend,
        )))
    }
    #[cfg(not(feature = "vienna-ffi"))]
    {
        let backend = CommandLineBackend::new(
            value::<PathBuf>(matches, "rnaplfold")?,
            value::<PathBuf>(matches, "rnafold")?,
        );
        if !backend.is_available() {
            bail!("ViennaRNA executables not found, install ViennaRNA or pass --rnaplfold/--rnafold");
        }
        Ok(FoldingEngine::new(Box::new(backend)))
    }
}

fn read_sequences(matches: &ArgMatches) -> Result<Vec<GeneRecord>> {
    let path: PathBuf = value(matches, "sequence")?;
    let records = read_gene_sequences(&path)
        .with_context(|| format!("failed to read sequences from {}", path.display()))?;
    if records.is_empty() {
        bail!("no sequences in {}", path.display());
    }
    info!(genes = records.len(), "Read gene sequences");
    Ok(records)
}

fn read_genes(matches: &ArgMatches) -> Result<BTreeMap<String, GeneCoordinates>> {
    let path: PathBuf = value(matches, "genes")?;
    let layout = if matches.get_flag("annotated") {
        BedLayout::Annotated
    } else {
        BedLayout::Plain
    };
    let genes = read_gene_bed(&path, layout)
        .with_context(|| format!("failed to read gene coordinates from {}", path.display()))?;
    if genes.is_empty() {
        bail!("no genes in {}", path.display());
    }
    Ok(genes)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create output directory: {}", path.display()))
}

fn report(summary: &RunSummary) {
    if !summary.failures.is_empty() {
        warn!(
            failures = summary.failures.len(),
            "Some windows failed, see summary.json"
        );
    }
    info!(
        genes = summary.genes,
        skipped = summary.genes_skipped,
        windows = summary.windows,
        files = summary.files.len(),
        "Done"
    );
}

fn run_fold(matches: &ArgMatches) -> Result<RunSummary> {
    let constraints = if let Some(path) = matches.get_one::<PathBuf>("constraints") {
        ConstraintSource::Bed(path.clone())
    } else if let Some(path) = matches.get_one::<PathBuf>("paired-constraints") {
        ConstraintSource::PairedBed(path.clone())
    } else {
        ConstraintSource::Sliding {
            length: value(matches, "sliding")?,
            step: value(matches, "step")?,
        }
    };
    let config = driver_config(matches, constraints)?;
    create_dir(&config.output_dir)?;
    let records = read_sequences(matches)?;
    let engine = engine(matches)?;
    fold_genes(&engine, &records, &config).context("folding run failed")
}

fn run_ddg(matches: &ArgMatches) -> Result<RunSummary> {
    let path: PathBuf = value(matches, "paired-constraints")?;
    let config = driver_config(matches, ConstraintSource::PairedBed(path))?;
    create_dir(&config.output_dir)?;
    let records = read_sequences(matches)?;
    let engine = engine(matches)?;
    fold_pairs(&engine, &records, &config).context("whole-fold run failed")
}

fn run_collect(matches: &ArgMatches) -> Result<RunSummary> {
    let config = pipeline_config(matches)?;
    let genes = read_genes(matches)?;
    create_dir(&config.output_dir)?;
    collect_regions(&config, &genes).context("collection failed")
}

fn run_tracks(matches: &ArgMatches) -> Result<RunSummary> {
    let config = pipeline_config(matches)?;
    let genes = read_genes(matches)?;
    let sizes_path: PathBuf = value(matches, "chromsizes")?;
    let sizes = ChromSizes::read(&sizes_path).with_context(|| {
        format!("failed to read chromosome sizes from {}", sizes_path.display())
    })?;
    if sizes.is_empty() {
        bail!("no chromosomes in {}", sizes_path.display());
    }
    create_dir(&config.output_dir)?;
    collect_tracks(&config, &genes, &sizes).context("track generation failed")
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    let level: String = value(&matches, "loglevel")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let summary = match matches.subcommand() {
        Some(("fold", sub)) => run_fold(sub)?,
        Some(("ddg", sub)) => run_ddg(sub)?,
        Some(("collect", sub)) => run_collect(sub)?,
        Some(("tracks", sub)) => run_tracks(sub)?,
        _ => bail!("unknown subcommand"),
    };
    report(&summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rnamediator_core::config::FoldDriverConfig;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_defaults_match_library() {
        let matches = cli()
            .try_get_matches_from(["rnamediator", "fold", "-s", "genes.fa"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let config = driver_config(sub, ConstraintSource::Sliding { length: 7, step: 1 }).unwrap();
        let defaults = FoldDriverConfig::default();
        assert_eq!(config.folding, defaults.folding);
        assert_eq!(config.window_multiplier, defaults.window_multiplier);
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_collection_config_from_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "rnamediator", "collect", "-g", "genes.bed", "-u", "5", "-c", "0.4", "-b", "0.1",
                "--padding", "2", "-z", "3",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let config = pipeline_config(sub).unwrap();
        assert_eq!(config.selection.ulim, 5);
        assert_eq!(config.selection.cutoff, 0.4);
        assert_eq!(config.selection.padding, 2);
        assert_eq!(config.folding.window, 240);
        assert_eq!(config.threads, Some(3));
    }

    #[test]
    fn test_constraint_sources_conflict() {
        let result = cli().try_get_matches_from([
            "rnamediator", "fold", "-s", "g.fa", "--constraints", "a.bed", "--paired-constraints",
            "b.bed",
        ]);
        assert!(result.is_err());
    }
}
