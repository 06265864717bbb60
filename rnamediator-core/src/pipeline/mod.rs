//! Genome-scale driver.
//!
//! Genes are processed independently on a fixed-size worker pool. Each task
//! reads or writes only files of its own gene and hands a [`GeneReport`] back
//! to the coordinator, which logs failures and writes every shared output.
//!
//! Two kinds of runs exist:
//!
//! - folding runs ([`fold_driver`]) turn gene sequences into window files
//! - collection runs ([`collect_regions`], [`collect_tracks`]) turn window
//!   files into BED collections or bedGraph tracks

pub mod fold_driver;
pub mod windows;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::annotation::ChromSizes;
use crate::config::PipelineConfig;
use crate::constants::SUMMARY_FILE;
use crate::coordinates::{GeneCoordinates, GenomicWindow};
use crate::output::{TrackKind, TrackSet, write_collections, write_tracks};
use crate::profile::ProfileArray;
use crate::selection::{Selection, select_pair, track_entries};
use crate::types::{MediatorError, Result};
use fold_driver::CooperativityScore;
use windows::{WindowKey, discover_windows, window_paths};

/// Failure of one window or gene, reported instead of its output.
#[derive(Debug)]
pub struct UnitFailure {
    pub gene: String,
    /// Window or step that failed
    pub unit: String,
    pub error: MediatorError,
}

/// Everything a gene task produces.
#[derive(Debug, Default)]
pub struct GeneReport {
    pub gene: String,
    /// Windows processed successfully
    pub windows: usize,
    /// No input was found for the gene
    pub skipped: bool,
    pub selection: Selection,
    pub tracks: TrackSet,
    pub scores: Vec<CooperativityScore>,
    pub failures: Vec<UnitFailure>,
}

impl GeneReport {
    pub fn new(gene: &str) -> Self {
        Self {
            gene: gene.to_string(),
            ..Default::default()
        }
    }

    pub fn fail(&mut self, unit: impl Into<String>, error: MediatorError) {
        self.failures.push(UnitFailure {
            gene: self.gene.clone(),
            unit: unit.into(),
            error,
        });
    }
}

/// Failure as listed in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureSummary {
    pub gene: String,
    pub unit: String,
    pub error: String,
}

/// Counts of a finished run, written as `summary.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub genes: usize,
    pub genes_skipped: usize,
    pub genes_failed: usize,
    pub windows: usize,
    pub records_unpaired: usize,
    pub records_paired: usize,
    pub track_entries: usize,
    pub cooperativity_scores: usize,
    pub failures: Vec<FailureSummary>,
    pub files: Vec<PathBuf>,
}

impl RunSummary {
    /// Counts `report` and logs its failures.
    pub fn add_report(&mut self, report: &GeneReport) {
        self.genes += 1;
        self.genes_skipped += usize::from(report.skipped);
        self.genes_failed += usize::from(!report.failures.is_empty());
        self.windows += report.windows;
        self.records_unpaired += report.selection.unpaired.len();
        self.records_paired += report.selection.paired.len();
        self.track_entries += report.tracks.len();
        self.cooperativity_scores += report.scores.len();
        for failure in &report.failures {
            error!(
                gene = %failure.gene,
                unit = %failure.unit,
                "{}",
                failure.error
            );
            self.failures.push(FailureSummary {
                gene: failure.gene.clone(),
                unit: failure.unit.clone(),
                error: failure.error.to_string(),
            });
        }
    }

    /// Writes the summary as pretty printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates I/O and serialization errors.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Worker pool with `threads` threads, or one per core.
///
/// # Errors
///
/// Returns [`MediatorError::ThreadPool`] if the pool cannot be started.
pub fn build_pool(threads: Option<usize>) -> Result<ThreadPool> {
    let mut builder = ThreadPoolBuilder::new();
    if let Some(threads) = threads {
        builder = builder.num_threads(threads);
    }
    Ok(builder.build()?)
}

/// Runs `task` for every item on `pool`, keeping the input order.
pub(crate) fn run_genes<T, F>(pool: &ThreadPool, items: Vec<T>, task: F) -> Vec<GeneReport>
where
    T: Send,
    F: Fn(T) -> GeneReport + Sync + Send,
{
    pool.install(|| items.into_par_iter().map(&task).collect())
}

/// Output of a single window.
fn collect_window(
    dir: &Path,
    key: &WindowKey,
    coordinates: &GeneCoordinates,
    config: &PipelineConfig,
    tracks: bool,
) -> Result<(Selection, TrackSet)> {
    let (raw_path, unpaired_path, paired_path) = window_paths(dir, key, &config.folding);
    for path in [&unpaired_path, &paired_path] {
        if !path.is_file() {
            return Err(MediatorError::MissingInputFiles {
                gene: key.gene.clone(),
                detail: format!("{} lacks {}", key.describe(), path.display()),
            });
        }
    }

    let ulim = config.selection.ulim;
    let raw = ProfileArray::read_npy_file(&raw_path)?.column(ulim)?;
    let unpaired = ProfileArray::read_npy_file(&unpaired_path)?.column(ulim)?;
    let paired = ProfileArray::read_npy_file(&paired_path)?.column(ulim)?;
    let window = GenomicWindow::new(&key.gene, key.window, key.constraint, coordinates)?;
    if key.strand != coordinates.strand {
        warn!(
            window = %key.describe(),
            "Window file strand differs from gene annotation, using the annotation"
        );
    }

    let mut selection = Selection::default();
    let mut set = TrackSet::new();
    if tracks {
        set.add_window(
            track_entries(&raw, Some(&unpaired), &window, &config.selection),
            TrackKind::Unpaired,
        );
        let paired_tracks = track_entries(&raw, Some(&paired), &window, &config.selection);
        set.add(TrackKind::Paired, paired_tracks.strand, paired_tracks.diff);
    } else {
        selection = select_pair(&raw, &unpaired, &paired, &window, &config.selection);
    }
    debug!(
        window = %key.describe(),
        records = selection.len(),
        entries = set.len(),
        "Collected window"
    );
    Ok((selection, set))
}

/// Collects every window file of one gene.
pub fn collect_gene(
    gene: &str,
    coordinates: &GeneCoordinates,
    config: &PipelineConfig,
    tracks: bool,
) -> GeneReport {
    let span = info_span!("gene", gene = %gene);
    let _enter = span.enter();

    let mut report = GeneReport::new(gene);
    let dir = config.input_dir.join(gene);
    let keys = match discover_windows(&dir, gene, &config.folding) {
        Ok(keys) => keys,
        Err(e) => {
            report.fail("window discovery", e);
            return report;
        }
    };
    if keys.is_empty() {
        warn!(
            dir = %dir.display(),
            window = config.folding.window,
            span = config.folding.span,
            "No window files found, skipping gene"
        );
        report.skipped = true;
        return report;
    }

    for key in &keys {
        match collect_window(&dir, key, coordinates, config, tracks) {
            Ok((selection, set)) => {
                report.windows += 1;
                report.selection.extend(selection);
                report.tracks.merge(set);
            }
            Err(e) => report.fail(key.describe(), e),
        }
    }
    info!(
        windows = report.windows,
        records = report.selection.len(),
        entries = report.tracks.len(),
        "Collected gene"
    );
    report
}

fn collect_all(
    config: &PipelineConfig,
    genes: &BTreeMap<String, GeneCoordinates>,
    tracks: bool,
) -> Result<(RunSummary, Selection, TrackSet)> {
    fs::create_dir_all(&config.output_dir)?;
    let pool = build_pool(config.threads)?;
    info!(
        genes = genes.len(),
        threads = pool.current_num_threads(),
        "Collecting window files"
    );
    let reports = run_genes(&pool, genes.iter().collect(), |(gene, coordinates)| {
        collect_gene(gene, coordinates, config, tracks)
    });

    let mut summary = RunSummary::default();
    let mut selection = Selection::default();
    let mut set = TrackSet::new();
    for report in reports {
        summary.add_report(&report);
        selection.extend(report.selection);
        set.merge(report.tracks);
    }
    Ok((summary, selection, set))
}

/// Gathers the selected positions of every gene into the BED collections.
///
/// # Errors
///
/// Only errors that stop the whole run are returned: an unusable output
/// directory, a failing worker pool or failing writers. Window and gene
/// failures are listed in the summary.
pub fn collect_regions(
    config: &PipelineConfig,
    genes: &BTreeMap<String, GeneCoordinates>,
) -> Result<RunSummary> {
    let (mut summary, selection, _) = collect_all(config, genes, false)?;
    summary.files = write_collections(&config.output_dir, &selection)?;
    let summary_path = config.output_dir.join(SUMMARY_FILE);
    summary.write_json(&summary_path)?;
    info!(
        unpaired = summary.records_unpaired,
        paired = summary.records_paired,
        failures = summary.failures.len(),
        "Collection finished"
    );
    Ok(summary)
}

/// Gathers raw and difference profiles of every gene into bedGraph tracks.
///
/// # Errors
///
/// See [`collect_regions`].
pub fn collect_tracks(
    config: &PipelineConfig,
    genes: &BTreeMap<String, GeneCoordinates>,
    sizes: &ChromSizes,
) -> Result<RunSummary> {
    let (mut summary, _, set) = collect_all(config, genes, true)?;
    summary.files = write_tracks(
        &config.output_dir,
        &config.track_name,
        config.selection.ulim,
        &set,
        sizes,
    )?;
    summary.write_json(&config.output_dir.join(SUMMARY_FILE))?;
    info!(
        entries = summary.track_entries,
        tracks = summary.files.len(),
        failures = summary.failures.len(),
        "Track generation finished"
    );
    Ok(summary)
}
