//! Constraint folding runs.
//!
//! For every gene and every constraint a folding window is cut around the
//! constraint and folded three times: unconstrained, with the constraint forced
//! unpaired and with it forced paired. The unconstrained profile and both
//! difference profiles are stored as window files for a later collection run.
//!
//! Whole-fold runs evaluate two-site constraints on the same windows and
//! report how cooperatively the sites open.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use super::windows::WindowKey;
use super::{GeneReport, RunSummary, build_pool, run_genes};
use crate::annotation::{read_constraint_bed, read_paired_constraint_bed};
use crate::config::{ConstraintSource, FoldDriverConfig};
use crate::constants::{COOPERATIVITY_TABLE, SUMMARY_FILE};
use crate::constraint::expand_window;
use crate::difference::{cooperativity, difference_profile};
use crate::fold::{FoldingBackend, FoldingEngine};
use crate::output::write_fold_table;
use crate::profile::ProfileArray;
use crate::selection::Category;
use crate::sequence::io::GeneRecord;
use crate::types::{Constraint, ConstraintKind, MediatorError, Region, Result};

/// Constraints of a run, resolved before any folding starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintPlan {
    /// Constraint of `length` residues every `step` residues
    Sliding { length: usize, step: usize },
    /// Single sites per gene
    Sites(BTreeMap<String, Vec<Region>>),
    /// Two-site constraints per gene
    Pairs(BTreeMap<String, Vec<(Region, Region)>>),
}

impl ConstraintPlan {
    /// Reads the constraint files named by `source`.
    ///
    /// # Errors
    ///
    /// Propagates I/O and parse errors of the constraint BED.
    pub fn load(source: &ConstraintSource) -> Result<Self> {
        match source {
            ConstraintSource::Sliding { length, step } => Ok(Self::Sliding {
                length: *length,
                step: *step,
            }),
            ConstraintSource::Bed(path) => Ok(Self::Sites(read_constraint_bed(path)?)),
            ConstraintSource::PairedBed(path) => {
                Ok(Self::Pairs(read_paired_constraint_bed(path)?))
            }
        }
    }

    /// Unpaired constraints for a gene of `length` residues.
    ///
    /// Sliding constraints that do not fit are dropped.
    pub fn constraints(&self, gene: &str, length: usize) -> Vec<Constraint> {
        match self {
            Self::Sliding { length: size, step } => {
                if *size == 0 || *size > length {
                    return Vec::new();
                }
                (0..=length - size)
                    .step_by((*step).max(1))
                    .map(|start| Constraint::unpaired(Region::new(start, start + size)))
                    .collect()
            }
            Self::Sites(sites) => sites
                .get(gene)
                .into_iter()
                .flatten()
                .map(|r| Constraint::unpaired(*r))
                .collect(),
            Self::Pairs(pairs) => pairs
                .get(gene)
                .into_iter()
                .flatten()
                .map(|(first, second)| Constraint::unpaired(*first).with_second(*second))
                .collect(),
        }
    }
}

/// Smallest region covering every site of `constraint`.
fn hull(constraint: &Constraint) -> Region {
    constraint.regions().fold(constraint.region, |acc, r| {
        Region::new(acc.start.min(r.start), acc.end.max(r.end))
    })
}

fn shift(region: Region, offset: usize) -> Region {
    Region::new(region.start - offset, region.end - offset)
}

/// `constraint` moved into window coordinates with `kind` applied.
fn localize(constraint: &Constraint, window: Region, kind: ConstraintKind) -> Constraint {
    Constraint {
        kind,
        region: shift(constraint.region, window.start),
        second: constraint.second.map(|r| shift(r, window.start)),
        value: constraint.value.clone(),
    }
}

fn window_key(record: &GeneRecord, constraint: Region, window: Region) -> WindowKey {
    WindowKey {
        gene: record.header.gene.clone(),
        chrom: record.header.chrom.clone(),
        strand: record.header.strand,
        constraint,
        window,
    }
}

/// Folding window around `constraint`, checked against the gene.
fn window_for(constraint: &Constraint, config: &FoldDriverConfig, length: usize) -> Result<(Region, Region)> {
    constraint.check_bounds(length)?;
    let site = hull(constraint);
    let window = expand_window(
        site,
        config.folding.window,
        config.window_multiplier,
        length,
    );
    Ok((site, window))
}

/// Folds one constraint and writes its three window files into `dir`.
fn fold_window<B: FoldingBackend>(
    engine: &FoldingEngine<B>,
    record: &GeneRecord,
    constraint: &Constraint,
    config: &FoldDriverConfig,
    dir: &Path,
    raw_cache: &mut HashMap<Region, ProfileArray>,
) -> Result<()> {
    let (site, window) = window_for(constraint, config, record.sequence.len())?;
    let sequence = record.sequence.slice(window)?;
    let params = &config.folding;

    let raw = match raw_cache.get(&window) {
        Some(raw) => raw.clone(),
        None => {
            let raw = engine.fold(&sequence, params, None)?;
            raw_cache.insert(window, raw.clone());
            raw
        }
    };
    let unpaired = engine.fold(
        &sequence,
        params,
        Some(&localize(constraint, window, ConstraintKind::Unpaired)),
    )?;
    let paired = engine.fold(
        &sequence,
        params,
        Some(&localize(constraint, window, ConstraintKind::Paired)),
    )?;

    let key = window_key(record, site, window);
    raw.write_npy_file(&dir.join(key.raw_file_name(params)))?;
    difference_profile(&raw, &unpaired)
        .write_npy_file(&dir.join(key.diff_file_name(Category::Unpaired, params)))?;
    difference_profile(&raw, &paired)
        .write_npy_file(&dir.join(key.diff_file_name(Category::Paired, params)))?;
    debug!(window = %key.describe(), "Wrote window files");
    Ok(())
}

/// Folds every constraint of one gene.
pub fn fold_gene<B: FoldingBackend>(
    engine: &FoldingEngine<B>,
    record: &GeneRecord,
    plan: &ConstraintPlan,
    config: &FoldDriverConfig,
) -> GeneReport {
    let gene = &record.header.gene;
    let span = info_span!("gene", gene = %gene);
    let _enter = span.enter();

    let mut report = GeneReport::new(gene);
    let constraints = plan.constraints(gene, record.sequence.len());
    if constraints.is_empty() {
        warn!(length = record.sequence.len(), "No constraints for gene, skipping");
        report.skipped = true;
        return report;
    }

    let dir = config.output_dir.join(gene);
    if let Err(e) = fs::create_dir_all(&dir) {
        report.fail("output directory", e.into());
        return report;
    }

    let mut raw_cache = HashMap::new();
    for constraint in &constraints {
        match fold_window(engine, record, constraint, config, &dir, &mut raw_cache) {
            Ok(()) => report.windows += 1,
            Err(e) => report.fail(constraint.to_string(), e),
        }
    }
    info!(
        windows = report.windows,
        failures = report.failures.len(),
        "Folded gene"
    );
    report
}

/// Folds all genes and writes their window files below `config.output_dir`.
///
/// # Errors
///
/// Returns errors reading constraint files, creating the output directory or
/// the worker pool. Failed windows are listed in the summary.
pub fn fold_genes<B: FoldingBackend>(
    engine: &FoldingEngine<B>,
    records: &[GeneRecord],
    config: &FoldDriverConfig,
) -> Result<RunSummary> {
    let plan = ConstraintPlan::load(&config.constraints)?;
    fs::create_dir_all(&config.output_dir)?;
    let pool = build_pool(config.threads)?;
    info!(
        genes = records.len(),
        threads = pool.current_num_threads(),
        window = config.folding.window,
        span = config.folding.span,
        "Folding constraints"
    );

    let reports = run_genes(&pool, records.iter().collect(), |record| {
        fold_gene(engine, record, &plan, config)
    });
    let mut summary = RunSummary::default();
    for report in &reports {
        summary.add_report(report);
    }
    summary.write_json(&config.output_dir.join(SUMMARY_FILE))?;
    info!(
        windows = summary.windows,
        failures = summary.failures.len(),
        "Folding finished"
    );
    Ok(summary)
}

/// Cooperativity of two sites, with sites in transcript coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CooperativityScore {
    pub gene: String,
    pub first: Region,
    pub second: Region,
    pub score: f64,
}

/// Whole-window folds of one two-site constraint; writes the fold table.
fn fold_pair<B: FoldingBackend>(
    engine: &FoldingEngine<B>,
    record: &GeneRecord,
    constraint: &Constraint,
    config: &FoldDriverConfig,
    dir: &Path,
) -> Result<CooperativityScore> {
    let Some(second) = constraint.second else {
        return Err(MediatorError::InvalidConstraint(format!(
            "{constraint} has a single site"
        )));
    };
    let (site, window) = window_for(constraint, config, record.sequence.len())?;
    let sequence = record.sequence.slice(window)?;
    let result = engine.fold_cooperative(
        &sequence,
        config.folding.span,
        config.folding.temperature,
        shift(constraint.region, window.start),
        shift(second, window.start),
    )?;

    let key = window_key(record, site, window);
    let path = dir.join(key.fold_table_file_name(&config.folding));
    let mut writer = BufWriter::new(File::create(&path)?);
    write_fold_table(&mut writer, &result)?;
    writer.flush()?;

    Ok(CooperativityScore {
        gene: record.header.gene.clone(),
        first: constraint.region,
        second,
        score: cooperativity(&result)?,
    })
}

/// Whole-window folds for every two-site constraint of one gene.
pub fn fold_gene_pairs<B: FoldingBackend>(
    engine: &FoldingEngine<B>,
    record: &GeneRecord,
    plan: &ConstraintPlan,
    config: &FoldDriverConfig,
) -> GeneReport {
    let gene = &record.header.gene;
    let span = info_span!("gene", gene = %gene);
    let _enter = span.enter();

    let mut report = GeneReport::new(gene);
    let constraints = plan.constraints(gene, record.sequence.len());
    if constraints.is_empty() {
        warn!("No constraints for gene, skipping");
        report.skipped = true;
        return report;
    }
    let dir = config.output_dir.join(gene);
    if let Err(e) = fs::create_dir_all(&dir) {
        report.fail("output directory", e.into());
        return report;
    }

    for constraint in &constraints {
        match fold_pair(engine, record, constraint, config, &dir) {
            Ok(score) => {
                debug!(constraint = %constraint, score = score.score, "Cooperativity");
                report.windows += 1;
                report.scores.push(score);
            }
            Err(e) => report.fail(constraint.to_string(), e),
        }
    }
    info!(pairs = report.scores.len(), "Folded constraint pairs");
    report
}

/// Writes `Gene\tFirst\tSecond\tCooperativity` rows, sites 1-based inclusive.
///
/// # Errors
///
/// Propagates I/O errors.
pub fn write_cooperativity<W: Write>(writer: &mut W, scores: &[CooperativityScore]) -> Result<()> {
    writeln!(writer, "Gene\tFirst\tSecond\tCooperativity")?;
    for score in scores {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            score.gene,
            score.first.location(),
            score.second.location(),
            score.score
        )?;
    }
    Ok(())
}

/// Whole-fold run over two-site constraints: one fold table per constraint and
/// a `Cooperativity.tsv` over all genes.
///
/// # Errors
///
/// Returns [`MediatorError::NotSupported`] unless the constraints come from a
/// paired constraint BED, plus the errors of [`fold_genes`].
pub fn fold_pairs<B: FoldingBackend>(
    engine: &FoldingEngine<B>,
    records: &[GeneRecord],
    config: &FoldDriverConfig,
) -> Result<RunSummary> {
    let plan = ConstraintPlan::load(&config.constraints)?;
    if !matches!(plan, ConstraintPlan::Pairs(_)) {
        return Err(MediatorError::NotSupported(
            "cooperativity needs two-site constraints from a paired constraint BED".to_string(),
        ));
    }
    fs::create_dir_all(&config.output_dir)?;
    let pool = build_pool(config.threads)?;
    info!(genes = records.len(), "Folding constraint pairs");

    let reports = run_genes(&pool, records.iter().collect(), |record| {
        fold_gene_pairs(engine, record, &plan, config)
    });
    let mut summary = RunSummary::default();
    let mut scores = Vec::new();
    for report in reports {
        summary.add_report(&report);
        scores.extend(report.scores);
    }

    let path = config.output_dir.join(COOPERATIVITY_TABLE);
    if scores.is_empty() {
        crate::output::remove_if_exists(&path)?;
    } else {
        let mut writer = BufWriter::new(File::create(&path)?);
        write_cooperativity(&mut writer, &scores)?;
        writer.flush()?;
        summary.files.push(path);
    }
    summary.write_json(&config.output_dir.join(SUMMARY_FILE))?;
    Ok(summary)
}
