//! Names of per-window result files and their discovery on disk.
//!
//! Every folded window leaves three NPY files in the gene directory:
//!
//! ```text
//! {gene}_{chrom}_{strand}_{cons}_{reg}_raw_{window}_{span}_{temp}.npy
//! StruCons_{gene}_{chrom}_{strand}_{cons}_{reg}_diffnu_{window}_{span}_{temp}.npy
//! StruCons_{gene}_{chrom}_{strand}_{cons}_{reg}_diffnp_{window}_{span}_{temp}.npy
//! ```
//!
//! `cons` and `reg` are 1-based inclusive transcript ranges (`start-end`) of
//! the constraint and the folded window.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::FoldingParameters;
use crate::constants::{
    CONSTRAINED_PREFIX, DIFF_PAIRED_TAG, DIFF_UNPAIRED_TAG, FOLD_TABLE_TAG, RAW_TAG,
};
use crate::selection::Category;
use crate::types::{MediatorError, Region, Result, Strand, parse_strand, strand_symbol};

/// Identity of one folded window of a gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowKey {
    pub gene: String,
    pub chrom: String,
    pub strand: Strand,
    /// Constraint, 0-based half-open transcript coordinates
    pub constraint: Region,
    /// Folded window, 0-based half-open transcript coordinates
    pub window: Region,
}

impl WindowKey {
    fn stem(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.gene,
            self.chrom,
            strand_symbol(self.strand),
            self.constraint.location(),
            self.window.location()
        )
    }

    fn suffix(params: &FoldingParameters, extension: &str) -> String {
        format!(
            "{}_{}_{}.{extension}",
            params.window,
            params.span,
            params.temperature_tag()
        )
    }

    /// File holding the unconstrained profile of the window.
    pub fn raw_file_name(&self, params: &FoldingParameters) -> String {
        format!("{}_{RAW_TAG}_{}", self.stem(), Self::suffix(params, "npy"))
    }

    /// Fold table of whole-window folds around the constraint.
    pub fn fold_table_file_name(&self, params: &FoldingParameters) -> String {
        format!("{}_{FOLD_TABLE_TAG}_{}", self.stem(), Self::suffix(params, "tsv"))
    }

    /// File holding the difference profile for `category`.
    pub fn diff_file_name(&self, category: Category, params: &FoldingParameters) -> String {
        let tag = match category {
            Category::Unpaired => DIFF_UNPAIRED_TAG,
            Category::Paired => DIFF_PAIRED_TAG,
        };
        format!(
            "{CONSTRAINED_PREFIX}_{}_{tag}_{}",
            self.stem(),
            Self::suffix(params, "npy")
        )
    }

    /// Short description used in log messages and failure reports.
    pub fn describe(&self) -> String {
        format!(
            "window {} constraint {}",
            self.window.location(),
            self.constraint.location()
        )
    }
}

/// Matches raw window files of `gene` folded with `params`.
///
/// # Errors
///
/// Returns [`MediatorError::ParseError`] if the pattern cannot be compiled.
pub fn raw_file_pattern(gene: &str, params: &FoldingParameters) -> Result<Regex> {
    let pattern = format!(
        r"^{}_(?P<chrom>.+)_(?P<strand>[+\-.])_(?P<cons>\d+-\d+)_(?P<reg>\d+-\d+)_{RAW_TAG}_{}_{}_{}\.npy$",
        regex::escape(gene),
        params.window,
        params.span,
        regex::escape(&params.temperature_tag())
    );
    Regex::new(&pattern).map_err(|e| MediatorError::ParseError(e.to_string()))
}

/// Reads the window identity from a raw file name matched by `pattern`.
pub fn parse_raw_file_name(name: &str, gene: &str, pattern: &Regex) -> Option<WindowKey> {
    let caps = pattern.captures(name)?;
    Some(WindowKey {
        gene: gene.to_string(),
        chrom: caps["chrom"].to_string(),
        strand: parse_strand(&caps["strand"]).ok()?,
        constraint: Region::parse_location(&caps["cons"]).ok()?,
        window: Region::parse_location(&caps["reg"]).ok()?,
    })
}

/// Raw window files of `gene` below `dir`, ordered along the transcript.
///
/// A missing directory yields no windows.
///
/// # Errors
///
/// Propagates I/O errors while listing an existing directory.
pub fn discover_windows(
    dir: &Path,
    gene: &str,
    params: &FoldingParameters,
) -> Result<Vec<WindowKey>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = raw_file_pattern(gene, params)?;
    let mut windows = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(key) = name
            .to_str()
            .and_then(|name| parse_raw_file_name(name, gene, &pattern))
        {
            windows.push(key);
        }
    }
    windows.sort_by_key(|k| (k.constraint.start, k.constraint.end, k.window.start, k.window.end));
    Ok(windows)
}

/// Paths of the raw and both difference files of `key` inside `dir`.
pub fn window_paths(
    dir: &Path,
    key: &WindowKey,
    params: &FoldingParameters,
) -> (PathBuf, PathBuf, PathBuf) {
    (
        dir.join(key.raw_file_name(params)),
        dir.join(key.diff_file_name(Category::Unpaired, params)),
        dir.join(key.diff_file_name(Category::Paired, params)),
    )
}
