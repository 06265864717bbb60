//! Unpaired-probability profiles.
//!
//! A [`ProfileArray`] holds one row per sequence position and one column per
//! region length `1..=u`: cell `(i, k)` is the probability that the `k` residues
//! ending at position `i + 1` are all unpaired. Cells the engine cannot compute
//! (`k > i + 1`) and any NaN coming out of a parser or engine are stored as
//! `None`, so downstream code never checks sentinel spellings.
//!
//! ## Formats
//!
//! - text: the RNAplfold `_lunp` table, optionally gzipped
//! - binary: NPY array of shape `[positions][1][u]` with NaN for missing cells
//!
//! ## Examples
//!
//! ```rust
//! use rnamediator_core::profile::ProfileArray;
//!
//! let text = "1\t0.9\tNA\n2\t0.8\t0.7\n";
//! let profile = ProfileArray::parse(text).unwrap();
//! assert_eq!(profile.rows(), 2);
//! assert_eq!(profile.get(0, 2), None);
//! assert_eq!(profile.get(1, 2), Some(0.7));
//!
//! let rendered = profile.to_text("NA", false);
//! assert!(rendered.starts_with("#unpaired probabilities"));
//! assert!(ProfileArray::parse(&rendered).unwrap().approx_eq(&profile));
//! ```

pub mod npy;

use std::fmt;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use ndarray::{Array2, Array3, Axis};

use crate::constants::{
    NA_LABEL, NEGATIVE_NOISE, PROFILE_COLUMN_PREFIX, PROFILE_HEADER, PROFILE_PRECISION,
    PROFILE_TOLERANCE,
};
use crate::types::{MediatorError, Result};
use npy::NpyArray;

/// Rows = positions, columns = region lengths.
#[derive(Debug, Clone)]
pub struct ProfileArray {
    cells: Array2<Option<f64>>,
}

fn malformed(detail: impl Into<String>) -> MediatorError {
    MediatorError::MalformedProfileFormat(detail.into())
}

fn is_gz(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

fn round(value: f64) -> f64 {
    let factor = 10f64.powi(PROFILE_PRECISION);
    (value * factor).round() / factor
}

fn format_value(value: f64) -> String {
    let value = round(value);
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Reads one table cell; every spelling of "not available" becomes `None`.
fn parse_cell(cell: &str) -> Result<Option<f64>> {
    match cell.trim() {
        "" | "NA" | "nan" | "NaN" | "None" => Ok(None),
        text => {
            let value: f64 = text
                .parse()
                .map_err(|_| malformed(format!("invalid probability '{text}'")))?;
            Ok((!value.is_nan()).then_some(value))
        }
    }
}

impl ProfileArray {
    pub fn from_array(cells: Array2<Option<f64>>) -> Self {
        let cells = cells.mapv(|c| c.filter(|v| !v.is_nan()));
        Self { cells }
    }

    /// Builds a profile from rectangular rows.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::MalformedProfileFormat`] for ragged rows.
    pub fn from_rows(rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(malformed(format!(
                "row {} has {} columns, expected {width}",
                i + 1,
                row.len()
            )));
        }
        let height = rows.len();
        let flat: Vec<Option<f64>> = rows.into_iter().flatten().collect();
        let cells = Array2::from_shape_vec((height, width), flat)
            .map_err(|e| malformed(e.to_string()))?;
        Ok(Self::from_array(cells))
    }

    /// Builds a profile from raw engine output, validating it on the way.
    ///
    /// NaN becomes `None`; see [`ProfileArray::checked`] for the other rules.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::EngineInvocationFailure`] on invalid output.
    pub fn from_engine_rows(rows: Vec<Vec<f64>>, expected_rows: usize) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| (!v.is_nan()).then_some(v)).collect())
            .collect();
        Self::from_rows(rows)
            .map_err(|e| MediatorError::EngineInvocationFailure(e.to_string()))?
            .checked(expected_rows)
    }

    /// Accepts engine output only with `expected_rows` positions and no negative
    /// probability. Values within [`NEGATIVE_NOISE`] below zero are set to 0.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::EngineInvocationFailure`] otherwise.
    pub fn checked(mut self, expected_rows: usize) -> Result<Self> {
        if self.rows() != expected_rows {
            return Err(MediatorError::EngineInvocationFailure(format!(
                "engine reported {} positions for a sequence of length {expected_rows}",
                self.rows()
            )));
        }
        if let Some(v) = self.cells.iter().flatten().find(|v| **v < -NEGATIVE_NOISE) {
            return Err(MediatorError::EngineInvocationFailure(format!(
                "engine reported negative probability {v}"
            )));
        }
        for v in self.cells.iter_mut().flatten() {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
        Ok(self)
    }

    /// Parses an unpaired-probability table with or without its two header lines.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::MalformedProfileFormat`] if the text is neither
    /// form or holds something other than probabilities.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let first = lines.next().unwrap_or_default();
        let skip = if first.starts_with("1\t") {
            0
        } else if first.starts_with('#') && lines.next().is_some_and(|l| l.starts_with(" #")) {
            2
        } else {
            return Err(malformed(
                "neither a raw probability table nor one with header lines",
            ));
        };

        let rows = text
            .lines()
            .skip(skip)
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split('\t').skip(1).map(parse_cell).collect())
            .collect::<Result<Vec<Vec<Option<f64>>>>>()?;
        Self::from_rows(rows)
    }

    /// Builds a profile from an NPY array of shape `[n][1][u]` or `[n][u]`.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::MalformedProfileFormat`] for other shapes.
    pub fn from_npy(array: NpyArray) -> Result<Self> {
        let (rows, cols) = match array.shape.as_slice() {
            [n, 1, u] | [n, u] => (*n, *u),
            [n] => (*n, 1),
            other => return Err(malformed(format!("unexpected array shape {other:?}"))),
        };
        let flat = array
            .data
            .into_iter()
            .map(|v| (!v.is_nan()).then_some(v))
            .collect();
        let cells =
            Array2::from_shape_vec((rows, cols), flat).map_err(|e| malformed(e.to_string()))?;
        Ok(Self { cells })
    }

    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    /// Number of region lengths per position.
    pub fn regions(&self) -> usize {
        self.cells.ncols()
    }

    pub fn cells(&self) -> &Array2<Option<f64>> {
        &self.cells
    }

    /// Cell at 0-based `row` and 1-based region length `region`.
    pub fn get(&self, row: usize, region: usize) -> Option<f64> {
        if region == 0 {
            return None;
        }
        self.cells.get((row, region - 1)).copied().flatten()
    }

    /// All positions for one 1-based region length.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::MalformedProfileFormat`] if the profile was
    /// computed for fewer region lengths.
    pub fn column(&self, region: usize) -> Result<Vec<Option<f64>>> {
        if region == 0 || region > self.regions() {
            return Err(malformed(format!(
                "region {region} requested from a profile with {} region lengths",
                self.regions()
            )));
        }
        Ok(self.cells.column(region - 1).to_vec())
    }

    /// Rows `start..end` (0-based, half-open), renumbered from 1.
    ///
    /// Bounds are clamped to the profile.
    #[must_use]
    pub fn localize(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.rows());
        let start = start.min(end);
        Self {
            cells: self
                .cells
                .slice_axis(Axis(0), (start..end).into())
                .to_owned(),
        }
    }

    /// Element-wise comparison within `1e-7`, two missing cells being equal.
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.cells.dim() == other.cells.dim()
            && self
                .cells
                .iter()
                .zip(other.cells.iter())
                .all(|(a, b)| match (a, b) {
                    (None, None) => true,
                    (Some(x), Some(y)) => (x - y).abs() <= PROFILE_TOLERANCE,
                    _ => false,
                })
    }

    /// Renders the table with values rounded to seven decimals.
    ///
    /// `truncated` drops the two header lines.
    pub fn to_text(&self, na_label: &str, truncated: bool) -> String {
        let mut out = String::new();
        if !truncated {
            let labels = (1..=self.regions())
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join("\t");
            let _ = writeln!(out, "{PROFILE_HEADER}");
            let _ = writeln!(out, "{PROFILE_COLUMN_PREFIX}{labels}");
        }
        for (i, row) in self.cells.rows().into_iter().enumerate() {
            let _ = write!(out, "{}", i + 1);
            for cell in row {
                match cell {
                    Some(v) => {
                        let _ = write!(out, "\t{}", format_value(*v));
                    }
                    None => {
                        let _ = write!(out, "\t{na_label}");
                    }
                }
            }
            out.push('\n');
        }
        out
    }

    /// Dense copy with NaN for missing cells and the legacy middle axis.
    pub fn to_npy_array(&self) -> Array3<f64> {
        self.cells
            .mapv(|c| c.unwrap_or(f64::NAN))
            .insert_axis(Axis(1))
    }

    fn to_npy(&self) -> NpyArray {
        let dense = self.to_npy_array();
        NpyArray {
            shape: dense.shape().to_vec(),
            data: dense.iter().copied().collect(),
        }
    }

    /// Reads a text table, decompressing `.gz` files.
    ///
    /// # Errors
    ///
    /// I/O errors and [`MediatorError::MalformedProfileFormat`].
    pub fn read_text_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut text = String::new();
        if is_gz(path) {
            MultiGzDecoder::new(file).read_to_string(&mut text)?;
        } else {
            BufReader::new(file).read_to_string(&mut text)?;
        }
        Self::parse(&text)
    }

    /// Writes the table with header lines, gzip-compressed for `.gz` paths.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors.
    pub fn write_text_file(&self, path: &Path, na_label: &str) -> Result<()> {
        let text = self.to_text(na_label, false);
        let file = File::create(path)?;
        if is_gz(path) {
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(text.as_bytes())?;
            encoder.finish()?;
        } else {
            let mut writer = BufWriter::new(file);
            writer.write_all(text.as_bytes())?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Reads an NPY window file.
    ///
    /// # Errors
    ///
    /// I/O errors and [`MediatorError::MalformedProfileFormat`].
    pub fn read_npy_file(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::from_npy(npy::read_npy(&mut reader)?)
    }

    /// Writes the profile as NPY array of shape `[n][1][u]`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors.
    pub fn write_npy_file(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        npy::write_npy(&mut writer, &self.to_npy())?;
        writer.flush()?;
        Ok(())
    }
}

impl PartialEq for ProfileArray {
    fn eq(&self, other: &Self) -> bool {
        self.approx_eq(other)
    }
}

impl fmt::Display for ProfileArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(NA_LABEL, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProfileArray {
        ProfileArray::from_rows(vec![
            vec![Some(0.912_345_678), None, None],
            vec![Some(0.5), Some(0.25), None],
            vec![Some(1.0), Some(0.0), Some(0.123_456_7)],
            vec![Some(0.3), None, Some(0.01)],
        ])
        .unwrap()
    }

    #[test]
    fn test_text_round_trip_with_missing_cells() {
        let profile = sample();
        let text = profile.to_text("NA", false);
        let parsed = ProfileArray::parse(&text).unwrap();
        assert!(parsed.approx_eq(&profile));
        assert_eq!(parsed.get(3, 2), None);
    }

    #[test]
    fn test_text_format() {
        let text = sample().to_text("NA", false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#unpaired probabilities");
        assert_eq!(lines[1], " #i$\tl=1\t2\t3");
        assert_eq!(lines[2], "1\t0.9123457\tNA\tNA");
        assert_eq!(lines[4], "3\t1.0\t0.0\t0.1234567");
    }

    #[test]
    fn test_truncated_text_and_custom_label() {
        let text = sample().to_text("nan", true);
        assert!(text.starts_with("1\t"));
        assert!(text.contains("\tnan"));
        assert!(ProfileArray::parse(&text).unwrap().approx_eq(&sample()));
    }

    #[test]
    fn test_sentinel_spellings() {
        let parsed = ProfileArray::parse("1\tnan\tNaN\n2\tNone\t\n3\tNA\t0.5\n").unwrap();
        assert_eq!(parsed.rows(), 3);
        assert_eq!(parsed.column(1).unwrap(), vec![None, None, None]);
        assert_eq!(parsed.column(2).unwrap(), vec![None, None, Some(0.5)]);
    }

    #[test]
    fn test_malformed_text() {
        for text in ["", "hello\nworld", "#header only\nno second header", "2\t0.5"] {
            assert!(matches!(
                ProfileArray::parse(text),
                Err(MediatorError::MalformedProfileFormat(_))
            ));
        }
        assert!(ProfileArray::parse("1\t0.5\n2\tabc\n").is_err());
        assert!(ProfileArray::parse("1\t0.5\n2\t0.1\t0.2\n").is_err());
    }

    #[test]
    fn test_localize() {
        let profile = sample();
        assert!(profile.localize(0, profile.rows()).approx_eq(&profile));

        let local = profile.localize(1, 3);
        assert_eq!(local.rows(), 2);
        assert_eq!(local.get(0, 2), Some(0.25));
        assert!(local.to_text("NA", true).starts_with("1\t0.5"));
        assert_eq!(profile.localize(3, 99).rows(), 1);
    }

    #[test]
    fn test_approx_eq_tolerance() {
        let a = ProfileArray::from_rows(vec![vec![Some(0.5)]]).unwrap();
        let b = ProfileArray::from_rows(vec![vec![Some(0.500_000_05)]]).unwrap();
        let c = ProfileArray::from_rows(vec![vec![Some(0.500_001)]]).unwrap();
        let d = ProfileArray::from_rows(vec![vec![None]]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(d, d.clone());
    }

    #[test]
    fn test_engine_rows_validation() {
        let ok = ProfileArray::from_engine_rows(vec![vec![0.5, f64::NAN], vec![0.0, 0.2]], 2)
            .unwrap();
        assert_eq!(ok.get(0, 2), None);

        assert!(matches!(
            ProfileArray::from_engine_rows(vec![vec![0.5]], 2),
            Err(MediatorError::EngineInvocationFailure(_))
        ));
        assert!(matches!(
            ProfileArray::from_engine_rows(vec![vec![-0.1]], 1),
            Err(MediatorError::EngineInvocationFailure(_))
        ));
    }

    #[test]
    fn test_engine_rounding_noise_reads_as_zero() {
        let profile =
            ProfileArray::from_engine_rows(vec![vec![-1e-17, 0.3], vec![-5e-10, f64::NAN]], 2)
                .unwrap();
        assert_eq!(profile.get(0, 1), Some(0.0));
        assert_eq!(profile.get(1, 1), Some(0.0));
        assert_eq!(profile.get(0, 2), Some(0.3));
        assert!(matches!(
            ProfileArray::from_engine_rows(vec![vec![-1e-6]], 1),
            Err(MediatorError::EngineInvocationFailure(_))
        ));
    }

    #[test]
    fn test_npy_layout_and_files() {
        let profile = sample();
        let dense = profile.to_npy_array();
        assert_eq!(dense.shape(), &[4, 1, 3]);
        assert!(dense[[0, 0, 1]].is_nan());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.npy");
        profile.write_npy_file(&path).unwrap();
        assert!(ProfileArray::read_npy_file(&path).unwrap().approx_eq(&profile));
    }

    #[test]
    fn test_gzipped_text_file() {
        let profile = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile_lunp.gz");
        profile.write_text_file(&path, "NA").unwrap();
        assert!(ProfileArray::read_text_file(&path).unwrap().approx_eq(&profile));
    }
}
