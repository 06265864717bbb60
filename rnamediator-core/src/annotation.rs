//! Readers for gene annotation, constraint BED and chromosome size files.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::constants::{CHROM_PREFIX, MAX_CHROM_NAME_LENGTH};
use crate::coordinates::GeneCoordinates;
use crate::sequence::io::open_maybe_gz;
use crate::types::{MediatorError, Region, Result, parse_strand};

/// Column layout of a gene BED file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BedLayout {
    /// `chrom start end name score strand`
    #[default]
    Plain,
    /// Intersected annotation carrying the gene location in columns 11, 12
    /// and 15
    Annotated,
}

fn parse_error(line: usize, message: impl std::fmt::Display) -> MediatorError {
    MediatorError::ParseError(format!("line {line}: {message}"))
}

fn field<'a>(fields: &[&'a str], index: usize, line: usize) -> Result<&'a str> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| parse_error(line, format!("missing column {}", index + 1)))
}

fn number<T: std::str::FromStr>(fields: &[&str], index: usize, line: usize) -> Result<T> {
    let text = field(fields, index, line)?;
    text.trim()
        .parse()
        .map_err(|_| parse_error(line, format!("'{text}' is not a number")))
}

/// Non-empty, non-comment lines with their 1-based line number.
fn data_lines<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(usize, String)>> {
    reader
        .lines()
        .enumerate()
        .map(|(i, line)| line.map(|l| (i + 1, l)).map_err(MediatorError::from))
        .filter(|entry| {
            entry.as_ref().map_or(true, |(_, l)| {
                let l = l.trim();
                !l.is_empty() && !l.starts_with('#') && !l.starts_with("track")
            })
        })
}

/// Gene locations keyed by gene name.
///
/// Starts are converted to 1-based coordinates. Only the first location of a
/// gene is kept.
///
/// # Errors
///
/// Returns [`MediatorError::ParseError`] for short lines or bad numbers and
/// [`MediatorError::InvalidStrand`] for unknown strands.
pub fn parse_gene_bed<R: BufRead>(
    reader: R,
    layout: BedLayout,
) -> Result<BTreeMap<String, GeneCoordinates>> {
    let (start_col, end_col, strand_col) = match layout {
        BedLayout::Plain => (1, 2, 5),
        BedLayout::Annotated => (10, 11, 14),
    };

    let mut genes = BTreeMap::new();
    for entry in data_lines(reader) {
        let (line, text) = entry?;
        let fields: Vec<&str> = text.trim_end().split('\t').collect();
        let name = field(&fields, 3, line)?.to_string();
        let start: u64 = number(&fields, start_col, line)?;
        let coordinates = GeneCoordinates {
            chrom: field(&fields, 0, line)?.to_string(),
            start: start + 1,
            end: number(&fields, end_col, line)?,
            strand: parse_strand(field(&fields, strand_col, line)?)?,
        };
        if genes.contains_key(&name) {
            warn!(gene = %name, line, "Gene annotated more than once, keeping first entry");
            continue;
        }
        genes.insert(name, coordinates);
    }
    Ok(genes)
}

/// Reads a (possibly gzipped) gene BED file. See [`parse_gene_bed`].
///
/// # Errors
///
/// I/O and parse errors.
pub fn read_gene_bed(path: &Path, layout: BedLayout) -> Result<BTreeMap<String, GeneCoordinates>> {
    parse_gene_bed(BufReader::new(open_maybe_gz(path)?), layout)
}

/// Constraint sites keyed by gene, 0-based half-open transcript coordinates.
///
/// # Errors
///
/// Returns [`MediatorError::ParseError`] for short lines or bad numbers.
pub fn parse_constraint_bed<R: BufRead>(reader: R) -> Result<BTreeMap<String, Vec<Region>>> {
    let mut sites: BTreeMap<String, Vec<Region>> = BTreeMap::new();
    for entry in data_lines(reader) {
        let (line, text) = entry?;
        let fields: Vec<&str> = text.trim_end().split('\t').collect();
        let region = Region::new(number(&fields, 1, line)?, number(&fields, 2, line)?);
        sites
            .entry(field(&fields, 3, line)?.to_string())
            .or_default()
            .push(region);
    }
    Ok(sites)
}

/// Two-site constraints keyed by gene.
///
/// Each line holds two BED records of equal width side by side. Lines where
/// either start is negative carry no pair and are skipped.
///
/// # Errors
///
/// Returns [`MediatorError::ParseError`] for lines with an odd number of
/// columns, short lines or bad numbers.
pub fn parse_paired_constraint_bed<R: BufRead>(
    reader: R,
) -> Result<BTreeMap<String, Vec<(Region, Region)>>> {
    let mut sites: BTreeMap<String, Vec<(Region, Region)>> = BTreeMap::new();
    for entry in data_lines(reader) {
        let (line, text) = entry?;
        let fields: Vec<&str> = text.trim_end().split('\t').collect();
        if fields.len() % 2 != 0 {
            return Err(parse_error(
                line,
                "unbalanced paired BED, both halves need the same number of columns",
            ));
        }
        let half = fields.len() / 2;
        let first_start: i64 = number(&fields, 1, line)?;
        let second_start: i64 = number(&fields, half + 1, line)?;
        let (Ok(first_start), Ok(second_start)) =
            (usize::try_from(first_start), usize::try_from(second_start))
        else {
            continue;
        };
        let first = Region::new(first_start, number(&fields, 2, line)?);
        let second = Region::new(second_start, number(&fields, half + 2, line)?);
        sites
            .entry(field(&fields, 3, line)?.to_string())
            .or_default()
            .push((first, second));
    }
    Ok(sites)
}

/// Reads a (possibly gzipped) constraint BED file.
///
/// # Errors
///
/// I/O and parse errors.
pub fn read_constraint_bed(path: &Path) -> Result<BTreeMap<String, Vec<Region>>> {
    parse_constraint_bed(BufReader::new(open_maybe_gz(path)?))
}

/// Reads a (possibly gzipped) paired constraint BED file.
///
/// # Errors
///
/// I/O and parse errors.
pub fn read_paired_constraint_bed(path: &Path) -> Result<BTreeMap<String, Vec<(Region, Region)>>> {
    parse_paired_constraint_bed(BufReader::new(open_maybe_gz(path)?))
}

/// Chromosome name as expected by genome browsers: `chr` prefixed, at most 32
/// characters.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::annotation::normalize_chrom;
///
/// assert_eq!(normalize_chrom("1"), "chr1");
/// assert_eq!(normalize_chrom("CHRX"), "chrX");
/// assert_eq!(normalize_chrom("chr2"), "chr2");
/// ```
#[must_use]
pub fn normalize_chrom(name: &str) -> String {
    let name = name.trim();
    let prefixed = if name.starts_with(CHROM_PREFIX) {
        name.to_string()
    } else if let Some(rest) = name.strip_prefix("CHR") {
        format!("{CHROM_PREFIX}{rest}")
    } else {
        format!("{CHROM_PREFIX}{name}")
    };
    prefixed.chars().take(MAX_CHROM_NAME_LENGTH).collect()
}

/// Chromosome sizes in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChromSizes {
    entries: Vec<(String, u64)>,
}

impl ChromSizes {
    /// Parses `name\tsize` lines, normalizing names with [`normalize_chrom`].
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::ParseError`] for short lines or bad sizes.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for entry in data_lines(reader) {
            let (line, text) = entry?;
            let fields: Vec<&str> = text.split_whitespace().collect();
            entries.push((
                normalize_chrom(field(&fields, 0, line)?),
                number(&fields, 1, line)?,
            ));
        }
        Ok(Self { entries })
    }

    /// # Errors
    ///
    /// I/O and parse errors.
    pub fn read(path: &Path) -> Result<Self> {
        Self::parse(BufReader::new(open_maybe_gz(path)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), *s))
    }

    /// Position of `chrom` in the file, used as sort key for tracks.
    pub fn rank(&self, chrom: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == chrom)
    }

    pub fn size(&self, chrom: &str) -> Option<u64> {
        self.entries
            .iter()
            .find_map(|(n, s)| (n == chrom).then_some(*s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strand;
    use std::io::Cursor;

    #[test]
    fn test_plain_gene_bed() {
        let bed = "chr1\t1000\t1200\tGENE1\t0\t+\n\
                   # comment\n\
                   chr2\t0\t50\tGENE2\t0\t-\n\
                   chr3\t10\t20\tGENE1\t0\t+\n";
        let genes = parse_gene_bed(Cursor::new(bed), BedLayout::Plain).unwrap();
        assert_eq!(genes.len(), 2);
        let first = &genes["GENE1"];
        assert_eq!((first.start, first.end), (1001, 1200));
        assert_eq!(first.chrom, "chr1");
        assert_eq!(genes["GENE2"].strand, Strand::Reverse);
    }

    #[test]
    fn test_annotated_gene_bed() {
        let bed = "chr1\t1050\t1051\tGENE1\t0\t.\tx\tx\tx\tx\t999\t1500\tx\tx\t-\n";
        let genes = parse_gene_bed(Cursor::new(bed), BedLayout::Annotated).unwrap();
        let gene = &genes["GENE1"];
        assert_eq!((gene.start, gene.end, gene.strand), (1000, 1500, Strand::Reverse));
    }

    #[test]
    fn test_gene_bed_errors() {
        let short = parse_gene_bed(Cursor::new("chr1\t10\t20\n"), BedLayout::Plain);
        assert!(matches!(short, Err(MediatorError::ParseError(m)) if m.starts_with("line 1")));
        let strand = parse_gene_bed(Cursor::new("chr1\t10\t20\tG\t0\t?\n"), BedLayout::Plain);
        assert!(matches!(strand, Err(MediatorError::InvalidStrand(_))));
    }

    #[test]
    fn test_constraint_beds() {
        let single = "chr1\t4\t8\tG1\t0\t+\nchr1\t10\t17\tG1\t0\t+\n";
        let sites = parse_constraint_bed(Cursor::new(single)).unwrap();
        assert_eq!(sites["G1"], vec![Region::new(4, 8), Region::new(10, 17)]);

        let paired = "chr1\t4\t8\tG1\t0\t+\tchr1\t20\t24\tG1\t0\t+\n\
                      chr1\t-1\t-1\tG1\t0\t+\tchr1\t20\t24\tG1\t0\t+\n";
        let pairs = parse_paired_constraint_bed(Cursor::new(paired)).unwrap();
        assert_eq!(pairs["G1"], vec![(Region::new(4, 8), Region::new(20, 24))]);

        let unbalanced = "chr1\t4\t8\tG1\t0\t+\tchr1\t20\t24\tG1\t0\n";
        assert!(parse_paired_constraint_bed(Cursor::new(unbalanced)).is_err());
    }

    #[test]
    fn test_chrom_sizes() {
        let sizes = ChromSizes::parse(Cursor::new("1\t1000\nCHRX\t500\nchrM\t16\n")).unwrap();
        assert_eq!(sizes.len(), 3);
        assert_eq!(sizes.rank("chrX"), Some(1));
        assert_eq!(sizes.size("chr1"), Some(1000));
        assert_eq!(sizes.rank("chr2"), None);

        let long = "a".repeat(40);
        assert_eq!(normalize_chrom(&long).len(), MAX_CHROM_NAME_LENGTH);
        assert!(ChromSizes::parse(Cursor::new("chr1\tbig\n")).is_err());
    }
}
