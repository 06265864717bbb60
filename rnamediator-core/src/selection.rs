//! Selection of positions whose accessibility reacts to a constraint.
//!
//! A window qualifies when the unconstrained constraint region is paired enough
//! (`mean(raw[cs..=ce]) <= cutoff`); within a qualifying window every position
//! outside the padded constraint with `border < |diff|` is reported.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::SelectionParams;
use crate::coordinates::GenomicWindow;
use crate::types::{Strand, strand_symbol};

/// Which constrained fold a difference profile comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Constraint region forced unpaired
    Unpaired,
    /// Constraint region forced paired
    Paired,
}

impl Category {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpaired => "unpaired",
            Self::Paired => "paired",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported position in BED layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalRecord {
    pub chrom: String,
    /// 0-based genomic start
    pub start: u64,
    /// Genomic end, exclusive
    pub end: u64,
    /// `gene|constraint|genomic constraint`
    pub label: String,
    /// Change in unpaired probability
    pub value: f64,
    pub strand: char,
    /// Signed distance to the constraint, positive upstream
    pub distance: i64,
    /// Unconstrained unpaired probability
    pub raw: f64,
}

impl fmt::Display for IntervalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.start,
            self.end,
            self.label,
            self.value,
            self.strand,
            self.distance,
            self.raw
        )
    }
}

/// Records of one window, unpaired first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub unpaired: Vec<IntervalRecord>,
    pub paired: Vec<IntervalRecord>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.unpaired.len() + self.paired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extend(&mut self, other: Self) {
        self.unpaired.extend(other.unpaired);
        self.paired.extend(other.paired);
    }

    pub fn records(&self, category: Category) -> &[IntervalRecord] {
        match category {
            Category::Unpaired => &self.unpaired,
            Category::Paired => &self.paired,
        }
    }
}

/// Mean of the available raw values over the constraint, `None` if there are none.
fn constraint_mean(raw: &[Option<f64>], window: &GenomicWindow) -> Option<f64> {
    let (cs, ce) = (window.cons_start as usize, window.cons_end as usize);
    let values: Vec<f64> = raw
        .get(cs..=ce.min(raw.len().saturating_sub(1)))?
        .iter()
        .flatten()
        .copied()
        .collect();
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Whether the constraint region passes the pairedness cutoff.
pub fn constraint_passes(raw: &[Option<f64>], window: &GenomicWindow, cutoff: f64) -> bool {
    constraint_mean(raw, window).is_some_and(|mean| mean <= cutoff)
}

/// Whether `pos` lies inside the constraint extended by `padding` on both sides.
fn in_padded_constraint(pos: usize, window: &GenomicWindow, padding: usize) -> bool {
    let low = (window.cons_start as usize).saturating_sub(padding);
    let high = window.cons_end as usize + padding;
    (low..=high).contains(&pos)
}

/// Reports positions of `diff` (one region-length column of a difference
/// profile) that react to the constraint of `window`.
///
/// `raw` is the matching column of the unconstrained profile. Records appear
/// in position order.
pub fn select(
    raw: &[Option<f64>],
    diff: &[Option<f64>],
    window: &GenomicWindow,
    params: &SelectionParams,
    category: Category,
) -> Vec<IntervalRecord> {
    if !constraint_passes(raw, window, params.cutoff) {
        debug!(
            gene = %window.gene,
            %category,
            cutoff = params.cutoff,
            "Constraint region above cutoff, window skipped"
        );
        return Vec::new();
    }

    let constraint = window.transcript_constraint().location();
    let genomic = window
        .genomic_constraint()
        .map_or_else(|| "NA".to_string(), |r| r.location());
    let label = format!("{}|{constraint}|{genomic}", window.gene);
    let ulim = params.ulim as u64;

    raw.iter()
        .zip(diff)
        .enumerate()
        .filter(|(pos, _)| !in_padded_constraint(*pos, window, params.padding))
        .filter_map(|(pos, (raw, diff))| {
            let (raw, value) = ((*raw)?, (*diff)?);
            if params.border >= value.abs() {
                return None;
            }
            let local = pos as u64;
            let start = window.segment_start(local, ulim)?;
            Some(IntervalRecord {
                chrom: window.chrom.clone(),
                start,
                end: start + ulim,
                label: label.clone(),
                value,
                strand: strand_symbol(window.strand),
                distance: window.distance(local)?,
                raw,
            })
        })
        .collect()
}

/// [`select`] for both constrained folds of a window.
pub fn select_pair(
    raw: &[Option<f64>],
    unpaired: &[Option<f64>],
    paired: &[Option<f64>],
    window: &GenomicWindow,
    params: &SelectionParams,
) -> Selection {
    Selection {
        unpaired: select(raw, unpaired, window, params, Category::Unpaired),
        paired: select(raw, paired, window, params, Category::Paired),
    }
}

/// Single-base track interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEntry {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub value: f64,
}

/// Track entries of one window; a window lies on a single strand.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTracks {
    pub strand: Strand,
    /// Unconstrained probabilities with `border < |raw|`
    pub raw: Vec<TrackEntry>,
    /// Differences passing cutoff, padding and border
    pub diff: Vec<TrackEntry>,
}

/// Track entries for the raw profile and, if given, one difference profile of
/// `window`.
///
/// Raw values are only thresholded by `border`. Differences additionally need
/// the constraint to pass the cutoff and lie outside the padded constraint.
pub fn track_entries(
    raw: &[Option<f64>],
    diff: Option<&[Option<f64>]>,
    window: &GenomicWindow,
    params: &SelectionParams,
) -> WindowTracks {
    let ulim = params.ulim as u64;
    let entry = |pos: usize, value: f64| {
        let start = window.segment_start(pos as u64, ulim)?;
        Some(TrackEntry {
            chrom: window.chrom.clone(),
            start,
            end: start + 1,
            value,
        })
    };

    let raw_entries = raw
        .iter()
        .enumerate()
        .filter_map(|(pos, v)| v.filter(|v| params.border < v.abs()).map(|v| (pos, v)))
        .filter_map(|(pos, v)| entry(pos, v))
        .collect();

    let diff_entries = match diff {
        Some(diff) if constraint_passes(raw, window, params.cutoff) => raw
            .iter()
            .zip(diff)
            .enumerate()
            .filter(|(pos, _)| !in_padded_constraint(*pos, window, params.padding))
            .filter_map(|(pos, (r, d))| {
                r.and(*d)
                    .filter(|d| params.border < d.abs())
                    .and_then(|d| entry(pos, d))
            })
            .collect(),
        _ => Vec::new(),
    };

    WindowTracks {
        strand: window.strand,
        raw: raw_entries,
        diff: diff_entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::GeneCoordinates;
    use crate::types::Region;

    fn window(strand: Strand) -> GenomicWindow {
        let gene = GeneCoordinates {
            chrom: "chr7".to_string(),
            start: 1,
            end: 300,
            strand,
        };
        GenomicWindow::new("GENE", Region::new(0, 200), Region::new(100, 111), &gene).unwrap()
    }

    fn params(border: f64) -> SelectionParams {
        SelectionParams {
            border,
            ..Default::default()
        }
    }

    fn flat(value: f64) -> Vec<Option<f64>> {
        vec![Some(value); 200]
    }

    #[test]
    fn test_distance_and_exclusion() {
        let w = window(Strand::Forward);
        let records = select(&flat(0.5), &flat(0.2), &w, &params(0.0), Category::Unpaired);
        assert_eq!(records.len(), 200 - 11);

        let find = |d: i64| records.iter().find(|r| r.distance == d);
        assert_eq!(find(5).map(|r| r.start), Some(95));
        assert_eq!(find(-10).map(|r| r.start), Some(120));
        assert!(records.iter().all(|r| !(100..=110).contains(&r.start)));
        assert!(records.windows(2).all(|p| p[0].start < p[1].start));
    }

    #[test]
    fn test_border_is_strict() {
        let w = window(Strand::Forward);
        let eps = 1e-9;
        let above = select(&flat(0.5), &flat(0.1 + eps), &w, &params(0.1), Category::Paired);
        let below = select(&flat(0.5), &flat(-(0.1 - eps)), &w, &params(0.1), Category::Paired);
        assert!(!above.is_empty());
        assert!(below.is_empty());
        let negative = select(&flat(0.5), &flat(-0.2), &w, &params(0.1), Category::Paired);
        assert_eq!(negative.len(), above.len());
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let w = window(Strand::Forward);
        let mut raw = flat(0.5);
        let mut diff = flat(0.3);
        raw[10] = None;
        diff[20] = None;
        let records = select(&raw, &diff, &w, &params(0.0), Category::Unpaired);
        assert_eq!(records.len(), 200 - 11 - 2);
        assert!(records.iter().all(|r| r.start != 10 && r.start != 20));
    }

    #[test]
    fn test_padding() {
        let w = window(Strand::Forward);
        let padded = SelectionParams {
            padding: 3,
            ..Default::default()
        };
        let records = select(&flat(0.5), &flat(0.2), &w, &padded, Category::Unpaired);
        assert_eq!(records.len(), 200 - 17);
        assert!(records.iter().all(|r| r.distance.abs() > 3));
    }

    #[test]
    fn test_cutoff_uses_constraint_mean() {
        let w = window(Strand::Forward);
        let strict = SelectionParams {
            cutoff: 0.4,
            ..Default::default()
        };
        assert!(select(&flat(0.5), &flat(0.2), &w, &strict, Category::Unpaired).is_empty());

        let mut raw = flat(0.5);
        for cell in &mut raw[100..=110] {
            *cell = Some(0.3);
        }
        raw[105] = None;
        assert!(!select(&raw, &flat(0.2), &w, &strict, Category::Unpaired).is_empty());

        let mut missing = flat(0.5);
        for cell in &mut missing[100..=110] {
            *cell = None;
        }
        assert!(!constraint_passes(&missing, &w, 1.0));
    }

    #[test]
    fn test_reverse_strand_records() {
        let w = window(Strand::Reverse);
        let wide = SelectionParams {
            ulim: 4,
            ..Default::default()
        };
        let records = select(&flat(0.5), &flat(0.2), &w, &wide, Category::Unpaired);
        let first = &records[0];
        assert_eq!((first.start, first.end), (299, 303));
        assert_eq!(first.strand, '-');
        assert_eq!(first.label, "GENE|101-111|190-200");
        assert_eq!(first.distance, 100);
    }

    #[test]
    fn test_select_pair_groups_categories() {
        let w = window(Strand::Forward);
        let mut paired = flat(0.0);
        paired[0] = Some(-0.4);
        let selection = select_pair(&flat(0.5), &flat(0.2), &paired, &w, &params(0.1));
        assert_eq!(selection.paired.len(), 1);
        assert_eq!(selection.unpaired.len(), 189);
        assert_eq!(selection.len(), 190);
        assert_eq!(selection.records(Category::Paired)[0].value, -0.4);
    }

    #[test]
    fn test_bed_line() {
        let record = IntervalRecord {
            chrom: "chr1".to_string(),
            start: 10,
            end: 11,
            label: "G|5-8|105-108".to_string(),
            value: -0.25,
            strand: '+',
            distance: -2,
            raw: 0.5,
        };
        assert_eq!(record.to_string(), "chr1\t10\t11\tG|5-8|105-108\t-0.25\t+\t-2\t0.5");
    }

    #[test]
    fn test_track_entries() {
        let w = window(Strand::Forward);
        let mut raw = flat(0.5);
        raw[3] = Some(0.05);
        let tracks = track_entries(&raw, Some(&flat(0.2)), &w, &params(0.1));
        assert_eq!(tracks.strand, Strand::Forward);
        assert_eq!(tracks.raw.len(), 199);
        assert_eq!(tracks.diff.len(), 189);
        assert!(tracks.diff.iter().all(|e| e.end == e.start + 1));

        let raw_only = track_entries(&raw, None, &w, &params(0.1));
        assert!(raw_only.diff.is_empty());
    }
}
