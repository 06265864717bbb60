//! Conversion between window-local, transcript and genomic coordinates.
//!
//! Three frames are involved:
//!
//! - **local**: 0-based index into a window profile
//! - **transcript**: 1-based inclusive positions along the gene sequence, as
//!   written into window file names
//! - **genomic**: 0-based positions on the chromosome
//!
//! On the reverse strand transcript position 1 is the last genomic base of the
//! gene, so window start and end swap roles.

use serde::Serialize;

use crate::types::{MediatorError, Region, Result, Strand, strand_symbol};

/// Genomic location of a gene, 1-based inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneCoordinates {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    #[serde(serialize_with = "serialize_strand")]
    pub strand: Strand,
}

fn serialize_strand<S: serde::Serializer>(strand: &Strand, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_char(strand_symbol(*strand))
}

/// Genomic 0-based position of window-local index `local`.
///
/// Windows are 1-based inclusive transcript coordinates, genes 1-based inclusive
/// genomic coordinates. Returns `None` if `local` lies beyond the window or the
/// result would be negative.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::coordinates::to_genomic;
/// use rnamediator_core::types::Strand;
///
/// // Transcript position 101 of a gene starting at genomic base 1001.
/// assert_eq!(to_genomic(10, 91, 150, 1001, 2000, Strand::Forward), Some(1100));
/// // Same transcript position on the reverse strand counts down from the gene end.
/// assert_eq!(to_genomic(10, 91, 150, 1001, 2000, Strand::Reverse), Some(1899));
/// ```
#[must_use]
pub fn to_genomic(
    local: u64,
    window_start: u64,
    window_end: u64,
    gene_start: u64,
    gene_end: u64,
    strand: Strand,
) -> Option<u64> {
    if window_start + local > window_end {
        return None;
    }
    let (local, ws, gs, ge) = (
        i64::try_from(local).ok()?,
        i64::try_from(window_start).ok()?,
        i64::try_from(gene_start).ok()?,
        i64::try_from(gene_end).ok()?,
    );
    let genomic = match strand {
        Strand::Reverse => ge - ws - local,
        Strand::Forward | Strand::Unknown => local + ws + gs - 2,
    };
    u64::try_from(genomic).ok()
}

/// Signed distance of `pos` to the closed interval `[cs, ce]`.
///
/// Positive upstream of the constraint, negative downstream, `None` inside.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::coordinates::distance_to_constraint;
///
/// assert_eq!(distance_to_constraint(95, 100, 110), Some(5));
/// assert_eq!(distance_to_constraint(120, 100, 110), Some(-10));
/// assert_eq!(distance_to_constraint(105, 100, 110), None);
/// ```
#[must_use]
pub const fn distance_to_constraint(pos: i64, cs: i64, ce: i64) -> Option<i64> {
    if pos > ce {
        Some(-(pos - ce))
    } else if pos < cs {
        Some(cs - pos)
    } else {
        None
    }
}

/// One folded window of a gene together with the constraint it was folded
/// around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomicWindow {
    pub gene: String,
    pub chrom: String,
    pub strand: Strand,
    /// Window start, 1-based inclusive transcript coordinate
    pub window_start: u64,
    /// Window end, 1-based inclusive transcript coordinate
    pub window_end: u64,
    /// Constraint start, 0-based closed, relative to the window
    pub cons_start: u64,
    /// Constraint end, 0-based closed, relative to the window
    pub cons_end: u64,
    /// Gene start, 1-based inclusive genomic coordinate
    pub gene_start: u64,
    /// Gene end, 1-based inclusive genomic coordinate
    pub gene_end: u64,
}

impl GenomicWindow {
    /// Builds a window from transcript regions (0-based half-open), as stored
    /// in window file names.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::ConstraintOutOfBounds`] if the constraint is
    /// empty or not inside the window.
    pub fn new(
        gene: &str,
        window: Region,
        constraint: Region,
        coordinates: &GeneCoordinates,
    ) -> Result<Self> {
        if constraint.is_empty()
            || constraint.start < window.start
            || constraint.end > window.end
        {
            return Err(MediatorError::ConstraintOutOfBounds {
                start: constraint.start,
                end: constraint.end,
                length: window.end,
            });
        }
        let offset = (constraint.start - window.start) as u64;
        Ok(Self {
            gene: gene.to_string(),
            chrom: coordinates.chrom.clone(),
            strand: coordinates.strand,
            window_start: window.start as u64 + 1,
            window_end: window.end as u64,
            cons_start: offset,
            cons_end: offset + constraint.len() as u64 - 1,
            gene_start: coordinates.start,
            gene_end: coordinates.end,
        })
    }

    /// Number of positions covered by the window.
    pub const fn len(&self) -> u64 {
        (self.window_end + 1).saturating_sub(self.window_start)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Genomic 0-based position of local index `local`.
    pub fn to_genomic(&self, local: u64) -> Option<u64> {
        to_genomic(
            local,
            self.window_start,
            self.window_end,
            self.gene_start,
            self.gene_end,
            self.strand,
        )
    }

    /// Genomic start of the `ulim` long segment reported at `local`.
    ///
    /// Profile column `ulim` describes the segment ending at `local` in
    /// transcript direction, which lies left of it on the forward strand and
    /// right of it on the reverse strand.
    pub fn segment_start(&self, local: u64, ulim: u64) -> Option<u64> {
        let genomic = self.to_genomic(local)?;
        match self.strand {
            Strand::Reverse => Some(genomic),
            Strand::Forward | Strand::Unknown => genomic.checked_sub(ulim.saturating_sub(1)),
        }
    }

    /// Constraint in transcript coordinates, 0-based half-open.
    pub fn transcript_constraint(&self) -> Region {
        Region::new(
            (self.window_start + self.cons_start - 1) as usize,
            (self.window_start + self.cons_end) as usize,
        )
    }

    /// Genomic span of the constraint, 0-based half-open.
    pub fn genomic_constraint(&self) -> Option<Region> {
        let first = self.to_genomic(self.cons_start)?;
        let last = self.to_genomic(self.cons_end)?;
        let (start, end) = (first.min(last), first.max(last));
        Some(Region::new(
            usize::try_from(start).ok()?,
            usize::try_from(end).ok()? + 1,
        ))
    }

    /// Signed distance of local index `local` to the constraint.
    pub fn distance(&self, local: u64) -> Option<i64> {
        distance_to_constraint(
            i64::try_from(local).ok()?,
            i64::try_from(self.cons_start).ok()?,
            i64::try_from(self.cons_end).ok()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gene(strand: Strand) -> GeneCoordinates {
        GeneCoordinates {
            chrom: "chr1".to_string(),
            start: 1001,
            end: 1200,
            strand,
        }
    }

    #[test]
    fn test_forward_mapping() {
        assert_eq!(to_genomic(0, 1, 200, 1001, 1200, Strand::Forward), Some(1000));
        assert_eq!(to_genomic(199, 1, 200, 1001, 1200, Strand::Forward), Some(1199));
        assert_eq!(to_genomic(0, 51, 100, 1001, 1200, Strand::Forward), Some(1050));
        assert_eq!(to_genomic(50, 51, 100, 1001, 1200, Strand::Forward), None);
    }

    #[test]
    fn test_reverse_mapping() {
        assert_eq!(to_genomic(0, 1, 200, 1001, 1200, Strand::Reverse), Some(1199));
        assert_eq!(to_genomic(199, 1, 200, 1001, 1200, Strand::Reverse), Some(1000));
        assert_eq!(to_genomic(0, 51, 100, 1001, 1200, Strand::Reverse), Some(1149));
    }

    #[test]
    fn test_strands_reflect_around_gene_midpoint() {
        let (gs, ge) = (1001, 1200);
        for ws in [1, 17, 120] {
            for local in 0..40 {
                let fw = to_genomic(local, ws, ws + 60, gs, ge, Strand::Forward).unwrap();
                let re = to_genomic(local, ws, ws + 60, gs, ge, Strand::Reverse).unwrap();
                assert_eq!(fw + re, gs + ge - 2);
            }
        }
    }

    #[test]
    fn test_unknown_strand_maps_forward() {
        assert_eq!(
            to_genomic(3, 5, 20, 10, 50, Strand::Unknown),
            to_genomic(3, 5, 20, 10, 50, Strand::Forward)
        );
    }

    #[test]
    fn test_distance_sign_convention() {
        assert_eq!(distance_to_constraint(95, 100, 110), Some(5));
        assert_eq!(distance_to_constraint(120, 100, 110), Some(-10));
        assert_eq!(distance_to_constraint(99, 100, 110), Some(1));
        assert_eq!(distance_to_constraint(111, 100, 110), Some(-1));
        assert!((100..=110).all(|p| distance_to_constraint(p, 100, 110).is_none()));
    }

    #[test]
    fn test_window_from_regions() {
        let window =
            GenomicWindow::new("GENE", Region::new(90, 150), Region::new(100, 110), &gene(Strand::Forward))
                .unwrap();
        assert_eq!((window.window_start, window.window_end), (91, 150));
        assert_eq!((window.cons_start, window.cons_end), (10, 19));
        assert_eq!(window.len(), 60);
        assert_eq!(window.to_genomic(10), Some(1100));
        assert_eq!(window.genomic_constraint(), Some(Region::new(1100, 1110)));
        assert_eq!(window.transcript_constraint(), Region::new(100, 110));

        assert!(
            GenomicWindow::new("GENE", Region::new(90, 150), Region::new(80, 95), &gene(Strand::Forward))
                .is_err()
        );
    }

    #[test]
    fn test_reverse_constraint_span() {
        let window =
            GenomicWindow::new("GENE", Region::new(90, 150), Region::new(100, 110), &gene(Strand::Reverse))
                .unwrap();
        // Transcript 101..=110 counted from the gene end at genomic 1199 (0-based).
        assert_eq!(window.genomic_constraint(), Some(Region::new(1090, 1100)));
    }

    #[test]
    fn test_segment_start() {
        let forward =
            GenomicWindow::new("GENE", Region::new(0, 200), Region::new(50, 60), &gene(Strand::Forward))
                .unwrap();
        assert_eq!(forward.segment_start(10, 1), Some(1010));
        assert_eq!(forward.segment_start(10, 4), Some(1007));
        assert_eq!(forward.segment_start(0, 4), Some(997));

        let reverse =
            GenomicWindow::new("GENE", Region::new(0, 200), Region::new(50, 60), &gene(Strand::Reverse))
                .unwrap();
        assert_eq!(reverse.segment_start(10, 4), Some(1189));
    }

    #[test]
    fn test_window_distance() {
        let window =
            GenomicWindow::new("GENE", Region::new(0, 200), Region::new(100, 111), &gene(Strand::Forward))
                .unwrap();
        assert_eq!(window.distance(95), Some(5));
        assert_eq!(window.distance(120), Some(-10));
        assert_eq!(window.distance(105), None);
    }
}
