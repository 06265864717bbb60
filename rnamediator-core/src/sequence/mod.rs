//! RNA sequences as seen by the folding engine.
//!
//! Sequences are normalized once on construction: lower case is upper-cased, DNA
//! `T` becomes `U` and any symbol outside `{A, C, G, U}` is replaced by `N`.
//! A [`Sequence`] is never edited in place; mutations produce a new value.
//!
//! ## Examples
//!
//! ```rust
//! use rnamediator_core::sequence::Sequence;
//! use rnamediator_core::types::Region;
//!
//! let seq = Sequence::new("acgtRacgu");
//! assert_eq!(seq.as_str(), "ACGUNACGU");
//!
//! let mutated = seq.with_replacement(Region::new(0, 2), "GG").unwrap();
//! assert_eq!(mutated.as_str(), "GGGUNACGU");
//! assert_eq!(seq.as_str(), "ACGUNACGU");
//! ```

use std::fmt;

use crate::types::{MediatorError, Region, Result};

pub mod io;

/// Normalized RNA sequence over `{A, C, G, U, N}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    residues: String,
}

/// Maps a raw byte onto the RNA alphabet.
#[must_use]
pub const fn normalize_base(b: u8) -> char {
    match b.to_ascii_uppercase() {
        b'A' => 'A',
        b'C' => 'C',
        b'G' => 'G',
        b'T' | b'U' => 'U',
        _ => 'N',
    }
}

impl Sequence {
    pub fn new(raw: &str) -> Self {
        Self::from_bytes(raw.as_bytes())
    }

    pub fn from_bytes(raw: &[u8]) -> Self {
        let residues = raw
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(|&b| normalize_base(b))
            .collect();
        Self { residues }
    }

    pub fn as_str(&self) -> &str {
        &self.residues
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Subsequence covering `region`.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::ConstraintOutOfBounds`] if the region does not fit.
    pub fn slice(&self, region: Region) -> Result<Self> {
        region.check_bounds(self.len())?;
        Ok(Self {
            residues: self.residues[region.start..region.end].to_string(),
        })
    }

    /// Copy of the sequence with `region` replaced by `replacement`.
    ///
    /// The replacement is normalized like any other input and must be exactly as
    /// long as the region.
    ///
    /// # Errors
    ///
    /// * [`MediatorError::ConstraintOutOfBounds`] if the region does not fit
    /// * [`MediatorError::InvalidConstraint`] if the lengths differ
    pub fn with_replacement(&self, region: Region, replacement: &str) -> Result<Self> {
        region.check_bounds(self.len())?;
        let replacement = Self::new(replacement);
        if replacement.len() != region.len() {
            return Err(MediatorError::InvalidConstraint(format!(
                "replacement of length {} for region {region} of length {}",
                replacement.len(),
                region.len()
            )));
        }

        let mut residues = String::with_capacity(self.len());
        residues.push_str(&self.residues[..region.start]);
        residues.push_str(replacement.as_str());
        residues.push_str(&self.residues[region.end..]);
        Ok(Self { residues })
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.residues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(Sequence::new("acgt").as_str(), "ACGU");
        assert_eq!(Sequence::new("AC-GX").as_str(), "ACNGN");
        assert_eq!(Sequence::new("ACG\nU").as_str(), "ACGU");
        assert!(Sequence::new("").is_empty());
    }

    #[test]
    fn test_slice() {
        let seq = Sequence::new("ACGUACGU");
        assert_eq!(seq.slice(Region::new(2, 5)).unwrap().as_str(), "GUA");
        assert!(seq.slice(Region::new(6, 9)).is_err());
    }

    #[test]
    fn test_replacement_length_mismatch() {
        let seq = Sequence::new("ACGUACGU");
        let err = seq.with_replacement(Region::new(1, 3), "AAA").unwrap_err();
        assert!(matches!(err, MediatorError::InvalidConstraint(_)));
    }

    #[test]
    fn test_replacement_at_end() {
        let seq = Sequence::new("ACGUACGU");
        let mutated = seq.with_replacement(Region::new(6, 8), "tt").unwrap();
        assert_eq!(mutated.as_str(), "ACGUACUU");
    }
}
