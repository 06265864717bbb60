//! Translation of [`Constraint`]s into folding model restrictions.
//!
//! Backends expose their model through [`ConstraintSink`]; positions handed to a
//! sink are 1-based, the convention of the folding library, while every
//! [`Region`] in this crate is 0-based half-open.

use std::fmt::Write as _;

use tracing::debug;

use crate::sequence::Sequence;
use crate::types::{Constraint, ConstraintKind, ConstraintValue, MediatorError, Region, Result};

/// A folding model that accepts structural restrictions.
pub trait ConstraintSink {
    /// Every position in `first..first + count` must form some base pair.
    fn force_paired(&mut self, first: usize, count: usize) -> Result<()>;

    /// No position in `first..first + count` may pair.
    fn forbid_pairing(&mut self, first: usize, count: usize) -> Result<()>;

    /// Adds a pseudo energy (kcal/mol) for each position in `first..first + count`
    /// staying unpaired.
    fn bias_unpaired(&mut self, first: usize, count: usize, energy: f64) -> Result<()>;
}

fn regions(region: Region, second: Option<Region>) -> impl Iterator<Item = Region> {
    std::iter::once(region).chain(second)
}

/// Applies a hard constraint to each region independently.
///
/// # Errors
///
/// Returns [`MediatorError::InvalidConstraint`] for kinds other than
/// [`ConstraintKind::Paired`] and [`ConstraintKind::Unpaired`], or whatever the
/// sink reports.
pub fn apply_hard<S: ConstraintSink + ?Sized>(
    sink: &mut S,
    kind: ConstraintKind,
    region: Region,
    second: Option<Region>,
) -> Result<()> {
    for r in regions(region, second) {
        if r.is_empty() {
            continue;
        }
        match kind {
            ConstraintKind::Paired => sink.force_paired(r.start + 1, r.len())?,
            ConstraintKind::Unpaired => sink.forbid_pairing(r.start + 1, r.len())?,
            other => {
                return Err(MediatorError::InvalidConstraint(format!(
                    "{other} is not a hard constraint"
                )));
            }
        }
    }
    Ok(())
}

/// Applies a soft constraint to each region independently.
///
/// # Errors
///
/// [`ConstraintKind::PairedSoft`] yields [`MediatorError::NotSupported`] before
/// the sink is touched: a pairing bias needs a concrete partner base, which is
/// not modelled. Non-soft kinds yield [`MediatorError::InvalidConstraint`].
pub fn apply_soft<S: ConstraintSink + ?Sized>(
    sink: &mut S,
    kind: ConstraintKind,
    region: Region,
    bias: f64,
    second: Option<Region>,
) -> Result<()> {
    match kind {
        ConstraintKind::PairedSoft => Err(MediatorError::NotSupported(
            "soft constraints for paired regions need specific base pairs".to_string(),
        )),
        ConstraintKind::UnpairedSoft => {
            for r in regions(region, second) {
                if !r.is_empty() {
                    sink.bias_unpaired(r.start + 1, r.len(), bias)?;
                }
            }
            Ok(())
        }
        other => Err(MediatorError::InvalidConstraint(format!(
            "{other} is not a soft constraint"
        ))),
    }
}

/// Replaces each region of `sequence` with `replacement`.
///
/// # Errors
///
/// Returns [`MediatorError::InvalidConstraint`] if the replacement length differs
/// from a region length and [`MediatorError::ConstraintOutOfBounds`] if a region
/// does not fit.
pub fn mutate(
    sequence: &Sequence,
    region: Region,
    replacement: &str,
    second: Option<Region>,
) -> Result<Sequence> {
    let mut mutated = sequence.clone();
    for r in regions(region, second) {
        mutated = mutated.with_replacement(r, replacement)?;
    }
    debug!(from = %sequence, to = %mutated, "Applied mutation");
    Ok(mutated)
}

/// Applies any non-mutating constraint to `sink` after checking its bounds.
///
/// Mutations change the sequence and must be resolved with [`mutate`] before a
/// model exists; passing one here is an [`MediatorError::InvalidConstraint`].
///
/// # Errors
///
/// See [`apply_hard`] and [`apply_soft`].
pub fn apply<S: ConstraintSink + ?Sized>(
    sink: &mut S,
    constraint: &Constraint,
    length: usize,
) -> Result<()> {
    if constraint.kind != ConstraintKind::PairedSoft {
        constraint.check_bounds(length)?;
    }

    match (constraint.kind, &constraint.value) {
        (ConstraintKind::PairedSoft, _) => {
            apply_soft(sink, constraint.kind, constraint.region, 0.0, constraint.second)
        }
        (ConstraintKind::Paired | ConstraintKind::Unpaired, _) => {
            apply_hard(sink, constraint.kind, constraint.region, constraint.second)
        }
        (ConstraintKind::UnpairedSoft, ConstraintValue::Bias(bias)) => apply_soft(
            sink,
            constraint.kind,
            constraint.region,
            *bias,
            constraint.second,
        ),
        (ConstraintKind::UnpairedSoft, _) => Err(MediatorError::InvalidConstraint(
            "soft constraint without bias".to_string(),
        )),
        (ConstraintKind::Mutate, _) => Err(MediatorError::InvalidConstraint(
            "mutations must be applied to the sequence".to_string(),
        )),
    }
}

/// Widens `region` by `window * multiplier` residues on both sides, bounded by
/// the sequence.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::constraint::expand_window;
/// use rnamediator_core::types::Region;
///
/// assert_eq!(expand_window(Region::new(10, 17), 5, 2, 100), Region::new(0, 27));
/// assert_eq!(expand_window(Region::new(50, 57), 5, 2, 60), Region::new(40, 60));
/// ```
#[must_use]
pub fn expand_window(region: Region, window: usize, multiplier: usize, length: usize) -> Region {
    let flank = window.saturating_mul(multiplier);
    Region::new(
        region.start.saturating_sub(flank),
        region.end.saturating_add(flank).min(length),
    )
}

/// ViennaRNA command file collected from constraint calls.
///
/// Each call becomes one line `F i 0 k`, `P i 0 k` or `E i 0 k e`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandFile {
    lines: Vec<String>,
}

impl CommandFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let _ = writeln!(out, "{line}");
        }
        out
    }
}

impl ConstraintSink for CommandFile {
    fn force_paired(&mut self, first: usize, count: usize) -> Result<()> {
        self.lines.push(format!("F {first} 0 {count}"));
        Ok(())
    }

    fn forbid_pairing(&mut self, first: usize, count: usize) -> Result<()> {
        self.lines.push(format!("P {first} 0 {count}"));
        Ok(())
    }

    fn bias_unpaired(&mut self, first: usize, count: usize, energy: f64) -> Result<()> {
        self.lines.push(format!("E {first} 0 {count} {energy}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_constraints_are_one_based() {
        let mut commands = CommandFile::new();
        apply_hard(&mut commands, ConstraintKind::Unpaired, Region::new(4, 8), None).unwrap();
        apply_hard(&mut commands, ConstraintKind::Paired, Region::new(0, 2), None).unwrap();
        assert_eq!(commands.lines(), ["P 5 0 4", "F 1 0 2"]);
    }

    #[test]
    fn test_two_regions_are_applied_separately() {
        let mut commands = CommandFile::new();
        apply_hard(
            &mut commands,
            ConstraintKind::Unpaired,
            Region::new(2, 4),
            Some(Region::new(10, 13)),
        )
        .unwrap();
        assert_eq!(commands.lines(), ["P 3 0 2", "P 11 0 3"]);
    }

    #[test]
    fn test_soft_paired_touches_nothing() {
        let mut commands = CommandFile::new();
        let err = apply_soft(
            &mut commands,
            ConstraintKind::PairedSoft,
            Region::new(2, 4),
            -1.0,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, MediatorError::NotSupported(_)));
        assert!(commands.is_empty());
    }

    #[test]
    fn test_soft_paired_rejected_before_bounds() {
        let mut commands = CommandFile::new();
        let c = Constraint::soft(ConstraintKind::PairedSoft, Region::new(2, 400), -1.0);
        assert!(matches!(
            apply(&mut commands, &c, 16),
            Err(MediatorError::NotSupported(_))
        ));
    }

    #[test]
    fn test_soft_unpaired() {
        let mut commands = CommandFile::new();
        let c = Constraint::soft(ConstraintKind::UnpairedSoft, Region::new(0, 3), -0.5);
        apply(&mut commands, &c, 16).unwrap();
        assert_eq!(commands.render(), "E 1 0 3 -0.5\n");
    }

    #[test]
    fn test_apply_checks_bounds() {
        let mut commands = CommandFile::new();
        let c = Constraint::unpaired(Region::new(10, 17));
        assert!(matches!(
            apply(&mut commands, &c, 16),
            Err(MediatorError::ConstraintOutOfBounds { .. })
        ));
        assert!(commands.is_empty());
    }

    #[test]
    fn test_mutate_both_regions() {
        let seq = Sequence::new("AAAAAAAAAA");
        let mutated = mutate(&seq, Region::new(0, 2), "GC", Some(Region::new(6, 8))).unwrap();
        assert_eq!(mutated.as_str(), "GCAAAAGCAA");
        assert_eq!(seq.as_str(), "AAAAAAAAAA");
    }

    #[test]
    fn test_mutate_length_mismatch() {
        let seq = Sequence::new("AAAAAAAAAA");
        assert!(matches!(
            mutate(&seq, Region::new(0, 3), "GC", None),
            Err(MediatorError::InvalidConstraint(_))
        ));
    }

    #[test]
    fn test_expand_window_clamps_at_both_ends() {
        assert_eq!(expand_window(Region::new(3, 5), 10, 2, 30), Region::new(0, 25));
        assert_eq!(expand_window(Region::new(3, 5), 100, 2, 30), Region::new(0, 30));
    }
}
