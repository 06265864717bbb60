//! Differences between folding conditions.
//!
//! Windowed folds are compared position by position on a single region length;
//! whole-sequence folds are compared through their ensemble and opening energies.

use ndarray::{Array2, s};
use tracing::warn;

use crate::constants::KT;
use crate::fold::result::{BasePair, Condition, ConditionRecord, FoldResult};
use crate::profile::ProfileArray;
use crate::types::Result;

/// `constrained - raw` for every position at 1-based region length `region`.
///
/// A position missing in either profile stays missing. Profiles of different
/// length are compared up to the shorter one.
///
/// # Errors
///
/// Returns [`crate::types::MediatorError::MalformedProfileFormat`] if either
/// profile lacks the requested region length.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::difference::difference;
/// use rnamediator_core::profile::ProfileArray;
///
/// let raw = ProfileArray::parse("1\t0.5\n2\t0.2\n3\tNA\n").unwrap();
/// let constrained = ProfileArray::parse("1\t0.75\n2\t0.1\n3\t0.4\n").unwrap();
/// let diff = difference(&raw, &constrained, 1).unwrap();
/// assert_eq!(diff[0], Some(0.25));
/// assert!((diff[1].unwrap() + 0.1).abs() < 1e-12);
/// assert_eq!(diff[2], None);
/// ```
pub fn difference(
    raw: &ProfileArray,
    constrained: &ProfileArray,
    region: usize,
) -> Result<Vec<Option<f64>>> {
    let before = raw.column(region)?;
    let after = constrained.column(region)?;
    if before.len() != after.len() {
        warn!(
            raw = before.len(),
            constrained = after.len(),
            "Profiles differ in length, comparing the common prefix"
        );
    }

    Ok(before
        .iter()
        .zip(&after)
        .map(|(b, a)| Some((*a)? - (*b)?))
        .collect())
}

/// Cell-wise `constrained - raw` over every region length.
///
/// The result covers the rows and region lengths both profiles share.
pub fn difference_profile(raw: &ProfileArray, constrained: &ProfileArray) -> ProfileArray {
    let rows = raw.rows().min(constrained.rows());
    let cols = raw.regions().min(constrained.regions());
    if rows != raw.rows().max(constrained.rows()) {
        warn!(
            raw = raw.rows(),
            constrained = constrained.rows(),
            "Profiles differ in length, comparing the common prefix"
        );
    }

    let before = raw.cells().slice(s![..rows, ..cols]);
    let after = constrained.cells().slice(s![..rows, ..cols]);
    let mut delta = Array2::from_elem((rows, cols), None);
    ndarray::Zip::from(&mut delta)
        .and(&before)
        .and(&after)
        .for_each(|d, b, a| *d = b.zip(*a).map(|(b, a)| a - b));
    ProfileArray::from_array(delta)
}

/// `gibbs(b) - gibbs(a)`.
pub fn ddg(a: &ConditionRecord, b: &ConditionRecord) -> f64 {
    b.gibbs - a.gibbs
}

/// `nrg(b) - nrg(a)`.
pub fn dnrg(a: &ConditionRecord, b: &ConditionRecord) -> f64 {
    b.nrg - a.nrg
}

/// Cooperativity of two binding sites on the opening-energy scale of the
/// unpaired conditions:
/// `nrg(first) + nrg(second) - nrg(both) - nrg(unconstrained)`.
///
/// # Errors
///
/// Returns [`crate::types::MediatorError::MissingCondition`] if one of the four
/// conditions has not been folded.
pub fn cooperativity(result: &FoldResult) -> Result<f64> {
    let first = result.require(Condition::ConstraintUnpaired)?.nrg;
    let second = result.require(Condition::SecondconstraintUnpaired)?.nrg;
    let both = result.require(Condition::BothconstraintUnpaired)?.nrg;
    let unconstrained = result.require(Condition::Unconstrained)?.nrg;
    Ok(first + second - both - unconstrained)
}

/// Pseudo opening energy `-kT ln p`, 0 for `p <= 0`.
///
/// `kT` is fixed at 37 °C regardless of the folding temperature.
pub fn opening_energy(probability: f64) -> f64 {
    if probability > 0.0 {
        -KT * probability.ln()
    } else {
        0.0
    }
}

/// Sum of all pair probabilities.
pub fn base_pair_probability(bppm: &[BasePair]) -> f64 {
    bppm.iter().map(|bp| bp.probability).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediatorError;

    fn record(nrg: f64) -> ConditionRecord {
        ConditionRecord::from_summary(0.0, nrg, "")
    }

    #[test]
    fn test_difference_uses_single_column() {
        let raw = ProfileArray::parse("1\t0.5\tNA\n2\t0.4\t0.3\n").unwrap();
        let constrained = ProfileArray::parse("1\t0.5\tNA\n2\t0.9\t0.8\n").unwrap();
        let first = difference(&raw, &constrained, 1).unwrap();
        assert_eq!(first[0], Some(0.0));
        let second = difference(&raw, &constrained, 2).unwrap();
        assert_eq!(second[0], None);
        assert!((second[1].unwrap() - 0.5).abs() < 1e-12);
        assert!(difference(&raw, &constrained, 3).is_err());
    }

    #[test]
    fn test_difference_length_mismatch() {
        let raw = ProfileArray::parse("1\t0.5\n2\t0.4\n3\t0.3\n").unwrap();
        let constrained = ProfileArray::parse("1\t0.5\n2\t0.4\n").unwrap();
        assert_eq!(difference(&raw, &constrained, 1).unwrap().len(), 2);
    }

    #[test]
    fn test_difference_profile() {
        let raw = ProfileArray::parse("1\t0.5\tNA\n2\t0.4\t0.3\n").unwrap();
        let constrained = ProfileArray::parse("1\t1.0\tNA\n2\t0.2\t0.3\n").unwrap();
        let delta = difference_profile(&raw, &constrained);
        assert_eq!(delta.get(0, 1), Some(0.5));
        assert_eq!(delta.get(0, 2), None);
        assert_eq!(delta.get(1, 2), Some(0.0));
    }

    #[test]
    fn test_opening_energy() {
        assert_eq!(opening_energy(1.0), 0.0);
        assert_eq!(opening_energy(0.0), 0.0);
        assert_eq!(opening_energy(-0.5), 0.0);
        assert!((opening_energy(0.5) - KT * std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn test_pairwise_energies() {
        let a = ConditionRecord::from_summary(-10.0, 1.0, "");
        let b = ConditionRecord::from_summary(-6.0, 3.0, "");
        assert_eq!(ddg(&a, &b), 4.0);
        assert_eq!(dnrg(&a, &b), 2.0);
    }

    #[test]
    fn test_cooperativity() {
        let mut result = FoldResult::new();
        result.insert(Condition::Unconstrained, record(0.5));
        result.insert(Condition::ConstraintUnpaired, record(2.0));
        result.insert(Condition::SecondconstraintUnpaired, record(1.5));
        assert!(matches!(
            cooperativity(&result),
            Err(MediatorError::MissingCondition(c)) if c == "bothconstraint_unpaired"
        ));

        result.insert(Condition::BothconstraintUnpaired, record(2.5));
        assert!((cooperativity(&result).unwrap() - 0.5).abs() < 1e-12);
    }
}
