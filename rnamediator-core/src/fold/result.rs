use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::difference::{base_pair_probability, ddg, dnrg, opening_energy};
use crate::types::{Constraint, ConstraintKind, MediatorError, Region, Result};

/// Closed set of conditions a whole-sequence fold is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Unconstrained,
    ConstraintPaired,
    ConstraintUnpaired,
    SecondconstraintPaired,
    SecondconstraintUnpaired,
    BothconstraintPaired,
    BothconstraintUnpaired,
    /// Unconstrained fold of the sequence with a mutation applied
    Mutated,
}

/// Which site(s) of a two-site constraint a condition restricts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    First,
    Second,
    Both,
}

impl Condition {
    pub const ALL: [Self; 8] = [
        Self::Unconstrained,
        Self::ConstraintPaired,
        Self::ConstraintUnpaired,
        Self::SecondconstraintPaired,
        Self::SecondconstraintUnpaired,
        Self::BothconstraintPaired,
        Self::BothconstraintUnpaired,
        Self::Mutated,
    ];

    /// Conditions folded for a two-site constraint.
    pub const COOPERATIVE: [Self; 7] = [
        Self::Unconstrained,
        Self::ConstraintPaired,
        Self::ConstraintUnpaired,
        Self::SecondconstraintPaired,
        Self::SecondconstraintUnpaired,
        Self::BothconstraintPaired,
        Self::BothconstraintUnpaired,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unconstrained => "unconstrained",
            Self::ConstraintPaired => "constraint_paired",
            Self::ConstraintUnpaired => "constraint_unpaired",
            Self::SecondconstraintPaired => "secondconstraint_paired",
            Self::SecondconstraintUnpaired => "secondconstraint_unpaired",
            Self::BothconstraintPaired => "bothconstraint_paired",
            Self::BothconstraintUnpaired => "bothconstraint_unpaired",
            Self::Mutated => "mutated",
        }
    }

    /// Condition for a paired or unpaired restriction of `site`.
    pub const fn restricting(site: Site, paired: bool) -> Self {
        match (site, paired) {
            (Site::First, true) => Self::ConstraintPaired,
            (Site::First, false) => Self::ConstraintUnpaired,
            (Site::Second, true) => Self::SecondconstraintPaired,
            (Site::Second, false) => Self::SecondconstraintUnpaired,
            (Site::Both, true) => Self::BothconstraintPaired,
            (Site::Both, false) => Self::BothconstraintUnpaired,
        }
    }

    /// Condition a constraint is reported under: single-region constraints are
    /// `constraint_*`, two-region constraints `bothconstraint_*` and mutations
    /// `mutated`.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::NotSupported`] for soft paired constraints.
    pub fn for_constraint(constraint: &Constraint) -> Result<Self> {
        let site = if constraint.second.is_some() {
            Site::Both
        } else {
            Site::First
        };
        match constraint.kind {
            ConstraintKind::Paired => Ok(Self::restricting(site, true)),
            ConstraintKind::Unpaired | ConstraintKind::UnpairedSoft => {
                Ok(Self::restricting(site, false))
            }
            ConstraintKind::Mutate => Ok(Self::Mutated),
            other => Err(MediatorError::NotSupported(format!(
                "{other} constraints in whole-sequence folds"
            ))),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = MediatorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| MediatorError::InvalidCondition(s.to_string()))
    }
}

/// One entry of a base-pair probability matrix, 1-based `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BasePair {
    pub i: usize,
    pub j: usize,
    pub probability: f64,
}

/// Ensemble energy and pair probabilities returned by a whole-sequence fold.
#[derive(Debug, Clone, PartialEq)]
pub struct WholeFold {
    pub gibbs: f64,
    pub pairs: Vec<BasePair>,
}

/// Thermodynamic summary of one condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionRecord {
    /// Ensemble free energy (kcal/mol)
    pub gibbs: f64,
    /// Human readable description of the applied constraint
    pub constraint: String,
    /// Pair probabilities whose 3' partner lies in the evaluated region
    pub bppm: Vec<BasePair>,
    /// Sum of `bppm`
    pub bpp: f64,
    /// Opening energy derived from `bpp`
    pub nrg: f64,
}

impl ConditionRecord {
    /// Summarizes `fold`, keeping pairs whose 3' partner falls into `region`
    /// (0-based, half-open) or all pairs when no region is given.
    pub fn from_fold(fold: WholeFold, constraint: impl Into<String>, region: Option<Region>) -> Self {
        let bppm: Vec<BasePair> = fold
            .pairs
            .into_iter()
            .filter(|bp| region.is_none_or(|r| r.contains(bp.j - 1)))
            .collect();
        let bpp = base_pair_probability(&bppm);
        Self {
            gibbs: fold.gibbs,
            constraint: constraint.into(),
            bppm,
            bpp,
            nrg: opening_energy(bpp),
        }
    }

    /// Record with precomputed values, as read back from a fold table.
    pub fn from_summary(gibbs: f64, nrg: f64, constraint: impl Into<String>) -> Self {
        Self {
            gibbs,
            constraint: constraint.into(),
            bppm: Vec::new(),
            bpp: 0.0,
            nrg,
        }
    }
}

/// Conditions of a whole-sequence fold keyed by [`Condition`].
///
/// Derived values are relative to the `unconstrained` entry and default to 0
/// when it is missing.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::fold::result::{Condition, ConditionRecord, FoldResult};
///
/// let mut result = FoldResult::new();
/// result.insert(Condition::ConstraintPaired, ConditionRecord::from_summary(-3.0, 0.5, "1-4"));
/// assert_eq!(result.ddg(Condition::ConstraintPaired), 0.0);
///
/// result.insert(Condition::Unconstrained, ConditionRecord::from_summary(-5.0, 0.1, "unconstrained"));
/// assert_eq!(result.ddg(Condition::ConstraintPaired), -2.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FoldResult {
    records: BTreeMap<Condition, ConditionRecord>,
}

impl FoldResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, condition: Condition, record: ConditionRecord) {
        self.records.insert(condition, record);
    }

    pub fn get(&self, condition: Condition) -> Option<&ConditionRecord> {
        self.records.get(&condition)
    }

    /// # Errors
    ///
    /// Returns [`MediatorError::MissingCondition`] if the condition was not folded.
    pub fn require(&self, condition: Condition) -> Result<&ConditionRecord> {
        self.get(condition)
            .ok_or_else(|| MediatorError::MissingCondition(condition.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in [`Condition`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Condition, &ConditionRecord)> {
        self.records.iter().map(|(c, r)| (*c, r))
    }

    /// Takes over every condition of `other`, replacing duplicates.
    pub fn merge(&mut self, other: Self) {
        self.records.extend(other.records);
    }

    /// Change in ensemble energy caused by `condition`:
    /// `gibbs(unconstrained) - gibbs(condition)`.
    pub fn ddg(&self, condition: Condition) -> f64 {
        match (self.get(condition), self.get(Condition::Unconstrained)) {
            (Some(record), Some(reference)) if condition != Condition::Unconstrained => {
                ddg(record, reference)
            }
            _ => 0.0,
        }
    }

    /// Change in opening energy caused by `condition`:
    /// `nrg(unconstrained) - nrg(condition)`.
    pub fn dnrg(&self, condition: Condition) -> f64 {
        match (self.get(condition), self.get(Condition::Unconstrained)) {
            (Some(record), Some(reference)) if condition != Condition::Unconstrained => {
                dnrg(record, reference)
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gibbs: f64, nrg: f64) -> ConditionRecord {
        ConditionRecord::from_summary(gibbs, nrg, "test")
    }

    #[test]
    fn test_condition_names_round_trip() {
        for condition in Condition::ALL {
            assert_eq!(condition.as_str().parse::<Condition>().unwrap(), condition);
        }
        assert!(matches!(
            "constraint".parse::<Condition>(),
            Err(MediatorError::InvalidCondition(_))
        ));
    }

    #[test]
    fn test_condition_for_constraint() {
        let single = Constraint::paired(Region::new(1, 4));
        assert_eq!(
            Condition::for_constraint(&single).unwrap(),
            Condition::ConstraintPaired
        );
        let both = Constraint::unpaired(Region::new(1, 4)).with_second(Region::new(8, 10));
        assert_eq!(
            Condition::for_constraint(&both).unwrap(),
            Condition::BothconstraintUnpaired
        );
        let mutation = Constraint::mutate(Region::new(1, 2), "A");
        assert_eq!(
            Condition::for_constraint(&mutation).unwrap(),
            Condition::Mutated
        );
        let soft = Constraint::soft(ConstraintKind::PairedSoft, Region::new(1, 4), -1.0);
        assert!(matches!(
            Condition::for_constraint(&soft),
            Err(MediatorError::NotSupported(_))
        ));
    }

    #[test]
    fn test_ddg_defaults_to_zero_without_reference() {
        let mut result = FoldResult::new();
        result.insert(Condition::ConstraintPaired, record(-4.0, 1.0));
        assert_eq!(result.ddg(Condition::ConstraintPaired), 0.0);
        assert_eq!(result.dnrg(Condition::ConstraintPaired), 0.0);
        assert_eq!(result.ddg(Condition::BothconstraintPaired), 0.0);
    }

    #[test]
    fn test_ddg_against_unconstrained() {
        let mut result = FoldResult::new();
        result.insert(Condition::Unconstrained, record(-10.0, 0.5));
        result.insert(Condition::ConstraintUnpaired, record(-7.5, 1.5));
        assert!((result.ddg(Condition::ConstraintUnpaired) + 2.5).abs() < 1e-12);
        assert!((result.dnrg(Condition::ConstraintUnpaired) + 1.0).abs() < 1e-12);
        assert_eq!(result.ddg(Condition::Unconstrained), 0.0);
    }

    #[test]
    fn test_record_restricts_pairs_to_region() {
        let fold = WholeFold {
            gibbs: -2.0,
            pairs: vec![
                BasePair { i: 1, j: 10, probability: 0.5 },
                BasePair { i: 2, j: 9, probability: 0.25 },
                BasePair { i: 3, j: 5, probability: 0.1 },
            ],
        };
        let all = ConditionRecord::from_fold(fold.clone(), "unconstrained", None);
        assert!((all.bpp - 0.85).abs() < 1e-12);

        let windowed = ConditionRecord::from_fold(fold, "unconstrained", Some(Region::new(8, 10)));
        assert_eq!(windowed.bppm.len(), 2);
        assert!((windowed.bpp - 0.75).abs() < 1e-12);
        assert!(windowed.nrg > 0.0);
    }

    #[test]
    fn test_iteration_follows_condition_order() {
        let mut result = FoldResult::new();
        result.insert(Condition::BothconstraintUnpaired, record(0.0, 0.0));
        result.insert(Condition::Unconstrained, record(0.0, 0.0));
        result.insert(Condition::ConstraintPaired, record(0.0, 0.0));
        let order: Vec<Condition> = result.iter().map(|(c, _)| c).collect();
        assert_eq!(
            order,
            vec![
                Condition::Unconstrained,
                Condition::ConstraintPaired,
                Condition::BothconstraintUnpaired
            ]
        );
    }
}
