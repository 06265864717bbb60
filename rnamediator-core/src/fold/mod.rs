//! Partition-function folding under structural constraints.
//!
//! [`FoldingEngine`] owns the rules every fold obeys (parameter normalization,
//! constraint validation, mutations, output checks) and hands the actual
//! computation to a [`FoldingBackend`]:
//!
//! - [`command::CommandLineBackend`] runs `RNAplfold` / `RNAfold`
//! - `vienna::ViennaBackend` (feature `vienna-ffi`) links libRNA directly
//!
//! ## Examples
//!
//! ```rust,no_run
//! use rnamediator_core::config::FoldingParameters;
//! use rnamediator_core::fold::{FoldingEngine, command::CommandLineBackend};
//! use rnamediator_core::sequence::Sequence;
//! use rnamediator_core::types::{Constraint, Region};
//!
//! let engine = FoldingEngine::new(CommandLineBackend::default());
//! let seq = Sequence::new("ACGUACGUACGUACGU");
//! let params = FoldingParameters { window: 16, span: 16, region: 4, temperature: 37.0 };
//!
//! let raw = engine.fold(&seq, &params, None)?;
//! let opened = engine.fold(&seq, &params, Some(&Constraint::unpaired(Region::new(4, 8))))?;
//! assert_eq!(raw.rows(), opened.rows());
//! # Ok::<(), rnamediator_core::types::MediatorError>(())
//! ```

pub mod command;
pub mod result;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(feature = "vienna-ffi")]
pub mod vienna;

use tracing::{debug, warn};

use crate::config::FoldingParameters;
use crate::constraint;
use crate::profile::ProfileArray;
use crate::sequence::Sequence;
use crate::types::{Constraint, ConstraintKind, ConstraintValue, MediatorError, Region, Result};
use result::{Condition, ConditionRecord, FoldResult, Site, WholeFold};

/// Something that can compute unpaired probabilities and ensemble energies.
///
/// Implementations receive normalized parameters, sequences with mutations
/// already applied and only constraints that passed [`validate_constraint`].
pub trait FoldingBackend: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Local folding with window, span and region from `params`.
    fn windowed_fold(
        &self,
        sequence: &Sequence,
        params: &FoldingParameters,
        constraint: Option<&Constraint>,
    ) -> Result<ProfileArray>;

    /// Global folding of the whole sequence.
    fn whole_fold(
        &self,
        sequence: &Sequence,
        span: usize,
        temperature: f64,
        constraint: Option<&Constraint>,
    ) -> Result<WholeFold>;
}

impl<B: FoldingBackend + ?Sized> FoldingBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn windowed_fold(
        &self,
        sequence: &Sequence,
        params: &FoldingParameters,
        constraint: Option<&Constraint>,
    ) -> Result<ProfileArray> {
        (**self).windowed_fold(sequence, params, constraint)
    }

    fn whole_fold(
        &self,
        sequence: &Sequence,
        span: usize,
        temperature: f64,
        constraint: Option<&Constraint>,
    ) -> Result<WholeFold> {
        (**self).whole_fold(sequence, span, temperature, constraint)
    }
}

/// Checks a constraint against a sequence of `length` residues without
/// touching any model.
///
/// # Errors
///
/// * [`MediatorError::NotSupported`] for soft paired constraints
/// * [`MediatorError::ConstraintOutOfBounds`] for regions outside the sequence
/// * [`MediatorError::InvalidConstraint`] for a missing bias or replacement
pub fn validate_constraint(constraint: &Constraint, length: usize) -> Result<()> {
    if constraint.kind == ConstraintKind::PairedSoft {
        return Err(MediatorError::NotSupported(
            "soft constraints for paired regions need specific base pairs".to_string(),
        ));
    }
    constraint.check_bounds(length)?;
    match (constraint.kind, &constraint.value) {
        (ConstraintKind::UnpairedSoft, ConstraintValue::Bias(_))
        | (ConstraintKind::Mutate, ConstraintValue::Replacement(_))
        | (ConstraintKind::Paired | ConstraintKind::Unpaired, _) => Ok(()),
        (kind, _) => Err(MediatorError::InvalidConstraint(format!(
            "{kind} constraint without matching value"
        ))),
    }
}

/// Backend-independent folding front end.
#[derive(Debug, Clone, Default)]
pub struct FoldingEngine<B> {
    backend: B,
}

impl<B: FoldingBackend> FoldingEngine<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Turns a mutation into the mutated sequence; other constraints pass through.
    fn resolve<'c>(
        sequence: &Sequence,
        constraint: Option<&'c Constraint>,
    ) -> Result<(Option<Sequence>, Option<&'c Constraint>)> {
        let Some(c) = constraint else {
            return Ok((None, None));
        };
        validate_constraint(c, sequence.len())?;
        match (&c.kind, &c.value) {
            (ConstraintKind::Mutate, ConstraintValue::Replacement(replacement)) => Ok((
                Some(constraint::mutate(sequence, c.region, replacement, c.second)?),
                None,
            )),
            _ => Ok((None, Some(c))),
        }
    }

    /// Unpaired probabilities of `sequence` in windowed mode.
    ///
    /// Window, span and region are clamped to the sequence with a warning.
    /// Mutations fold the mutated sequence on a fresh model.
    ///
    /// # Errors
    ///
    /// Constraint errors (see [`validate_constraint`]) are raised before the
    /// backend runs; backend failures are passed on.
    pub fn fold(
        &self,
        sequence: &Sequence,
        params: &FoldingParameters,
        constraint: Option<&Constraint>,
    ) -> Result<ProfileArray> {
        let (mutated, constraint) = Self::resolve(sequence, constraint)?;
        let target = mutated.as_ref().unwrap_or(sequence);

        let (params, adjustments) = params.normalized_for(target.len());
        for adjustment in &adjustments {
            warn!(backend = self.backend.name(), "{adjustment}");
        }
        debug!(
            backend = self.backend.name(),
            length = target.len(),
            window = params.window,
            span = params.span,
            region = params.region,
            constraint = ?constraint.map(ToString::to_string),
            "Windowed fold"
        );

        self.backend
            .windowed_fold(target, &params, constraint)?
            .checked(target.len())
    }

    fn whole_record(
        &self,
        sequence: &Sequence,
        span: usize,
        temperature: f64,
        constraint: Option<&Constraint>,
        description: String,
    ) -> Result<ConditionRecord> {
        let fold = self
            .backend
            .whole_fold(sequence, span.min(sequence.len()), temperature, constraint)?;
        Ok(ConditionRecord::from_fold(fold, description, None))
    }

    /// Whole-sequence fold without and with each constraint.
    ///
    /// The result always holds `unconstrained`; every constraint is folded on
    /// its own fresh model and stored under [`Condition::for_constraint`].
    /// A mutation folds the mutated sequence without constraints and is stored
    /// as [`Condition::Mutated`].
    ///
    /// # Errors
    ///
    /// Any constraint error aborts the call before its fold.
    pub fn fold_whole(
        &self,
        sequence: &Sequence,
        span: usize,
        temperature: f64,
        constraints: &[Constraint],
    ) -> Result<FoldResult> {
        let mut result = FoldResult::new();
        result.insert(
            Condition::Unconstrained,
            self.whole_record(sequence, span, temperature, None, "unconstrained".to_string())?,
        );

        for c in constraints {
            let condition = Condition::for_constraint(c)?;
            let (mutated, constraint) = Self::resolve(sequence, Some(c))?;
            let target = mutated.as_ref().unwrap_or(sequence);
            debug!(%condition, constraint = %c, "Whole-sequence fold");
            result.insert(
                condition,
                self.whole_record(target, span, temperature, constraint, c.to_string())?,
            );
        }
        Ok(result)
    }

    /// All seven conditions for the two sites `first` and `second`.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::ConstraintOutOfBounds`] for sites outside the
    /// sequence and passes on backend failures.
    pub fn fold_cooperative(
        &self,
        sequence: &Sequence,
        span: usize,
        temperature: f64,
        first: Region,
        second: Region,
    ) -> Result<FoldResult> {
        let mut result = FoldResult::new();
        result.insert(
            Condition::Unconstrained,
            self.whole_record(sequence, span, temperature, None, "unconstrained".to_string())?,
        );

        for site in [Site::First, Site::Second, Site::Both] {
            for paired in [true, false] {
                let base = match site {
                    Site::First => Constraint::unpaired(first),
                    Site::Second => Constraint::unpaired(second),
                    Site::Both => Constraint::unpaired(first).with_second(second),
                };
                let c = Constraint {
                    kind: if paired {
                        ConstraintKind::Paired
                    } else {
                        ConstraintKind::Unpaired
                    },
                    ..base
                };
                validate_constraint(&c, sequence.len())?;
                result.insert(
                    Condition::restricting(site, paired),
                    self.whole_record(sequence, span, temperature, Some(&c), c.to_string())?,
                );
            }
        }
        Ok(result)
    }
}
