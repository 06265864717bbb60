use std::sync::Mutex;

use crate::config::FoldingParameters;
use crate::constants::KT;
use crate::constraint::{self, ConstraintSink};
use crate::fold::FoldingBackend;
use crate::fold::result::{BasePair, WholeFold};
use crate::profile::ProfileArray;
use crate::sequence::Sequence;
use crate::types::{Constraint, Result};

#[derive(Debug, Default)]
struct Calls {
    count: usize,
    window: Option<(usize, usize)>,
    sequence: Option<String>,
    constrained: bool,
}

/// Deterministic stand-in for ViennaRNA.
///
/// Every residue is unpaired independently with a probability depending on
/// its base; constraints pin that probability to 0 or 1 or shift it by the
/// Boltzmann factor of the bias.
#[derive(Debug, Default)]
pub(crate) struct ToyBackend {
    calls: Mutex<Calls>,
}

struct ToyModel {
    unpaired: Vec<f64>,
}

impl ToyModel {
    fn new(sequence: &Sequence) -> Self {
        let unpaired = sequence
            .as_str()
            .bytes()
            .map(|b| match b {
                b'A' | b'U' => 0.7,
                b'G' | b'C' => 0.4,
                _ => 1.0,
            })
            .collect();
        Self { unpaired }
    }

    fn positions(&mut self, first: usize, count: usize) -> &mut [f64] {
        &mut self.unpaired[first - 1..first - 1 + count]
    }
}

impl ConstraintSink for ToyModel {
    fn force_paired(&mut self, first: usize, count: usize) -> Result<()> {
        self.positions(first, count).fill(0.0);
        Ok(())
    }

    fn forbid_pairing(&mut self, first: usize, count: usize) -> Result<()> {
        self.positions(first, count).fill(1.0);
        Ok(())
    }

    fn bias_unpaired(&mut self, first: usize, count: usize, energy: f64) -> Result<()> {
        let boltzmann = (-energy / KT).exp();
        for p in self.positions(first, count) {
            *p = *p * boltzmann / (*p * boltzmann + (1.0 - *p));
        }
        Ok(())
    }
}

impl ToyBackend {
    fn model(&self, sequence: &Sequence, constraint: Option<&Constraint>) -> Result<ToyModel> {
        let mut model = ToyModel::new(sequence);
        if let Some(c) = constraint {
            constraint::apply(&mut model, c, sequence.len())?;
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.count += 1;
            calls.sequence = Some(sequence.to_string());
            calls.constrained = constraint.is_some();
        }
        Ok(model)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().map(|c| c.count).unwrap_or_default()
    }

    pub(crate) fn last_window(&self) -> Option<(usize, usize)> {
        self.calls.lock().ok().and_then(|c| c.window)
    }

    pub(crate) fn last_sequence(&self) -> Option<String> {
        self.calls.lock().ok().and_then(|c| c.sequence.clone())
    }

    pub(crate) fn last_had_constraint(&self) -> bool {
        self.calls.lock().map(|c| c.constrained).unwrap_or_default()
    }
}

impl FoldingBackend for ToyBackend {
    fn name(&self) -> &'static str {
        "toy"
    }

    fn windowed_fold(
        &self,
        sequence: &Sequence,
        params: &FoldingParameters,
        constraint: Option<&Constraint>,
    ) -> Result<ProfileArray> {
        let model = self.model(sequence, constraint)?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.window = Some((params.window, params.span));
        }

        let rows = (0..sequence.len())
            .map(|i| {
                (1..=params.region)
                    .map(|k| {
                        if k > i + 1 {
                            f64::NAN
                        } else {
                            model.unpaired[i + 1 - k..=i].iter().product()
                        }
                    })
                    .collect()
            })
            .collect();
        ProfileArray::from_engine_rows(rows, sequence.len())
    }

    fn whole_fold(
        &self,
        sequence: &Sequence,
        _span: usize,
        _temperature: f64,
        constraint: Option<&Constraint>,
    ) -> Result<WholeFold> {
        let model = self.model(sequence, constraint)?;
        let n = model.unpaired.len();
        let pairs = (0..n / 2)
            .map(|i| BasePair {
                i: i + 1,
                j: n - i,
                probability: (1.0 - model.unpaired[i]) * (1.0 - model.unpaired[n - 1 - i]),
            })
            .filter(|bp| bp.probability > 0.0)
            .collect();
        let gibbs = -model.unpaired.iter().map(|p| 1.0 - p).sum::<f64>();
        Ok(WholeFold { gibbs, pairs })
    }
}
