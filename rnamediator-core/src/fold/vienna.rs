//! In-process folding through libRNA.
//!
//! Each call creates its own fold compound, so one [`ViennaBackend`] can be
//! shared between worker threads.

use std::ffi::{CString, c_int, c_uint, c_void};
use std::ptr;

use librna_sys::{
    VRNA_CONSTRAINT_CONTEXT_ALL_LOOPS, VRNA_OPTION_DEFAULT, VRNA_OPTION_WINDOW,
    VRNA_PROBS_WINDOW_UP, vrna_ep_t, vrna_fold_compound, vrna_fold_compound_free,
    vrna_fold_compound_t, vrna_hc_add_bp_nonspecific, vrna_hc_add_up, vrna_md_set_default,
    vrna_md_t, vrna_pf, vrna_plist_from_probs, vrna_probs_window, vrna_sc_add_up,
};

use crate::config::FoldingParameters;
use crate::constraint::{self, ConstraintSink};
use crate::fold::FoldingBackend;
use crate::fold::result::{BasePair, WholeFold};
use crate::profile::ProfileArray;
use crate::sequence::Sequence;
use crate::types::{Constraint, MediatorError, Result};

/// Pairs below this probability are not reported by whole-sequence folds.
const PAIR_CUTOFF: f64 = 1e-8;

unsafe extern "C" {
    fn free(ptr: *mut c_void);
}

fn failure(message: impl Into<String>) -> MediatorError {
    MediatorError::EngineInvocationFailure(message.into())
}

/// Owned `vrna_fold_compound_t`.
struct Compound {
    fc: *mut vrna_fold_compound_t,
    length: usize,
}

impl Compound {
    fn new(sequence: &Sequence, span: usize, window: usize, temperature: f64, options: u32) -> Result<Self> {
        let cseq = CString::new(sequence.as_str())
            .map_err(|e| failure(format!("sequence not representable: {e}")))?;
        let to_int = |v: usize| c_int::try_from(v).map_err(|e| failure(e.to_string()));

        let fc = unsafe {
            let mut md: vrna_md_t = std::mem::zeroed();
            vrna_md_set_default(&mut md);
            md.max_bp_span = to_int(span)?;
            md.window_size = to_int(window)?;
            md.temperature = temperature;
            vrna_fold_compound(cseq.as_ptr(), &md, options)
        };
        if fc.is_null() {
            return Err(failure("libRNA refused to create a fold compound"));
        }
        Ok(Self {
            fc,
            length: sequence.len(),
        })
    }

    fn check(status: c_int, what: &str) -> Result<()> {
        if status == 0 {
            Err(failure(format!("libRNA rejected {what}")))
        } else {
            Ok(())
        }
    }

    fn positions(first: usize, count: usize) -> Result<impl Iterator<Item = c_uint>> {
        let first = c_uint::try_from(first).map_err(|e| failure(e.to_string()))?;
        let count = c_uint::try_from(count).map_err(|e| failure(e.to_string()))?;
        Ok(first..first + count)
    }
}

impl Drop for Compound {
    fn drop(&mut self) {
        unsafe {
            vrna_fold_compound_free(self.fc);
        }
    }
}

impl ConstraintSink for Compound {
    fn force_paired(&mut self, first: usize, count: usize) -> Result<()> {
        for i in Self::positions(first, count)? {
            let status = unsafe {
                vrna_hc_add_bp_nonspecific(self.fc, i, 0, VRNA_CONSTRAINT_CONTEXT_ALL_LOOPS as u8)
            };
            Self::check(status, "pairing constraint")?;
        }
        Ok(())
    }

    fn forbid_pairing(&mut self, first: usize, count: usize) -> Result<()> {
        for i in Self::positions(first, count)? {
            let status =
                unsafe { vrna_hc_add_up(self.fc, i, VRNA_CONSTRAINT_CONTEXT_ALL_LOOPS as u8) };
            Self::check(status, "unpaired constraint")?;
        }
        Ok(())
    }

    fn bias_unpaired(&mut self, first: usize, count: usize, energy: f64) -> Result<()> {
        for i in Self::positions(first, count)? {
            let i = c_int::try_from(i).map_err(|e| failure(e.to_string()))?;
            let status = unsafe { vrna_sc_add_up(self.fc, i, energy, VRNA_OPTION_DEFAULT) };
            Self::check(status, "soft unpaired constraint")?;
        }
        Ok(())
    }
}

/// Rows of unpaired probabilities collected by [`collect_unpaired`].
struct UnpairedRows {
    rows: Vec<Vec<f64>>,
}

unsafe extern "C" fn collect_unpaired(
    pr: *mut f64,
    _pr_size: c_int,
    i: c_int,
    max: c_int,
    kind: c_uint,
    data: *mut c_void,
) {
    if kind & VRNA_PROBS_WINDOW_UP == 0 || pr.is_null() || data.is_null() {
        return;
    }
    let collected = unsafe { &mut *data.cast::<UnpairedRows>() };
    let (Ok(i), Ok(max)) = (usize::try_from(i), usize::try_from(max)) else {
        return;
    };
    let Some(row) = i.checked_sub(1).and_then(|r| collected.rows.get_mut(r)) else {
        return;
    };
    for (k, cell) in row.iter_mut().enumerate().take(max) {
        let length = k + 1;
        if length <= i {
            *cell = unsafe { *pr.add(length) };
        }
    }
}

/// Backend linking libRNA directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViennaBackend;

impl FoldingBackend for ViennaBackend {
    fn name(&self) -> &'static str {
        "libRNA"
    }

    fn windowed_fold(
        &self,
        sequence: &Sequence,
        params: &FoldingParameters,
        constraint: Option<&Constraint>,
    ) -> Result<ProfileArray> {
        let mut compound = Compound::new(
            sequence,
            params.span,
            params.window,
            params.temperature,
            VRNA_OPTION_WINDOW,
        )?;
        if let Some(c) = constraint {
            constraint::apply(&mut compound, c, compound.length)?;
        }

        let mut collected = UnpairedRows {
            rows: vec![vec![f64::NAN; params.region]; compound.length],
        };
        let region = c_int::try_from(params.region).map_err(|e| failure(e.to_string()))?;
        let status = unsafe {
            vrna_probs_window(
                compound.fc,
                region,
                VRNA_PROBS_WINDOW_UP,
                Some(collect_unpaired),
                ptr::from_mut(&mut collected).cast::<c_void>(),
            )
        };
        Compound::check(status, "windowed partition function")?;
        ProfileArray::from_engine_rows(collected.rows, compound.length)
    }

    fn whole_fold(
        &self,
        sequence: &Sequence,
        span: usize,
        temperature: f64,
        constraint: Option<&Constraint>,
    ) -> Result<WholeFold> {
        let mut compound =
            Compound::new(sequence, span, sequence.len(), temperature, VRNA_OPTION_DEFAULT)?;
        if let Some(c) = constraint {
            constraint::apply(&mut compound, c, compound.length)?;
        }

        let gibbs = unsafe { vrna_pf(compound.fc, ptr::null_mut()) };
        let mut pairs = Vec::new();
        unsafe {
            let plist: *mut vrna_ep_t = vrna_plist_from_probs(compound.fc, PAIR_CUTOFF);
            if plist.is_null() {
                return Err(failure("libRNA returned no pair probabilities"));
            }
            let mut entry = plist;
            while (*entry).i > 0 {
                let (i, j) = ((*entry).i, (*entry).j);
                if let (Ok(i), Ok(j)) = (usize::try_from(i), usize::try_from(j)) {
                    pairs.push(BasePair {
                        i,
                        j,
                        probability: f64::from((*entry).p),
                    });
                }
                entry = entry.add(1);
            }
            free(plist.cast::<c_void>());
        }
        Ok(WholeFold { gibbs, pairs })
    }
}
