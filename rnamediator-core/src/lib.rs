//! # RNAmediator - constraint folding and differential accessibility
//!
//! Predicts how RNA secondary-structure accessibility changes when a binding
//! event is imposed on a transcript. Genes are folded in windows around each
//! hypothetical binding site, with the site forced unpaired or paired, and the
//! per-position change in unpaired probability is reported as genomic
//! intervals.
//!
//! ## Overview
//!
//! A screen runs in two stages:
//!
//! 1. **Folding**: every constraint of every gene is folded in a window around
//!    it; the unconstrained profile and both difference profiles are stored as
//!    window files ([`pipeline::fold_driver`])
//! 2. **Collection**: window files are mapped to the genome, thresholded and
//!    written as BED collections or bedGraph tracks
//!    ([`pipeline::collect_regions`], [`pipeline::collect_tracks`])
//!
//! Whole-sequence folds of two-site constraints additionally yield ensemble
//! energies per condition and a cooperativity score.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rnamediator_core::config::{FoldingParameters, SelectionParams};
//! use rnamediator_core::difference::difference;
//! use rnamediator_core::fold::{FoldingEngine, command::CommandLineBackend};
//! use rnamediator_core::sequence::Sequence;
//! use rnamediator_core::types::{Constraint, Region};
//!
//! let engine = FoldingEngine::new(CommandLineBackend::default());
//! let seq = Sequence::new("GGGGAAAACCCCUUUUGGGGAAAACCCC");
//! let params = FoldingParameters { window: 28, span: 28, region: 1, ..Default::default() };
//!
//! let raw = engine.fold(&seq, &params, None)?;
//! let opened = engine.fold(&seq, &params, Some(&Constraint::unpaired(Region::new(4, 8))))?;
//! let diff = difference(&raw, &opened, 1)?;
//! println!("{} positions compared", diff.len());
//! # Ok::<(), rnamediator_core::types::MediatorError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`fold`]: folding engine and ViennaRNA backends
//! - [`constraint`]: application of constraints to folding models
//! - [`profile`]: unpaired-probability tables and their codecs
//! - [`difference`]: profile differences and energy deltas
//! - [`coordinates`]: window, transcript and genomic coordinates
//! - [`selection`]: thresholds turning differences into records
//! - [`pipeline`]: genome-scale folding and collection runs
//! - [`annotation`]: gene, constraint and chromosome size files
//! - [`output`]: BED, bedGraph and fold table writers
//! - [`sequence`]: normalized RNA sequences and FASTA input
//! - [`config`]: run parameters
//! - [`types`]: shared value types and errors
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, MediatorError>`](types::MediatorError).
//! Inside a run, failures of single windows or genes are collected in
//! [`pipeline::GeneReport`]s and do not abort the remaining work.

pub mod annotation;
pub mod config;
pub mod constants;
pub mod constraint;
pub mod coordinates;
pub mod difference;
pub mod fold;
pub mod output;
pub mod pipeline;
pub mod profile;
pub mod selection;
pub mod sequence;
pub mod types;

pub use fold::FoldingEngine;
pub use profile::ProfileArray;
pub use types::{MediatorError, Result};
