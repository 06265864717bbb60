use std::fmt;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_REGION, DEFAULT_SPAN, DEFAULT_TEMPERATURE, DEFAULT_WINDOW, DEFAULT_WINDOW_MULTIPLIER,
};

/// Thermodynamic and windowing parameters of a single fold.
///
/// The invariants `span <= window` and `region <= window` are not enforced on
/// construction; call [`FoldingParameters::normalized_for`] with the sequence length
/// to obtain a consistent copy together with the list of corrections applied.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::config::FoldingParameters;
///
/// let params = FoldingParameters {
///     window: 100,
///     span: 150,
///     ..Default::default()
/// };
/// let (fixed, adjustments) = params.normalized_for(80);
/// assert_eq!(fixed.window, 80);
/// assert_eq!(fixed.span, 80);
/// assert_eq!(adjustments.len(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldingParameters {
    /// Length of the sequence stretch folded at once (RNAplfold `-W`).
    ///
    /// **Default**: 240
    pub window: usize,

    /// Maximal distance between two paired bases (RNAplfold `-L`).
    ///
    /// **Default**: 160
    pub span: usize,

    /// Number of region lengths reported per residue (RNAplfold `-u`).
    ///
    /// Column `k` of the resulting profile holds the probability that the stretch
    /// of `k` residues ending at the row position is unpaired.
    ///
    /// **Default**: 1
    pub region: usize,

    /// Folding temperature in °C.
    ///
    /// **Default**: 37.0
    pub temperature: f64,
}

impl Default for FoldingParameters {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            span: DEFAULT_SPAN,
            region: DEFAULT_REGION,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Correction applied by [`FoldingParameters::normalized_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterAdjustment {
    /// Window was longer than the sequence
    WindowClamped { from: usize, to: usize },
    /// Span was longer than the window
    SpanClamped { from: usize, to: usize },
    /// Region was longer than the window
    RegionClamped { from: usize, to: usize },
}

impl fmt::Display for ParameterAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WindowClamped { from, to } => {
                write!(f, "window {from} exceeds sequence length, clamped to {to}")
            }
            Self::SpanClamped { from, to } => {
                write!(f, "span {from} exceeds window, clamped to {to}")
            }
            Self::RegionClamped { from, to } => {
                write!(f, "region {from} exceeds window, clamped to {to}")
            }
        }
    }
}

impl FoldingParameters {
    /// Returns a copy satisfying `region <= window`, `span <= window` and
    /// `window <= length`, plus the corrections that were needed.
    #[must_use]
    pub fn normalized_for(&self, length: usize) -> (Self, Vec<ParameterAdjustment>) {
        let mut fixed = *self;
        let mut adjustments = Vec::new();

        if fixed.window > length {
            adjustments.push(ParameterAdjustment::WindowClamped {
                from: fixed.window,
                to: length,
            });
            fixed.window = length;
        }
        if fixed.span > fixed.window {
            adjustments.push(ParameterAdjustment::SpanClamped {
                from: fixed.span,
                to: fixed.window,
            });
            fixed.span = fixed.window;
        }
        if fixed.region > fixed.window {
            adjustments.push(ParameterAdjustment::RegionClamped {
                from: fixed.region,
                to: fixed.window,
            });
            fixed.region = fixed.window;
        }

        (fixed, adjustments)
    }

    /// Temperature as it appears in window file names (`37.0` becomes `370`).
    #[must_use]
    pub fn temperature_tag(&self) -> String {
        let rendered = if self.temperature.fract() == 0.0 {
            format!("{:.1}", self.temperature)
        } else {
            self.temperature.to_string()
        };
        rendered.replace(['.', ','], "")
    }
}

/// Thresholds deciding which positions of a difference profile are reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionParams {
    /// Minimal absolute change in unpaired probability; only `border < |diff|` is kept.
    pub border: f64,

    /// Upper bound on the mean unconstrained unpaired probability of the
    /// constraint region. A value of 1.0 accepts every constraint.
    pub cutoff: f64,

    /// Positions within this many residues of a constraint edge are not reported.
    pub padding: usize,

    /// Region length (profile column) evaluated.
    pub ulim: usize,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            border: 0.0,
            cutoff: 1.0,
            padding: 0,
            ulim: DEFAULT_REGION,
        }
    }
}

/// Configuration of a collection run over already folded windows.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::config::PipelineConfig;
///
/// let config = PipelineConfig {
///     threads: Some(4),
///     ..Default::default()
/// };
/// assert_eq!(config.folding.window, 240);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Window, span and temperature identifying the window files to collect.
    ///
    /// Only `window`, `span` and `temperature` take part in file discovery.
    pub folding: FoldingParameters,

    /// Selection thresholds.
    pub selection: SelectionParams,

    /// Directory holding one subdirectory of window files per gene.
    ///
    /// **Default**: current directory
    pub input_dir: PathBuf,

    /// Directory the collections and tracks are written to.
    ///
    /// **Default**: current directory
    pub output_dir: PathBuf,

    /// Base name of the track files (`{name}_{ulim}.{fw,re}.bedgraph`).
    pub track_name: String,

    /// Number of worker threads.
    ///
    /// **Default**: `None` (use all available cores)
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            folding: FoldingParameters::default(),
            selection: SelectionParams::default(),
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            track_name: "RNAmediator".to_string(),
            threads: None,
        }
    }
}

/// Where the constraints of a folding run come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintSource {
    /// Constraint BED with transcript-relative coordinates, one site per line.
    Bed(PathBuf),

    /// Paired constraint BED, two consecutive halves of each line form one
    /// two-site constraint.
    PairedBed(PathBuf),

    /// Constraint of `length` residues slid along the whole transcript in
    /// steps of `step`.
    Sliding { length: usize, step: usize },
}

/// Configuration of a constraint folding run that produces window files.
#[derive(Debug, Clone)]
pub struct FoldDriverConfig {
    /// Folding parameters shared by every window.
    pub folding: FoldingParameters,

    /// Constraint origin.
    pub constraints: ConstraintSource,

    /// The folding window is extended by `window * multiplier` on each side
    /// of the constraint.
    ///
    /// **Default**: 2
    pub window_multiplier: usize,

    /// Directory receiving one subdirectory of window files per gene.
    pub output_dir: PathBuf,

    /// Number of worker threads.
    ///
    /// **Default**: `None` (use all available cores)
    pub threads: Option<usize>,
}

impl Default for FoldDriverConfig {
    fn default() -> Self {
        Self {
            folding: FoldingParameters::default(),
            constraints: ConstraintSource::Sliding { length: 7, step: 1 },
            window_multiplier: DEFAULT_WINDOW_MULTIPLIER,
            output_dir: PathBuf::from("."),
            threads: None,
        }
    }
}
