use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, MediatorError>;

/// Strand of a gene or constraint. Unstranded entries (`.`) are `Unknown` and
/// compare equal to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

/// Zero-based, half-open interval `[start, end)` on a sequence.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::types::Region;
///
/// let region = Region::new(4, 8);
/// assert_eq!(region.len(), 4);
/// assert!(region.contains(4));
/// assert!(!region.contains(8));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    /// First position of the region (zero-based, inclusive)
    pub start: usize,
    /// Position after the last one (zero-based, exclusive)
    pub end: usize,
}

impl Region {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[must_use]
    pub const fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Checks `start <= end <= length`.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::ConstraintOutOfBounds`] when the region does not fit
    /// into a sequence of `length` residues.
    pub fn check_bounds(&self, length: usize) -> Result<()> {
        if self.start > self.end || self.end > length {
            return Err(MediatorError::ConstraintOutOfBounds {
                start: self.start,
                end: self.end,
                length,
            });
        }
        Ok(())
    }

    /// One-based inclusive `start-end` as used in file names and BED labels.
    #[must_use]
    pub fn location(&self) -> String {
        format!("{}-{}", self.start + 1, self.end)
    }

    /// Parses a one-based inclusive `start-end`.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::ParseError`] for anything else, including a zero
    /// start.
    pub fn parse_location(s: &str) -> Result<Self> {
        let invalid = || MediatorError::ParseError(format!("invalid location '{s}'"));
        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let start: usize = start.parse().map_err(|_| invalid())?;
        let end: usize = end.parse().map_err(|_| invalid())?;
        if start == 0 {
            return Err(invalid());
        }
        Ok(Self::new(start - 1, end))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Kind of structural constraint applied before folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConstraintKind {
    /// Every position of the region is forced to pair
    Paired,
    /// Every position of the region is forbidden to pair
    Unpaired,
    /// Energetic bias towards pairing (not supported)
    PairedSoft,
    /// Energetic bias towards staying single stranded
    UnpairedSoft,
    /// The region is replaced by another subsequence
    Mutate,
}

impl ConstraintKind {
    #[must_use]
    pub const fn is_soft(self) -> bool {
        matches!(self, Self::PairedSoft | Self::UnpairedSoft)
    }

    #[must_use]
    pub const fn is_paired(self) -> bool {
        matches!(self, Self::Paired | Self::PairedSoft)
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paired => write!(f, "paired"),
            Self::Unpaired => write!(f, "unpaired"),
            Self::PairedSoft => write!(f, "paired_soft"),
            Self::UnpairedSoft => write!(f, "unpaired_soft"),
            Self::Mutate => write!(f, "mutate"),
        }
    }
}

impl FromStr for ConstraintKind {
    type Err = MediatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "p" | "paired" => Ok(Self::Paired),
            "u" | "unpaired" => Ok(Self::Unpaired),
            "ps" | "paired_soft" => Ok(Self::PairedSoft),
            "us" | "unpaired_soft" => Ok(Self::UnpairedSoft),
            "m" | "mutate" => Ok(Self::Mutate),
            other => Err(MediatorError::InvalidConstraint(format!(
                "unknown constraint kind '{other}'"
            ))),
        }
    }
}

/// Payload carried by soft and mutation constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConstraintValue {
    /// Hard constraints carry nothing
    None,
    /// Pseudo-energy bias in kcal/mol for soft constraints
    Bias(f64),
    /// Replacement subsequence for mutations
    Replacement(String),
}

/// A structural constraint on one or two disjoint regions of a sequence.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::types::{Constraint, Region};
///
/// let single = Constraint::unpaired(Region::new(4, 8));
/// let both = Constraint::paired(Region::new(2, 5)).with_second(Region::new(10, 12));
/// assert!(single.second.is_none());
/// assert_eq!(both.second, Some(Region::new(10, 12)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub region: Region,
    pub second: Option<Region>,
    pub value: ConstraintValue,
}

impl Constraint {
    #[must_use]
    pub const fn paired(region: Region) -> Self {
        Self {
            kind: ConstraintKind::Paired,
            region,
            second: None,
            value: ConstraintValue::None,
        }
    }

    #[must_use]
    pub const fn unpaired(region: Region) -> Self {
        Self {
            kind: ConstraintKind::Unpaired,
            region,
            second: None,
            value: ConstraintValue::None,
        }
    }

    #[must_use]
    pub const fn soft(kind: ConstraintKind, region: Region, bias: f64) -> Self {
        Self {
            kind,
            region,
            second: None,
            value: ConstraintValue::Bias(bias),
        }
    }

    #[must_use]
    pub fn mutate(region: Region, replacement: impl Into<String>) -> Self {
        Self {
            kind: ConstraintKind::Mutate,
            region,
            second: None,
            value: ConstraintValue::Replacement(replacement.into()),
        }
    }

    #[must_use]
    pub const fn with_second(mut self, second: Region) -> Self {
        self.second = Some(second);
        self
    }

    /// Same constraint type, different target region, no second region.
    #[must_use]
    pub fn retarget(&self, region: Region) -> Self {
        Self {
            kind: self.kind,
            region,
            second: None,
            value: self.value.clone(),
        }
    }

    /// Regions the constraint acts on, in order.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        std::iter::once(self.region).chain(self.second)
    }

    /// Checks every region against a sequence of `length` residues.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::ConstraintOutOfBounds`] for the first region that
    /// does not fit.
    pub fn check_bounds(&self, length: usize) -> Result<()> {
        self.regions().try_for_each(|r| r.check_bounds(length))
    }

    /// Parses a location string `start-end|strand[|value]`, optionally followed
    /// by `:start-end|strand` for a second site. Coordinates are one-based
    /// inclusive.
    ///
    /// The value is read as bias for soft kinds and as replacement for mutations.
    ///
    /// # Errors
    ///
    /// [`MediatorError::ParseError`] for malformed locations,
    /// [`MediatorError::InvalidStrand`] for unknown strands and
    /// [`MediatorError::InvalidConstraint`] if a soft or mutation constraint
    /// lacks its value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rnamediator_core::types::{Constraint, ConstraintKind, Region, Strand};
    ///
    /// let (c, strand) = Constraint::parse_location("5-8|-", ConstraintKind::Unpaired).unwrap();
    /// assert_eq!(c.region, Region::new(4, 8));
    /// assert_eq!(strand, Strand::Reverse);
    ///
    /// let (both, _) = Constraint::parse_location("1-3|+:10-12|+", ConstraintKind::Paired).unwrap();
    /// assert_eq!(both.second, Some(Region::new(9, 12)));
    /// ```
    pub fn parse_location(s: &str, kind: ConstraintKind) -> Result<(Self, Strand)> {
        let mut sites = s.split(':');
        let first = sites.next().unwrap_or_default();
        let mut fields = first.split('|');
        let region = Region::parse_location(fields.next().unwrap_or_default())?;
        let strand = fields.next().map_or(Ok(Strand::Unknown), parse_strand)?;
        let raw_value = fields.next();

        let value = match (kind, raw_value) {
            (ConstraintKind::Paired | ConstraintKind::Unpaired, _) => ConstraintValue::None,
            (ConstraintKind::PairedSoft | ConstraintKind::UnpairedSoft, Some(v)) => {
                ConstraintValue::Bias(v.trim().parse().map_err(|_| {
                    MediatorError::InvalidConstraint(format!("invalid bias '{v}'"))
                })?)
            }
            (ConstraintKind::Mutate, Some(v)) => ConstraintValue::Replacement(v.trim().to_string()),
            (kind, None) => {
                return Err(MediatorError::InvalidConstraint(format!(
                    "{kind} constraint '{s}' without value"
                )));
            }
        };

        let second = sites
            .next()
            .map(|site| Region::parse_location(site.split('|').next().unwrap_or_default()))
            .transpose()?;
        Ok((
            Self {
                kind,
                region,
                second,
                value,
            },
            strand,
        ))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.region)?;
        if let Some(second) = self.second {
            write!(f, ":{second}")?;
        }
        Ok(())
    }
}

/// Converts a strand into its single character representation.
#[must_use]
pub const fn strand_symbol(strand: Strand) -> char {
    match strand {
        Strand::Forward => '+',
        Strand::Reverse => '-',
        Strand::Unknown => '.',
    }
}

/// Parses `+`, `-` or `.` into a [`Strand`].
///
/// # Errors
///
/// Returns [`MediatorError::InvalidStrand`] for anything else.
pub fn parse_strand(s: &str) -> Result<Strand> {
    match s.trim() {
        "+" => Ok(Strand::Forward),
        "-" => Ok(Strand::Reverse),
        "." => Ok(Strand::Unknown),
        other => Err(MediatorError::InvalidStrand(other.to_string())),
    }
}

/// Error types raised by folding, parsing and selection
#[derive(Error, Debug)]
pub enum MediatorError {
    /// Constraint region outside the sequence or with start > end
    #[error("Constraint {start}-{end} out of bounds for sequence of length {length}")]
    ConstraintOutOfBounds {
        start: usize,
        end: usize,
        length: usize,
    },
    /// Constraint is well bounded but otherwise unusable
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),
    /// Serialized profile could not be understood
    #[error("Malformed profile: {0}")]
    MalformedProfileFormat(String),
    /// Requested operation is a known design limitation
    #[error("Not supported: {0}")]
    NotSupported(String),
    /// Expected window result files of a gene are incomplete
    #[error("Missing input files for {gene}: {detail}")]
    MissingInputFiles { gene: String, detail: String },
    /// Folding backend terminated abnormally or produced unexpected output
    #[error("Folding engine failed: {0}")]
    EngineInvocationFailure(String),
    /// Condition needed for a derived energy is absent
    #[error("Missing folding condition: {0}")]
    MissingCondition(String),
    /// Condition name outside the closed set
    #[error("Invalid folding condition: {0}")]
    InvalidCondition(String),
    /// Invalid strand specification
    #[error("Invalid strand: '{0}'")]
    InvalidStrand(String),
    /// Error parsing input data
    #[error("Parse error: {0}")]
    ParseError(String),
    /// File I/O operation failed
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// Run summary could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
