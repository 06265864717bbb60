// =============================================================================
// Thermodynamics
// =============================================================================

/// Version string for RNAmediator
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed `kT` (kcal/mol) at 37 °C used to turn base-pair probabilities into
/// opening energies, independent of the folding temperature.
pub const KT: f64 = 0.616_320_775_5;

/// Default folding temperature in °C
pub const DEFAULT_TEMPERATURE: f64 = 37.0;

// =============================================================================
// Profiles
// =============================================================================

/// Decimal digits kept when a profile is serialized as text
pub const PROFILE_PRECISION: i32 = 7;

/// Absolute tolerance used when two profiles are compared
pub const PROFILE_TOLERANCE: f64 = 1e-7;

/// Negative engine probabilities down to this magnitude are rounding noise and read as 0
pub const NEGATIVE_NOISE: f64 = 1e-9;

/// Text label for a cell that carries no probability
pub const NA_LABEL: &str = "NA";

/// First header line of an unpaired-probability table
pub const PROFILE_HEADER: &str = "#unpaired probabilities";

/// Prefix of the column label line of an unpaired-probability table
pub const PROFILE_COLUMN_PREFIX: &str = " #i$\tl=";

// =============================================================================
// Folding defaults
// =============================================================================

/// Default folding window (RNAplfold `-W`)
pub const DEFAULT_WINDOW: usize = 240;

/// Default maximal base-pair span (RNAplfold `-L`)
pub const DEFAULT_SPAN: usize = 160;

/// Default region of interest (RNAplfold `-u`)
pub const DEFAULT_REGION: usize = 1;

/// Factor by which a folding window is extended on both sides of a constraint
pub const DEFAULT_WINDOW_MULTIPLIER: usize = 2;

// =============================================================================
// Genome browser limits
// =============================================================================

/// Longest chromosome name accepted by UCSC track formats
pub const MAX_CHROM_NAME_LENGTH: usize = 32;

/// Prefix every chromosome name must carry for UCSC track formats
pub const CHROM_PREFIX: &str = "chr";

// =============================================================================
// File naming
// =============================================================================

/// Prefix of constrained window result files
pub const CONSTRAINED_PREFIX: &str = "StruCons";

/// Tag of unconstrained window result files
pub const RAW_TAG: &str = "raw";

/// Tag of unpaired-constraint difference files
pub const DIFF_UNPAIRED_TAG: &str = "diffnu";

/// Tag of paired-constraint difference files
pub const DIFF_PAIRED_TAG: &str = "diffnp";

/// Tag of whole-window fold tables
pub const FOLD_TABLE_TAG: &str = "fold";

/// Table of cooperativity scores written by a whole-fold run
pub const COOPERATIVITY_TABLE: &str = "Cooperativity.tsv";

/// Run summary written next to the outputs
pub const SUMMARY_FILE: &str = "summary.json";

/// BED collection written for unpaired-constraint effects
pub const COLLECTION_UNPAIRED: &str = "Collection_unpaired.bed.gz";

/// BED collection written for paired-constraint effects
pub const COLLECTION_PAIRED: &str = "Collection_paired.bed.gz";
