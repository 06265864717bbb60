//! Writers for collected results.
//!
//! ## Supported Formats
//!
//! - **BED collections**: gzipped `Collection_{unpaired,paired}.bed.gz` with
//!   one line per reported position
//! - **bedGraph tracks**: per-strand, globally sorted tracks of raw and
//!   difference profiles, ready for `bedGraphToBigWig`
//! - **Fold tables**: energies of whole-sequence folds per condition
//!
//! Every writer leaves no file behind when it has nothing to write.
//!
//! ## Examples
//!
//! ```rust
//! use rnamediator_core::output::write_fold_table;
//! use rnamediator_core::fold::result::{Condition, ConditionRecord, FoldResult};
//!
//! let mut result = FoldResult::new();
//! result.insert(Condition::Unconstrained, ConditionRecord::from_summary(-5.0, 0.2, "unconstrained"));
//!
//! let mut buffer = Vec::new();
//! write_fold_table(&mut buffer, &result)?;
//! assert!(String::from_utf8(buffer).unwrap().starts_with("Condition\t"));
//! # Ok::<(), rnamediator_core::types::MediatorError>(())
//! ```

use std::fs;
use std::io;
use std::path::Path;

use crate::types::Result;

mod formats {
    pub mod bed;
    pub mod bedgraph;
    pub mod fold_table;
}

pub use formats::bed::{collection_name, write_bed, write_collections};
pub use formats::bedgraph::{TrackKind, TrackSet, prepare_entries, write_bedgraph, write_tracks};
pub use formats::fold_table::{read_fold_table, write_fold_table};

/// Removes `path` if it exists and reports whether it did.
///
/// # Errors
///
/// Propagates I/O errors other than a missing file.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
