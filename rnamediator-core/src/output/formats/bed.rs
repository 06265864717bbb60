use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::info;

use crate::constants::{COLLECTION_PAIRED, COLLECTION_UNPAIRED};
use crate::selection::{Category, IntervalRecord, Selection};
use crate::output::remove_if_exists;
use crate::types::Result;

/// Write interval records as BED lines
pub fn write_bed<W: Write>(writer: &mut W, records: &[IntervalRecord]) -> Result<()> {
    for record in records {
        writeln!(writer, "{record}")?;
    }
    Ok(())
}

/// File name of the collection holding `category` records.
pub const fn collection_name(category: Category) -> &'static str {
    match category {
        Category::Unpaired => COLLECTION_UNPAIRED,
        Category::Paired => COLLECTION_PAIRED,
    }
}

/// Writes `Collection_unpaired.bed.gz` and `Collection_paired.bed.gz` into `dir`.
///
/// A category without records leaves no file behind, including one from an
/// earlier run. Returns the paths written.
pub fn write_collections(dir: &Path, selection: &Selection) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for category in [Category::Unpaired, Category::Paired] {
        let path = dir.join(collection_name(category));
        let records = selection.records(category);
        if records.is_empty() {
            remove_if_exists(&path)?;
            continue;
        }

        let mut encoder = GzEncoder::new(BufWriter::new(File::create(&path)?), Compression::default());
        write_bed(&mut encoder, records)?;
        encoder.finish()?.flush()?;
        info!(path = %path.display(), records = records.len(), "Wrote {category} collection");
        written.push(path);
    }
    Ok(written)
}
