use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::annotation::{ChromSizes, normalize_chrom};
use crate::selection::{TrackEntry, WindowTracks};
use crate::output::remove_if_exists;
use crate::types::{Result, Strand};

/// Profile a track is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrackKind {
    /// Unconstrained probabilities
    Raw,
    /// Differences after forcing the constraint unpaired
    Unpaired,
    /// Differences after forcing the constraint paired
    Paired,
}

impl TrackKind {
    pub const ALL: [Self; 3] = [Self::Raw, Self::Unpaired, Self::Paired];

    /// File name of the track for `strand`: `{name}_{ulim}.{fw,re}.bedgraph`,
    /// with `_diffnu` or `_diffnp` appended to `name` for difference tracks.
    pub fn file_name(self, name: &str, ulim: usize, strand: Strand) -> String {
        let orientation = match strand {
            Strand::Reverse => "re",
            Strand::Forward | Strand::Unknown => "fw",
        };
        let suffix = match self {
            Self::Raw => "",
            Self::Unpaired => "_diffnu",
            Self::Paired => "_diffnp",
        };
        format!("{name}{suffix}_{ulim}.{orientation}.bedgraph")
    }
}

/// Track entries of a whole run, per kind and orientation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSet {
    tracks: BTreeMap<(TrackKind, bool), Vec<TrackEntry>>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: TrackKind, strand: Strand, entries: Vec<TrackEntry>) {
        if entries.is_empty() {
            return;
        }
        self.tracks
            .entry((kind, strand == Strand::Reverse))
            .or_default()
            .extend(entries);
    }

    /// Adds the raw entries of a window and its difference entries as `diff_kind`.
    pub fn add_window(&mut self, window: WindowTracks, diff_kind: TrackKind) {
        self.add(TrackKind::Raw, window.strand, window.raw);
        self.add(diff_kind, window.strand, window.diff);
    }

    pub fn merge(&mut self, other: Self) {
        for ((kind, reverse), entries) in other.tracks {
            self.tracks.entry((kind, reverse)).or_default().extend(entries);
        }
    }

    pub fn entries(&self, kind: TrackKind, strand: Strand) -> &[TrackEntry] {
        self.tracks
            .get(&(kind, strand == Strand::Reverse))
            .map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sorts entries by chromosome-sizes order and start, collapsing overlaps to
/// the entry with the largest absolute value.
///
/// Chromosome names are normalized first; entries on chromosomes missing from
/// `sizes` are dropped with a warning.
pub fn prepare_entries(entries: &[TrackEntry], sizes: &ChromSizes) -> Vec<TrackEntry> {
    let mut dropped = 0usize;
    let mut ranked: Vec<(usize, TrackEntry)> = entries
        .iter()
        .filter_map(|entry| {
            let chrom = normalize_chrom(&entry.chrom);
            let Some(rank) = sizes.rank(&chrom) else {
                dropped += 1;
                return None;
            };
            Some((rank, TrackEntry { chrom, ..entry.clone() }))
        })
        .collect();
    if dropped > 0 {
        warn!(dropped, "Track entries on chromosomes without size were dropped");
    }
    ranked.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then(a.start.cmp(&b.start)));

    let mut collapsed: Vec<(usize, TrackEntry)> = Vec::with_capacity(ranked.len());
    for (rank, entry) in ranked {
        match collapsed.last_mut() {
            Some((last_rank, last)) if *last_rank == rank && entry.start < last.end => {
                if entry.value.abs() > last.value.abs() {
                    *last = entry;
                }
            }
            _ => collapsed.push((rank, entry)),
        }
    }
    collapsed.into_iter().map(|(_, e)| e).collect()
}

/// Write track entries as bedGraph lines
pub fn write_bedgraph<W: Write>(writer: &mut W, entries: &[TrackEntry]) -> Result<()> {
    for entry in entries {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            entry.chrom, entry.start, entry.end, entry.value
        )?;
    }
    Ok(())
}

/// Writes every non-empty track of `set` into `dir`; tracks without entries
/// leave no file behind. Returns the paths written.
pub fn write_tracks(
    dir: &Path,
    name: &str,
    ulim: usize,
    set: &TrackSet,
    sizes: &ChromSizes,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for kind in TrackKind::ALL {
        for strand in [Strand::Forward, Strand::Reverse] {
            let path = dir.join(kind.file_name(name, ulim, strand));
            let entries = prepare_entries(set.entries(kind, strand), sizes);
            if entries.is_empty() {
                if remove_if_exists(&path)? {
                    warn!(path = %path.display(), "Track is empty, removed");
                }
                continue;
            }
            let mut writer = BufWriter::new(File::create(&path)?);
            write_bedgraph(&mut writer, &entries)?;
            writer.flush()?;
            info!(path = %path.display(), entries = entries.len(), "Wrote track");
            written.push(path);
        }
    }
    Ok(written)
}
