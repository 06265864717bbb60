use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bio::io::fasta;
use flate2::read::MultiGzDecoder;

use crate::sequence::Sequence;
use crate::types::*;

/// Gene sequence read from FASTA together with the location encoded in its header.
#[derive(Debug, Clone)]
pub struct GeneRecord {
    pub header: GeneHeader,
    pub sequence: Sequence,
}

/// Location information carried by a `gene::chrom:start-end(strand)` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneHeader {
    pub gene: String,
    /// Chromosome, `na` when the header carries none
    pub chrom: String,
    /// 1-based genomic start, if present
    pub start: Option<u64>,
    /// Genomic end, if present
    pub end: Option<u64>,
    pub strand: Strand,
}

/// Splits a FASTA identifier of the form `gene::chrom:start-end(strand)`.
///
/// Identifiers without location information yield chromosome `na` and an
/// unknown strand.
///
/// # Examples
///
/// ```rust
/// use rnamediator_core::sequence::io::parse_header;
/// use rnamediator_core::types::Strand;
///
/// let header = parse_header("ENSG01::chr1:1001-1200(-)");
/// assert_eq!(header.gene, "ENSG01");
/// assert_eq!(header.chrom, "chr1");
/// assert_eq!(header.start, Some(1001));
/// assert_eq!(header.strand, Strand::Reverse);
///
/// let bare = parse_header("my_gene");
/// assert_eq!(bare.chrom, "na");
/// ```
#[must_use]
pub fn parse_header(id: &str) -> GeneHeader {
    let parts: Vec<&str> = id.split(':').collect();
    let gene = parts[0].to_string();

    if parts.len() < 4 {
        return GeneHeader {
            gene,
            chrom: "na".to_string(),
            start: None,
            end: None,
            strand: Strand::Unknown,
        };
    }

    let chrom = parts[2].to_string();
    let location = parts[3];
    let (span, strand) = match location.split_once('(') {
        Some((span, rest)) => {
            let strand = rest
                .chars()
                .next()
                .map(|c| parse_strand(&c.to_string()).unwrap_or(Strand::Unknown))
                .unwrap_or(Strand::Unknown);
            (span, strand)
        }
        None => (location, Strand::Unknown),
    };
    let (start, end) = match span.split_once('-') {
        Some((s, e)) => (s.parse().ok(), e.parse().ok()),
        None => (None, None),
    };

    GeneHeader {
        gene,
        chrom,
        start,
        end,
        strand,
    }
}

pub(crate) fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(MultiGzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Reads all records of a (possibly gzipped) FASTA file.
///
/// # Errors
///
/// Returns [`MediatorError::IoError`] if the file cannot be opened and
/// [`MediatorError::ParseError`] for malformed records.
pub fn read_gene_sequences(path: &Path) -> Result<Vec<GeneRecord>> {
    let reader = fasta::Reader::new(BufReader::new(open_maybe_gz(path)?));
    let mut records = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| MediatorError::ParseError(e.to_string()))?;
        records.push(GeneRecord {
            header: parse_header(record.id()),
            sequence: Sequence::from_bytes(record.seq()),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    #[test]
    fn test_read_gene_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.fa");
        fs::write(
            &path,
            ">g1::chr2:11-18(+)\nacgt\nACGT\n>g2::chr3:5-8(-)\nUUAA\n",
        )
        .unwrap();

        let records = read_gene_sequences(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].header.gene, "g1");
        assert_eq!(records[0].sequence.as_str(), "ACGUACGU");
        assert_eq!(records[1].header.strand, Strand::Reverse);
        assert_eq!(records[1].header.end, Some(8));
    }

    #[test]
    fn test_read_gzipped_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.fa.gz");
        let mut encoder =
            flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        encoder.write_all(b">g1\nACGU\n").unwrap();
        encoder.finish().unwrap();

        let records = read_gene_sequences(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].header.chrom, "na");
    }

    #[test]
    fn test_missing_file() {
        let result = read_gene_sequences(Path::new("nonexistent_file.fa"));
        assert!(matches!(result, Err(MediatorError::IoError(_))));
    }

    #[test]
    fn test_header_without_strand() {
        let header = parse_header("g::chrX:10-20");
        assert_eq!(header.chrom, "chrX");
        assert_eq!(header.start, Some(10));
        assert_eq!(header.end, Some(20));
        assert_eq!(header.strand, Strand::Unknown);
    }
}
