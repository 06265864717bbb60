#![allow(dead_code)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

/// Sixteen residue hairpin used by the end-to-end tests.
pub const HAIRPIN: &str = "GGGGAAAACCCCUUUU";

/// Detect if the ViennaRNA executables are available on PATH.
pub fn vienna_available() -> bool {
    ["RNAplfold", "RNAfold"].iter().all(|program| {
        match std::process::Command::new(program).arg("--version").output() {
            Ok(output) => output.status.success(),
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    eprintln!("{program} could not be started: {e}");
                }
                false
            }
        }
    })
}

/// The `rnamediator` binary with logging kept quiet.
pub fn rnamediator() -> Command {
    let mut cmd = Command::cargo_bin("rnamediator").unwrap();
    cmd.env("RUST_LOG", "error");
    cmd
}

/// Writes a one-gene FASTA and the matching gene BED into `dir`.
pub fn write_gene(dir: &Path, gene: &str, sequence: &str, strand: char) -> (PathBuf, PathBuf) {
    let end = 1000 + sequence.len();
    let fasta = dir.join("genes.fa");
    fs::write(
        &fasta,
        format!(">{gene}::chr1:1001-{end}({strand})\n{sequence}\n"),
    )
    .unwrap();
    let bed = dir.join("genes.bed");
    fs::write(&bed, format!("chr1\t1000\t{end}\t{gene}\t0\t{strand}\n")).unwrap();
    (fasta, bed)
}
