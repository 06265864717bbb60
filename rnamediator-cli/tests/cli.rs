mod common;
use crate::common::{HAIRPIN, rnamediator, vienna_available, write_gene};
use std::fs;
use std::path::Path;

fn summary(dir: &Path) -> serde_json::Value {
    let text = fs::read_to_string(dir.join("summary.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn help_lists_subcommands() {
    let output = rnamediator().arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["fold", "collect", "tracks", "ddg"] {
        assert!(text.contains(subcommand), "missing {subcommand} in help");
    }
}

#[test]
fn unreadable_gene_bed_fails_before_work() {
    let dir = tempfile::tempdir().unwrap();
    let output = rnamediator()
        .args(["collect", "-g", "does_not_exist.bed", "-o"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read gene coordinates"));
    assert!(!dir.path().join("summary.json").exists());
}

#[test]
fn tracks_require_chromosome_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let (_, bed) = write_gene(dir.path(), "G", HAIRPIN, '+');
    rnamediator()
        .args(["tracks", "-g"])
        .arg(&bed)
        .assert()
        .failure();
}

#[test]
fn collect_skips_genes_without_windows() {
    let dir = tempfile::tempdir().unwrap();
    let (_, bed) = write_gene(dir.path(), "G", HAIRPIN, '+');
    let out = dir.path().join("out");
    rnamediator()
        .args(["collect", "-g"])
        .arg(&bed)
        .arg("-i")
        .arg(dir.path())
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let summary = summary(&out);
    assert_eq!(summary["genes"], 1);
    assert_eq!(summary["genes_skipped"], 1);
    assert!(!out.join("Collection_unpaired.bed.gz").exists());
    assert!(!out.join("Collection_paired.bed.gz").exists());
}

#[test]
fn fold_and_collect_hairpin() {
    if !vienna_available() {
        eprintln!("Skipping: ViennaRNA not in PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (fasta, bed) = write_gene(dir.path(), "G", HAIRPIN, '+');
    let windows = dir.path().join("windows");
    let pattern = ["-w", "16", "-l", "16", "-u", "1"];

    rnamediator()
        .args(["fold", "-s"])
        .arg(&fasta)
        .arg("-o")
        .arg(&windows)
        .args(pattern)
        .args(["-m", "1", "--sliding", "4", "--step", "4", "-z", "1"])
        .assert()
        .success();
    let folded = summary(&windows);
    assert_eq!(folded["windows"], 4);
    assert_eq!(folded["failures"].as_array().unwrap().len(), 0);
    assert!(
        windows
            .join("G")
            .join("G_chr1_+_5-8_1-16_raw_16_16_370.npy")
            .is_file()
    );

    let collected = dir.path().join("collected");
    rnamediator()
        .args(["collect", "-g"])
        .arg(&bed)
        .arg("-i")
        .arg(&windows)
        .arg("-o")
        .arg(&collected)
        .args(pattern)
        .assert()
        .success();
    let summary = summary(&collected);
    assert_eq!(summary["windows"], 4);
    assert_eq!(summary["failures"].as_array().unwrap().len(), 0);

    let sizes = dir.path().join("chrom.sizes");
    fs::write(&sizes, "chr1\t100000\n").unwrap();
    let tracks = dir.path().join("tracks");
    rnamediator()
        .args(["tracks", "-g"])
        .arg(&bed)
        .arg("-i")
        .arg(&windows)
        .arg("-o")
        .arg(&tracks)
        .arg("--chromsizes")
        .arg(&sizes)
        .args(pattern)
        .assert()
        .success();
    assert!(tracks.join("RNAmediator_1.fw.bedgraph").is_file());
    assert!(!tracks.join("RNAmediator_1.re.bedgraph").exists());
}
