//! End-to-end CLI tests for the dedup command.
//!
//! These tests run the actual `fgdedup dedup` binary and validate:
//! 1. Duplicate marking across partitions
//! 2. UMI-aware splitting of duplicate sets
//! 3. Metrics output
//! 4. Error handling for bad input

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

const HEADER: &str = "name\tflag\tchrom\tpos\tcigar\tmate_chrom\tmate_pos\tmate_cigar\tsa\tquals";

/// A row for a first-of-pair (flag 99) or second-of-pair (flag 147) 10M record.
fn row(name: &str, flag: u16, pos: u32, mate_pos: u32, qual: char) -> String {
    let quals: String = std::iter::repeat_n(qual, 10).collect();
    format!("{name}\t{flag}\tchr1\t{pos}\t10M\tchr1\t{mate_pos}\t*\t*\t{quals}")
}

fn pair(name: &str, lower: u32, upper: u32, qual: char) -> [String; 2] {
    [row(name, 99, lower, upper, qual), row(name, 147, upper, lower, qual)]
}

fn write_reads(dir: &Path, rows: &[String]) -> PathBuf {
    let path = dir.join("reads.tsv");
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    fs::write(&path, content).unwrap();
    path
}

fn run_dedup(input: &Path, output: &Path, extra: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_fgdedup"))
        .arg("dedup")
        .arg("--input")
        .arg(input)
        .arg("--output")
        .arg(output)
        .args(extra)
        .output()
        .expect("Failed to run fgdedup dedup")
}

/// Parses the decision table into `(name, flag, status, duplicate_count)` rows.
fn read_decisions(path: &Path) -> Vec<(String, u16, String, String)> {
    let content = fs::read_to_string(path).unwrap();
    let mut lines = content.lines();
    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    assert_eq!(
        header,
        ["name", "flag", "chrom", "pos", "status", "duplicate", "duplicate_count", "umi_group"]
    );
    lines
        .map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            (
                fields[0].to_string(),
                fields[1].parse().unwrap(),
                fields[4].to_string(),
                fields[6].to_string(),
            )
        })
        .collect()
}

fn statuses(decisions: &[(String, u16, String, String)], name: &str) -> Vec<String> {
    decisions.iter().filter(|d| d.0 == name).map(|d| d.2.clone()).collect()
}

#[test]
fn test_dedup_across_partitions() {
    let dir = TempDir::new().unwrap();
    let mut rows = Vec::new();
    rows.extend(pair("hi", 100, 5100, 'I'));
    rows.extend(pair("lo", 100, 5100, '5'));
    rows.extend(pair("solo", 100, 5300, 'I'));
    rows.extend(pair("local", 2000, 2200, 'I'));
    let input = write_reads(dir.path(), &rows);
    let output = dir.path().join("decisions.tsv");
    let metrics = dir.path().join("metrics.tsv");

    let result = run_dedup(
        &input,
        &output,
        &["--partition-size", "1000", "--threads", "4", "--metrics", metrics.to_str().unwrap()],
    );
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let decisions = read_decisions(&output);
    assert_eq!(decisions.len(), 8);
    assert_eq!(statuses(&decisions, "hi"), ["PRIMARY", "PRIMARY"]);
    assert_eq!(statuses(&decisions, "lo"), ["DUPLICATE", "DUPLICATE"]);
    assert_eq!(statuses(&decisions, "solo"), ["NONE", "NONE"]);
    assert_eq!(statuses(&decisions, "local"), ["NONE", "NONE"]);

    for (name, flag, _, dc) in &decisions {
        assert_eq!(flag & 0x400 != 0, name == "lo", "duplicate flag on {name}");
        if name == "hi" {
            assert_eq!(dc, "1");
        }
    }

    let metrics = fs::read_to_string(&metrics).unwrap();
    let mut lines = metrics.lines();
    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let values: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let field = |name: &str| values[header.iter().position(|h| *h == name).unwrap()];
    assert_eq!(field("total_templates"), "4");
    assert_eq!(field("duplicate_templates"), "1");
    assert_eq!(field("total_reads"), "8");
    assert_eq!(field("unresolved_fragments"), "0");
}

#[test]
fn test_dedup_with_umis() {
    let dir = TempDir::new().unwrap();
    let mut rows = Vec::new();
    rows.extend(pair("r1:ACGTAC", 100, 400, 'I'));
    rows.extend(pair("r2:ACGTAA", 100, 400, '5'));
    rows.extend(pair("r3:TTTTTT", 100, 400, 'I'));
    let input = write_reads(dir.path(), &rows);
    let output = dir.path().join("decisions.tsv");

    let result = run_dedup(&input, &output, &["--umi"]);
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let decisions = read_decisions(&output);
    assert_eq!(statuses(&decisions, "r1:ACGTAC"), ["PRIMARY", "PRIMARY"]);
    assert_eq!(statuses(&decisions, "r2:ACGTAA"), ["DUPLICATE", "DUPLICATE"]);
    assert_eq!(statuses(&decisions, "r3:TTTTTT"), ["NONE", "NONE"]);
}

#[test]
fn test_dedup_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    let result =
        run_dedup(&dir.path().join("missing.tsv"), &dir.path().join("out.tsv"), &[]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("does not exist"));
}

#[test]
fn test_dedup_rejects_zero_partition_size() {
    let dir = TempDir::new().unwrap();
    let input = write_reads(dir.path(), &pair("a", 100, 300, 'I'));
    let result = run_dedup(&input, &dir.path().join("out.tsv"), &["--partition-size", "0"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("partition-size"));
}

#[test]
fn test_dedup_rejects_bad_cigar() {
    let dir = TempDir::new().unwrap();
    let bad = row("a", 99, 100, 300, 'I').replace("10M", "10Q");
    let input = write_reads(dir.path(), &[bad]);
    let result = run_dedup(&input, &dir.path().join("out.tsv"), &[]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Invalid CIGAR"));
}

#[test]
fn test_dedup_soft_clipped_duplicates_straddling_partitions() {
    let dir = TempDir::new().unwrap();
    let quals = |q: char| -> String { std::iter::repeat_n(q, 10).collect() };
    // Unclipped starts are both 985; alignment starts sit either side of 1000
    let rows = vec![
        format!("a\t99\tchr1\t995\t10S10M\tchr1\t1200\t*\t*\t{}", quals('I')),
        format!("a\t147\tchr1\t1200\t10M\tchr1\t995\t*\t*\t{}", quals('I')),
        format!("b\t99\tchr1\t1005\t20S10M\tchr1\t1200\t*\t*\t{}", quals('5')),
        format!("b\t147\tchr1\t1200\t10M\tchr1\t1005\t*\t*\t{}", quals('5')),
    ];
    let input = write_reads(dir.path(), &rows);
    let output = dir.path().join("decisions.tsv");

    let result = run_dedup(&input, &output, &["--partition-size", "1000", "--threads", "2"]);
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let decisions = read_decisions(&output);
    assert_eq!(statuses(&decisions, "a"), ["PRIMARY", "PRIMARY"]);
    assert_eq!(statuses(&decisions, "b"), ["DUPLICATE", "DUPLICATE"]);
}

#[test]
fn test_dedup_rejects_qualities_below_phred_zero() {
    let dir = TempDir::new().unwrap();
    let bad = row("a", 99, 100, 300, 'I').replace("IIIIIIIIII", "IIII IIIII");
    let input = write_reads(dir.path(), &[bad]);
    let result = run_dedup(&input, &dir.path().join("out.tsv"), &[]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("below '!'"));
}
