#![allow(missing_docs)]

use assert_cmd::cargo::cargo_bin_cmd;
use huge_arrays::catalog;
use huge_arrays::mem::GraphDimensions;
use serde_json::Value;

fn stdout_json(args: &[&str]) -> Value {
    let output = cargo_bin_cmd!("huge-estimate")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid json")
}

#[test]
fn list_names_every_catalog_entry() {
    let json = stdout_json(&["--format", "json", "list"]);
    let names: Vec<&str> = json
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|entry| entry["name"].as_str())
        .collect();
    let expected: Vec<&str> = catalog::entries().iter().map(|e| e.name).collect();
    assert_eq!(names, expected);
}

#[test]
fn list_text_mentions_summaries() {
    let output = cargo_bin_cmd!("huge-estimate")
        .arg("list")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.lines().any(|line| line.starts_with("long-array ")));
    assert!(text.contains("union-find with union by rank"));
}

#[test]
fn estimate_json_matches_library() {
    let json = stdout_json(&[
        "estimate",
        "long-array",
        "--nodes",
        "1000",
        "--concurrency",
        "4",
        "--format",
        "json",
    ]);
    let expected = catalog::lookup("long-array")
        .expect("known entry")
        .estimation()
        .estimate(&GraphDimensions::of(1000), 4);
    assert_eq!(json["dimensions"]["node_count"], 1000);
    assert_eq!(json["concurrency"], 4);
    assert_eq!(json["min_bytes"].as_u64(), Some(expected.range.min as u64));
    assert_eq!(json["max_bytes"].as_u64(), Some(expected.range.max as u64));
    assert_eq!(json["tree"]["description"], expected.description.as_str());
}

#[test]
fn several_structures_are_combined() {
    let json = stdout_json(&[
        "--format",
        "json",
        "estimate",
        "ranked-dss",
        "long-long-double-map",
        "--nodes",
        "5000",
        "--relationships",
        "20000",
    ]);
    let components = json["tree"]["components"].as_array().expect("components");
    assert_eq!(components.len(), 2);
    let sum: u64 = components
        .iter()
        .map(|c| c["range"]["min"].as_u64().unwrap_or(0))
        .sum();
    assert_eq!(json["min_bytes"].as_u64(), Some(sum));
}

#[test]
fn text_output_respects_block_size() {
    let output = cargo_bin_cmd!("huge-estimate")
        .args(["estimate", "long-array", "--nodes", "1000000", "--block-size", "M"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.starts_with("nodes=1000000 relationships=0"));
    assert!(text.contains("total: 8M"));
}

#[test]
fn unknown_structure_fails() {
    let output = cargo_bin_cmd!("huge-estimate")
        .args(["estimate", "btree", "--nodes", "10"])
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("unknown structure `btree`"));
}

#[test]
fn zero_concurrency_is_rejected() {
    cargo_bin_cmd!("huge-estimate")
        .args(["estimate", "merge-sort", "--nodes", "10", "--concurrency", "0"])
        .assert()
        .failure();
}
