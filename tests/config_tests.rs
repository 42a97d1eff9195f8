// SPDX-License-Identifier: PMPL-1.0-or-later

//! Profile loading and batch files on disk

mod common;

use common::{processor, SAMPLE_PROGRAM};
use simple_spa::batch;
use simple_spa::EngineProfile;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_json_profile() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.json");
    fs::write(&path, r#"{ "optimize": false, "enable_bip": true }"#).unwrap();

    let profile = EngineProfile::load(&path).unwrap();
    assert!(!profile.optimize);
    assert!(profile.enable_bip);
    assert!(!profile.settings().dedup_clauses);
}

#[test]
fn test_load_yaml_profile() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.yml");
    fs::write(&path, "group_before_merge: false\nsort_before_bfs: false\n").unwrap();

    let profile = EngineProfile::load(&path).unwrap();
    assert!(profile.optimize);
    assert!(!profile.enable_bip);
    assert!(!profile.settings().group_before_merge);
    assert!(profile.settings().sort_clauses);
}

#[test]
fn test_unsupported_profile_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    fs::write(&path, "optimize = true").unwrap();

    let err = EngineProfile::load(&path).unwrap_err();
    assert!(err.to_string().contains("unsupported"));
}

#[test]
fn test_missing_profile_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    let err = EngineProfile::load(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.json"));
}

#[test]
fn test_batch_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.txt");
    let queries = dir.path().join("queries.txt");
    let report_path = dir.path().join("report.json");
    fs::write(&source, SAMPLE_PROGRAM).unwrap();
    fs::write(
        &queries,
        "1 - procedures
procedure p;
Select p
main, compute, report
5000
2 - deliberately wrong expectation
stmt s;
Select s such that Follows(1, s)
3
5000
3 - malformed query counts as no answers
stmt s;
Select s such that
none
5000
",
    )
    .unwrap();

    let cases = batch::load_cases(&queries).unwrap();
    assert_eq!(cases.len(), 3);

    let report = batch::run_cases(&processor(EngineProfile::default()), &cases);
    assert_eq!(report.total, 3);
    assert_eq!(report.passed, 2);
    assert!(!report.cases[1].passed);
    assert!(report.cases[2].error.is_some());

    report.save(&report_path).unwrap();
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(saved["passed"], 2);
    assert_eq!(saved["cases"][0]["id"], "1");
}
