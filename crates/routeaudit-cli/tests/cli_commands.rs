//! End-to-end tests for the `check`, `coverage` and `audit` commands.
//!
//! These run the binary against the checked-in fixtures and verify:
//! - text and JSON reports
//! - command-line and file configuration overrides
//! - exit codes for clean, faulty and fatal runs

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../docs/fixtures")
        .join(name)
        .canonicalize()
        .expect("fixture present")
}

fn cli() -> Command {
    let mut cmd = cargo_bin_cmd!("routeaudit-cli");
    cmd.env("NO_COLOR", "1").env("RUST_LOG", "error");
    cmd
}

fn check() -> Command {
    let mut cmd = cli();
    cmd.arg("check").arg("--graph").arg(fixture("sample_routes.json"));
    cmd
}

#[test]
fn check_reports_faulty_routes_and_fails() {
    check()
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "ERROR - OSM bus route 3 (id: 1003) \"Linie 3\" - Oneway violation in way",
        ))
        .stdout(predicate::str::contains(
            "OSM hiking route 9 (id: 1002) \"Zirbenweg\" - Route disconnected at way",
        ))
        .stdout(predicate::str::contains("Checked 4 relations"))
        .stdout(predicate::str::contains("Faulty relations: 1002, 1003, 1004"))
        .stdout(predicate::str::contains("Murtalweg").not());
}

#[test]
fn json_output_is_parseable() {
    let output = cli()
        .args(["--format", "json", "check", "--graph"])
        .arg(fixture("sample_routes.json"))
        .output()
        .expect("run binary");
    assert_eq!(output.status.code(), Some(1));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["checked_routes"], 4);
    assert_eq!(value["faulty_routes"], serde_json::json!([1002, 1003, 1004]));
    let kinds: Vec<&str> = value["diagnostics"]
        .as_array()
        .expect("diagnostics array")
        .iter()
        .filter_map(|d| d["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"oneway_violation"));
    assert!(kinds.contains(&"malformed_relation"));
}

#[test]
fn downgraded_routes_only_fail_with_fail_on_warning() {
    check()
        .args(["--routes", "hiking", "--warn", "1002", "1004"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WARNING - OSM hiking route 9 (id: 1002)"))
        .stdout(predicate::str::contains("Checked 3 relations: 0 errors"));

    cli()
        .arg("--fail-on-warning")
        .arg("check")
        .arg("--graph")
        .arg(fixture("sample_routes.json"))
        .args(["--routes", "hiking", "--warn", "1002", "1004"])
        .assert()
        .code(1);
}

#[test]
fn ignored_routes_are_not_checked() {
    check()
        .args(["--routes", "hiking", "--ignore", "1002", "1004"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Checked 1 relations: 0 errors, 0 warnings. Faulty relations: none",
        ));
}

#[test]
fn unknown_category_suggests_alternatives() {
    check()
        .args(["--routes", "hikking"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown route category: hikking"))
        .stderr(predicate::str::contains("'hiking'"));
}

#[test]
fn configuration_file_overrides_defaults() {
    cli()
        .arg("--config")
        .arg(fixture("audit_config.json"))
        .arg("check")
        .arg("--graph")
        .arg(fixture("sample_routes.json"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("(id: 1002)").not())
        .stdout(predicate::str::contains("WARNING - OSM hiking route 20 (id: 1004)"))
        .stdout(predicate::str::contains("Faulty relations: 1003, 1004"));
}

#[test]
fn invalid_configuration_is_fatal() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"coverage": {"tolerance": -1}}"#).expect("write config");

    cli()
        .arg("--config")
        .arg(&path)
        .arg("check")
        .arg("--graph")
        .arg(fixture("sample_routes.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("tolerance must be positive"));
}

#[test]
fn missing_graph_is_fatal() {
    let dir = tempdir().expect("create temp dir");
    cli()
        .arg("check")
        .arg("--graph")
        .arg(dir.path().join("absent.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to load route graph"));
}

#[test]
fn coverage_reports_unmatched_reference_routes() {
    cli()
        .arg("coverage")
        .arg("--graph")
        .arg(fixture("sample_routes.json"))
        .arg("--reference")
        .arg(fixture("reference_routes.geojson"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "ERROR - reference route 40 (id: gk-40) \"Hochschwabweg\" - No intersecting OSM route matches",
        ))
        .stdout(predicate::str::contains("(id: gk-0)").not());
}

#[test]
fn audit_confirms_coverage_of_faulty_routes() {
    cli()
        .arg("audit")
        .arg("--graph")
        .arg(fixture("sample_routes.json"))
        .arg("--reference")
        .arg(fixture("reference_routes.geojson"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "INFO - OSM hiking route 9 (id: 1002) \"Zirbenweg\" - Fully covered by",
        ))
        .stdout(predicate::str::contains("(id: gk-40)"));
}

#[test]
fn audit_without_references_runs_topology_only() {
    cli()
        .arg("audit")
        .arg("--graph")
        .arg(fixture("sample_routes.json"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Fully covered").not())
        .stdout(predicate::str::contains("Checked 4 relations"));
}
