//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run against a throwaway data
//! directory and verify the JSON they print.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "driftmirror-cli", "--"])
        .args(args)
        .env("DRIFTMIRROR_DATA_DIR", data_dir)
        .env_remove("DRIFTMIRROR_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn create_goal(data_dir: &Path) -> String {
    let created = run_json(
        data_dir,
        &["goal", "create", "Practice guitar", "--frequency", "7", "--minutes", "20"],
    );
    created["goal"]["id"].as_i64().unwrap().to_string()
}

#[test]
fn test_goal_create_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let created = run_json(
        dir.path(),
        &[
            "goal",
            "create",
            "Read",
            "--why",
            "Learn more",
            "--window",
            "evening",
        ],
    );
    assert_eq!(created["goal"]["title"], "Read");
    assert_eq!(created["plan"]["version"], 1);
    assert_eq!(created["plan"]["frequency_per_week"], 3);
    assert_eq!(created["plan"]["time_window"], "evening");

    let id = created["goal"]["id"].as_i64().unwrap().to_string();
    let shown = run_json(dir.path(), &["goal", "show", &id]);
    assert_eq!(shown["goal"]["why"], "Learn more");

    let listed = run_json(dir.path(), &["goal", "list"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[test]
fn test_goal_create_rejects_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["goal", "create", "Run", "--frequency", "9"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_checkins_trigger_adjustment() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_goal(dir.path());

    let mut last = Value::Null;
    for _ in 0..3 {
        last = run_json(
            dir.path(),
            &["checkin", "add", &id, "--done", "--friction", "3"],
        );
    }
    assert_eq!(last["drift_triggered"], true);
    assert_eq!(last["new_plan"]["min_minutes"], 15);
    assert_eq!(last["report"]["source"], "deterministic");

    let history = run_json(dir.path(), &["plan", "history", &id]);
    assert_eq!(history.as_array().unwrap().len(), 2);
    let current = run_json(dir.path(), &["plan", "current", &id]);
    assert_eq!(current["version"], 2);

    let checkins = run_json(dir.path(), &["checkin", "list", &id, "--limit", "2"]);
    assert_eq!(checkins.as_array().unwrap().len(), 2);

    let status = run_json(dir.path(), &["status", &id]);
    assert_eq!(status["metrics"]["total_checkins"], 3);

    let report = run_json(dir.path(), &["report", "latest", &id]);
    let report_id = report["id"].as_i64().unwrap().to_string();
    let summary = run_json(dir.path(), &["report", "feedback", &report_id, "yes"]);
    assert_eq!(summary["helpful"], 1);
}

#[test]
fn test_report_summary_and_momentum() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_goal(dir.path());

    let empty = run_json(dir.path(), &["report", "summary", &id]);
    assert_eq!(empty["days_to_habit"], 90);
    assert_eq!(empty["source"], "deterministic");

    for _ in 0..5 {
        run_json(
            dir.path(),
            &["checkin", "add", &id, "--done", "--friction", "1", "--extra", "played scales"],
        );
    }
    let summary = run_json(dir.path(), &["report", "summary", &id]);
    assert!(summary["overall_progress"]
        .as_str()
        .unwrap()
        .contains("5 check-ins"));
    assert_eq!(summary["key_wins"].as_array().unwrap().len(), 3);

    let status = run_json(dir.path(), &["status", &id]);
    assert_eq!(status["metrics"]["suggest_momentum_minimum"], true);
    assert_eq!(status["metrics"]["active_minimum_level"], "momentum");

    let (_, _, code) = run_cli(dir.path(), &["report", "summary", "999"]);
    assert_eq!(code, 1);
}

#[test]
fn test_checkin_rejects_bad_friction() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_goal(dir.path());
    let (_, stderr, code) = run_cli(dir.path(), &["checkin", "add", &id, "--friction", "5"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("friction"));
}

#[test]
fn test_suggest_accept_with_explicit_changes() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_goal(dir.path());

    let suggestions = run_json(dir.path(), &["suggest", "list", &id]);
    assert!(suggestions.as_array().unwrap().is_empty());

    let accepted = run_json(
        dir.path(),
        &[
            "suggest",
            "accept",
            &id,
            "reduce_frequency",
            "--changes",
            r#"{"frequency_per_week": 5}"#,
        ],
    );
    assert_eq!(accepted["plan"]["frequency_per_week"], 5);
    assert_eq!(accepted["plan"]["version"], 2);

    let (_, _, code) = run_cli(
        dir.path(),
        &[
            "suggest",
            "accept",
            &id,
            "reduce_duration",
            "--changes",
            r#"{"min_minutes": 9999}"#,
        ],
    );
    assert_eq!(code, 1);

    let dismissed = run_json(dir.path(), &["suggest", "dismiss", &id, "recovery_mode"]);
    assert_eq!(dismissed["dismissed"], "recovery_mode");
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "defaults.min_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "15");

    let (stdout, _, code) = run_cli(dir.path(), &["config", "set", "defaults.min_minutes", "25"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "defaults.min_minutes"]);
    assert_eq!(stdout.trim(), "25");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "defaults.min_minutes", "500"]);
    assert_eq!(code, 1);

    let (_, _, code) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);

    let (stdout, _, code) = run_cli(dir.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));
}
