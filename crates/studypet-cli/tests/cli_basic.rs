//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(dir: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_studypet"))
        .args(args)
        .env("STUDYPET_DATA_DIR", dir.path())
        .env_remove("STUDYPET_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_cli_success(dir: &TempDir, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(dir, args);
    assert_eq!(code, 0, "CLI command {args:?} failed: {stderr}");
    stdout
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("event line is JSON"))
        .collect()
}

#[test]
fn test_pet_create_and_show() {
    let dir = TempDir::new().unwrap();
    let created = run_cli_success(&dir, &["pet", "create", "Mochi", "--kind", "axolotl"]);
    let pet: serde_json::Value = serde_json::from_str(&created).unwrap();
    assert_eq!(pet["name"], "Mochi");
    assert_eq!(pet["kind"], "axolotl");

    let shown = run_cli_success(&dir, &["pet", "show"]);
    let view: serde_json::Value = serde_json::from_str(&shown).unwrap();
    assert_eq!(view["stage_name"], "Egg");
    assert_eq!(view["progress_points"], 0);
    assert_eq!(view["progress_limit"], 200);
    assert_eq!(view["mood"], "sad");
}

#[test]
fn test_pet_create_twice_fails() {
    let dir = TempDir::new().unwrap();
    run_cli_success(&dir, &["pet", "create", "Mochi"]);
    let (_, stderr, code) = run_cli(&dir, &["pet", "create", "Other"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("already exists"));

    run_cli_success(&dir, &["pet", "reset"]);
    run_cli_success(&dir, &["pet", "create", "Other"]);
}

#[test]
fn test_session_without_pet_fails() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["session", "run", "10"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("no pet yet"));
}

#[test]
fn test_session_run_credits_pet() {
    let dir = TempDir::new().unwrap();
    run_cli_success(&dir, &["pet", "create", "Mochi"]);

    let stdout = run_cli_success(&dir, &["session", "run", "10", "--time-scale", "6000"]);
    let events = json_lines(&stdout);
    let types: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
    assert_eq!(
        types,
        vec![
            "SessionSelected",
            "SessionStarted",
            "SessionCompleted",
            "ProgressCommitted",
            "StateSnapshot"
        ]
    );
    assert_eq!(events[4]["progress_points"], 10);

    let history: serde_json::Value =
        serde_json::from_str(&run_cli_success(&dir, &["history", "--limit", "5"])).unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["points_awarded"], 10);
    assert_eq!(history[0]["outcome"], "accrued");

    let stats: serde_json::Value =
        serde_json::from_str(&run_cli_success(&dir, &["stats"])).unwrap();
    assert_eq!(stats["completed_sessions"], 1);
    assert_eq!(stats["minutes_studied"], 10);
    assert_eq!(stats["today_minutes"], 10);
    assert_eq!(stats["week_minutes"], 10);
    assert_eq!(stats["streak_days"], 1);
    assert_eq!(stats["avg_session_minutes"], 10.0);
}

#[test]
fn test_session_rejects_non_preset_without_custom() {
    let dir = TempDir::new().unwrap();
    run_cli_success(&dir, &["pet", "create", "Mochi"]);
    let (_, stderr, code) = run_cli(&dir, &["session", "run", "7"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid session duration"));

    let stdout = run_cli_success(&dir, &["session", "run", "7", "--custom", "--time-scale", "6000"]);
    let events = json_lines(&stdout);
    assert_eq!(events.last().unwrap()["progress_points"], 7);
}

#[test]
fn test_config_get_set_list() {
    let dir = TempDir::new().unwrap();
    assert_eq!(
        run_cli_success(&dir, &["config", "get", "session.allow_custom"]).trim(),
        "false"
    );
    run_cli_success(&dir, &["config", "set", "session.allow_custom", "true"]);
    assert_eq!(
        run_cli_success(&dir, &["config", "get", "session.allow_custom"]).trim(),
        "true"
    );

    let (_, _, code) = run_cli(&dir, &["config", "set", "focus.window", "0"]);
    assert_ne!(code, 0);
    let (_, _, code) = run_cli(&dir, &["config", "get", "session.nope"]);
    assert_ne!(code, 0);

    let stdout = run_cli_success(&dir, &["config", "set", "session.max_custom_minutes", "180"]);
    assert_eq!(stdout.trim(), "session.max_custom_minutes = 180");
    let stdout = run_cli_success(&dir, &["config", "set", "session.max_custom_minutes", "none"]);
    assert_eq!(stdout.trim(), "session.max_custom_minutes = null");

    let section = run_cli_success(&dir, &["config", "get", "focus"]);
    assert!(section.contains("focus.window = 3"));
    assert!(!section.contains("session."));

    let listed = run_cli_success(&dir, &["config", "list"]);
    assert!(listed.contains("focus.multiplier_floor = 0.25"));

    run_cli_success(&dir, &["config", "reset"]);
    assert_eq!(
        run_cli_success(&dir, &["config", "get", "session.allow_custom"]).trim(),
        "false"
    );
}

#[test]
fn test_completions() {
    let dir = TempDir::new().unwrap();
    let script = run_cli_success(&dir, &["completions", "bash"]);
    assert!(script.contains("studypet"));
}
