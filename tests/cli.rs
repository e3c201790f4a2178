/// Tests for the `train_model` binary
///
/// Run with: cargo test --test cli -- --nocapture
use std::{
    fs,
    path::Path,
    process::{Command, Output},
};

use serde_json::{json, Value};

fn train_model() -> Command {
    Command::new(env!("CARGO_BIN_EXE_train_model"))
}

fn run_in(dir: &Path, sessions: &Value, logs: Vec<Value>) -> Output {
    fs::write(dir.join("sessions.json"), sessions.to_string()).unwrap();
    fs::write(dir.join("logs.json"), Value::Array(logs).to_string()).unwrap();
    train_model()
        .args(["sessions.json", "logs.json"])
        .current_dir(dir)
        .output()
        .unwrap()
}

#[test]
fn test_wrong_argument_count_prints_usage() {
    println!("\n=== Test: Usage ===");
    let dir = tempfile::tempdir().unwrap();

    for args in [vec![], vec!["sessions.json"], vec!["a.json", "b.json", "c.json"]] {
        let out = train_model().args(&args).current_dir(dir.path()).output().unwrap();

        assert_eq!(out.status.code(), Some(1), "args {args:?}");
        let stdout = String::from_utf8_lossy(&out.stdout);
        assert_eq!(stdout.trim_end(), "Usage: train_model <sessions_file> <logs_file>");
    }
    assert!(!dir.path().join("models").exists());
    println!("✓ exit 1 with usage, nothing written");
}

#[test]
fn test_missing_input_file_fails() {
    println!("\n=== Test: Missing Input ===");
    let dir = tempfile::tempdir().unwrap();
    let out = train_model()
        .args(["missing_sessions.json", "missing_logs.json"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing_sessions.json"));
    println!("✓ non-zero exit, stdout empty");
}

#[test]
fn test_successful_run_prints_one_json_line() {
    println!("\n=== Test: Training Run ===");
    let dir = tempfile::tempdir().unwrap();
    let logs: Vec<Value> = (0..24)
        .map(|i| {
            json!({
                "session_id": if i < 12 { "s1" } else { "s2" },
                "created_at": format!("2024-07-01T12:{:02}:00Z", i),
                "output_power": format!("{}", 6.5 + (i % 4) as f64 * 0.5),
                "battery_level": 10 + i * 3,
                "consumption": i as f64 * 0.2,
                "status": if i % 6 == 5 { "Error" } else { "Charging" },
                "connector_status": "Connected",
            })
        })
        .collect();
    let sessions = json!([{"id": "s1"}, {"id": "s2"}]);
    let out = run_in(dir.path(), &sessions, logs);

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);

    let report: Value = serde_json::from_str(lines[0]).unwrap();
    let keys: Vec<&String> = report.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 4);
    assert!(report["validation_mae"].is_number());

    assert!(dir.path().join("models/ev_charging_model/weights.ot").exists());
    assert!(dir.path().join("models/scaler_params.npy").exists());
    println!("✓ {}", lines[0]);
}

#[test]
fn test_fault_findings_are_logged_to_stderr() {
    println!("\n=== Test: Fault Findings ===");
    let dir = tempfile::tempdir().unwrap();
    let logs: Vec<Value> = (0..12)
        .map(|i| {
            json!({
                "session_id": 7,
                "created_at": format!("2024-07-02T08:{:02}:00Z", i * 5),
                "output_power": 2.0 + (i % 3) as f64 * 0.1,
                "battery_level": 40 + i / 2,
                "status": "Charging",
                "connector_status": "Connected",
            })
        })
        .collect();
    let sessions = json!([{
        "id": 7,
        "started_at": "2024-07-02T08:00:00Z",
        "stopped_at": "2024-07-02T09:00:00Z",
    }]);
    let out = run_in(dir.path(), &sessions, logs);

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Low Power Output"), "stderr: {stderr}");
    assert!(stderr.contains("Average power output (2.10 kW) is below expected threshold"));
    assert!(stderr.contains("Slow Charging Rate"));
    assert!(!stderr.contains("Charging Interruptions"));
    assert_eq!(String::from_utf8(out.stdout).unwrap().lines().count(), 1);
    println!("✓ findings on stderr, report alone on stdout");
}
