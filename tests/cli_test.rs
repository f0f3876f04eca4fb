//! CLI contract tests
//!
//! Runs the built binary against generated streams in a scratch directory,
//! isolated from any user config and MLSTREAM_* variables.

use std::path::Path;
use std::process::{Command, Output};

fn mlstream(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mlstream"))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("MLSTREAM_WINDOWS")
        .env_remove("MLSTREAM_SUPERVISION")
        .env_remove("MLSTREAM_THRESHOLD")
        .env_remove("MLSTREAM_VERBOSITY")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run mlstream")
}

fn generate(dir: &Path, file: &str, instances: usize) {
    let n = instances.to_string();
    let out = mlstream(
        dir,
        &["generate", "-o", file, "-n", &n, "--features", "4", "--labels", "3", "--seed", "5"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn test_generate_then_evaluate_json() {
    let dir = tempfile::tempdir().unwrap();
    generate(dir.path(), "stream.jsonl", 300);

    let out = mlstream(
        dir.path(),
        &["evaluate", "-t", "stream.jsonl", "-s", "0.5", "-f", "json", "--no-progress"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["origin"], "streaming");
    assert_eq!(report["info"]["Type"], "MLi");
    assert_eq!(report["info"]["Dataset"], "stream");
    assert_eq!(report["info"]["Supervision"], "0.5");
    assert_eq!(report["trace"].as_array().unwrap().len(), 9);
    assert_eq!(report["thresholds"].as_array().unwrap().len(), 3);
    assert!(report["stats"]["Accuracy"].is_number());
}

#[test]
fn test_evaluate_writes_report_and_predictions() {
    let dir = tempfile::tempdir().unwrap();
    generate(dir.path(), "train.jsonl", 200);
    generate(dir.path(), "test.jsonl", 40);

    let out = mlstream(
        dir.path(),
        &[
            "evaluate", "-t", "train.jsonl", "-T", "test.jsonl", "-m", "majority", "-f", "markdown",
            "-o", "report.md", "--predictions", "preds.jsonl", "--no-progress",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let report = std::fs::read_to_string(dir.path().join("report.md")).unwrap();
    assert!(report.contains("Accuracy"));
    let preds = std::fs::read_to_string(dir.path().join("preds.jsonl")).unwrap();
    assert_eq!(preds.lines().count(), 40);
    let first: Vec<f64> = serde_json::from_str(preds.lines().next().unwrap()).unwrap();
    assert_eq!(first.len(), 3);
}

#[test]
fn test_no_eval_still_writes_predictions() {
    let dir = tempfile::tempdir().unwrap();
    generate(dir.path(), "train.jsonl", 100);
    generate(dir.path(), "unlabelled.jsonl", 15);

    let out = mlstream(
        dir.path(),
        &[
            "evaluate", "-t", "train.jsonl", "-T", "unlabelled.jsonl", "--no-eval", "-f", "json",
            "--predictions", "preds.jsonl", "--no-progress",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["origin"], "unevaluated");
    assert_eq!(report["measurements"]["Total instances tested"], 0.0);
    let preds = std::fs::read_to_string(dir.path().join("preds.jsonl")).unwrap();
    assert_eq!(preds.lines().count(), 15);
}

#[test]
fn test_window_too_small_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    generate(dir.path(), "stream.jsonl", 100);

    let out = mlstream(
        dir.path(),
        &["evaluate", "-t", "stream.jsonl", "--window-size", "5", "-s", "0.1", "--no-progress"],
    );
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("too small"), "{stderr}");
    assert!(out.stdout.is_empty());
}

#[test]
fn test_project_config_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    generate(dir.path(), "stream.jsonl", 120);
    std::fs::write(dir.path().join("mlstream.toml"), "windows = 4\nthreshold = \"PCutL\"\n").unwrap();

    let out = mlstream(
        dir.path(),
        &["evaluate", "-t", "stream.jsonl", "-f", "json", "--no-progress"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["trace"].as_array().unwrap().len(), 3);
}

#[test]
fn test_init_writes_config_once() {
    let dir = tempfile::tempdir().unwrap();

    let out = mlstream(dir.path(), &["init"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("Created"));
    let written = std::fs::read_to_string(dir.path().join("mlstream.toml")).unwrap();
    assert!(written.contains("windows = 10"));

    let again = mlstream(dir.path(), &["init"]);
    assert!(again.status.success());
    assert!(String::from_utf8_lossy(&again.stdout).contains("already exists"));
}

#[test]
fn test_missing_stream_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = mlstream(dir.path(), &["evaluate", "-t", "nope.jsonl", "--no-progress"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("nope.jsonl"));
}
