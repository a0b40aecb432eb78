//! Integration tests for the CLI application
//!
//! These tests verify that the CLI commands work correctly with real data files.

use std::io::Write;
use std::process::{Command, Output};
use tempfile::{NamedTempFile, TempDir};

/// Helper to create test data files
struct TestDataFiles {
    pub train_file: NamedTempFile,
    pub test_file: NamedTempFile,
    pub regression_file: NamedTempFile,
}

impl TestDataFiles {
    fn new() -> std::io::Result<Self> {
        let mut train_file = NamedTempFile::new()?;
        for i in 0..6 {
            let d = i as f64 * 0.1;
            writeln!(train_file, "+1 1:{} 2:{}", 1.5 + d, 0.8 + d)?;
            writeln!(train_file, "-1 1:{} 2:{}", -1.5 - d, -0.8 - d)?;
        }
        train_file.flush()?;

        let mut test_file = NamedTempFile::new()?;
        writeln!(test_file, "+1 1:1.6 2:0.7")?;
        writeln!(test_file, "-1 1:-1.6 2:-0.7")?;
        test_file.flush()?;

        let mut regression_file = NamedTempFile::new()?;
        for i in 0..20 {
            let x = i as f64 / 20.0;
            writeln!(regression_file, "{} 1:{}", 3.0 * x - 1.0, x)?;
        }
        regression_file.flush()?;

        Ok(TestDataFiles {
            train_file,
            test_file,
            regression_file,
        })
    }
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_smosvm"))
        .args(args)
        .output()
        .expect("Failed to run CLI")
}

fn path_str(path: &std::path::Path) -> &str {
    path.to_str().expect("temp paths are valid UTF-8")
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_cli_train_and_predict() {
    let data = TestDataFiles::new().expect("Failed to create test data");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let model_path = temp_dir.path().join("model.json");
    let predictions_path = temp_dir.path().join("predictions.txt");

    let output = run(&[
        "train",
        "--data",
        path_str(data.train_file.path()),
        "--output",
        path_str(&model_path),
        "--kernel",
        "linear",
        "--c",
        "1.0",
        "--epsilon",
        "0.001",
    ]);
    assert_success(&output, "train");
    assert!(model_path.exists(), "Model file was not created");

    let output = run(&[
        "predict",
        "--model",
        path_str(&model_path),
        "--data",
        path_str(data.test_file.path()),
        "--output",
        path_str(&predictions_path),
    ]);
    assert_success(&output, "predict");

    let predictions = std::fs::read_to_string(&predictions_path).unwrap();
    let lines: Vec<&str> = predictions.lines().collect();
    assert_eq!(lines, vec!["1", "-1"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Accuracy = 100"), "stdout: {}", stdout);
}

#[test]
fn test_cli_predict_with_probability() {
    let data = TestDataFiles::new().expect("Failed to create test data");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let model_path = temp_dir.path().join("model.json");

    let output = run(&[
        "train",
        "--data",
        path_str(data.train_file.path()),
        "--output",
        path_str(&model_path),
        "--kernel",
        "linear",
        "--probability",
        "--weight",
        "1:2",
        "--weight=-1:1",
        "--seed",
        "3",
    ]);
    assert_success(&output, "train");

    let output = run(&[
        "predict",
        "--model",
        path_str(&model_path),
        "--data",
        path_str(data.test_file.path()),
        "--probability",
    ]);
    assert_success(&output, "predict");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("labels 1 -1"));
    let first: Vec<&str> = lines.next().unwrap().split_whitespace().collect();
    assert_eq!(first.len(), 3);
    let p1: f64 = first[1].parse().unwrap();
    let p2: f64 = first[2].parse().unwrap();
    assert!((p1 + p2 - 1.0).abs() < 1e-5);
}

#[test]
fn test_cli_probability_requires_calibrated_model() {
    let data = TestDataFiles::new().expect("Failed to create test data");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let model_path = temp_dir.path().join("model.json");

    let output = run(&[
        "train",
        "--data",
        path_str(data.train_file.path()),
        "--output",
        path_str(&model_path),
    ]);
    assert_success(&output, "train");

    let output = run(&[
        "predict",
        "--model",
        path_str(&model_path),
        "--data",
        path_str(data.test_file.path()),
        "--probability",
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_cross_validation() {
    let data = TestDataFiles::new().expect("Failed to create test data");

    let output = run(&[
        "train",
        "--data",
        path_str(data.train_file.path()),
        "--kernel",
        "linear",
        "--cross-validation",
        "3",
    ]);
    assert_success(&output, "cross-validation");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cross Validation Accuracy = 100"), "stdout: {}", stdout);
}

#[test]
fn test_cli_regression_cross_validation() {
    let data = TestDataFiles::new().expect("Failed to create test data");

    let output = run(&[
        "train",
        "--data",
        path_str(data.regression_file.path()),
        "--svm-type",
        "epsilon-svr",
        "--kernel",
        "linear",
        "--c",
        "10",
        "--p",
        "0.01",
        "--cross-validation",
        "4",
    ]);
    assert_success(&output, "regression cross-validation");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Mean squared error"));
    assert!(stdout.contains("Squared correlation coefficient"));
}

#[test]
fn test_cli_info_command() {
    let data = TestDataFiles::new().expect("Failed to create test data");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let model_path = temp_dir.path().join("model.json");

    let output = run(&[
        "train",
        "--data",
        path_str(data.train_file.path()),
        "--output",
        path_str(&model_path),
        "--svm-type",
        "nu-svc",
        "--nu",
        "0.4",
    ]);
    assert_success(&output, "train");

    let output = run(&["info", path_str(&model_path)]);
    assert_success(&output, "info");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SVM Type: nu_svc"), "stdout: {}", stdout);
    assert!(stdout.contains("Kernel Type: rbf"));
    assert!(stdout.contains("Labels: 1 -1"));
}

#[test]
fn test_cli_rejects_invalid_parameters() {
    let data = TestDataFiles::new().expect("Failed to create test data");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let model_path = temp_dir.path().join("model.json");

    let output = run(&[
        "train",
        "--data",
        path_str(data.train_file.path()),
        "--output",
        path_str(&model_path),
        "--svm-type",
        "nu-svc",
        "--nu",
        "1.5",
    ]);
    assert!(!output.status.success());
    assert!(!model_path.exists());

    let output = run(&[
        "train",
        "--data",
        path_str(data.train_file.path()),
        "--weight",
        "not-a-weight",
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_missing_files() {
    let output = run(&["train", "--data", "/non/existent/file.libsvm", "--output", "m.json"]);
    assert!(!output.status.success());

    let output = run(&["info", "/non/existent/model.json"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("train"));
    assert!(stdout.contains("predict"));
    assert!(stdout.contains("info"));
}
