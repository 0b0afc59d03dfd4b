//! Integration tests for the export command's argument handling.
//!
//! Exercises the usage-error paths, which do not require ansible-galaxy to
//! be installed.

use std::process::Command;

fn helmible(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_helmible"))
        .args(args)
        .output()
        .expect("Failed to execute helmible")
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn export_without_role_name_fails() {
    let output = helmible(&["export"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("please specify role name"));
}

#[test]
fn export_with_flag_but_no_role_name_fails() {
    let output = helmible(&["export", "--workspace", "workspace"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("please specify role name"));
}

#[test]
fn export_without_chart_path_fails() {
    let output = helmible(&["export", "test"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("please specify helm chart path"));
}

#[test]
fn export_with_bad_chart_path_fails() {
    let output = helmible(&["export", "test", "--helm-chart", "./does-not-exist"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("helm chart path doesn't exists"));
}

#[test]
fn export_with_whitespace_chart_path_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let spaced = dir.path().join("my chart");
    std::fs::create_dir_all(&spaced).unwrap();
    let output = helmible(&["export", "test", "--helm-chart", spaced.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("must not contain spaces"));
}

#[test]
fn help_mentions_the_flags() {
    let output = helmible(&["export", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--helm-chart"));
    assert!(stdout.contains("--generateFilters"));
    assert!(stdout.contains("--emitKeysSnakeCase"));
    assert!(stdout.contains("--workspace"));
}
