//! End-to-end runs of the binary with ranks as child processes.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

fn pidecimals(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pidecimals"))
        .args(args)
        .env_remove("PIDECIMALS_RANK")
        .env_remove("PIDECIMALS_SIZE")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn field(stdout: &str, name: &str) -> String {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(name))
        .map(|rest| rest.trim_start_matches(':').trim().to_string())
        .unwrap_or_else(|| panic!("no '{name}' line in:\n{stdout}"))
}

#[test]
fn three_processes_reduce_to_the_root() {
    let out = pidecimals(&["bellard", "300", "-p", "3", "-t", "2"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(field(&stdout, "Processes"), "3");
    assert_eq!(field(&stdout, "Iterations"), "100");
    let matched: usize = field(&stdout, "Correct decimals").parse().unwrap();
    assert!(matched >= 290, "only {matched} decimals");
}

#[test]
fn weighted_chudnovsky_across_processes() {
    let out = pidecimals(&["chudnovsky", "500", "-p", "2", "-t", "2", "--print"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let matched: usize = field(&stdout, "Correct decimals").parse().unwrap();
    assert!(matched >= 490, "only {matched} decimals");
    assert!(stdout.lines().any(|line| line.starts_with("3.14159265358979")));
}

#[test]
fn too_many_workers_fail_before_starting() {
    // 10 digits of Chudnovsky is a single iteration
    let out = pidecimals(&["chudnovsky", "10", "-p", "4", "-t", "2"]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("too small"), "stderr: {stderr}");
    assert!(out.stdout.is_empty());
}

#[test]
fn unknown_algorithm_rejected() {
    let out = pidecimals(&["machin", "100"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("machin"));
}

#[test]
fn work_rates_file_is_honoured() {
    let mut rates = NamedTempFile::new().unwrap();
    write!(rates, "version = 1\n\n[[column]]\nworkers = 2\nrates = [70.0, 30.0]\n").unwrap();
    let path = rates.path().to_str().unwrap();
    let out = pidecimals(&["chudnovsky", "300", "-t", "2", "--work-rates", path]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let matched: usize = field(&stdout, "Correct decimals").parse().unwrap();
    assert!(matched >= 290, "only {matched} decimals");
}

#[test]
fn invalid_work_rates_file_is_a_configuration_error() {
    let mut rates = NamedTempFile::new().unwrap();
    write!(rates, "version = 1\n\n[[column]]\nworkers = 2\nrates = [70.0]\n").unwrap();
    let path = rates.path().to_str().unwrap();
    let out = pidecimals(&["chudnovsky", "300", "-t", "2", "--work-rates", path]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Failed to load work rates"), "stderr: {stderr}");
    assert!(stderr.contains("has 1 rates"), "stderr: {stderr}");
    assert!(out.stdout.is_empty());
}

#[test]
fn missing_reference_is_a_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("pi.txt");
    let out = pidecimals(&["bbp", "50", "--reference", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Failed to read reference"), "stderr: {stderr}");
}
