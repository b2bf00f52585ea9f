//! End-to-end tests driving the `bolt` binary.

use std::io::Write;
use std::process::Command;

fn write_source(dir: &tempfile::TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create source file");
    file.write_all(source.as_bytes()).expect("write source");
    path
}

fn bolt() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bolt"))
}

#[test]
fn check_accepts_a_valid_program() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "ok.bolt", "let id x = x\nlet main = id 42\n");
    let output = bolt().arg("check").arg(&path).output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn check_rejects_a_type_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "bad.bolt", "let a: Int = \"foo\"\n");
    let output = bolt().arg("check").arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("E2002"), "stderr: {stderr}");
}

#[test]
fn verify_consumes_expected_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        &dir,
        "expected.bolt",
        "@expect_diagnostic(2002)\nlet a: Int = \"foo\"\n",
    );
    let output = bolt().arg("verify").arg(&path).output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn verify_checks_type_assertions() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_source(&dir, "assert_ok.bolt", "let a = @: Int 1\n");
    let output = bolt().arg("verify").arg(&good).output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let bad = write_source(&dir, "assert_bad.bolt", "let a = @: String 1\n");
    let output = bolt().arg("verify").arg(&bad).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn eval_runs_a_program() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        &dir,
        "hello.bolt",
        "foreign let print: String -> ()\nprint \"hello\"\n",
    );
    let output = bolt().arg("eval").arg(&path).output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("hello"), "stderr: {stderr}");
}

#[test]
fn json_output_is_machine_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "bad.bolt", "let a: Int = \"foo\"\n");
    let output = bolt().arg("--json").arg("check").arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next().expect("one diagnostic line");
    let value: serde_json::Value = serde_json::from_str(first).expect("valid JSON");
    assert_eq!(value["code"], 2002);
}
