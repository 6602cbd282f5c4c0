//! E2E tests for program file execution
//! Tests running JSON-encoded Shrun programs from files

use super::cli_workflows::cli_binary;
use std::fs;
use std::process::{Command, Output};
use tempfile::{NamedTempFile, TempDir};

fn run_file(json: &str, args: &[&str]) -> Output {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(&temp_file, json).unwrap();

    Command::new(cli_binary())
        .arg(temp_file.path())
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_program_file_execution() {
    let json = r#"{"stmts": [{"cmd": {"type": "Call", "args": [
        {"parts": [{"type": "Lit", "value": "echo"}]},
        {"parts": [{"type": "Lit", "value": "hello from file"}]}
    ]}}]}"#;
    let output = run_file(json, &[]);

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "hello from file\n"
    );
}

#[test]
fn test_program_with_variables_and_loop() {
    // for x in a b; do y=$y$x; done; echo "$y"
    let json = r#"{"stmts": [
        {"cmd": {"type": "For", "loop": {"type": "WordIter", "name": "x", "items": [
            {"parts": [{"type": "Lit", "value": "a"}]},
            {"parts": [{"type": "Lit", "value": "b"}]}
        ]}, "body": [
            {"cmd": {"type": "Call", "assigns": [{"name": "y", "value": {"parts": [
                {"type": "ParamExp", "short": true, "name": "y"},
                {"type": "ParamExp", "short": true, "name": "x"}
            ]}}]}}
        ]}},
        {"cmd": {"type": "Call", "args": [
            {"parts": [{"type": "Lit", "value": "echo"}]},
            {"parts": [{"type": "DblQuoted", "parts": [
                {"type": "ParamExp", "short": true, "name": "y"}
            ]}]}
        ]}}
    ]}"#;
    let output = run_file(json, &[]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ab\n");
}

#[test]
fn test_program_arguments() {
    let json = r##"{"stmts": [{"cmd": {"type": "Call", "args": [
        {"parts": [{"type": "Lit", "value": "echo"}]},
        {"parts": [{"type": "ParamExp", "short": true, "name": "1"}]},
        {"parts": [{"type": "ParamExp", "short": true, "name": "#"}]}
    ]}}]}"##;
    let output = run_file(json, &["-flag", "two"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "-flag 2\n");
}

#[test]
fn test_redirect_to_file_in_working_dir() {
    let dir = TempDir::new().unwrap();
    let json = r#"{"stmts": [{"cmd": {"type": "Call", "args": [
        {"parts": [{"type": "Lit", "value": "echo"}]},
        {"parts": [{"type": "Lit", "value": "saved"}]}
    ]}, "redirs": [{"op": "RdrOut", "word": {"parts": [{"type": "Lit", "value": "out.txt"}]}}]}]}"#;
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(&temp_file, json).unwrap();

    let output = Command::new(cli_binary())
        .arg("-C")
        .arg(dir.path())
        .arg(temp_file.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, b"");
    assert_eq!(
        fs::read_to_string(dir.path().join("out.txt")).unwrap(),
        "saved\n"
    );
}

#[test]
fn test_missing_program_file() {
    let output = Command::new(cli_binary())
        .arg("/nonexistent/program.json")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("could not read"));
}

#[test]
fn test_no_program_given() {
    let output = Command::new(cli_binary()).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no program given"));
}
