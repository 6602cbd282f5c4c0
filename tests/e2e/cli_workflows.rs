//! E2E tests for complete CLI workflows
//! Tests the entire application through the command-line interface

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::OnceLock;

/// Path to the `shrun` binary, built on first use
pub fn cli_binary() -> &'static PathBuf {
    static BINARY: OnceLock<PathBuf> = OnceLock::new();
    BINARY.get_or_init(|| {
        let status = Command::new(env!("CARGO"))
            .args(["build", "--quiet", "-p", "shrun-cli", "--bin", "shrun"])
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .status()
            .expect("Failed to run cargo build");
        assert!(status.success(), "building shrun failed");
        let target = std::env::var_os("CARGO_TARGET_DIR").map_or_else(
            || PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target"),
            PathBuf::from,
        );
        target.join("debug").join("shrun")
    })
}

fn run_command(args: &[&str]) -> Output {
    Command::new(cli_binary())
        .args(args)
        .output()
        .unwrap_or_else(|_| panic!("Failed to execute {}", cli_binary().display()))
}

fn run_inline(json: &str, extra: &[&str]) -> Output {
    let mut args = vec!["-c", json];
    args.extend_from_slice(extra);
    run_command(&args)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const ECHO_HELLO: &str = r#"{"stmts": [{"cmd": {"type": "Call", "args": [
    {"parts": [{"type": "Lit", "value": "echo"}]},
    {"parts": [{"type": "Lit", "value": "hello"}]}
]}}]}"#;

#[test]
fn test_basic_echo() {
    let output = run_inline(ECHO_HELLO, &[]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello\n");
}

#[test]
fn test_exit_status_propagates() {
    let json = r#"{"stmts": [{"cmd": {"type": "Call", "args": [
        {"parts": [{"type": "Lit", "value": "exit"}]},
        {"parts": [{"type": "Lit", "value": "42"}]}
    ]}}]}"#;
    let output = run_inline(json, &[]);

    assert_eq!(output.status.code(), Some(42));
}

#[test]
fn test_positional_parameters() {
    let json = r##"{"stmts": [{"cmd": {"type": "Call", "args": [
        {"parts": [{"type": "Lit", "value": "echo"}]},
        {"parts": [{"type": "ParamExp", "short": true, "name": "#"}]},
        {"parts": [{"type": "ParamExp", "short": true, "name": "2"}]}
    ]}}]}"##;
    let output = run_inline(json, &["first", "second"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "2 second\n");
}

#[test]
fn test_env_option() {
    let json = r#"{"stmts": [{"cmd": {"type": "Call", "args": [
        {"parts": [{"type": "Lit", "value": "echo"}]},
        {"parts": [{"type": "ParamExp", "short": true, "name": "SHRUN_E2E_VALUE"}]}
    ]}}]}"#;
    let output = run_command(&["--env", "SHRUN_E2E_VALUE=from-flag", "-c", json]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "from-flag\n");
}

#[test]
fn test_errexit_flag() {
    let json = r#"{"stmts": [
        {"cmd": {"type": "Call", "args": [{"parts": [{"type": "Lit", "value": "false"}]}]}},
        {"cmd": {"type": "Call", "args": [
            {"parts": [{"type": "Lit", "value": "echo"}]},
            {"parts": [{"type": "Lit", "value": "unreached"}]}
        ]}}
    ]}"#;
    let output = run_command(&["-e", "-c", json]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "");

    let output = run_inline(json, &[]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "unreached\n");
}

#[test]
fn test_invalid_json() {
    let output = run_inline("{not json", &[]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid program"));
}

#[test]
fn test_runtime_error_reported() {
    let json = r#"{"stmts": [{"cmd": {"type": "Decl", "pos": {"line": 1, "column": 1},
        "variant": "declare",
        "opts": [{"parts": [{"type": "Lit", "value": "-q"}]}]}}]}"#;
    let output = run_inline(json, &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("-c:1:1: unhandled declare opts: -q"));
}

#[test]
fn test_command_not_found() {
    let json = r#"{"stmts": [{"cmd": {"type": "Call", "args": [
        {"parts": [{"type": "Lit", "value": "nonexistent_command_12345"}]}
    ]}}]}"#;
    let output = run_inline(json, &[]);

    assert_eq!(output.status.code(), Some(127));
    assert!(stderr(&output).contains("nonexistent_command_12345: command not found"));
}
