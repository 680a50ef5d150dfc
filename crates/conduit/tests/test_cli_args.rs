//! CLI argument parsing tests for conduit

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn conduit() -> Command {
    Command::new(env!("CARGO_BIN_EXE_conduit"))
}

#[test]
fn test_help_flag() {
    conduit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MCP tool server"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("tools"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_version_flag() {
    conduit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_usage() {
    conduit()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_chat_help() {
    conduit()
        .args(["chat", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Chat with the agent"))
        .stdout(predicate::str::contains("-m, --message"));
}

#[test]
fn test_global_flags_after_subcommand() {
    conduit()
        .args(["status", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_unknown_subcommand() {
    conduit()
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_chat_rejects_stray_argument() {
    conduit()
        .args(["chat", "--session", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--session"));
}
