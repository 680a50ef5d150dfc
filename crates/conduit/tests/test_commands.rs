//! Command behaviour tests that need no network

mod common;

use common::TestEnv;
use predicates::prelude::*;
use serde_json::json;

#[test]
fn test_init_writes_default_config() {
    let env = TestEnv::default();

    env.command()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initializing conduit"))
        .stdout(predicate::str::contains("conduit chat"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(env.config_file()).unwrap()).unwrap();
    assert_eq!(written["endpoint"]["api_key"], "");
    assert_eq!(written["tool_service"]["url"], "");
}

#[test]
fn test_init_respects_config_flag() {
    let env = TestEnv::default();
    let path = env.temp_dir.path().join("elsewhere").join("conduit.json");

    env.command()
        .args(["init", "--config"])
        .arg(&path)
        .assert()
        .success();

    assert!(path.exists());
    assert!(!env.config_file().exists());
}

#[test]
fn test_init_keeps_existing_config() {
    let env = TestEnv::default();
    env.write_config(&json!({"endpoint": {"api_key": "sk-keep"}}))
        .unwrap();

    env.command().arg("init").assert().success();

    let content = std::fs::read_to_string(env.config_file()).unwrap();
    assert!(content.contains("sk-keep"));
}

#[test]
fn test_status_without_config() {
    let env = TestEnv::default();

    env.command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[Missing]"))
        .stdout(predicate::str::contains("endpoint.api_key"))
        .stdout(predicate::str::contains("CONDUIT_TOOL_SERVICE_URL"));
}

#[test]
fn test_status_ready_hides_secrets() {
    let env = TestEnv::default();
    env.write_config(&json!({
        "endpoint": {"api_key": "sk-secret", "url": "https://example.openai.azure.com"},
        "tool_service": {"name": "local", "url": "http://localhost:5000/mcp"}
    }))
    .unwrap();

    env.command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[Set]"))
        .stdout(predicate::str::contains("Ready"))
        .stdout(predicate::str::contains("gpt-4.1"))
        .stdout(predicate::str::contains("sk-secret").not());
}

#[test]
fn test_status_env_overrides_file() {
    let env = TestEnv::default();
    env.write_config(&json!({"endpoint": {"model": "gpt-4o"}}))
        .unwrap();

    env.command()
        .env("CONDUIT_MODEL", "o4-mini")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("o4-mini"));
}

#[test]
fn test_chat_without_config_names_every_missing_value() {
    let env = TestEnv::default();

    env.command()
        .args(["chat", "-m", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("endpoint.api_key"))
        .stderr(predicate::str::contains("CONDUIT_ENDPOINT"))
        .stderr(predicate::str::contains("tool_service.name"))
        .stderr(predicate::str::contains("tool_service.url"))
        .stderr(predicate::str::contains("4 required value(s) missing"));
}

#[test]
fn test_chat_with_env_only_reports_remaining() {
    let env = TestEnv::default();

    env.command()
        .env("CONDUIT_API_KEY", "sk-env")
        .env("CONDUIT_ENDPOINT", "https://api.openai.com/v1")
        .args(["chat", "-m", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("endpoint.api_key").not())
        .stderr(predicate::str::contains("2 required value(s) missing"));
}

#[test]
fn test_tools_only_needs_tool_service() {
    let env = TestEnv::default();

    env.command()
        .arg("tools")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tool_service.url"))
        .stderr(predicate::str::contains("endpoint.api_key").not());
}

#[test]
fn test_unparseable_config() {
    let env = TestEnv::default();
    std::fs::create_dir_all(&env.config_dir).unwrap();
    std::fs::write(env.config_file(), "{ not json").unwrap();

    env.command()
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_unreachable_tool_service() {
    let env = TestEnv::default();
    env.write_config(&json!({
        "endpoint": {"api_key": "sk-test", "url": "http://127.0.0.1:1"},
        "tool_service": {"name": "nowhere", "url": "http://127.0.0.1:1/mcp"}
    }))
    .unwrap();

    env.command()
        .args(["chat", "-m", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to connect to tool service nowhere"));
}
