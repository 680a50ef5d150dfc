//! Common test utilities for conduit integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

const CONDUIT_ENV: &[&str] = &[
    "CONDUIT_API_KEY",
    "CONDUIT_ENDPOINT",
    "CONDUIT_MODEL",
    "CONDUIT_API_VERSION",
    "CONDUIT_TOOL_SERVICE_NAME",
    "CONDUIT_TOOL_SERVICE_URL",
    "CONDUIT_PROMPT",
];

/// Isolated home directory so the real ~/.conduit is never touched
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_dir = temp_dir.path().join(".conduit");

        Ok(Self {
            temp_dir,
            config_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Command with HOME pointed at the temp dir and no CONDUIT_* overrides
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_conduit"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("RUST_LOG", "off");
        for var in CONDUIT_ENV {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn write_config(&self, json: &serde_json::Value) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::write(self.config_file(), serde_json::to_string_pretty(json)?)?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
