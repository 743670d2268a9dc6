//! Telemetry from an external replay parser process
//!
//! The parser is invoked as `<command> <args...> <replay path>` and must
//! print a [`GameTelemetry`] JSON document on stdout.

use super::{GameTelemetry, TelemetrySource};
use async_trait::async_trait;
use rtag_common::config::TelemetryConfig;
use rtag_common::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub struct CommandTelemetrySource {
    command: String,
    args: Vec<String>,
}

impl CommandTelemetrySource {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Build from configuration
    ///
    /// # Errors
    /// `Config` when no parser command is configured.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        let command = config.command.clone().ok_or_else(|| {
            Error::Config(
                "No telemetry parser configured (set [telemetry] command in the config file)"
                    .to_string(),
            )
        })?;
        Ok(Self::new(command, config.args.clone()))
    }
}

#[async_trait]
impl TelemetrySource for CommandTelemetrySource {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn load(&self, replay_path: &Path) -> Result<GameTelemetry> {
        debug!(command = %self.command, path = %replay_path.display(), "Running telemetry parser");

        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(replay_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Telemetry(format!("Failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Telemetry(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            Error::Telemetry(format!(
                "Failed to parse telemetry for {}: {}",
                replay_path.display(),
                e
            ))
        })
    }
}
