//! In-memory telemetry, keyed by replay file stem
//!
//! Archived replays are named `<digest>.<ext>`, so registering telemetry
//! under a digest serves that replay once it has been archived.

use super::{GameTelemetry, TelemetrySource};
use async_trait::async_trait;
use rtag_common::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

#[derive(Default)]
pub struct StaticTelemetrySource {
    by_key: RwLock<HashMap<String, GameTelemetry>>,
    fallback: Option<GameTelemetry>,
}

impl StaticTelemetrySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `telemetry` for any replay without a registered entry
    pub fn with_fallback(telemetry: GameTelemetry) -> Self {
        Self {
            by_key: RwLock::default(),
            fallback: Some(telemetry),
        }
    }

    /// Register telemetry for the replay whose file stem is `key`
    pub fn insert(&self, key: impl Into<String>, telemetry: GameTelemetry) -> Result<()> {
        self.by_key
            .write()
            .map_err(poisoned)?
            .insert(key.into(), telemetry);
        Ok(())
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Internal("Telemetry map lock poisoned".to_string())
}

#[async_trait]
impl TelemetrySource for StaticTelemetrySource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn load(&self, replay_path: &Path) -> Result<GameTelemetry> {
        let key = replay_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let registered = self
            .by_key
            .read()
            .map_err(poisoned)?
            .get(&key)
            .cloned();

        registered
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| Error::Telemetry(format!("No telemetry for {}", replay_path.display())))
    }
}
