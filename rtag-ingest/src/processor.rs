//! Replay processing pipeline
//!
//! telemetry → preprocessing steps → tag generation → store update

use crate::db::{ReplayStore, UpdateScope};
use crate::generators::TagGenerationStage;
use crate::preprocess::{create_preprocessors, PreprocessContext, Preprocessor};
use crate::telemetry::{GameTelemetry, TelemetrySource};
use rtag_common::{Replay, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ReplayProcessor {
    source: Arc<dyn TelemetrySource>,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    stage: TagGenerationStage,
}

impl ReplayProcessor {
    /// Processor with the built-in preprocessing steps and generators
    pub fn new(source: Arc<dyn TelemetrySource>) -> Self {
        Self {
            source,
            preprocessors: create_preprocessors(),
            stage: TagGenerationStage::default(),
        }
    }

    pub fn stage(&self) -> &TagGenerationStage {
        &self.stage
    }

    /// Load telemetry for the replay's canonical file and process it
    pub async fn process(&self, replay: Replay, store: &ReplayStore) -> Result<Replay> {
        debug!(source = self.source.name(), path = %replay.path.display(), "Loading telemetry");
        let telemetry = self.source.load(&replay.path).await?;
        Ok(self.process_with(replay, &telemetry, store).await)
    }

    /// Run preprocessing and tag generation against known telemetry
    ///
    /// Failing preprocessing steps are logged and skipped.
    pub async fn process_with(
        &self,
        mut replay: Replay,
        telemetry: &GameTelemetry,
        store: &ReplayStore,
    ) -> Replay {
        let ctx = PreprocessContext { telemetry, store };
        for step in &self.preprocessors {
            if let Err(e) = step.apply(&mut replay, &ctx).await {
                warn!(
                    step = step.name(),
                    digest = %replay.digest,
                    error = %e,
                    "Preprocessing step failed, continuing"
                );
            }
        }

        if !replay.has_valid_roles() {
            replay.clear_roles();
        }

        self.stage.apply(&mut replay, telemetry);
        replay
    }

    /// Process and persist with a full refresh of derived fields
    pub async fn process_and_store(&self, replay: Replay, store: &ReplayStore) -> Result<Replay> {
        let processed = self.process(replay, store).await?;
        let stored = store.insert_or_update(&processed, UpdateScope::Full).await?;
        info!(digest = %stored.digest, tags = stored.tags.len(), "Processed replay");
        Ok(stored)
    }
}
