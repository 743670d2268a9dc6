//! Preprocessing stage
//!
//! Fixed, ordered steps that fill in the replay fields tag generation relies
//! on: timestamp, team roster, and player/opponent roles. Order matters:
//! role validation runs first so no later step reasons about a team paired
//! with itself, and role inference runs after the roster is rebuilt.

mod roles;
mod roster;

pub use roles::{InferRoles, ValidateRoles};
pub use roster::{RebuildTeams, SetTimestamp};

use crate::db::ReplayStore;
use crate::telemetry::GameTelemetry;
use async_trait::async_trait;
use rtag_common::{Replay, Result};

/// Read-only inputs shared by every preprocessing step
pub struct PreprocessContext<'a> {
    pub telemetry: &'a GameTelemetry,
    pub store: &'a ReplayStore,
}

/// One preprocessing step
///
/// A step either succeeds, leaving its changes on the replay, or returns an
/// error without having modified it.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, replay: &mut Replay, ctx: &PreprocessContext<'_>) -> Result<()>;
}

/// The built-in steps in execution order
pub fn create_preprocessors() -> Vec<Box<dyn Preprocessor>> {
    vec![
        Box::new(ValidateRoles),
        Box::new(SetTimestamp),
        Box::new(RebuildTeams),
        Box::new(InferRoles),
    ]
}
