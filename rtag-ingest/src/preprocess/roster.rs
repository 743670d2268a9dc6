//! Timestamp and team roster steps

use super::{PreprocessContext, Preprocessor};
use async_trait::async_trait;
use rtag_common::{Replay, Result, Team};
use tracing::debug;

/// Copy the game's end time onto the replay
pub struct SetTimestamp;

#[async_trait]
impl Preprocessor for SetTimestamp {
    fn name(&self) -> &'static str {
        "set_timestamp"
    }

    async fn apply(&self, replay: &mut Replay, ctx: &PreprocessContext<'_>) -> Result<()> {
        replay.timestamp = ctx.telemetry.unix_timestamp;
        Ok(())
    }
}

/// Replace the team list with one built from telemetry
///
/// Teams are always rebuilt wholesale, never patched.
pub struct RebuildTeams;

#[async_trait]
impl Preprocessor for RebuildTeams {
    fn name(&self) -> &'static str {
        "rebuild_teams"
    }

    async fn apply(&self, replay: &mut Replay, ctx: &PreprocessContext<'_>) -> Result<()> {
        replay.teams = ctx
            .telemetry
            .teams
            .iter()
            .map(|team| {
                Team::from_members(
                    team.players
                        .iter()
                        .map(|p| (p.handle.as_str(), p.name.as_str())),
                )
            })
            .collect();

        debug!(digest = %replay.digest, teams = replay.teams.len(), "Rebuilt team roster");
        Ok(())
    }
}
