//! Player/opponent role steps

use super::{PreprocessContext, Preprocessor};
use async_trait::async_trait;
use rtag_common::{Replay, Result, Role};
use tracing::{debug, warn};

/// Clear both roles when they point at the same team
pub struct ValidateRoles;

#[async_trait]
impl Preprocessor for ValidateRoles {
    fn name(&self) -> &'static str {
        "validate_roles"
    }

    async fn apply(&self, replay: &mut Replay, _ctx: &PreprocessContext<'_>) -> Result<()> {
        if !replay.has_valid_roles() {
            warn!(
                digest = %replay.digest,
                team = ?replay.player_team,
                "Player and opponent share a team, clearing roles"
            );
            replay.clear_roles();
        }
        Ok(())
    }
}

/// Assign roles from the teams previously seen in the player role
///
/// Runs only when neither role is set. The player team is the single team
/// whose id has held the player role before; the opponent is then the single
/// remaining team. Any other count leaves the roles unset.
pub struct InferRoles;

#[async_trait]
impl Preprocessor for InferRoles {
    fn name(&self) -> &'static str {
        "infer_roles"
    }

    async fn apply(&self, replay: &mut Replay, ctx: &PreprocessContext<'_>) -> Result<()> {
        if replay.player_team.is_some() || replay.opponent_team.is_some() || replay.teams.is_empty()
        {
            return Ok(());
        }

        let known_players = ctx.store.historical_role_ids(Role::Player).await?;
        let candidates: Vec<usize> = replay
            .teams
            .iter()
            .enumerate()
            .filter(|(_, team)| known_players.contains(&team.id))
            .map(|(index, _)| index)
            .collect();

        let [player] = candidates.as_slice() else {
            debug!(
                digest = %replay.digest,
                candidates = candidates.len(),
                "Player team ambiguous, leaving roles unset"
            );
            return Ok(());
        };
        let player = *player;

        let mut remaining = (0..replay.teams.len()).filter(|&index| index != player);
        let opponent = match (remaining.next(), remaining.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        };

        replay.player_team = Some(player);
        replay.opponent_team = opponent;
        debug!(
            digest = %replay.digest,
            player,
            opponent = ?opponent,
            "Inferred roles from history"
        );
        Ok(())
    }
}
