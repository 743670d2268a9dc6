//! Participant-level generators: race, random pick, result, matchup, AI

use super::{TagGenerator, SIDES};
use crate::telemetry::TelemetryView;
use rtag_common::tags::game_tag;
use rtag_common::{Replay, Result, Role};

const RACES: [&str; 3] = ["protoss", "terran", "zerg"];

const OUTCOMES: [&str; 3] = ["win", "loss", "tie"];

const RANDOM_TAG: &str = "random";

const AI_TAG: &str = "ai";

/// Every tag of the form `<role>:<value>` for both roles
fn side_tags<'a>(values: impl IntoIterator<Item = &'a str> + Clone) -> Vec<String> {
    SIDES
        .iter()
        .flat_map(|role| values.clone().into_iter().map(move |v| role.tag(v)))
        .collect()
}

/// Lowercased resolved race of `role`'s sole participant, if it is a known race
fn known_race(telemetry: &TelemetryView<'_>, role: Role) -> Option<String> {
    let race = telemetry.participant(role)?.play_race.as_deref()?.to_lowercase();
    RACES.contains(&race.as_str()).then_some(race)
}

pub struct RaceTagGenerator;

impl TagGenerator for RaceTagGenerator {
    fn name(&self) -> &'static str {
        "race"
    }

    fn owned_tags(&self) -> Vec<String> {
        side_tags(RACES)
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        Ok(SIDES
            .iter()
            .filter_map(|&role| known_race(telemetry, role).map(|race| role.tag(&race)))
            .collect())
    }
}

/// Marks a side that picked Random before the game
pub struct RandomRaceTagGenerator;

impl TagGenerator for RandomRaceTagGenerator {
    fn name(&self) -> &'static str {
        "random_race"
    }

    fn owned_tags(&self) -> Vec<String> {
        side_tags([RANDOM_TAG])
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        Ok(SIDES
            .iter()
            .filter(|&&role| {
                telemetry
                    .participant(role)
                    .and_then(|p| p.pick_race.as_deref())
                    .is_some_and(|race| race.eq_ignore_ascii_case("random"))
            })
            .map(|role| role.tag(RANDOM_TAG))
            .collect())
    }
}

/// Win/loss/tie per side; emitted only when both outcomes are known
pub struct ResultTagGenerator;

impl TagGenerator for ResultTagGenerator {
    fn name(&self) -> &'static str {
        "result"
    }

    fn owned_tags(&self) -> Vec<String> {
        side_tags(OUTCOMES)
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        let outcome = |role: Role| {
            let result = telemetry.participant(role)?.result.as_deref()?.to_lowercase();
            OUTCOMES.contains(&result.as_str()).then_some(result)
        };

        match (outcome(Role::Player), outcome(Role::Opponent)) {
            (Some(player), Some(opponent)) => Ok(vec![
                Role::Player.tag(&player),
                Role::Opponent.tag(&opponent),
            ]),
            _ => Ok(Vec::new()),
        }
    }
}

/// `game:<p>v<o>` from the first letter of each side's race
pub struct MatchupTagGenerator;

impl MatchupTagGenerator {
    fn code(player_race: &str, opponent_race: &str) -> String {
        let initial = |race: &str| race.chars().next().unwrap_or_default();
        format!("{}v{}", initial(player_race), initial(opponent_race))
    }
}

impl TagGenerator for MatchupTagGenerator {
    fn name(&self) -> &'static str {
        "matchup"
    }

    fn owned_tags(&self) -> Vec<String> {
        RACES
            .iter()
            .flat_map(|p| RACES.iter().map(move |o| game_tag(&Self::code(p, o))))
            .collect()
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        match (
            known_race(telemetry, Role::Player),
            known_race(telemetry, Role::Opponent),
        ) {
            (Some(player), Some(opponent)) => Ok(vec![game_tag(&Self::code(&player, &opponent))]),
            _ => Ok(Vec::new()),
        }
    }
}

/// Marks a side whose sole participant is computer-controlled
pub struct AiTagGenerator;

impl TagGenerator for AiTagGenerator {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn owned_tags(&self) -> Vec<String> {
        side_tags([AI_TAG])
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        Ok(SIDES
            .iter()
            .filter(|&&role| telemetry.participant(role).is_some_and(|p| !p.is_human))
            .map(|role| role.tag(AI_TAG))
            .collect())
    }
}
