//! Telemetry builders for generator tests

use crate::telemetry::{GameTelemetry, Participant, Point, TelemetryTeam, Unit, UnitType};
use rtag_common::{Replay, Team};

pub fn unit(name: &str, started_at: u32) -> Unit {
    Unit {
        type_history: vec![UnitType {
            frame: started_at,
            name: name.to_string(),
        }],
        started_at,
        location: None,
        is_building: false,
        is_army: false,
        supply: 0.0,
    }
}

pub fn army(name: &str, started_at: u32, supply: f64) -> Unit {
    Unit {
        is_army: true,
        supply,
        ..unit(name, started_at)
    }
}

pub fn building(name: &str, started_at: u32, x: f64, y: f64) -> Unit {
    Unit {
        is_building: true,
        location: Some(Point::new(x, y)),
        ..unit(name, started_at)
    }
}

pub fn participant(handle: &str, race: &str, units: Vec<Unit>) -> Participant {
    Participant {
        handle: handle.to_string(),
        name: handle.to_uppercase(),
        pick_race: Some(race.to_string()),
        play_race: Some(race.to_string()),
        is_human: true,
        result: None,
        units,
    }
}

/// One participant per team, teams in argument order
pub fn game(participants: Vec<Participant>) -> GameTelemetry {
    GameTelemetry {
        teams: participants
            .into_iter()
            .map(|p| TelemetryTeam { players: vec![p] })
            .collect(),
        unix_timestamp: 1_700_000_000,
        game_type: Some("1v1".to_string()),
        map_name: Some("Ever Dream LE".to_string()),
    }
}

/// Replay whose player is team 0 and opponent team 1
pub fn replay_for(telemetry: &GameTelemetry) -> Replay {
    let mut replay = Replay::new("/archive/test.SC2Replay", "test");
    replay.teams = telemetry
        .teams
        .iter()
        .map(|t| Team::from_members(t.players.iter().map(|p| (p.handle.as_str(), p.name.as_str()))))
        .collect();
    replay.player_team = Some(0);
    replay.opponent_team = Some(1);
    replay
}

/// Protoss player beating a Terran opponent, mains at (0,0) and (100,0)
pub fn protoss_vs_terran() -> (GameTelemetry, Replay) {
    let mut player = participant(
        "p",
        "Protoss",
        vec![building("Nexus", 0, 0.0, 0.0), building("Gateway", 1000, 10.0, 0.0)],
    );
    player.result = Some("Win".to_string());

    let mut opponent = participant(
        "o",
        "Terran",
        vec![
            building("CommandCenter", 0, 100.0, 0.0),
            building("Barracks", 1000, 95.0, 0.0),
        ],
    );
    opponent.result = Some("Loss".to_string());

    let telemetry = game(vec![player, opponent]);
    let replay = replay_for(&telemetry);
    (telemetry, replay)
}

/// Game in which every built-in generator emits at least one tag
///
/// The player picked Random, landed Protoss, and proxies a Gateway and a
/// cannon before going Twilight into Carriers. The opponent is a Terran AI
/// on Marines with a Banshee.
pub fn every_generator_fires() -> (GameTelemetry, Replay) {
    let mut player = participant(
        "p",
        "Protoss",
        vec![
            building("Nexus", 0, 0.0, 0.0),
            building("Gateway", 500, 70.0, 0.0),
            building("PhotonCannon", 1000, 80.0, 0.0),
            building("TwilightCouncil", 3000, 5.0, 5.0),
            army("Carrier", 9000, 6.0),
        ],
    );
    player.pick_race = Some("Random".to_string());
    player.result = Some("Win".to_string());

    let mut opponent_units = vec![
        building("CommandCenter", 0, 100.0, 0.0),
        army("Banshee", 5000, 3.0),
    ];
    opponent_units.extend((0..40).map(|_| army("Marine", 1000, 1.0)));
    let mut opponent = participant("o", "Terran", opponent_units);
    opponent.is_human = false;
    opponent.result = Some("Loss".to_string());

    let telemetry = game(vec![player, opponent]);
    let replay = replay_for(&telemetry);
    (telemetry, replay)
}

/// Run one generator against `telemetry` with the default role assignment
pub fn derive_with(
    generator: &dyn super::TagGenerator,
    telemetry: &GameTelemetry,
) -> Vec<String> {
    let replay = replay_for(telemetry);
    let view = crate::telemetry::TelemetryView::new(telemetry, &replay);
    generator
        .derive(&replay, &view)
        .unwrap_or_else(|e| panic!("{} failed: {}", generator.name(), e))
}
