//! Replay telemetry model and sources
//!
//! Telemetry is produced by an external replay parser; this crate never
//! decodes replay files itself. [`GameTelemetry`] is the parser's output as
//! deserialized from JSON, and [`TelemetryView`] resolves it against a
//! replay's player/opponent role assignment for the tag generators.
//!
//! Times are in the parser's native frame unit.

pub mod command;
pub mod fixed;

pub use command::CommandTelemetrySource;
pub use fixed::StaticTelemetrySource;

use async_trait::async_trait;
use rtag_common::{Replay, Result, Role};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Frames per ten real seconds at "Faster" game speed (22.4 fps)
pub const FRAMES_PER_TEN_SECONDS: u32 = 224;

/// Convert real-time minutes to telemetry frames
pub const fn minutes_to_frames(minutes: u32) -> u32 {
    minutes * 60 * FRAMES_PER_TEN_SECONDS / 10
}

/// End of the cannon-rush window
pub const EARLY_RUSH_END: u32 = minutes_to_frames(3);

/// End of the early game (proxies, first tech structure)
pub const EARLY_GAME_END: u32 = minutes_to_frames(5);

/// Start of the late game; army composition is judged before this
pub const LATE_GAME_START: u32 = minutes_to_frames(12);

/// Structure types a side starts the game with
pub const MAIN_BASE_TYPES: [&str; 3] = ["Nexus", "CommandCenter", "Hatchery"];

/// A structure is a proxy when its distance from its own main base exceeds
/// this share of (own-base distance + enemy-base distance)
pub const PROXY_DISTANCE_RATIO: f64 = 0.4;

/// Everything the parser reports about one game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameTelemetry {
    #[serde(default)]
    pub teams: Vec<TelemetryTeam>,
    /// Wall-clock end of the game, unix epoch seconds
    #[serde(default)]
    pub unix_timestamp: i64,
    /// Team-size classification such as "1v1" or "FFA"
    #[serde(default)]
    pub game_type: Option<String>,
    #[serde(default)]
    pub map_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryTeam {
    #[serde(default)]
    pub players: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable account handle
    pub handle: String,
    #[serde(default)]
    pub name: String,
    /// Race selected before the game, may be "Random"
    #[serde(default)]
    pub pick_race: Option<String>,
    /// Race actually played
    #[serde(default)]
    pub play_race: Option<String>,
    #[serde(default = "default_true")]
    pub is_human: bool,
    /// "Win", "Loss", "Tie", or absent when unknown
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub units: Vec<Unit>,
}

fn default_true() -> bool {
    true
}

/// One entry of a unit's type history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitType {
    pub frame: u32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Type changes ordered by frame; the first entry is the built type
    #[serde(default)]
    pub type_history: Vec<UnitType>,
    /// Frame the unit or structure was started
    #[serde(default)]
    pub started_at: u32,
    #[serde(default)]
    pub location: Option<Point>,
    #[serde(default)]
    pub is_building: bool,
    #[serde(default)]
    pub is_army: bool,
    #[serde(default)]
    pub supply: f64,
}

impl Unit {
    /// Type the unit was created as, ignoring later morphs
    pub fn original_type(&self) -> Option<&str> {
        self.type_history.first().map(|t| t.name.as_str())
    }

    pub fn is_type(&self, name: &str) -> bool {
        self.original_type() == Some(name)
    }
}

/// Produces telemetry for a replay file
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Parse the replay at `replay_path`
    async fn load(&self, replay_path: &Path) -> Result<GameTelemetry>;
}

/// Telemetry resolved against a replay's role assignment
pub struct TelemetryView<'a> {
    telemetry: &'a GameTelemetry,
    player_team: Option<usize>,
    opponent_team: Option<usize>,
}

impl<'a> TelemetryView<'a> {
    pub fn new(telemetry: &'a GameTelemetry, replay: &Replay) -> Self {
        Self {
            telemetry,
            player_team: replay.player_team,
            opponent_team: replay.opponent_team,
        }
    }

    pub fn game(&self) -> &'a GameTelemetry {
        self.telemetry
    }

    fn team(&self, role: Role) -> Option<&'a TelemetryTeam> {
        let index = match role {
            Role::Player => self.player_team?,
            Role::Opponent => self.opponent_team?,
        };
        self.telemetry.teams.get(index)
    }

    /// The sole participant on `role`'s team
    ///
    /// `None` when the role is unassigned, out of range, or the team does
    /// not have exactly one member.
    pub fn participant(&self, role: Role) -> Option<&'a Participant> {
        match self.team(role)?.players.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Location of `role`'s single starting base structure
    pub fn main_base(&self, role: Role) -> Option<Point> {
        let participant = self.participant(role)?;
        let mut bases = participant.units.iter().filter(|unit| {
            unit.is_building
                && unit.started_at == 0
                && unit
                    .original_type()
                    .is_some_and(|t| MAIN_BASE_TYPES.contains(&t))
        });

        let base = bases.next()?;
        if bases.next().is_some() {
            return None;
        }
        base.location
    }

    /// Whether `unit`, owned by `role`, sits proportionally close to the enemy
    ///
    /// `None` when either main base or the unit's location is unknown.
    pub fn is_proxy(&self, role: Role, unit: &Unit) -> Option<bool> {
        let own_base = self.main_base(role)?;
        let enemy_base = self.main_base(role.other())?;
        let location = unit.location?;
        Some(is_proxy_location(location, own_base, enemy_base))
    }
}

/// Strict distance-ratio test behind [`TelemetryView::is_proxy`]
pub fn is_proxy_location(location: Point, own_base: Point, enemy_base: Point) -> bool {
    let own_distance = location.distance(own_base);
    let enemy_distance = location.distance(enemy_base);
    own_distance > PROXY_DISTANCE_RATIO * (own_distance + enemy_distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtag_common::Team;

    fn building(name: &str, started_at: u32, at: Point) -> Unit {
        Unit {
            type_history: vec![UnitType {
                frame: started_at,
                name: name.to_string(),
            }],
            started_at,
            location: Some(at),
            is_building: true,
            is_army: false,
            supply: 0.0,
        }
    }

    fn participant(handle: &str, units: Vec<Unit>) -> Participant {
        Participant {
            handle: handle.to_string(),
            name: handle.to_string(),
            pick_race: None,
            play_race: None,
            is_human: true,
            result: None,
            units,
        }
    }

    fn one_v_one(player_units: Vec<Unit>, opponent_units: Vec<Unit>) -> (GameTelemetry, Replay) {
        let telemetry = GameTelemetry {
            teams: vec![
                TelemetryTeam {
                    players: vec![participant("p", player_units)],
                },
                TelemetryTeam {
                    players: vec![participant("o", opponent_units)],
                },
            ],
            ..Default::default()
        };
        let mut replay = Replay::new("/tmp/x.SC2Replay", "x");
        replay.teams = vec![Team::new("p", "p"), Team::new("o", "o")];
        replay.player_team = Some(0);
        replay.opponent_team = Some(1);
        (telemetry, replay)
    }

    #[test]
    fn test_frame_cutoffs() {
        assert_eq!(EARLY_RUSH_END, 4032);
        assert_eq!(EARLY_GAME_END, 6720);
        assert_eq!(LATE_GAME_START, 16128);
    }

    #[test]
    fn test_proxy_boundary_is_strict() {
        let own = Point::new(0.0, 0.0);
        let enemy = Point::new(100.0, 0.0);

        assert!(!is_proxy_location(Point::new(40.0, 0.0), own, enemy));
        assert!(is_proxy_location(Point::new(40.5, 0.0), own, enemy));
        assert!(!is_proxy_location(Point::new(10.0, 0.0), own, enemy));
    }

    #[test]
    fn test_original_type_ignores_morphs() {
        let mut unit = building("CommandCenter", 0, Point::new(0.0, 0.0));
        unit.type_history.push(UnitType {
            frame: 900,
            name: "OrbitalCommand".to_string(),
        });
        assert_eq!(unit.original_type(), Some("CommandCenter"));
        assert!(unit.is_type("CommandCenter"));
    }

    #[test]
    fn test_participant_requires_single_member() {
        let (mut telemetry, replay) = one_v_one(vec![], vec![]);
        telemetry.teams[1].players.push(participant("o2", vec![]));

        let view = TelemetryView::new(&telemetry, &replay);
        assert_eq!(view.participant(Role::Player).map(|p| p.handle.as_str()), Some("p"));
        assert!(view.participant(Role::Opponent).is_none());
    }

    #[test]
    fn test_is_proxy_uses_main_bases() {
        let (telemetry, replay) = one_v_one(
            vec![
                building("Nexus", 0, Point::new(0.0, 0.0)),
                building("Gateway", 500, Point::new(80.0, 0.0)),
            ],
            vec![building("Hatchery", 0, Point::new(100.0, 0.0))],
        );
        let view = TelemetryView::new(&telemetry, &replay);
        let gateway = &telemetry.teams[0].players[0].units[1];

        assert_eq!(view.main_base(Role::Player), Some(Point::new(0.0, 0.0)));
        assert_eq!(view.is_proxy(Role::Player, gateway), Some(true));
    }

    #[test]
    fn test_is_proxy_abstains_without_single_base() {
        let (telemetry, replay) = one_v_one(
            vec![
                building("Nexus", 0, Point::new(0.0, 0.0)),
                building("Nexus", 0, Point::new(5.0, 0.0)),
                building("Gateway", 500, Point::new(80.0, 0.0)),
            ],
            vec![building("Hatchery", 0, Point::new(100.0, 0.0))],
        );
        let view = TelemetryView::new(&telemetry, &replay);
        let gateway = &telemetry.teams[0].players[0].units[2];

        assert_eq!(view.main_base(Role::Player), None);
        assert_eq!(view.is_proxy(Role::Player, gateway), None);
    }

    #[test]
    fn test_deserializes_sparse_json() {
        let json = r#"{
            "teams": [{"players": [{"handle": "1-S2-1-1", "units": [
                {"type_history": [{"frame": 0, "name": "Nexus"}], "is_building": true}
            ]}]}],
            "unix_timestamp": 1700000000,
            "game_type": "1v1"
        }"#;
        let telemetry: GameTelemetry = serde_json::from_str(json).unwrap();
        let player = &telemetry.teams[0].players[0];
        assert!(player.is_human);
        assert_eq!(player.units[0].original_type(), Some("Nexus"));
        assert_eq!(telemetry.map_name, None);
    }
}
