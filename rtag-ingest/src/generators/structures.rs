//! Structure-based generators: tech path, proxies, cannon rush

use super::{TagGenerator, SIDES};
use crate::telemetry::{TelemetryView, Unit, EARLY_GAME_END, EARLY_RUSH_END};
use rtag_common::{Replay, Result, Role};

/// Protoss tech structure to tag value
const TECH_STRUCTURES: [(&str, &str); 3] = [
    ("TwilightCouncil", "twilight"),
    ("Stargate", "stargate"),
    ("RoboticsFacility", "robo"),
];

/// Production structures, highest proxy priority first
const PRODUCTION_STRUCTURES: [&str; 9] = [
    "Starport",
    "Factory",
    "Barracks",
    "CommandCenter",
    "RoboticsFacility",
    "Stargate",
    "Gateway",
    "Nexus",
    "Hatchery",
];

const PROXY_TAG_PREFIX: &str = "proxy_";

const CANNON_STRUCTURE: &str = "PhotonCannon";

const CANNON_RUSH_TAG: &str = "cannon_rush";

fn proxy_tag_value(structure: &str) -> String {
    format!("{}{}", PROXY_TAG_PREFIX, structure.to_lowercase())
}

/// Structures of `role` built by `cutoff` that sit proxied
fn proxied_structures<'a>(
    telemetry: &'a TelemetryView<'a>,
    role: Role,
    cutoff: u32,
) -> impl Iterator<Item = &'a Unit> + 'a {
    telemetry
        .participant(role)
        .into_iter()
        .flat_map(|p| p.units.iter())
        .filter(move |u| u.is_building && u.started_at <= cutoff)
        .filter(move |u| telemetry.is_proxy(role, u) == Some(true))
}

/// First tech structure started in the early game
pub struct TechPathTagGenerator;

impl TechPathTagGenerator {
    fn first_tech(units: &[Unit]) -> Option<&'static str> {
        let tech_value = |unit: &Unit| {
            let unit_type = unit.original_type()?;
            TECH_STRUCTURES
                .iter()
                .find(|(structure, _)| *structure == unit_type)
                .map(|(_, value)| *value)
        };

        let early: Vec<(u32, &'static str)> = units
            .iter()
            .filter(|u| u.started_at <= EARLY_GAME_END)
            .filter_map(|u| tech_value(u).map(|value| (u.started_at, value)))
            .collect();

        let earliest = early.iter().map(|(frame, _)| *frame).min()?;
        let mut first = early.iter().filter(|(frame, _)| *frame == earliest);
        let (_, value) = first.next()?;

        // Two different structures started on the same frame
        if first.any(|(_, other)| other != value) {
            return None;
        }
        Some(*value)
    }
}

impl TagGenerator for TechPathTagGenerator {
    fn name(&self) -> &'static str {
        "tech_path"
    }

    fn owned_tags(&self) -> Vec<String> {
        SIDES
            .iter()
            .flat_map(|role| TECH_STRUCTURES.iter().map(move |(_, value)| role.tag(value)))
            .collect()
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        Ok(SIDES
            .iter()
            .filter_map(|&role| {
                let participant = telemetry.participant(role)?;
                Self::first_tech(&participant.units).map(|value| role.tag(value))
            })
            .collect())
    }
}

/// Highest-priority production structure proxied in the early game
pub struct ProxyTagGenerator;

impl TagGenerator for ProxyTagGenerator {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn owned_tags(&self) -> Vec<String> {
        SIDES
            .iter()
            .flat_map(|role| {
                PRODUCTION_STRUCTURES
                    .iter()
                    .map(move |structure| role.tag(&proxy_tag_value(structure)))
            })
            .collect()
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        let mut tags = Vec::new();

        for role in SIDES {
            let top = proxied_structures(telemetry, role, EARLY_GAME_END)
                .filter_map(|u| {
                    let unit_type = u.original_type()?;
                    PRODUCTION_STRUCTURES.iter().position(|s| *s == unit_type)
                })
                .min();

            if let Some(priority) = top {
                tags.push(role.tag(&proxy_tag_value(PRODUCTION_STRUCTURES[priority])));
            }
        }

        Ok(tags)
    }
}

/// Proxied photon cannon in the first minutes
pub struct CannonRushTagGenerator;

impl TagGenerator for CannonRushTagGenerator {
    fn name(&self) -> &'static str {
        "cannon_rush"
    }

    fn owned_tags(&self) -> Vec<String> {
        SIDES.iter().map(|role| role.tag(CANNON_RUSH_TAG)).collect()
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        Ok(SIDES
            .iter()
            .filter(|&&role| {
                proxied_structures(telemetry, role, EARLY_RUSH_END)
                    .any(|u| u.is_type(CANNON_STRUCTURE))
            })
            .map(|role| role.tag(CANNON_RUSH_TAG))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn protoss_with(units: Vec<Unit>) -> crate::telemetry::GameTelemetry {
        let mut player_units = vec![building("Nexus", 0, 0.0, 0.0)];
        player_units.extend(units);
        game(vec![
            participant("p", "Protoss", player_units),
            participant("o", "Terran", vec![building("CommandCenter", 0, 100.0, 0.0)]),
        ])
    }

    #[test]
    fn test_tech_path_earliest_structure() {
        let telemetry = protoss_with(vec![
            building("RoboticsFacility", 4000, 5.0, 5.0),
            building("TwilightCouncil", 3000, 5.0, 5.0),
            building("Stargate", EARLY_GAME_END + 1, 5.0, 5.0),
        ]);
        assert_eq!(
            derive_with(&TechPathTagGenerator, &telemetry),
            vec!["player:twilight"]
        );
    }

    #[test]
    fn test_tech_path_tie_is_ambiguous() {
        let telemetry = protoss_with(vec![
            building("RoboticsFacility", 3000, 5.0, 5.0),
            building("Stargate", 3000, 5.0, 5.0),
        ]);
        assert!(derive_with(&TechPathTagGenerator, &telemetry).is_empty());
    }

    #[test]
    fn test_proxy_boundary() {
        let at_threshold = protoss_with(vec![building("Gateway", 500, 40.0, 0.0)]);
        assert!(derive_with(&ProxyTagGenerator, &at_threshold).is_empty());

        let beyond = protoss_with(vec![building("Gateway", 500, 41.0, 0.0)]);
        assert_eq!(
            derive_with(&ProxyTagGenerator, &beyond),
            vec!["player:proxy_gateway"]
        );
    }

    #[test]
    fn test_proxy_reports_highest_priority_only() {
        let telemetry = protoss_with(vec![
            building("Gateway", 500, 70.0, 0.0),
            building("Stargate", 2000, 70.0, 5.0),
            building("Pylon", 400, 70.0, 0.0),
        ]);
        assert_eq!(
            derive_with(&ProxyTagGenerator, &telemetry),
            vec!["player:proxy_stargate"]
        );
    }

    #[test]
    fn test_proxy_ignores_late_structures() {
        let telemetry = protoss_with(vec![building("Gateway", EARLY_GAME_END + 1, 70.0, 0.0)]);
        assert!(derive_with(&ProxyTagGenerator, &telemetry).is_empty());
    }

    #[test]
    fn test_proxy_abstains_without_enemy_main() {
        let telemetry = game(vec![
            participant(
                "p",
                "Protoss",
                vec![building("Nexus", 0, 0.0, 0.0), building("Gateway", 500, 90.0, 0.0)],
            ),
            participant("o", "Terran", vec![]),
        ]);
        assert!(derive_with(&ProxyTagGenerator, &telemetry).is_empty());
    }

    #[test]
    fn test_cannon_rush_window() {
        let early = protoss_with(vec![building("PhotonCannon", EARLY_RUSH_END, 80.0, 0.0)]);
        assert_eq!(
            derive_with(&CannonRushTagGenerator, &early),
            vec!["player:cannon_rush"]
        );

        let late = protoss_with(vec![building("PhotonCannon", EARLY_RUSH_END + 1, 80.0, 0.0)]);
        assert!(derive_with(&CannonRushTagGenerator, &late).is_empty());

        let home = protoss_with(vec![building("PhotonCannon", 1000, 10.0, 0.0)]);
        assert!(derive_with(&CannonRushTagGenerator, &home).is_empty());
    }
}
