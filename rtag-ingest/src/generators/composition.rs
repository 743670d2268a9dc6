//! Army composition generators

use super::{TagGenerator, SIDES};
use crate::telemetry::{TelemetryView, Unit, LATE_GAME_START};
use rtag_common::{Replay, Result};

const BIO_UNITS: [&str; 3] = ["Marine", "Marauder", "Medivac"];

const MECH_UNITS: [&str; 5] = ["Hellion", "BattleHellion", "Cyclone", "SiegeTank", "Thor"];

/// Minimum supply of a composition before it is tagged
const COMPOSITION_SUPPLY_FLOOR: f64 = 35.0;

/// Unit type to tag value
const HIGH_TECH_UNITS: [(&str, &str); 8] = [
    ("Battlecruiser", "battlecruiser"),
    ("Raven", "raven"),
    ("Banshee", "banshee"),
    ("Lurker", "lurker"),
    ("Mutalisk", "muta"),
    ("SwarmHost", "swarm_host"),
    ("VoidRay", "void_ray"),
    ("Carrier", "carrier"),
];

/// Bio or mech, judged on army supply started before the late game
pub struct ArmyCompositionTagGenerator;

impl ArmyCompositionTagGenerator {
    fn classify(units: &[Unit]) -> Option<&'static str> {
        let army: Vec<&Unit> = units
            .iter()
            .filter(|u| u.is_army && u.started_at < LATE_GAME_START)
            .collect();

        let supply_of = |types: &[&str]| -> f64 {
            army.iter()
                .filter(|u| {
                    u.original_type()
                        .is_some_and(|t| types.iter().any(|candidate| *candidate == t))
                })
                .map(|u| u.supply)
                .sum()
        };

        let total: f64 = army.iter().map(|u| u.supply).sum();
        let bio = supply_of(&BIO_UNITS);
        let mech = supply_of(&MECH_UNITS);

        let dominates = |own: f64, other: f64| {
            own > other && own > total * 0.5 && own > COMPOSITION_SUPPLY_FLOOR
        };

        if dominates(bio, mech) {
            Some("bio")
        } else if dominates(mech, bio) {
            Some("mech")
        } else {
            None
        }
    }
}

impl TagGenerator for ArmyCompositionTagGenerator {
    fn name(&self) -> &'static str {
        "army_composition"
    }

    fn owned_tags(&self) -> Vec<String> {
        SIDES
            .iter()
            .flat_map(|role| [role.tag("bio"), role.tag("mech")])
            .collect()
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        Ok(SIDES
            .iter()
            .filter_map(|&role| {
                let participant = telemetry.participant(role)?;
                Self::classify(&participant.units).map(|value| role.tag(value))
            })
            .collect())
    }
}

/// One tag per distinct high-value unit type fielded before the late game
pub struct HighTechUnitTagGenerator;

impl TagGenerator for HighTechUnitTagGenerator {
    fn name(&self) -> &'static str {
        "high_tech_unit"
    }

    fn owned_tags(&self) -> Vec<String> {
        SIDES
            .iter()
            .flat_map(|role| HIGH_TECH_UNITS.iter().map(move |(_, tag)| role.tag(tag)))
            .collect()
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        let mut tags = Vec::new();

        for role in SIDES {
            let Some(participant) = telemetry.participant(role) else {
                continue;
            };

            let fielded = |unit_type: &str| {
                participant.units.iter().any(|u| {
                    u.is_army && u.started_at <= LATE_GAME_START && u.is_type(unit_type)
                })
            };

            // List order keeps the output stable across runs
            tags.extend(
                HIGH_TECH_UNITS
                    .iter()
                    .filter(|(unit_type, _)| fielded(*unit_type))
                    .map(|(_, tag)| role.tag(tag)),
            );
        }

        Ok(tags)
    }
}
