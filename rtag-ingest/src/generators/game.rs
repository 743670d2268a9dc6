//! Game-scoped generators: game type and map

use super::TagGenerator;
use crate::telemetry::TelemetryView;
use rtag_common::tags::game_tag;
use rtag_common::{Replay, Result};

const GAME_TYPES: [&str; 5] = ["1v1", "2v2", "3v3", "4v4", "ffa"];

const MAP_TAG_PREFIX: &str = "map_";

pub struct GameTypeTagGenerator;

impl TagGenerator for GameTypeTagGenerator {
    fn name(&self) -> &'static str {
        "game_type"
    }

    fn owned_tags(&self) -> Vec<String> {
        GAME_TYPES.iter().map(|t| game_tag(t)).collect()
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        let Some(game_type) = telemetry.game().game_type.as_deref() else {
            return Ok(Vec::new());
        };

        let game_type = game_type.to_lowercase();
        if GAME_TYPES.contains(&game_type.as_str()) {
            Ok(vec![game_tag(&game_type)])
        } else {
            Ok(Vec::new())
        }
    }
}

/// `game:map_<name>` with the map name lowercased, punctuation dropped, and
/// whitespace runs collapsed to `_`
///
/// Map names cannot be enumerated, so every `game:map_*` tag is claimed.
pub struct MapTagGenerator;

impl MapTagGenerator {
    pub fn normalize(map_name: &str) -> String {
        let kept: String = map_name
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
            .collect();
        kept.split_whitespace().collect::<Vec<_>>().join("_")
    }
}

impl TagGenerator for MapTagGenerator {
    fn name(&self) -> &'static str {
        "map"
    }

    fn owned_tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn claims(&self, tag: &str) -> bool {
        tag.starts_with(&game_tag(MAP_TAG_PREFIX))
    }

    fn derive(&self, _replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>> {
        let Some(map_name) = telemetry.game().map_name.as_deref() else {
            return Ok(Vec::new());
        };

        let normalized = Self::normalize(map_name);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![game_tag(&format!("{}{}", MAP_TAG_PREFIX, normalized))])
    }
}
