//! Tag generation stage
//!
//! A fixed, ordered list of generators, each owning the tags it can emit.
//! One pass over a replay:
//! 1. removes every tag any generator owns or claims (namespace reclamation)
//! 2. runs every generator's `derive` in list order and concatenates results
//! 3. prepends that concatenation to the remaining tags, deduplicated
//!
//! Reclamation happens before any generator emits, so a re-run fully
//! supersedes the previous derived set and the stage is idempotent for
//! unchanged telemetry. A generator that fails contributes no tags; the
//! others are unaffected.

mod composition;
mod game;
mod sides;
mod structures;

#[cfg(test)]
pub(crate) mod test_support;

pub use composition::{ArmyCompositionTagGenerator, HighTechUnitTagGenerator};
pub use game::{GameTypeTagGenerator, MapTagGenerator};
pub use sides::{
    AiTagGenerator, MatchupTagGenerator, RaceTagGenerator, RandomRaceTagGenerator,
    ResultTagGenerator,
};
pub use structures::{CannonRushTagGenerator, ProxyTagGenerator, TechPathTagGenerator};

use crate::telemetry::{GameTelemetry, TelemetryView};
use rtag_common::{Replay, Result, Role};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Sides every per-side generator inspects, in emission order
pub(crate) const SIDES: [Role; 2] = [Role::Player, Role::Opponent];

/// A built-in tag rule
pub trait TagGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every tag this generator could ever emit
    fn owned_tags(&self) -> Vec<String>;

    /// Tags outside `owned_tags` that this generator also reclaims
    ///
    /// Only needed when the emitted tag space cannot be enumerated.
    fn claims(&self, _tag: &str) -> bool {
        false
    }

    /// Tags to add for this replay
    fn derive(&self, replay: &Replay, telemetry: &TelemetryView<'_>) -> Result<Vec<String>>;
}

/// The built-in generators in execution order
pub fn create_tag_generators() -> Vec<Box<dyn TagGenerator>> {
    vec![
        Box::new(RaceTagGenerator),
        Box::new(RandomRaceTagGenerator),
        Box::new(ResultTagGenerator),
        Box::new(MatchupTagGenerator),
        Box::new(AiTagGenerator),
        Box::new(GameTypeTagGenerator),
        Box::new(MapTagGenerator),
        Box::new(ProxyTagGenerator),
        Box::new(ArmyCompositionTagGenerator),
        Box::new(TechPathTagGenerator),
        Box::new(CannonRushTagGenerator),
        Box::new(HighTechUnitTagGenerator),
    ]
}

pub struct TagGenerationStage {
    generators: Vec<Box<dyn TagGenerator>>,
    owned: HashSet<String>,
}

impl TagGenerationStage {
    pub fn new(generators: Vec<Box<dyn TagGenerator>>) -> Self {
        let owned = generators.iter().flat_map(|g| g.owned_tags()).collect();
        Self { generators, owned }
    }

    pub fn generators(&self) -> impl Iterator<Item = &dyn TagGenerator> {
        self.generators.iter().map(|g| g.as_ref())
    }

    /// True if some generator owns or claims `tag`
    pub fn is_derived(&self, tag: &str) -> bool {
        self.owned.contains(tag) || self.generators.iter().any(|g| g.claims(tag))
    }

    /// Regenerate the derived tags of `replay`
    pub fn apply(&self, replay: &mut Replay, telemetry: &GameTelemetry) {
        replay.tags.retain(|tag| !self.is_derived(tag));

        let view = TelemetryView::new(telemetry, replay);
        let mut derived = Vec::new();
        for generator in &self.generators {
            match generator.derive(replay, &view) {
                Ok(tags) => {
                    debug!(generator = generator.name(), ?tags, "Derived tags");
                    derived.extend(tags);
                }
                Err(e) => {
                    warn!(
                        generator = generator.name(),
                        digest = %replay.digest,
                        error = %e,
                        "Tag generator failed, continuing with the rest"
                    );
                }
            }
        }

        replay.tags.prepend_all(derived);
    }
}

impl Default for TagGenerationStage {
    fn default() -> Self {
        Self::new(create_tag_generators())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use rtag_common::Error;

    struct Failing;

    impl TagGenerator for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn owned_tags(&self) -> Vec<String> {
            vec!["game:failing".to_string()]
        }

        fn derive(&self, _: &Replay, _: &TelemetryView<'_>) -> Result<Vec<String>> {
            Err(Error::Telemetry("unit data missing".to_string()))
        }
    }

    #[test]
    fn test_generator_order() {
        let stage = TagGenerationStage::default();
        let names: Vec<&str> = stage.generators().map(|g| g.name()).collect();
        assert_eq!(
            names,
            vec![
                "race",
                "random_race",
                "result",
                "matchup",
                "ai",
                "game_type",
                "map",
                "proxy",
                "army_composition",
                "tech_path",
                "cannon_rush",
                "high_tech_unit",
            ]
        );
    }

    #[test]
    fn test_derived_tags_precede_user_tags() {
        let (telemetry, mut replay) = protoss_vs_terran();
        replay.add_tag("favourite");

        TagGenerationStage::default().apply(&mut replay, &telemetry);

        let tags = replay.tags.as_slice();
        assert_eq!(tags.first().map(String::as_str), Some("player:protoss"));
        assert_eq!(tags.last().map(String::as_str), Some("favourite"));
        assert!(replay.tags.contains("opponent:terran"));
        assert!(replay.tags.contains("game:pvt"));
        assert!(replay.tags.contains("game:1v1"));
        assert!(replay.tags.contains("game:map_ever_dream_le"));
    }

    #[test]
    fn test_stage_is_idempotent() {
        let (telemetry, mut replay) = protoss_vs_terran();
        replay.add_tag("keeper");
        let stage = TagGenerationStage::default();

        stage.apply(&mut replay, &telemetry);
        let first = replay.tags.clone();
        stage.apply(&mut replay, &telemetry);

        assert_eq!(replay.tags, first);
    }

    #[test]
    fn test_stale_derived_tags_are_reclaimed() {
        let (telemetry, mut replay) = protoss_vs_terran();
        replay.add_tag("player:zerg");
        replay.add_tag("game:map_old_map");
        replay.add_tag("opponent:proxy_barracks");
        replay.add_tag("player:custom");

        TagGenerationStage::default().apply(&mut replay, &telemetry);

        assert!(!replay.tags.contains("player:zerg"));
        assert!(!replay.tags.contains("game:map_old_map"));
        assert!(!replay.tags.contains("opponent:proxy_barracks"));
        assert!(replay.tags.contains("player:custom"));
    }

    /// Generators whose output depends on unit positions and timings
    const STRATEGY_GENERATORS: [&str; 5] = [
        "proxy",
        "army_composition",
        "tech_path",
        "cannon_rush",
        "high_tech_unit",
    ];

    #[test]
    fn test_every_generator_fires_on_full_fixture() {
        let (telemetry, _) = every_generator_fires();

        for generator in create_tag_generators() {
            let tags = derive_with(generator.as_ref(), &telemetry);
            assert!(!tags.is_empty(), "{} emitted nothing", generator.name());
        }
    }

    #[test]
    fn test_stage_is_idempotent_with_every_generator() {
        let (telemetry, mut replay) = every_generator_fires();
        replay.add_tag("keeper");
        let stage = TagGenerationStage::default();

        stage.apply(&mut replay, &telemetry);
        let first = replay.tags.clone();
        stage.apply(&mut replay, &telemetry);

        assert_eq!(replay.tags, first);
        for tag in [
            "player:proxy_gateway",
            "player:cannon_rush",
            "player:twilight",
            "player:carrier",
            "opponent:bio",
            "opponent:banshee",
            "player:random",
            "opponent:ai",
        ] {
            assert!(replay.tags.contains(tag), "missing {}", tag);
        }
        assert_eq!(replay.tags.as_slice().last().map(String::as_str), Some("keeper"));
    }

    #[test]
    fn test_changed_telemetry_reclaims_every_strategy_tag() {
        let (rich, mut replay) = every_generator_fires();
        let (plain, mut fresh) = protoss_vs_terran();
        replay.add_tag("keeper");
        fresh.add_tag("keeper");
        let stage = TagGenerationStage::default();

        stage.apply(&mut replay, &rich);
        stage.apply(&mut replay, &plain);
        stage.apply(&mut fresh, &plain);

        assert_eq!(replay.tags, fresh.tags);
        for generator in stage
            .generators()
            .filter(|g| STRATEGY_GENERATORS.contains(&g.name()))
        {
            for owned in generator.owned_tags() {
                assert!(
                    !replay.tags.contains(&owned),
                    "{} left {} behind",
                    generator.name(),
                    owned
                );
            }
        }
    }

    #[test]
    fn test_failing_generator_is_isolated() {
        let (telemetry, mut replay) = protoss_vs_terran();
        replay.add_tag("game:failing");
        let stage = TagGenerationStage::new(vec![Box::new(Failing), Box::new(RaceTagGenerator)]);

        stage.apply(&mut replay, &telemetry);

        assert_eq!(
            replay.tags.as_slice(),
            &["player:protoss", "opponent:terran"]
        );
    }
}
