use std::collections::HashSet;

use gym::{
    ActionSpace, EnvId, EnvironmentSpec, EpisodeScope, GymError, ObservationMode, Registry, RegistryBuilder,
};

#[test]
fn every_catalog_identifier_resolves_to_a_distinct_spec() {
    let registry = Registry::catalog();
    assert_eq!(registry.len(), 68);

    let mut seen = HashSet::new();
    for id in registry.ids() {
        let spec = registry.resolve(id).unwrap();
        assert_eq!(spec.id, id);
        assert!(seen.insert(spec.clone()), "{id} resolves to a spec seen before");
    }
    assert_eq!(seen.len(), 68);
}

#[test]
fn catalog_identifiers_round_trip_through_the_parser() {
    for spec in Registry::catalog().iter() {
        let parsed: EnvId = spec.id.parse().unwrap();
        assert_eq!(parsed.to_string(), spec.id);
        assert_eq!(parsed.tiles, spec.observation == ObservationMode::Tiles);
    }
}

#[test]
fn first_level_pixels_entry() {
    let registry = Registry::catalog();
    let spec = registry.resolve("SuperMarioBros-1-1-v0").unwrap();
    assert_eq!((spec.world, spec.level), (1, 1));
    assert_eq!(spec.observation, ObservationMode::Pixels);
    assert_eq!(spec.action_space, ActionSpace::Discrete);
    assert_eq!(spec.scope, EpisodeScope::Level);
}

#[test]
fn last_level_and_whole_game_entries() {
    let registry = Registry::catalog();
    let last = registry.resolve("SuperMarioBros-8-4-Tiles-v0").unwrap();
    assert_eq!((last.world, last.level, last.level_index()), (8, 4, 31));
    assert_eq!(registry.resolve("SuperMarioBros-v0").unwrap().scope, EpisodeScope::Game);
    assert_eq!(registry.resolve("meta-SuperMarioBros-Tiles-v0").unwrap().scope, EpisodeScope::Curriculum);
}

#[test]
fn register_then_resolve_returns_identical_fields() {
    let spec = EnvironmentSpec {
        id: "Lab-2-3-Tiles-v1".to_string(),
        world: 2,
        level: 3,
        scope: EpisodeScope::Level,
        observation: ObservationMode::Tiles,
        action_space: ActionSpace::MultiDiscrete,
        rom: nes::RomTarget::SuperMarioBros,
    };
    let mut builder = RegistryBuilder::new();
    builder.register(spec.clone()).unwrap();
    let registry = builder.build();
    assert_eq!(registry.resolve("Lab-2-3-Tiles-v1").unwrap(), &spec);
}

#[test]
fn registering_a_catalog_identifier_twice_fails() {
    let mut builder = RegistryBuilder::with_catalog();
    let err = builder
        .register(EnvironmentSpec::for_game(EpisodeScope::Game, ObservationMode::Tiles))
        .unwrap_err();
    assert!(matches!(err, GymError::DuplicateIdentifier(id) if id == "SuperMarioBros-Tiles-v0"));
}

#[test]
fn unknown_identifiers_are_reported() {
    let registry = Registry::catalog();
    for id in ["SuperMarioBros-0-1-v0", "SuperMarioBros-1-1-v1", "Tetris-v0", ""] {
        assert!(matches!(registry.resolve(id), Err(GymError::UnknownIdentifier(_))), "{id}");
    }
}
