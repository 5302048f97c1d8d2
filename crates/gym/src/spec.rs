use nes::{RomTarget, LEVEL_COUNT};
use serde::{Deserialize, Serialize};

use crate::{ActionSpace, EnvId, GymError, ObservationMode};

pub const FAMILY: &str = "SuperMarioBros";
pub const CURRICULUM_FAMILY: &str = "meta-SuperMarioBros";
pub const WORLDS: u8 = 8;
pub const LEVELS_PER_WORLD: u8 = 4;

/// How far one episode reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeScope {
    /// A single level; the episode ends when it is cleared or lost.
    #[default]
    Level,
    /// The whole game from 1-1 onwards.
    Game,
    /// The whole game, with the starting level picked by a curriculum.
    Curriculum,
}

/// Everything needed to start a session for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub id: String,
    /// 1-based world number.
    pub world: u8,
    /// 1-based level number within the world.
    pub level: u8,
    #[serde(default)]
    pub scope: EpisodeScope,
    pub observation: ObservationMode,
    #[serde(default)]
    pub action_space: ActionSpace,
    #[serde(default)]
    pub rom: RomTarget,
}

impl EnvironmentSpec {
    /// Catalog entry for a single level.
    #[must_use]
    pub fn for_level(world: u8, level: u8, observation: ObservationMode) -> Self {
        let id = EnvId::new(FAMILY, Some((world, level)), observation == ObservationMode::Tiles);
        Self {
            id: id.to_string(),
            world,
            level,
            scope: EpisodeScope::Level,
            observation,
            action_space: ActionSpace::Discrete,
            rom: RomTarget::SuperMarioBros,
        }
    }

    /// Catalog entry covering the whole game.
    #[must_use]
    pub fn for_game(scope: EpisodeScope, observation: ObservationMode) -> Self {
        let family = if scope == EpisodeScope::Curriculum { CURRICULUM_FAMILY } else { FAMILY };
        let id = EnvId::new(family, None, observation == ObservationMode::Tiles);
        Self {
            id: id.to_string(),
            world: 1,
            level: 1,
            scope,
            observation,
            action_space: ActionSpace::Discrete,
            rom: RomTarget::SuperMarioBros,
        }
    }

    #[must_use]
    pub fn with_action_space(mut self, action_space: ActionSpace) -> Self {
        self.action_space = action_space;
        self
    }

    /// Zero-based index of the starting level in play order (1-1 = 0, 8-4 = 31).
    #[must_use]
    pub fn level_index(&self) -> u8 {
        let index = u16::from(self.world.saturating_sub(1)) * u16::from(LEVELS_PER_WORLD)
            + u16::from(self.level.saturating_sub(1));
        u8::try_from(index % u16::from(LEVEL_COUNT)).unwrap_or_default()
    }

    /// Checks the fields against each other and against the identifier text.
    ///
    /// # Errors
    /// [`GymError::InvalidIdentifier`] describing the first inconsistency.
    pub fn validate(&self) -> Result<EnvId, GymError> {
        let invalid = |reason: String| GymError::InvalidIdentifier { id: self.id.clone(), reason };
        let parsed: EnvId = self.id.parse()?;

        if !(1..=WORLDS).contains(&self.world) || !(1..=LEVELS_PER_WORLD).contains(&self.level) {
            return Err(invalid(format!("stage {}-{} is outside 1-1..8-4", self.world, self.level)));
        }
        if parsed.tiles != (self.observation == ObservationMode::Tiles) {
            return Err(invalid(format!("identifier disagrees with {:?} observations", self.observation)));
        }
        match (self.scope, parsed.stage) {
            (EpisodeScope::Level, Some(stage)) if stage == (self.world, self.level) => Ok(parsed),
            (EpisodeScope::Level, Some((w, l))) => Err(invalid(format!(
                "identifier names stage {w}-{l} but spec says {}-{}",
                self.world, self.level
            ))),
            (EpisodeScope::Level, None) => Err(invalid("single-level specs need a world-level pair".into())),
            (EpisodeScope::Game | EpisodeScope::Curriculum, Some(_)) => {
                Err(invalid("whole-game specs take no world-level pair".into()))
            }
            (EpisodeScope::Game | EpisodeScope::Curriculum, None) => Ok(parsed),
        }
    }
}
