//! Environment identifiers.
//!
//! Per-level identifiers look like `SuperMarioBros-1-1-v0` or
//! `SuperMarioBros-1-1-Tiles-v0`; whole-game ones drop the world/level pair
//! (`meta-SuperMarioBros-Tiles-v0`).

use std::fmt;
use std::str::FromStr;

use crate::GymError;

pub const TILES_MARKER: &str = "Tiles";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvId {
    pub family: String,
    /// `(world, level)` for per-level identifiers.
    pub stage: Option<(u8, u8)>,
    pub tiles: bool,
    pub version: u32,
}

impl EnvId {
    #[must_use]
    pub fn new(family: impl Into<String>, stage: Option<(u8, u8)>, tiles: bool) -> Self {
        Self { family: family.into(), stage, tiles, version: 0 }
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.family)?;
        if let Some((world, level)) = self.stage {
            write!(f, "-{world}-{level}")?;
        }
        if self.tiles {
            write!(f, "-{TILES_MARKER}")?;
        }
        write!(f, "-v{}", self.version)
    }
}

impl FromStr for EnvId {
    type Err = GymError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| GymError::InvalidIdentifier { id: id.to_string(), reason: reason.to_string() };

        let (rest, version) = id.rsplit_once('-').ok_or_else(|| invalid("missing version suffix"))?;
        let version = version
            .strip_prefix('v')
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| invalid("version must look like v0"))?;

        let (rest, tiles) = match rest.strip_suffix(TILES_MARKER).and_then(|r| r.strip_suffix('-')) {
            Some(rest) => (rest, true),
            None => (rest, false),
        };

        let stage = rest.rsplit_once('-').and_then(|(head, level)| {
            let (family, world) = head.rsplit_once('-')?;
            Some((family, world.parse::<u8>().ok()?, level.parse::<u8>().ok()?))
        });
        let (family, stage) = match stage {
            Some((family, world, level)) => (family, Some((world, level))),
            None => (rest, None),
        };

        if family.is_empty() || family.chars().any(char::is_whitespace) {
            return Err(invalid("family name must be non-empty without whitespace"));
        }
        Ok(Self { family: family.to_string(), stage, tiles, version })
    }
}
