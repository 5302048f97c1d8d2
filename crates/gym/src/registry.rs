//! Identifier → [`EnvironmentSpec`] table.
//!
//! Entries are added through a [`RegistryBuilder`] while the program starts
//! and frozen into a [`Registry`]; the frozen table is never mutated again and
//! is shared between sessions behind an `Arc`.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::spec::{LEVELS_PER_WORLD, WORLDS};
use crate::{EnvironmentSpec, EpisodeScope, GymError, ObservationMode};

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    specs: Vec<EnvironmentSpec>,
    index: HashMap<String, usize>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the standard catalog. [`EnvironmentSpec::for_level`] and
    /// [`EnvironmentSpec::for_game`] only build consistent entries, and the
    /// catalog never repeats a stage, so nothing is checked here.
    #[must_use]
    pub fn with_catalog() -> Self {
        let mut builder = Self::new();
        for spec in catalog_entries() {
            builder.insert(spec);
        }
        builder
    }

    /// # Errors
    /// [`GymError::DuplicateIdentifier`] when the identifier is taken, or
    /// [`GymError::InvalidIdentifier`] when the entry contradicts its identifier.
    pub fn register(&mut self, spec: EnvironmentSpec) -> Result<&mut Self, GymError> {
        spec.validate()?;
        if self.index.contains_key(&spec.id) {
            return Err(GymError::DuplicateIdentifier(spec.id));
        }
        self.insert(spec);
        Ok(self)
    }

    /// Registers every spec of a JSON array. The batch is checked as a whole
    /// first; a rejected entry leaves the builder unchanged.
    ///
    /// # Errors
    /// [`GymError::Config`] for malformed JSON, otherwise as [`Self::register`].
    pub fn register_json(&mut self, json: &str) -> Result<usize, GymError> {
        let specs: Vec<EnvironmentSpec> = serde_json::from_str(json)?;
        let mut batch = HashSet::with_capacity(specs.len());
        for spec in &specs {
            spec.validate()?;
            if self.index.contains_key(&spec.id) || !batch.insert(spec.id.as_str()) {
                return Err(GymError::DuplicateIdentifier(spec.id.clone()));
            }
        }
        let count = specs.len();
        for spec in specs {
            self.insert(spec);
        }
        Ok(count)
    }

    fn insert(&mut self, spec: EnvironmentSpec) {
        self.index.insert(spec.id.clone(), self.specs.len());
        self.specs.push(spec);
    }

    #[must_use]
    pub fn build(self) -> Registry {
        debug!("Registry frozen with {} environments", self.specs.len());
        Registry { specs: self.specs, index: self.index }
    }
}

/// Frozen identifier table.
#[derive(Debug, Clone)]
pub struct Registry {
    specs: Vec<EnvironmentSpec>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// The standard 68-entry catalog.
    #[must_use]
    pub fn catalog() -> Self {
        RegistryBuilder::with_catalog().build()
    }

    /// # Errors
    /// [`GymError::UnknownIdentifier`] when nothing is registered under `id`.
    pub fn resolve(&self, id: &str) -> Result<&EnvironmentSpec, GymError> {
        self.index
            .get(id)
            .map(|&i| &self.specs[i])
            .ok_or_else(|| GymError::UnknownIdentifier(id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentSpec> {
        self.specs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Every level in both observation modes, then the whole-game and
/// curriculum variants.
fn catalog_entries() -> Vec<EnvironmentSpec> {
    let modes = [ObservationMode::Pixels, ObservationMode::Tiles];
    let mut entries = Vec::with_capacity(usize::from(WORLDS * LEVELS_PER_WORLD) * 2 + 4);
    for world in 1..=WORLDS {
        for level in 1..=LEVELS_PER_WORLD {
            for mode in modes {
                entries.push(EnvironmentSpec::for_level(world, level, mode));
            }
        }
    }
    for scope in [EpisodeScope::Game, EpisodeScope::Curriculum] {
        for mode in modes {
            entries.push(EnvironmentSpec::for_game(scope, mode));
        }
    }
    entries
}
