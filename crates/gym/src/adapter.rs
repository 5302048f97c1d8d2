use std::sync::Arc;

use nes::NesLauncher;
use parking_lot::Mutex;

use crate::{GymConfig, GymError, Observation, Registry, Session};

/// Entry point that turns identifiers into sessions.
///
/// Cloning is cheap; clones share the registry, the configuration and the
/// launch gate, so emulators still boot one at a time.
#[derive(Clone)]
pub struct Gym {
    registry: Arc<Registry>,
    config: Arc<GymConfig>,
    launcher: Arc<dyn NesLauncher>,
    launch_gate: Arc<Mutex<()>>,
}

impl Gym {
    #[must_use]
    pub fn new(registry: Arc<Registry>, config: GymConfig, launcher: Arc<dyn NesLauncher>) -> Self {
        Self { registry, config: Arc::new(config), launcher, launch_gate: Arc::new(Mutex::new(())) }
    }

    /// Gym over the standard catalog.
    #[must_use]
    pub fn with_catalog(config: GymConfig, launcher: Arc<dyn NesLauncher>) -> Self {
        Self::new(Arc::new(Registry::catalog()), config, launcher)
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &GymConfig {
        &self.config
    }

    /// A session for `id` with no emulator attached yet.
    ///
    /// # Errors
    /// [`GymError::UnknownIdentifier`] when `id` is not registered.
    pub fn make(&self, id: &str) -> Result<Session, GymError> {
        let spec = self.registry.resolve(id)?.clone();
        Ok(Session::new(spec, Arc::clone(&self.config), Arc::clone(&self.launcher), Arc::clone(&self.launch_gate)))
    }

    /// [`Gym::make`] followed by the first [`Session::reset`].
    ///
    /// # Errors
    /// As [`Gym::make`] and [`Session::reset`].
    pub fn reset(&self, id: &str) -> Result<(Session, Observation), GymError> {
        let mut session = self.make(id)?;
        let observation = session.reset()?;
        Ok((session, observation))
    }
}

impl std::fmt::Debug for Gym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gym")
            .field("environments", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
