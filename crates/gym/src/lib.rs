#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Super Mario Bros environments
//!
//! A catalog of reinforcement-learning environments backed by an external
//! NES emulator, and the session adapter that drives it.
//!
//! -   [`Registry`] maps identifiers such as `SuperMarioBros-1-1-v0` to an
//!     [`EnvironmentSpec`]. It is built once and then shared read-only.
//! -   [`Gym`] turns an identifier into a [`Session`], which owns one
//!     emulator and exposes `reset` / `step` / `close`.
//! -   [`RewardTracker`] and [`Curriculum`] shape rewards and pick levels.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gym::{Gym, GymConfig};
//! use nes::fceux::FceuxLauncher;
//!
//! let launcher = FceuxLauncher::locate(None)?;
//! let gym = Gym::with_catalog(GymConfig::from_env(), Arc::new(launcher));
//! let (mut session, _obs) = gym.reset("SuperMarioBros-1-1-v0")?;
//! let step = session.step(7)?;
//! println!("reward {} done {}", step.reward, step.done);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod action;
mod adapter;
mod config;
mod curriculum;
mod env;
mod error;
mod id;
mod observation;
mod registry;
mod reward;
mod session;
pub mod spec;
pub mod timing;
mod worker;

pub use action::{ActionSpace, DISCRETE_ACTIONS, DISCRETE_ACTION_NAMES};
pub use adapter::Gym;
pub use config::GymConfig;
pub use curriculum::{Curriculum, CurriculumConfig};
pub use env::Env;
pub use error::GymError;
pub use id::{EnvId, TILES_MARKER};
pub use observation::{Observation, ObservationMode};
pub use registry::{Registry, RegistryBuilder};
pub use reward::{RewardConfig, RewardOutcome, RewardTracker};
pub use session::{Session, SessionState, Step, StepInfo};
pub use spec::{EnvironmentSpec, EpisodeScope};
