//! # Random-agent rollouts
//!
//! [`run`] builds a [`Gym`] from the command-line options, resets one
//! session per invocation and plays episodes by sampling actions uniformly
//! from the environment's action space, logging progress every few steps.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use gym::{Gym, GymConfig, Registry, RegistryBuilder};
use nes::{DisplayMode, MockLauncher, NesLauncher};
use serde::Serialize;

const LOG_EVERY: u32 = 50;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Environment identifier, e.g. `SuperMarioBros-1-1-v0`.
    pub id: String,
    #[arg(long, default_value_t = 1)]
    pub episodes: u32,
    /// Step limit per episode.
    #[arg(long, default_value_t = 500)]
    pub max_steps: u32,
    /// Seeds both the episode start offsets and the agent.
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, value_enum, default_value_t = Backend::Mock)]
    pub backend: Backend,
    #[arg(long, conflicts_with = "headless")]
    pub fullscreen: bool,
    #[arg(long)]
    pub headless: bool,
    /// JSON configuration file; defaults come from the environment.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Deterministic in-process emulator stand-in.
    Mock,
    /// FCEUX subprocess.
    Fceux,
}

#[derive(Debug, Clone, Serialize)]
pub struct EpisodeSummary {
    pub id: String,
    pub episode: u32,
    pub level: u8,
    pub steps: u32,
    pub reward: f64,
    pub distance: i32,
    pub done: bool,
}

/// Catalog plus the entries of an optional JSON file.
///
/// # Errors
/// Unreadable files and rejected entries.
pub fn build_registry(extra: Option<&Path>) -> Result<Registry> {
    let mut builder = RegistryBuilder::with_catalog();
    if let Some(path) = extra {
        let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let added = builder.register_json(&json)?;
        tracing::info!("Registered {added} extra environments from {}", path.display());
    }
    Ok(builder.build())
}

fn load_config(args: &RunArgs) -> Result<GymConfig> {
    let mut config = match &args.config {
        Some(path) => GymConfig::load(path)?,
        None => GymConfig::from_env(),
    };
    if args.fullscreen {
        config.display = DisplayMode::Fullscreen;
    } else if args.headless {
        config.display = DisplayMode::Headless;
    }
    Ok(config)
}

fn launcher(backend: Backend, config: &GymConfig) -> Result<Arc<dyn NesLauncher>> {
    match backend {
        Backend::Mock => Ok(Arc::new(MockLauncher::default())),
        #[cfg(unix)]
        Backend::Fceux => {
            let fceux = nes::fceux::FceuxLauncher::locate(config.emulator_path.clone())?;
            tracing::info!("Using emulator at {}", fceux.executable().display());
            Ok(Arc::new(fceux))
        }
        #[cfg(not(unix))]
        Backend::Fceux => {
            let _ = config;
            anyhow::bail!("the FCEUX backend needs named pipes, which this platform lacks")
        }
    }
}

/// Plays `args.episodes` episodes and returns one summary per episode.
///
/// # Errors
/// Unknown identifiers, configuration problems and emulator faults.
pub fn run(args: &RunArgs, registry: Registry) -> Result<Vec<EpisodeSummary>> {
    let config = load_config(args)?;
    let launcher = launcher(args.backend, &config)?;
    let gym = Gym::new(Arc::new(registry), config, launcher);

    let mut session = gym.make(&args.id)?;
    let first_seed = session.seed(args.seed);
    let mut agent = args.seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
    let actions = session.spec().action_space.len();
    tracing::info!("Running {} episodes of {} (first seed {first_seed})", args.episodes, args.id);

    let mut summaries = Vec::new();
    for episode in 1..=args.episodes {
        session.reset()?;
        let mut steps = 0;
        let mut done = false;
        let mut distance = 0;
        while steps < args.max_steps && !done {
            let action = i64::try_from(agent.usize(..actions))?;
            let step = session.step(action)?;
            steps += 1;
            done = step.done;
            distance = step.info.game.distance;
            if steps % LOG_EVERY == 0 {
                tracing::info!(
                    "Episode {episode} step {steps}: {} distance {distance} reward {:.1}",
                    session.spec().action_space.describe(action),
                    session.episode_reward()
                );
            }
        }

        let summary = EpisodeSummary {
            id: args.id.clone(),
            episode,
            level: session.level(),
            steps,
            reward: session.episode_reward(),
            distance,
            done,
        };
        tracing::info!("Episode {episode} finished: {steps} steps, reward {:.1}", summary.reward);
        summaries.push(summary);
    }

    for (scope, times) in session.timings().summary() {
        tracing::debug!("{scope}: {} calls, total {:?}, self {:?}", times.calls, times.total, times.partial);
    }
    session.close();
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(id: &str) -> RunArgs {
        RunArgs {
            id: id.to_string(),
            episodes: 2,
            max_steps: 30,
            seed: Some(5),
            backend: Backend::Mock,
            fullscreen: false,
            headless: true,
            config: None,
        }
    }

    #[test]
    fn plays_the_requested_episodes() {
        let summaries = run(&args("SuperMarioBros-1-1-Tiles-v0"), Registry::catalog()).unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.steps == 30 && !s.done));
        assert_eq!(summaries[1].episode, 2);
    }

    #[test]
    fn seeded_runs_repeat() {
        let first = run(&args("SuperMarioBros-4-1-v0"), Registry::catalog()).unwrap();
        let second = run(&args("SuperMarioBros-4-1-v0"), Registry::catalog()).unwrap();
        let rewards = |s: &[EpisodeSummary]| s.iter().map(|e| (e.reward, e.distance)).collect::<Vec<_>>();
        assert_eq!(rewards(&first), rewards(&second));
    }

    #[test]
    fn unknown_identifier_fails() {
        assert!(run(&args("Zelda-v0"), Registry::catalog()).is_err());
    }

    #[test]
    fn extra_entries_are_registered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.json");
        std::fs::write(&path, r#"[{"id":"Practice-2-2-Tiles-v0","world":2,"level":2,"observation":"tiles"}]"#).unwrap();
        let registry = build_registry(Some(&path)).unwrap();
        assert_eq!(registry.len(), 69);
        assert!(registry.contains("Practice-2-2-Tiles-v0"));
        assert!(build_registry(Some(Path::new("/nonexistent.json"))).is_err());
    }

    #[test]
    fn command_line_display_overrides_config() {
        let mut run_args = args("SuperMarioBros-1-1-v0");
        assert_eq!(load_config(&run_args).unwrap().display, DisplayMode::Headless);
        run_args.headless = false;
        run_args.fullscreen = true;
        assert_eq!(load_config(&run_args).unwrap().display, DisplayMode::Fullscreen);
    }
}
