#![deny(clippy::all, clippy::pedantic)]
//! # Runtime
//!
//! Entry point for the `runtime_main` binary.
//!
//! `list` and `show` inspect the environment catalog; `run` plays episodes
//! with a uniformly random agent, either against the in-process mock
//! emulator or a real FCEUX install. Logs go to stderr and are filtered with
//! `RUST_LOG`; stdout carries only command output.

mod app;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gym::ObservationMode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "runtime_main", version, about = "Super Mario Bros environment catalog and runner")]
struct Cli {
    /// JSON array of extra environment specs to register next to the catalog.
    #[arg(long, global = true)]
    extra: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every registered identifier.
    List {
        /// Only tile-grid environments.
        #[arg(long)]
        tiles: bool,
    },
    /// Print one environment spec as JSON.
    Show { id: String },
    /// Play episodes with a random agent.
    Run(app::RunArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = app::build_registry(cli.extra.as_deref())?;

    match cli.command {
        Command::List { tiles } => {
            for spec in registry.iter().filter(|spec| !tiles || spec.observation == ObservationMode::Tiles) {
                println!("{}", spec.id);
            }
        }
        Command::Show { id } => {
            println!("{}", serde_json::to_string_pretty(registry.resolve(&id)?)?);
        }
        Command::Run(args) => {
            for summary in app::run(&args, registry)? {
                println!("{}", serde_json::to_string(&summary)?);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults_to_the_mock_backend() {
        let cli = Cli::try_parse_from(["runtime_main", "run", "SuperMarioBros-1-1-v0"]).unwrap();
        let Command::Run(args) = cli.command else { panic!("expected run") };
        assert_eq!(args.backend, app::Backend::Mock);
        assert_eq!(args.episodes, 1);
        assert!(args.seed.is_none());
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "runtime_main",
            "run",
            "meta-SuperMarioBros-v0",
            "--episodes",
            "3",
            "--max-steps",
            "40",
            "--seed",
            "9",
            "--backend",
            "fceux",
            "--fullscreen",
            "--extra",
            "more.json",
        ])
        .unwrap();
        assert_eq!(cli.extra, Some(PathBuf::from("more.json")));
        let Command::Run(args) = cli.command else { panic!("expected run") };
        assert_eq!((args.episodes, args.max_steps, args.seed), (3, 40, Some(9)));
        assert_eq!(args.backend, app::Backend::Fceux);
        assert!(args.fullscreen);
    }

    #[test]
    fn fullscreen_and_headless_conflict() {
        assert!(Cli::try_parse_from(["runtime_main", "run", "x", "--fullscreen", "--headless"]).is_err());
    }
}
