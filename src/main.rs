//! DeepRTS CLI - Command-line interface for running, replaying and batching games.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use deeprts::batch::BatchConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// DeepRTS - A deterministic tick-driven RTS simulation engine
#[derive(Parser, Debug)]
#[command(name = "deeprts")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Map generation and game length options shared by `run` and `batch`.
#[derive(clap::Args, Debug, Clone, Copy)]
struct GameArgs {
    /// Maximum ticks per game (default: 500)
    #[arg(short, long, default_value = "500")]
    ticks: u64,

    /// Generated map width (default: 32)
    #[arg(long, default_value = "32")]
    width: u16,

    /// Generated map height (default: 32)
    #[arg(long, default_value = "32")]
    height: u16,

    /// Number of players on generated maps (1-8)
    #[arg(short, long, default_value = "2")]
    players: usize,
}

impl From<GameArgs> for BatchConfig {
    fn from(args: GameArgs) -> Self {
        Self {
            max_ticks: args.ticks,
            map_width: args.width,
            map_height: args.height,
            players: args.players,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single scripted game
    Run {
        /// Map descriptor JSON (default: generated from the seed)
        #[arg(short, long)]
        map: Option<PathBuf>,

        /// Game config JSON (default: skirmish rules)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Random seed (default: random)
        #[arg(short, long)]
        seed: Option<u64>,

        #[command(flatten)]
        game: GameArgs,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Save recording to file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print the final map
        #[arg(long)]
        show_map: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Replay a recorded game
    Replay {
        /// Recording file (JSON)
        #[arg(required = true)]
        recording: PathBuf,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::ReplayFormat,

        /// Show only this tick
        #[arg(short, long)]
        tick: Option<u64>,
    },

    /// Run many scripted games in parallel and aggregate statistics
    Batch {
        /// Number of games to run (default: 100)
        #[arg(short, long, default_value = "100")]
        games: u64,

        /// Starting seed (increments for each game)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Parallel threads (default: CPU count)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Game config JSON (default: skirmish rules)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        game: GameArgs,

        /// Output format: text, json, or csv
        #[arg(short, long, default_value = "text")]
        format: cli::BatchFormat,

        /// Show progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Validate a map, config or recording file
    Validate {
        /// File to validate
        #[arg(required = true)]
        file: PathBuf,

        /// Kind of file
        #[arg(short, long, default_value = "map")]
        kind: cli::ValidateKind,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let result = match args.command {
        Commands::Run {
            map,
            config,
            seed,
            game,
            format,
            save,
            show_map,
            quiet,
        } => cli::run::execute(cli::run::RunOptions {
            map,
            config,
            seed,
            batch: game.into(),
            format,
            save,
            show_map,
            quiet,
        }),

        Commands::Replay {
            recording,
            format,
            tick,
        } => cli::replay::execute(recording, format, tick),

        Commands::Batch {
            games,
            seed,
            threads,
            config,
            game,
            format,
            progress,
        } => cli::batch::execute(cli::batch::BatchOptions {
            games,
            seed,
            threads,
            config,
            batch: game.into(),
            format,
            progress,
        }),

        Commands::Validate { file, kind } => cli::validate::execute(file, kind),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
