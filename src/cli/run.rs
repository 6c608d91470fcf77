//! Run command implementation.

use super::output::format_text;
use super::{CliError, OutputFormat, load_config, seed_or_now};
use deeprts::MapDescriptor;
use deeprts::batch::{BatchConfig, GameResult, script_commands, skirmish_config};
use deeprts::game::generate_map;
use deeprts::replay::{Recorder, render_ascii};
use std::path::PathBuf;

/// Options for the run command.
#[derive(Debug)]
pub(crate) struct RunOptions {
    pub(crate) map: Option<PathBuf>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) seed: Option<u64>,
    pub(crate) batch: BatchConfig,
    pub(crate) format: OutputFormat,
    pub(crate) save: Option<PathBuf>,
    pub(crate) show_map: bool,
    pub(crate) quiet: bool,
}

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the map or config cannot be loaded or a step fails.
pub(crate) fn execute(options: RunOptions) -> Result<(), CliError> {
    let seed = seed_or_now(options.seed);
    let config = load_config(options.config.as_deref(), skirmish_config())?;
    let descriptor = match &options.map {
        Some(path) => MapDescriptor::load(path).map_err(|e| {
            CliError::new(format!("Failed to load map {}: {e}", path.display()))
        })?,
        None => generate_map(
            seed,
            options.batch.map_width,
            options.batch.map_height,
            options.batch.players,
        )?,
    };

    if !options.quiet {
        println!("Running '{}' with seed {seed}...", descriptor.name);
        println!(
            "Map: {}x{}, players: {}",
            descriptor.width,
            descriptor.height,
            descriptor.starts.len()
        );
        println!();
    }

    let mut recorder = Recorder::new(descriptor, config)?;
    let mut rejected_commands = 0u64;
    while !recorder.game().is_game_over() && recorder.game().tick() < options.batch.max_ticks {
        let commands = script_commands(recorder.game());
        let report = recorder.step(commands)?;
        rejected_commands += report.rejected() as u64;
    }

    let game = recorder.game();
    let result = GameResult::from_game(seed, game, rejected_commands);

    if options.show_map {
        println!("{}", render_ascii(game));
    }

    if let Some(save_path) = options.save {
        recorder
            .into_recording()
            .save(&save_path)
            .map_err(|e| CliError::new(format!("Failed to save recording: {e}")))?;
        if !options.quiet {
            println!("Recording saved to: {}", save_path.display());
            println!();
        }
    }

    match options.format {
        OutputFormat::Text => print!("{}", format_text(&result)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}
