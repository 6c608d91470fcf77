//! Validation command implementation.

use super::{CliError, ValidateKind};
use deeprts::game::{Capabilities, find_path};
use deeprts::replay::{Recording, ReplayEngine};
use deeprts::{Game, GameConfig, MapDescriptor};
use std::path::{Path, PathBuf};

/// Execute the validate command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is invalid.
pub(crate) fn execute(path: PathBuf, kind: ValidateKind) -> Result<(), CliError> {
    println!("Validating: {}", path.display());
    println!();

    match kind {
        ValidateKind::Map => validate_map(&path)?,
        ValidateKind::Config => validate_config(&path)?,
        ValidateKind::Recording => validate_recording(&path)?,
    }

    println!();
    println!("Validation successful!");
    Ok(())
}

fn validate_map(path: &Path) -> Result<(), CliError> {
    let descriptor = MapDescriptor::load(path);
    print_check("Map descriptor", descriptor.is_ok());
    let descriptor = descriptor?;

    let game = Game::new(descriptor.clone(), GameConfig::default());
    print_check("Start units placed", game.is_ok());
    game?;

    let map = descriptor.build_tilemap()?;
    let mut connected = true;
    if let Some((&first, rest)) = descriptor.starts.split_first() {
        for &other in rest {
            if find_path(&map, first, other, Capabilities::GROUND).is_err() {
                println!("  note: no ground route from {first} to {other}");
                connected = false;
            }
        }
    }
    print_check("Starts connected", connected);

    println!();
    println!("Summary:");
    println!("  Name:    {}", descriptor.name);
    println!("  Size:    {}x{}", descriptor.width, descriptor.height);
    println!("  Players: {}", descriptor.starts.len());
    Ok(())
}

fn validate_config(path: &Path) -> Result<(), CliError> {
    let config = GameConfig::load(path);
    print_check("Config parses", config.is_ok());
    let config = config?;
    print_check("Start units listed", !config.start_units.is_empty());
    Ok(())
}

fn validate_recording(path: &Path) -> Result<(), CliError> {
    let recording = Recording::load(path);
    print_check("Recording parses", recording.is_ok());
    let recording = recording?;
    let ticks = recording.len();

    let replayed = ReplayEngine::new_at_tick(recording, ticks);
    print_check("Replays to the end", replayed.is_ok());
    let engine = replayed?;

    println!();
    println!("Summary:");
    println!("  Ticks:      {ticks}");
    println!("  Game over:  {}", engine.game().is_game_over());
    println!("  State hash: {:016x}", engine.game().state_hash());
    Ok(())
}

fn print_check(name: &str, ok: bool) {
    let status = if ok { "OK" } else { "FAILED" };
    println!("  {name:.<30} {status}");
}
