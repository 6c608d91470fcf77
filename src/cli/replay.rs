//! Replay command implementation.

use super::{CliError, ReplayFormat};
use deeprts::replay::{Recording, ReplayEngine};
use std::path::PathBuf;

/// Execute the replay command.
///
/// # Errors
///
/// Returns an error if the recording cannot be loaded or replayed.
pub(crate) fn execute(
    recording_path: PathBuf,
    format: ReplayFormat,
    tick: Option<u64>,
) -> Result<(), CliError> {
    // Load recording
    let recording = Recording::load(&recording_path).map_err(|e| {
        CliError::new(format!(
            "Failed to load recording {}: {e}",
            recording_path.display()
        ))
    })?;

    match format {
        ReplayFormat::Text => print_text_replay(ReplayEngine::new(recording)?, tick),
        ReplayFormat::Json => {
            let target = tick.unwrap_or_else(|| recording.len());
            let engine = ReplayEngine::new_at_tick(recording, target)?;
            println!("{}", engine.game().snapshot().to_json()?);
            Ok(())
        }
    }
}

/// Print every tick, or only `tick` when given.
fn print_text_replay(mut engine: ReplayEngine, tick: Option<u64>) -> Result<(), CliError> {
    println!("Replay of map '{}'", engine.recording().descriptor.name);
    println!("Recorded ticks: {}", engine.recording().len());
    println!();

    if let Some(target) = tick {
        engine.jump_to(target)?;
        println!("{}", engine.render_ascii());
        return Ok(());
    }

    loop {
        println!("=== Tick {} ===", engine.tick());
        println!("{}", engine.render_ascii());
        println!();

        if engine.game().is_game_over() {
            println!("=== GAME OVER ===");
            break;
        }
        if engine.is_finished() {
            println!("=== END OF RECORDING ===");
            break;
        }
        engine.step_forward()?;
    }

    Ok(())
}
