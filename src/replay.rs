//! Game recording and replay.
//!
//! Because games are fully deterministic, a replay needs only:
//! - the map descriptor,
//! - the game configuration,
//! - the command list submitted at every tick.
//!
//! No state deltas are stored. To view tick N, re-run the simulation from
//! tick 0 to N.
//!
//! # Time Travel
//!
//! - **Forward**: Continue stepping the simulation
//! - **Backward**: Re-run from tick 0 to (`current_tick` - 1)
//! - **Jump to tick N**: Re-run from tick 0 to N

mod render;

pub use render::render_ascii;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::GameConfig;
use crate::error::{EngineError, EngineResult};
use crate::game::{Command, Game, MapDescriptor, StepReport};

/// Everything needed to reproduce a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    /// Map the game was played on.
    pub descriptor: MapDescriptor,
    /// Rules the game was played with.
    #[serde(default)]
    pub config: GameConfig,
    /// Commands submitted at each tick; index `i` holds the commands of the
    /// step that advanced tick `i` to `i + 1`.
    pub ticks: Vec<Vec<Command>>,
}

impl Recording {
    /// Create an empty recording.
    #[must_use]
    pub const fn new(descriptor: MapDescriptor, config: GameConfig) -> Self {
        Self {
            descriptor,
            config,
            ticks: Vec::new(),
        }
    }

    /// Number of recorded ticks.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.ticks.len() as u64
    }

    /// Whether no ticks are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Save recording to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file operations fail.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load recording from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or holds an
    /// invalid map.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let recording: Self = serde_json::from_str(&json)?;
        recording.descriptor.validate()?;
        Ok(recording)
    }
}

/// Error type for replay operations.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The engine rejected the recording.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Tick number out of bounds.
    #[error("tick {requested} out of bounds (max: {max_tick})")]
    TickOutOfBounds {
        /// Requested tick.
        requested: u64,
        /// Last reachable tick.
        max_tick: u64,
    },
}

/// Plays a game while recording every accepted step.
#[derive(Debug)]
pub struct Recorder {
    game: Game,
    recording: Recording,
}

impl Recorder {
    /// Start a new recorded game.
    ///
    /// # Errors
    ///
    /// Same as [`Game::new`].
    pub fn new(descriptor: MapDescriptor, config: GameConfig) -> EngineResult<Self> {
        let game = Game::new(descriptor.clone(), config.clone())?;
        Ok(Self {
            game,
            recording: Recording::new(descriptor, config),
        })
    }

    /// Step the game and record the commands if the step succeeds.
    ///
    /// # Errors
    ///
    /// Same as [`Game::step`]; failed steps are not recorded.
    pub fn step(&mut self, commands: Vec<Command>) -> EngineResult<StepReport> {
        let report = self.game.step(&commands)?;
        self.recording.ticks.push(commands);
        Ok(report)
    }

    /// The live game.
    #[must_use]
    pub const fn game(&self) -> &Game {
        &self.game
    }

    /// Finish and return the recording.
    #[must_use]
    pub fn into_recording(self) -> Recording {
        self.recording
    }
}

/// Replay engine - steps through a recording deterministically.
///
/// Since games are deterministic, this engine can:
/// - Step forward by executing one recorded tick
/// - Step backward by replaying from tick 0
/// - Jump to any tick by replaying from tick 0
#[derive(Debug)]
pub struct ReplayEngine {
    recording: Recording,
    game: Game,
}

impl ReplayEngine {
    /// Create a new replay engine from a recording, at tick 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorded map or config is invalid.
    pub fn new(recording: Recording) -> Result<Self, ReplayError> {
        let game = Game::new(recording.descriptor.clone(), recording.config.clone())?;
        Ok(Self { recording, game })
    }

    /// Create a replay engine positioned at `tick`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tick is out of range or replay fails.
    pub fn new_at_tick(recording: Recording, tick: u64) -> Result<Self, ReplayError> {
        let mut engine = Self::new(recording)?;
        engine.jump_to(tick)?;
        Ok(engine)
    }

    /// Get the recording.
    #[must_use]
    pub const fn recording(&self) -> &Recording {
        &self.recording
    }

    /// Current tick.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.game.tick()
    }

    /// Current game state.
    #[must_use]
    pub const fn game(&self) -> &Game {
        &self.game
    }

    /// Whether no further tick can be replayed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.game.is_game_over() || self.tick() >= self.recording.len()
    }

    /// Replay the next recorded tick.
    ///
    /// # Errors
    ///
    /// Returns an error at the end of the recording or if the engine
    /// refuses the step.
    pub fn step_forward(&mut self) -> Result<StepReport, ReplayError> {
        let tick = self.tick();
        let commands = usize::try_from(tick)
            .ok()
            .and_then(|idx| self.recording.ticks.get(idx))
            .ok_or(ReplayError::TickOutOfBounds {
                requested: tick + 1,
                max_tick: self.recording.len(),
            })?;
        Ok(self.game.step(commands)?)
    }

    /// Step backward one tick.
    ///
    /// This replays from tick 0 to (`current_tick` - 1).
    ///
    /// # Errors
    ///
    /// Returns an error if already at tick 0.
    pub fn step_backward(&mut self) -> Result<(), ReplayError> {
        let Some(target) = self.tick().checked_sub(1) else {
            return Err(ReplayError::TickOutOfBounds {
                requested: 0,
                max_tick: self.recording.len(),
            });
        };
        self.jump_to(target)
    }

    /// Jump to a specific tick.
    ///
    /// Moving backwards replays from tick 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the tick is beyond the recording or the game ended
    /// before reaching it.
    pub fn jump_to(&mut self, target: u64) -> Result<(), ReplayError> {
        if target > self.recording.len() {
            return Err(ReplayError::TickOutOfBounds {
                requested: target,
                max_tick: self.recording.len(),
            });
        }
        if target < self.tick() {
            self.game.reset();
        }
        while self.tick() < target {
            self.step_forward()?;
        }
        debug!(tick = target, "replay positioned");
        Ok(())
    }

    /// Render current state to ASCII for terminal viewing.
    #[must_use]
    pub fn render_ascii(&self) -> String {
        render_ascii(&self.game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Coord;
    use tempfile::NamedTempFile;

    fn recorded_game() -> Recording {
        let descriptor = MapDescriptor::open(8, 8, vec![Coord::new(0, 0), Coord::new(7, 7)]);
        let mut recorder = Recorder::new(descriptor, GameConfig::default()).unwrap();
        recorder.step(Vec::new()).unwrap();
        recorder
            .step(vec![Command::Move {
                unit: 1,
                to: Coord::new(4, 4),
            }])
            .unwrap();
        for _ in 0..4 {
            recorder.step(Vec::new()).unwrap();
        }
        recorder.into_recording()
    }

    #[test]
    fn test_recording_save_load_roundtrip() {
        let recording = recorded_game();
        let temp_file = NamedTempFile::new().unwrap();
        recording.save(temp_file.path()).unwrap();
        let loaded = Recording::load(temp_file.path()).unwrap();
        assert_eq!(loaded, recording);
        assert_eq!(loaded.len(), 6);
    }

    #[test]
    fn test_replay_matches_live_game() {
        let recording = recorded_game();
        let mut live = Game::new(recording.descriptor.clone(), recording.config.clone()).unwrap();
        for commands in &recording.ticks {
            live.step(commands).unwrap();
        }

        let replay = ReplayEngine::new_at_tick(recording, 6).unwrap();
        assert_eq!(replay.game().state_hash(), live.state_hash());
        assert_eq!(replay.game().unit(1).unwrap().position, Coord::new(4, 4));
        assert!(replay.is_finished());
    }

    #[test]
    fn test_time_travel() {
        let mut replay = ReplayEngine::new(recorded_game()).unwrap();
        replay.jump_to(4).unwrap();
        let at_four = replay.game().state_hash();

        replay.step_forward().unwrap();
        replay.step_backward().unwrap();
        assert_eq!(replay.tick(), 4);
        assert_eq!(replay.game().state_hash(), at_four);

        replay.jump_to(0).unwrap();
        assert!(matches!(
            replay.step_backward(),
            Err(ReplayError::TickOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_cannot_step_past_recording() {
        let mut replay = ReplayEngine::new_at_tick(recorded_game(), 6).unwrap();
        let err = replay.step_forward().unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
        assert!(replay.jump_to(7).is_err());
    }
}
