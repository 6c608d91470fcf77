//! Serializable copies of the simulation state.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::game::state::World;
use crate::game::{Game, Pathfinder, Player, PlayerId, Tilemap, UnitManager};

/// Full copy of the mutable simulation state at one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// Whether the game had ended.
    pub game_over: bool,
    /// Winner at that point.
    pub winner: Option<PlayerId>,
    /// Tilemap.
    pub map: Tilemap,
    /// Units.
    pub units: UnitManager,
    /// Players.
    pub players: Vec<Player>,
}

impl Snapshot {
    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Json`] if serialization fails.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Json`] if the JSON is malformed.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Game {
    /// Copy the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.world.tick,
            game_over: self.world.game_over,
            winner: self.world.winner,
            map: self.world.map.clone(),
            units: self.world.units.clone(),
            players: self.world.players.clone(),
        }
    }

    /// Replace the current state with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] and keeps the current
    /// state if the snapshot does not belong to this map or is inconsistent.
    pub fn restore(&mut self, snapshot: Snapshot) -> EngineResult<()> {
        let descriptor = self.descriptor();
        let expected_tiles = usize::from(descriptor.width) * usize::from(descriptor.height);
        if snapshot.map.width() != descriptor.width
            || snapshot.map.height() != descriptor.height
            || snapshot.map.tiles().len() != expected_tiles
            || snapshot.players.len() != descriptor.starts.len()
        {
            return Err(EngineError::InvariantViolation(
                "snapshot does not match this game's map".to_string(),
            ));
        }

        let restored = World {
            map: snapshot.map,
            units: snapshot.units,
            players: snapshot.players,
            pathfinder: Pathfinder::new(),
            tick: snapshot.tick,
            game_over: snapshot.game_over,
            winner: snapshot.winner,
        };
        let previous = std::mem::replace(&mut self.world, restored);
        if let Err(err) = self.verify() {
            self.world = previous;
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::{Command, Coord, MapDescriptor};

    fn game() -> Game {
        let descriptor = MapDescriptor::open(6, 6, vec![Coord::new(0, 0), Coord::new(5, 5)]);
        Game::new(descriptor, GameConfig::default()).unwrap()
    }

    #[test]
    fn test_restore_rewinds_state() {
        let mut game = game();
        game.step(&[]).unwrap();
        let snapshot = game.snapshot();
        let hash = game.state_hash();

        game.step(&[Command::Move {
            unit: 1,
            to: Coord::new(3, 0),
        }])
        .unwrap();
        assert_ne!(game.state_hash(), hash);

        game.restore(snapshot).unwrap();
        assert_eq!(game.state_hash(), hash);
        assert_eq!(game.tick(), 1);
    }

    #[test]
    fn test_snapshot_json() {
        let mut game = game();
        game.step(&[]).unwrap();
        let snapshot = game.snapshot();
        let parsed = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_rejects_foreign_snapshot() {
        let mut game = game();
        let other = Game::new(
            MapDescriptor::open(3, 3, vec![Coord::new(0, 0)]),
            GameConfig::default(),
        )
        .unwrap();
        let hash = game.state_hash();
        assert!(game.restore(other.snapshot()).is_err());
        assert_eq!(game.state_hash(), hash);
    }

    #[test]
    fn test_rejects_inconsistent_snapshot() {
        let mut game = game();
        let mut snapshot = game.snapshot();
        snapshot.players[0].units.clear();
        assert!(matches!(
            game.restore(snapshot),
            Err(EngineError::InvariantViolation(_))
        ));
    }
}
