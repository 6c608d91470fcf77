//! Error types for the simulation engine.

use thiserror::Error;

use crate::game::{Coord, RejectReason, ResourceKind};

/// Errors raised by engine operations.
///
/// Spatial and FSM errors hit during a unit's own tick are absorbed by the
/// state machine and never surface from [`crate::Game::step`]. Command errors
/// are reported per command. Everything else aborts the step.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Coordinate outside the tilemap.
    #[error("coordinate {coord} is out of bounds")]
    OutOfBounds {
        /// The offending coordinate.
        coord: Coord,
    },
    /// A ground unit already occupies the tile.
    #[error("tile {coord} is already occupied")]
    TileOccupied {
        /// The contested tile.
        coord: Coord,
    },
    /// No walkable route exists.
    #[error("no path from {from} to {to}")]
    Unreachable {
        /// Search origin.
        from: Coord,
        /// Search goal.
        to: Coord,
    },
    /// A command targeted a missing id or is illegal in the current state.
    #[error("invalid command: {0}")]
    InvalidCommand(RejectReason),
    /// Spawn target tile is not walkable or out of bounds.
    #[error("cannot spawn at {coord}")]
    InvalidSpawnLocation {
        /// The requested spawn tile.
        coord: Coord,
    },
    /// A debit exceeded the available balance.
    #[error("insufficient {kind:?}: requested {requested}, available {available}")]
    InsufficientResources {
        /// Resource that ran short.
        kind: ResourceKind,
        /// Amount requested.
        requested: u32,
        /// Amount available.
        available: u32,
    },
    /// Malformed map descriptor.
    #[error("map load error: {0}")]
    MapLoad(String),
    /// An internal invariant was broken; the step was rolled back.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// The game already has a result.
    #[error("game is over")]
    GameOver,
    /// Filesystem failure while loading or saving.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON encoding or decoding failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::OutOfBounds {
            coord: Coord::new(12, 3),
        };
        assert_eq!(err.to_string(), "coordinate (12, 3) is out of bounds");

        let err = EngineError::InsufficientResources {
            kind: ResourceKind::Gold,
            requested: 50,
            available: 10,
        };
        assert!(err.to_string().contains("requested 50"));
    }

    #[test]
    fn test_invalid_command_display() {
        let err = EngineError::InvalidCommand(RejectReason::UnknownUnit(7));
        assert!(err.to_string().contains("unit 7"));
    }
}
