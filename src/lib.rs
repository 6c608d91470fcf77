// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! DeepRTS: a deterministic, tick-driven real-time strategy simulation engine.
//!
//! This crate provides a headless RTS engine designed for:
//! - Bit-exact deterministic execution: the same commands from the same
//!   start always produce the same world
//! - Atomic steps: a faulty step is rolled back, never half applied
//! - Research use: batch simulation, replays and state snapshots
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │     CLI / Batch runner / Replay     │
//! ├─────────────────────────────────────┤
//! │   Game: commands, step, invariants  │
//! ├─────────────────────────────────────┤
//! │  Unit FSM · Combat · Pathfinder     │
//! ├─────────────────────────────────────┤
//! │  Tilemap · UnitManager · Players    │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use deeprts::{Command, Coord, Game, GameConfig, MapDescriptor};
//!
//! let descriptor = MapDescriptor::open(10, 10, vec![Coord::new(0, 0), Coord::new(9, 9)]);
//! let mut game = Game::new(descriptor, GameConfig::default())?;
//! game.step(&[])?;
//! let report = game.step(&[Command::Move { unit: 1, to: Coord::new(5, 0) }])?;
//! assert!(report.results[0].is_accepted());
//! # Ok::<(), deeprts::EngineError>(())
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod game;
pub mod replay;

pub use config::{GameConfig, UnitRegistry};
pub use error::{EngineError, EngineResult};

// Re-export key game types at crate root for convenience
pub use game::{
    Command, CommandResult, Coord, Game, MapDescriptor, Player, PlayerId, RejectReason, StateTag,
    StepReport, TerrainKind, Tilemap, Unit, UnitId, UnitKind, UnitState,
};
