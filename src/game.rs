//! Simulation core.
//!
//! - Tilemap with terrain, resource deposits and ground occupancy
//! - Cached A* pathfinding
//! - Units driven by a per-unit finite-state machine
//! - Players with resource banks and defeat tracking
//! - Commands, step execution and invariant checking

mod combat;
mod command;
mod descriptor;
mod fsm;
mod invariants;
mod map;
pub mod mapgen;
mod pathfinder;
mod player;
mod snapshot;
mod state;
mod unit;
mod units;

pub use combat::{acquire_target, damage, is_valid_target};
pub use command::{Command, CommandResult, RejectReason};
pub use descriptor::{DEFAULT_DEPOSITS, MapDescriptor};
pub use fsm::{StateTag, Transition, UnitState, is_legal_transition};
pub use invariants::{InvariantViolation, assert_invariants, check_invariants};
pub use map::{
    Coord, Deposit, Direction, ResourceKind, Resources, TerrainKind, Tile, Tilemap,
};
pub use mapgen::generate_map;
pub use pathfinder::{Capabilities, Pathfinder, find_path};
pub use player::{Player, PlayerId, PlayerStats};
pub use snapshot::Snapshot;
pub use state::{Game, MAX_PLAYERS, StepEvents, StepReport};
pub use unit::{TILE_PROGRESS, Target, Unit, UnitId, UnitKind, UnitType};
pub use units::{Region, UnitManager};
