//! Commands issued by agents and their validation.
//!
//! Commands are applied at the start of a step, in submission order, before
//! any unit ticks. A command that fails validation is rejected with a
//! [`RejectReason`] and has no effect; other commands in the same step are
//! unaffected.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::error::{EngineError, EngineResult};
use crate::game::fsm::{self, TickContext};
use crate::game::{
    Capabilities, Coord, PlayerId, ResourceKind, StateTag, Unit, UnitId, UnitKind, UnitState,
};

/// An order for the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Walk to a tile.
    Move {
        /// Unit to move.
        unit: UnitId,
        /// Destination.
        to: Coord,
    },
    /// Attack an enemy unit in range.
    Attack {
        /// Attacker.
        unit: UnitId,
        /// Victim.
        target: UnitId,
    },
    /// Harvest an adjacent resource tile.
    Harvest {
        /// Worker.
        unit: UnitId,
        /// Resource tile.
        at: Coord,
    },
    /// Construct a structure on the worker's tile.
    Build {
        /// Worker.
        unit: UnitId,
        /// Structure to build.
        kind: UnitKind,
    },
    /// Train a unit next to an idle structure that produces it.
    Spawn {
        /// Paying player.
        player: PlayerId,
        /// Kind to train.
        kind: UnitKind,
        /// Tile the new unit appears on.
        at: Coord,
    },
}

/// Why a command was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    /// No such unit.
    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),
    /// No such player.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    /// The player has already lost.
    #[error("player {0} is defeated")]
    PlayerDefeated(PlayerId),
    /// The command is not accepted in the unit's current state.
    #[error("unit {unit} cannot take this order while {state}")]
    IllegalState {
        /// Commanded unit.
        unit: UnitId,
        /// Its state.
        state: StateTag,
    },
    /// The unit is immobile.
    #[error("unit {0} cannot move")]
    CannotMove(UnitId),
    /// The unit has no attack.
    #[error("unit {0} cannot attack")]
    CannotAttack(UnitId),
    /// The unit cannot gather.
    #[error("unit {0} cannot harvest")]
    CannotHarvest(UnitId),
    /// The unit cannot construct this kind.
    #[error("unit {unit} cannot build {kind}")]
    CannotBuild {
        /// Commanded unit.
        unit: UnitId,
        /// Requested structure.
        kind: UnitKind,
    },
    /// The builder's tile cannot hold a structure.
    #[error("cannot build on {0}")]
    NotBuildable(Coord),
    /// No idle structure of the player next to the tile trains this kind.
    #[error("player {player} has no idle structure next to {at} that trains {kind}")]
    NoTrainer {
        /// Requesting player.
        player: PlayerId,
        /// Requested kind.
        kind: UnitKind,
        /// Requested tile.
        at: Coord,
    },
    /// Attack on an own unit.
    #[error("unit {unit} cannot attack friendly unit {target}")]
    FriendlyTarget {
        /// Attacker.
        unit: UnitId,
        /// Intended victim.
        target: UnitId,
    },
    /// Target is dead or despawning.
    #[error("unit {0} is not a valid target")]
    InvalidTarget(UnitId),
    /// Target exists but is beyond the attacker's range.
    #[error("unit {target} is out of range of unit {unit}")]
    TargetOutOfRange {
        /// Attacker.
        unit: UnitId,
        /// Intended victim.
        target: UnitId,
    },
    /// The tile has no resources left.
    #[error("tile {0} has nothing to harvest")]
    NotHarvestable(Coord),
    /// Harvesting needs an adjacent tile.
    #[error("unit {unit} is not adjacent to {at}")]
    NotAdjacent {
        /// Worker.
        unit: UnitId,
        /// Requested tile.
        at: Coord,
    },
    /// Coordinate outside the map.
    #[error("coordinate {0} is out of bounds")]
    OutOfBounds(Coord),
    /// No route to the destination.
    #[error("no path to {0}")]
    Unreachable(Coord),
    /// The owner cannot pay.
    #[error("insufficient {kind:?}: requested {requested}, available {available}")]
    InsufficientResources {
        /// Resource that ran short.
        kind: ResourceKind,
        /// Price.
        requested: u32,
        /// Balance.
        available: u32,
    },
    /// The spawn tile is unusable.
    #[error("cannot spawn at {0}")]
    InvalidSpawnLocation(Coord),
}

/// Outcome of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CommandResult {
    /// The command took effect.
    Accepted,
    /// The command was ignored.
    Rejected(RejectReason),
}

impl CommandResult {
    /// Whether the command took effect.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, CommandResult::Accepted)
    }
}

fn reject(reason: RejectReason) -> EngineError {
    EngineError::InvalidCommand(reason)
}

/// Map an error raised while validating a command to its rejection reason.
/// Errors that are not command-level faults pass through.
fn rejection(err: EngineError) -> EngineResult<RejectReason> {
    match err {
        EngineError::InvalidCommand(reason) => Ok(reason),
        EngineError::Unreachable { to, .. } => Ok(RejectReason::Unreachable(to)),
        EngineError::InsufficientResources {
            kind,
            requested,
            available,
        } => Ok(RejectReason::InsufficientResources {
            kind,
            requested,
            available,
        }),
        EngineError::InvalidSpawnLocation { coord } => {
            Ok(RejectReason::InvalidSpawnLocation(coord))
        }
        EngineError::OutOfBounds { coord } => Ok(RejectReason::OutOfBounds(coord)),
        other => Err(other),
    }
}

/// Validate and apply one command.
///
/// # Errors
///
/// Only internal faults are returned as errors; invalid commands come back
/// as [`CommandResult::Rejected`].
pub(crate) fn apply(
    command: &Command,
    ctx: &mut TickContext<'_>,
) -> EngineResult<CommandResult> {
    let outcome = match *command {
        Command::Move { unit, to } => with_unit(unit, ctx, |u, ctx| order_move(u, to, ctx)),
        Command::Attack { unit, target } => {
            with_unit(unit, ctx, |u, ctx| order_attack(u, target, ctx))
        }
        Command::Harvest { unit, at } => with_unit(unit, ctx, |u, ctx| order_harvest(u, at, ctx)),
        Command::Build { unit, kind } => with_unit(unit, ctx, |u, ctx| order_build(u, kind, ctx)),
        Command::Spawn { player, kind, at } => order_spawn(player, kind, at, ctx),
    };

    match outcome {
        Ok(()) => Ok(CommandResult::Accepted),
        Err(err) => {
            let reason = rejection(err)?;
            debug!(tick = ctx.tick, ?command, %reason, "command rejected");
            Ok(CommandResult::Rejected(reason))
        }
    }
}

fn with_unit(
    id: UnitId,
    ctx: &mut TickContext<'_>,
    order: impl FnOnce(&mut Unit, &mut TickContext<'_>) -> EngineResult<()>,
) -> EngineResult<()> {
    let mut unit = ctx
        .units
        .take(id)
        .ok_or_else(|| reject(RejectReason::UnknownUnit(id)))?;
    let result = order(&mut unit, ctx);
    ctx.units.restore(unit);
    result
}

fn require_state(unit: &Unit, allowed: &[StateTag]) -> EngineResult<()> {
    let state = unit.tag();
    if allowed.contains(&state) {
        Ok(())
    } else {
        Err(reject(RejectReason::IllegalState {
            unit: unit.id,
            state,
        }))
    }
}

fn order_move(unit: &mut Unit, to: Coord, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let unit_type = ctx.config.unit_type(unit.kind);
    if !unit_type.can_move() {
        return Err(reject(RejectReason::CannotMove(unit.id)));
    }
    require_state(unit, &[StateTag::Idle, StateTag::Walking])?;
    let caps = Capabilities {
        flying: unit_type.flying,
    };
    let path = ctx.pathfinder.find_path(ctx.map, unit.position, to, caps)?;

    if path.len() == 1 {
        if unit.tag() == StateTag::Walking {
            fsm::transition(unit, UnitState::Idle, ctx)?;
        }
        return Ok(());
    }

    if let UnitState::Walking { progress, .. } = unit.state {
        trace!(unit = unit.id, goal = %to, "re-routed");
        unit.state = UnitState::Walking {
            path: path.into_iter().skip(1).collect(),
            goal: to,
            progress,
        };
        return Ok(());
    }
    fsm::transition(unit, UnitState::walking(path, to), ctx)
}

fn order_attack(unit: &mut Unit, target: UnitId, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let unit_type = ctx.config.unit_type(unit.kind);
    if unit_type.attack == 0 {
        return Err(reject(RejectReason::CannotAttack(unit.id)));
    }
    require_state(unit, &[StateTag::Idle, StateTag::Combat])?;

    let friendly = RejectReason::FriendlyTarget {
        unit: unit.id,
        target,
    };
    if target == unit.id {
        return Err(reject(friendly));
    }
    let victim = ctx
        .units
        .get(target)
        .ok_or_else(|| reject(RejectReason::UnknownUnit(target)))?;
    if !victim.is_alive() {
        return Err(reject(RejectReason::InvalidTarget(target)));
    }
    if victim.owner == unit.owner {
        return Err(reject(friendly));
    }
    if unit.position.distance(victim.position) > unit_type.range {
        return Err(reject(RejectReason::TargetOutOfRange {
            unit: unit.id,
            target,
        }));
    }

    if unit.tag() == StateTag::Combat {
        unit.state = UnitState::Combat { target };
        return Ok(());
    }
    fsm::transition(unit, UnitState::Combat { target }, ctx)
}

fn order_harvest(unit: &mut Unit, at: Coord, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    if ctx.config.unit_type(unit.kind).harvest_amount == 0 {
        return Err(reject(RejectReason::CannotHarvest(unit.id)));
    }
    require_state(unit, &[StateTag::Idle])?;
    if !ctx.map.tile_at(at)?.is_harvestable() {
        return Err(reject(RejectReason::NotHarvestable(at)));
    }
    if !unit.position.is_adjacent(at) {
        return Err(reject(RejectReason::NotAdjacent { unit: unit.id, at }));
    }
    fsm::transition(
        unit,
        UnitState::Harvesting {
            tile: at,
            timer: 0,
            elapsed: 0,
        },
        ctx,
    )
}

fn order_build(unit: &mut Unit, kind: UnitKind, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let config = ctx.config;
    if !config.unit_type(unit.kind).builds.contains(&kind) {
        return Err(reject(RejectReason::CannotBuild {
            unit: unit.id,
            kind,
        }));
    }
    require_state(unit, &[StateTag::Idle])?;

    let site = unit.position;
    let taken = ctx.map.occupant(site).is_some_and(|id| id != unit.id);
    if taken || !ctx.map.tile_at(site)?.is_buildable() {
        return Err(reject(RejectReason::NotBuildable(site)));
    }

    let owner = unit.owner;
    ctx.player_mut(owner)
        .ok_or_else(|| reject(RejectReason::UnknownPlayer(owner)))?
        .pay(&config.unit_type(kind).cost)?;
    fsm::transition(unit, UnitState::Building { kind, progress: 0 }, ctx)
}

fn order_spawn(
    player: PlayerId,
    kind: UnitKind,
    at: Coord,
    ctx: &mut TickContext<'_>,
) -> EngineResult<()> {
    let config = ctx.config;
    let owner = ctx
        .player(player)
        .ok_or_else(|| reject(RejectReason::UnknownPlayer(player)))?;
    if owner.defeated {
        return Err(reject(RejectReason::PlayerDefeated(player)));
    }
    if !ctx.map.in_bounds(at) {
        return Err(EngineError::InvalidSpawnLocation { coord: at });
    }

    let trainer = ctx
        .units
        .units_of(player)
        .find(|u| {
            u.tag() == StateTag::Idle
                && u.position.is_adjacent(at)
                && config.unit_type(u.kind).trains.contains(&kind)
        })
        .map(|u| u.id)
        .ok_or_else(|| reject(RejectReason::NoTrainer { player, kind, at }))?;

    let unit_type = config.unit_type(kind);
    let placeable = unit_type.flying || ctx.map.is_walkable(at);
    if !placeable {
        return Err(EngineError::InvalidSpawnLocation { coord: at });
    }

    ctx.player_mut(player)
        .ok_or_else(|| reject(RejectReason::UnknownPlayer(player)))?
        .pay(&unit_type.cost)?;
    let id = ctx.units.spawn(kind, player, at, ctx.map, &config.units)?;
    if let Some(owner) = ctx.player_mut(player) {
        owner.units.insert(id);
        owner.stats.units_created += 1;
    }
    ctx.events.spawned.push(id);
    trace!(tick = ctx.tick, player, trainer, unit = id, %kind, %at, "unit trained");
    Ok(())
}
