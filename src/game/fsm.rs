//! Unit finite-state machine.
//!
//! Each [`UnitState`] variant carries its own working data. A transition runs
//! the old state's exit hook, swaps the state and runs the new state's enter
//! hook; the pair must appear in the legality table or the transition fails
//! with [`EngineError::InvariantViolation`].
//!
//! | from       | to                                         |
//! |------------|--------------------------------------------|
//! | Spawning   | Idle                                       |
//! | Idle       | Walking, Harvesting, Building, Combat      |
//! | Walking    | Idle, Walking (re-plan), Combat            |
//! | Harvesting | Idle, Combat                               |
//! | Building   | Idle                                       |
//! | Combat     | Idle                                       |
//! | Dead       | Despawned                                  |
//! | any alive  | Dead                                       |

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::GameConfig;
use crate::error::{EngineError, EngineResult};
use crate::game::combat;
use crate::game::{
    Capabilities, Coord, Direction, Pathfinder, Player, PlayerId, StepEvents, TILE_PROGRESS,
    Tilemap, Unit, UnitId, UnitKind, UnitManager,
};

/// Discriminant of a [`UnitState`], without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTag {
    /// Just created; becomes idle after the spawn duration.
    Spawning,
    /// Waiting for orders.
    Idle,
    /// Following a path.
    Walking,
    /// Gathering from an adjacent resource tile.
    Harvesting,
    /// Constructing a structure.
    Building,
    /// Attacking a target.
    Combat,
    /// Health reached zero; decaying.
    Dead,
    /// Terminal; removed at the end of the step.
    Despawned,
}

impl StateTag {
    /// All tags.
    pub const ALL: [StateTag; 8] = [
        StateTag::Spawning,
        StateTag::Idle,
        StateTag::Walking,
        StateTag::Harvesting,
        StateTag::Building,
        StateTag::Combat,
        StateTag::Dead,
        StateTag::Despawned,
    ];
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateTag::Spawning => "spawning",
            StateTag::Idle => "idle",
            StateTag::Walking => "walking",
            StateTag::Harvesting => "harvesting",
            StateTag::Building => "building",
            StateTag::Combat => "combat",
            StateTag::Dead => "dead",
            StateTag::Despawned => "despawned",
        };
        f.write_str(name)
    }
}

/// Active state of a unit together with the data that state works on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    /// Ticks spent spawning so far.
    Spawning {
        /// Ticks elapsed.
        elapsed: u32,
    },
    /// No work.
    Idle,
    /// Moving along `path` towards `goal`.
    Walking {
        /// Remaining tiles, next step first. The current tile is not included.
        path: VecDeque<Coord>,
        /// Final tile.
        goal: Coord,
        /// Accumulated progress towards the next tile.
        progress: u32,
    },
    /// Gathering from `tile`.
    Harvesting {
        /// Resource tile being harvested.
        tile: Coord,
        /// Ticks since the last harvest.
        timer: u32,
        /// Ticks since the order started.
        elapsed: u32,
    },
    /// Constructing a structure of `kind`.
    Building {
        /// What is being built.
        kind: UnitKind,
        /// Progress so far.
        progress: u32,
    },
    /// Attacking `target`.
    Combat {
        /// Unit being attacked.
        target: UnitId,
    },
    /// Dead and decaying.
    Dead {
        /// Tick the unit died in.
        since: u64,
    },
    /// Gone.
    Despawned,
}

impl UnitState {
    /// Tag of this state.
    #[must_use]
    pub const fn tag(&self) -> StateTag {
        match self {
            UnitState::Spawning { .. } => StateTag::Spawning,
            UnitState::Idle => StateTag::Idle,
            UnitState::Walking { .. } => StateTag::Walking,
            UnitState::Harvesting { .. } => StateTag::Harvesting,
            UnitState::Building { .. } => StateTag::Building,
            UnitState::Combat { .. } => StateTag::Combat,
            UnitState::Dead { .. } => StateTag::Dead,
            UnitState::Despawned => StateTag::Despawned,
        }
    }

    /// Walking state for a path that starts at the unit's own tile.
    #[must_use]
    pub fn walking(path: Vec<Coord>, goal: Coord) -> Self {
        UnitState::Walking {
            path: path.into_iter().skip(1).collect(),
            goal,
            progress: 0,
        }
    }
}

/// Whether `from -> to` is an allowed state change.
#[must_use]
pub const fn is_legal_transition(from: StateTag, to: StateTag) -> bool {
    match (from, to) {
        (StateTag::Dead | StateTag::Despawned, StateTag::Dead) => false,
        (_, StateTag::Dead)
        | (StateTag::Spawning, StateTag::Idle)
        | (
            StateTag::Idle,
            StateTag::Walking | StateTag::Harvesting | StateTag::Building | StateTag::Combat,
        )
        | (StateTag::Walking, StateTag::Idle | StateTag::Walking | StateTag::Combat)
        | (StateTag::Harvesting, StateTag::Idle | StateTag::Combat)
        | (StateTag::Building | StateTag::Combat, StateTag::Idle)
        | (StateTag::Dead, StateTag::Despawned) => true,
        _ => false,
    }
}

/// A state change observed during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Unit that changed state.
    pub unit: UnitId,
    /// Previous state.
    pub from: StateTag,
    /// New state.
    pub to: StateTag,
    /// Tick the change happened in.
    pub tick: u64,
}

/// Mutable view of the world handed to commands and state ticks.
///
/// The unit being processed is taken out of `units` for the duration.
#[derive(Debug)]
pub(crate) struct TickContext<'a> {
    pub(crate) map: &'a mut Tilemap,
    pub(crate) units: &'a mut UnitManager,
    pub(crate) players: &'a mut [Player],
    pub(crate) pathfinder: &'a mut Pathfinder,
    pub(crate) config: &'a GameConfig,
    pub(crate) events: &'a mut StepEvents,
    pub(crate) tick: u64,
}

impl TickContext<'_> {
    pub(crate) fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(usize::from(id).checked_sub(1)?)
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(usize::from(id).checked_sub(1)?)
    }
}

/// Move `unit` into `next`, running exit and enter hooks.
pub(crate) fn transition(
    unit: &mut Unit,
    next: UnitState,
    ctx: &mut TickContext<'_>,
) -> EngineResult<()> {
    let from = unit.tag();
    let to = next.tag();
    if !is_legal_transition(from, to) {
        return Err(EngineError::InvariantViolation(format!(
            "unit {} cannot go from {from} to {to}",
            unit.id
        )));
    }

    exit(unit, to);
    unit.state = next;
    enter(unit, ctx)?;

    ctx.events.transitions.push(Transition {
        unit: unit.id,
        from,
        to,
        tick: ctx.tick,
    });
    trace!(tick = ctx.tick, unit = unit.id, %from, %to, "state transition");
    Ok(())
}

fn exit(unit: &Unit, to: StateTag) {
    if let UnitState::Building { kind, progress } = &unit.state {
        if to == StateTag::Dead {
            trace!(unit = unit.id, %kind, progress, "construction abandoned");
        }
    }
}

fn enter(unit: &mut Unit, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let facing = match &unit.state {
        UnitState::Walking { path, .. } => path.front().copied(),
        UnitState::Harvesting { tile, .. } => Some(*tile),
        UnitState::Dead { .. } => {
            unit.health = 0;
            if ctx.map.occupant(unit.position) == Some(unit.id) {
                ctx.map.clear_occupant(unit.position)?;
            }
            if let Some(owner) = ctx.player_mut(unit.owner) {
                owner.stats.units_lost += 1;
            }
            None
        }
        _ => None,
    };
    if let Some(direction) = facing.and_then(|c| Direction::towards(unit.position, c)) {
        unit.direction = direction;
    }
    Ok(())
}

/// Advance `unit` by one tick in its current state.
pub(crate) fn tick(unit: &mut Unit, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    match unit.state {
        UnitState::Spawning { .. } => tick_spawning(unit, ctx),
        UnitState::Idle | UnitState::Dead { .. } | UnitState::Despawned => Ok(()),
        UnitState::Walking { .. } => tick_walking(unit, ctx),
        UnitState::Harvesting { .. } => tick_harvesting(unit, ctx),
        UnitState::Building { .. } => tick_building(unit, ctx),
        UnitState::Combat { .. } => combat::tick_combat(unit, ctx),
    }
}

fn tick_spawning(unit: &mut Unit, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let duration = ctx.config.unit_type(unit.kind).spawn_duration;
    let UnitState::Spawning { elapsed } = &mut unit.state else {
        return Ok(());
    };
    *elapsed += 1;
    if *elapsed >= duration {
        transition(unit, UnitState::Idle, ctx)?;
    }
    Ok(())
}

fn tick_walking(unit: &mut Unit, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let unit_type = ctx.config.unit_type(unit.kind);
    let (speed, flying) = (unit_type.speed, unit_type.flying);

    if let UnitState::Walking { progress, .. } = &mut unit.state {
        *progress = progress.saturating_add(speed);
    }

    loop {
        let UnitState::Walking {
            path,
            goal,
            progress,
        } = &mut unit.state
        else {
            return Ok(());
        };
        let goal = *goal;
        let Some(&next) = path.front() else {
            return transition(unit, UnitState::Idle, ctx);
        };
        if *progress < TILE_PROGRESS {
            return Ok(());
        }
        if !flying && !ctx.map.is_walkable(next) {
            return replan(unit, goal, ctx);
        }

        *progress -= TILE_PROGRESS;
        path.pop_front();
        let arrived = path.is_empty();

        let from = unit.position;
        if !flying {
            ctx.map.clear_occupant(from)?;
            ctx.map.set_occupant(next, unit.id)?;
        }
        unit.position = next;
        if let Some(direction) = Direction::towards(from, next) {
            unit.direction = direction;
        }

        if arrived {
            return transition(unit, UnitState::Idle, ctx);
        }
    }
}

fn replan(unit: &mut Unit, goal: Coord, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let caps = Capabilities {
        flying: ctx.config.unit_type(unit.kind).flying,
    };
    match ctx.pathfinder.find_path(ctx.map, unit.position, goal, caps) {
        Ok(path) => transition(unit, UnitState::walking(path, goal), ctx),
        Err(EngineError::Unreachable { .. }) => {
            trace!(unit = unit.id, %goal, "path blocked, giving up");
            transition(unit, UnitState::Idle, ctx)
        }
        Err(err) => Err(err),
    }
}

fn tick_harvesting(unit: &mut Unit, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let unit_type = ctx.config.unit_type(unit.kind);
    let (amount, interval, duration) = (
        unit_type.harvest_amount,
        unit_type.harvest_interval.max(1),
        unit_type.harvest_duration,
    );

    let UnitState::Harvesting {
        tile,
        timer,
        elapsed,
    } = &mut unit.state
    else {
        return Ok(());
    };
    let tile = *tile;
    *timer += 1;
    *elapsed += 1;
    let harvest_now = *timer >= interval;
    if harvest_now {
        *timer = 0;
    }
    let expired = *elapsed >= duration;

    if harvest_now {
        let kind = ctx.map.tile_at(tile)?.deposit.map(|d| d.kind);
        let granted = ctx.map.harvest(tile, amount)?;
        if let Some(kind) = kind.filter(|_| granted > 0) {
            if let Some(owner) = ctx.player_mut(unit.owner) {
                owner.credit(kind, granted);
                let gathered = owner.stats.gathered.get_mut(kind);
                *gathered = gathered.saturating_add(granted);
            }
        }
    }

    if expired || !ctx.map.tile_at(tile)?.is_harvestable() {
        transition(unit, UnitState::Idle, ctx)?;
    }
    Ok(())
}

fn tick_building(unit: &mut Unit, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let config = ctx.config;
    let rate = config.unit_type(unit.kind).build_rate;
    let UnitState::Building { kind, progress } = &mut unit.state else {
        return Ok(());
    };
    let kind = *kind;
    let required = config.unit_type(kind).build_time;
    *progress = progress.saturating_add(rate).min(required);
    if *progress < required {
        return Ok(());
    }
    complete_building(unit, kind, ctx)
}

/// Finish construction: the builder steps onto the first free neighbour and
/// the structure appears on the builder's old tile. Without a free
/// neighbour the builder keeps waiting at full progress.
fn complete_building(
    unit: &mut Unit,
    kind: UnitKind,
    ctx: &mut TickContext<'_>,
) -> EngineResult<()> {
    let config = ctx.config;
    let site = unit.position;
    let flying = config.unit_type(unit.kind).flying;

    if flying && !ctx.map.is_walkable(site) {
        return Ok(());
    }
    let Some(free) = ctx
        .map
        .neighbors(site)
        .map(|(_, c)| c)
        .find(|&c| ctx.map.is_walkable(c))
    else {
        trace!(unit = unit.id, %kind, "no room to leave the construction site");
        return Ok(());
    };

    if !flying {
        ctx.map.clear_occupant(site)?;
        ctx.map.set_occupant(free, unit.id)?;
    }
    unit.position = free;
    if let Some(direction) = Direction::towards(site, free) {
        unit.direction = direction;
    }

    let id = ctx
        .units
        .spawn(kind, unit.owner, site, ctx.map, &config.units)?;
    if let Some(owner) = ctx.player_mut(unit.owner) {
        owner.units.insert(id);
        owner.stats.units_created += 1;
    }
    ctx.events.spawned.push(id);
    trace!(builder = unit.id, structure = id, %kind, %site, "construction finished");

    transition(unit, UnitState::Idle, ctx)
}

/// Despawn `unit` once it has been dead for `decay_ticks` ticks, counting
/// the tick it died in. Runs after every unit has ticked, so the count does
/// not depend on who killed whom first.
pub(crate) fn decay(unit: &mut Unit, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let UnitState::Dead { since } = unit.state else {
        return Ok(());
    };
    let dead_for = ctx.tick.saturating_sub(since) + 1;
    if dead_for >= u64::from(ctx.config.decay_ticks) {
        transition(unit, UnitState::Despawned, ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        assert!(is_legal_transition(StateTag::Spawning, StateTag::Idle));
        assert!(is_legal_transition(StateTag::Idle, StateTag::Walking));
        assert!(is_legal_transition(StateTag::Walking, StateTag::Walking));
        assert!(is_legal_transition(StateTag::Harvesting, StateTag::Combat));
        assert!(is_legal_transition(StateTag::Building, StateTag::Dead));
        assert!(is_legal_transition(StateTag::Dead, StateTag::Despawned));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!is_legal_transition(StateTag::Spawning, StateTag::Walking));
        assert!(!is_legal_transition(StateTag::Idle, StateTag::Idle));
        assert!(!is_legal_transition(StateTag::Building, StateTag::Walking));
        assert!(!is_legal_transition(StateTag::Dead, StateTag::Idle));
        assert!(!is_legal_transition(StateTag::Dead, StateTag::Dead));
        assert!(!is_legal_transition(StateTag::Idle, StateTag::Despawned));
    }

    #[test]
    fn test_despawned_is_terminal() {
        for to in StateTag::ALL {
            assert!(!is_legal_transition(StateTag::Despawned, to));
        }
    }

    #[test]
    fn test_every_live_state_can_die() {
        for from in StateTag::ALL {
            let alive = !matches!(from, StateTag::Dead | StateTag::Despawned);
            assert_eq!(is_legal_transition(from, StateTag::Dead), alive, "{from}");
        }
    }

    #[test]
    fn test_walking_skips_current_tile() {
        let path = vec![Coord::new(0, 0), Coord::new(1, 1), Coord::new(2, 2)];
        let state = UnitState::walking(path, Coord::new(2, 2));
        let UnitState::Walking { path, .. } = state else {
            panic!("expected walking");
        };
        assert_eq!(path.front(), Some(&Coord::new(1, 1)));
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_state_json_is_tagged() {
        let json = serde_json::to_string(&UnitState::Combat { target: 4 }).unwrap();
        assert_eq!(json, r#"{"state":"combat","target":4}"#);
    }
}
