//! Units and unit-type descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::{Coord, Direction, PlayerId, Resources, StateTag, UnitState};

/// Unique identifier for a unit. Ids are never reused within a game.
pub type UnitId = u32;

/// Catalogue of unit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Worker: harvests and constructs.
    Peasant,
    /// Melee infantry.
    Footman,
    /// Ranged infantry.
    Archer,
    /// Main structure; trains peasants.
    TownHall,
    /// Military structure; trains footmen and archers.
    Barracks,
    /// Support structure.
    Farm,
}

impl UnitKind {
    /// All kinds.
    pub const ALL: [UnitKind; 6] = [
        UnitKind::Peasant,
        UnitKind::Footman,
        UnitKind::Archer,
        UnitKind::TownHall,
        UnitKind::Barracks,
        UnitKind::Farm,
    ];
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitKind::Peasant => "peasant",
            UnitKind::Footman => "footman",
            UnitKind::Archer => "archer",
            UnitKind::TownHall => "town_hall",
            UnitKind::Barracks => "barracks",
            UnitKind::Farm => "farm",
        };
        f.write_str(name)
    }
}

/// Progress units per tile. A unit with `speed == TILE_PROGRESS` crosses one
/// tile per tick.
pub const TILE_PROGRESS: u32 = 1000;

/// Static description of a unit kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitType {
    /// Health at spawn.
    pub max_health: u32,
    /// Damage dealt per tick in combat before defense.
    pub attack: u32,
    /// Damage absorbed per hit.
    pub defense: u32,
    /// Attack reach in tiles (Chebyshev).
    pub range: u32,
    /// Walking speed in progress units per tick; zero means immobile.
    pub speed: u32,
    /// Structures never move and are produced by building.
    pub structure: bool,
    /// Flying units ignore terrain and never occupy tiles.
    pub flying: bool,
    /// Construction progress contributed per tick while building.
    pub build_rate: u32,
    /// Progress needed to finish this kind when it is being built.
    pub build_time: u32,
    /// Amount taken from a deposit per harvest.
    pub harvest_amount: u32,
    /// Ticks between harvests.
    pub harvest_interval: u32,
    /// Ticks a single harvest order lasts.
    pub harvest_duration: u32,
    /// Ticks spent in `Spawning`.
    pub spawn_duration: u32,
    /// Price paid by the owner.
    pub cost: Resources,
    /// Structures this unit can build.
    #[serde(default)]
    pub builds: Vec<UnitKind>,
    /// Units this structure can train.
    #[serde(default)]
    pub trains: Vec<UnitKind>,
}

impl UnitType {
    /// Default peasant.
    #[must_use]
    pub fn peasant() -> Self {
        Self {
            max_health: 30,
            attack: 2,
            defense: 0,
            range: 1,
            speed: TILE_PROGRESS,
            structure: false,
            flying: false,
            build_rate: 10,
            build_time: 0,
            harvest_amount: 10,
            harvest_interval: 1,
            harvest_duration: 20,
            spawn_duration: 1,
            cost: Resources::new(50, 0, 0),
            builds: vec![UnitKind::TownHall, UnitKind::Barracks, UnitKind::Farm],
            trains: Vec::new(),
        }
    }

    /// Default footman.
    #[must_use]
    pub fn footman() -> Self {
        Self {
            max_health: 60,
            attack: 6,
            defense: 2,
            cost: Resources::new(60, 10, 0),
            builds: Vec::new(),
            harvest_amount: 0,
            harvest_duration: 0,
            build_rate: 0,
            ..Self::peasant()
        }
    }

    /// Default archer.
    #[must_use]
    pub fn archer() -> Self {
        Self {
            max_health: 40,
            attack: 5,
            range: 4,
            cost: Resources::new(50, 30, 0),
            ..Self::footman()
        }
    }

    fn structure(max_health: u32, defense: u32, build_time: u32, cost: Resources) -> Self {
        Self {
            max_health,
            attack: 0,
            defense,
            range: 0,
            speed: 0,
            structure: true,
            flying: false,
            build_rate: 0,
            build_time,
            harvest_amount: 0,
            harvest_interval: 1,
            harvest_duration: 0,
            spawn_duration: 1,
            cost,
            builds: Vec::new(),
            trains: Vec::new(),
        }
    }

    /// Default town hall.
    #[must_use]
    pub fn town_hall() -> Self {
        Self {
            trains: vec![UnitKind::Peasant],
            ..Self::structure(1200, 5, 200, Resources::new(300, 200, 0))
        }
    }

    /// Default barracks.
    #[must_use]
    pub fn barracks() -> Self {
        Self {
            trains: vec![UnitKind::Footman, UnitKind::Archer],
            ..Self::structure(800, 4, 150, Resources::new(200, 100, 0))
        }
    }

    /// Default farm.
    #[must_use]
    pub fn farm() -> Self {
        Self::structure(400, 2, 100, Resources::new(80, 60, 20))
    }

    /// Whether this kind can walk.
    #[must_use]
    pub const fn can_move(&self) -> bool {
        self.speed > 0 && !self.structure
    }
}

/// What a unit is currently acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Another unit (combat).
    Unit(UnitId),
    /// A tile (walking goal or harvest site).
    Tile(Coord),
}

/// A simulated entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Unique id.
    pub id: UnitId,
    /// Kind; stats come from the registry.
    pub kind: UnitKind,
    /// Owning player.
    pub owner: PlayerId,
    /// Current tile.
    pub position: Coord,
    /// Facing.
    pub direction: Direction,
    /// Current health; zero once dead.
    pub health: u32,
    /// Active state and its working data.
    pub state: UnitState,
}

impl Unit {
    /// Create a unit in the `Spawning` state at full health.
    #[must_use]
    pub fn new(
        id: UnitId,
        kind: UnitKind,
        owner: PlayerId,
        position: Coord,
        unit_type: &UnitType,
    ) -> Self {
        Self {
            id,
            kind,
            owner,
            position,
            direction: Direction::default(),
            health: unit_type.max_health,
            state: UnitState::Spawning { elapsed: 0 },
        }
    }

    /// Tag of the active state.
    #[must_use]
    pub fn tag(&self) -> StateTag {
        self.state.tag()
    }

    /// Whether the unit is neither dead nor despawned.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !matches!(self.tag(), StateTag::Dead | StateTag::Despawned)
    }

    /// Current target, derived from the active state.
    #[must_use]
    pub fn target(&self) -> Option<Target> {
        match &self.state {
            UnitState::Combat { target } => Some(Target::Unit(*target)),
            UnitState::Walking { goal, .. } => Some(Target::Tile(*goal)),
            UnitState::Harvesting { tile, .. } => Some(Target::Tile(*tile)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unit_is_spawning() {
        let unit = Unit::new(1, UnitKind::Peasant, 1, Coord::new(2, 3), &UnitType::peasant());
        assert_eq!(unit.tag(), StateTag::Spawning);
        assert_eq!(unit.health, 30);
        assert!(unit.is_alive());
        assert_eq!(unit.target(), None);
    }

    #[test]
    fn test_structures_cannot_move() {
        assert!(!UnitType::town_hall().can_move());
        assert!(!UnitType::farm().can_move());
        assert!(UnitType::peasant().can_move());
    }

    #[test]
    fn test_archer_outranges_footman() {
        assert!(UnitType::archer().range > UnitType::footman().range);
        assert!(UnitType::footman().builds.is_empty());
    }

    #[test]
    fn test_combat_target() {
        let mut unit = Unit::new(1, UnitKind::Footman, 1, Coord::new(0, 0), &UnitType::footman());
        unit.state = UnitState::Combat { target: 9 };
        assert_eq!(unit.target(), Some(Target::Unit(9)));
    }
}
