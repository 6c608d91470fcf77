//! Map and tile types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::game::UnitId;

/// A coordinate on the map.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Coord {
    /// X coordinate (column).
    pub x: u16,
    /// Y coordinate (row).
    pub y: u16,
}

impl Coord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance: the number of 8-connected steps between two tiles
    /// on an open map.
    #[must_use]
    pub fn distance(self, other: Coord) -> u32 {
        let dx = u32::from(self.x.abs_diff(other.x));
        let dy = u32::from(self.y.abs_diff(other.y));
        dx.max(dy)
    }

    /// Whether `other` is one of the eight surrounding tiles.
    #[must_use]
    pub fn is_adjacent(self, other: Coord) -> bool {
        self.distance(other) == 1
    }

    /// The coordinate one step away in `direction`, if it stays inside a
    /// `width` x `height` grid.
    #[must_use]
    pub fn step(self, direction: Direction, width: u16, height: u16) -> Option<Coord> {
        let (dx, dy) = direction.delta();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        (x < width && y < height).then_some(Coord::new(x, y))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Facing / step direction.
///
/// The declaration order is the neighbour expansion order used everywhere a
/// deterministic scan over neighbours is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards y - 1.
    #[default]
    North,
    /// Towards y + 1.
    South,
    /// Towards x - 1.
    West,
    /// Towards x + 1.
    East,
    /// Towards (x - 1, y - 1).
    NorthWest,
    /// Towards (x + 1, y - 1).
    NorthEast,
    /// Towards (x - 1, y + 1).
    SouthWest,
    /// Towards (x + 1, y + 1).
    SouthEast,
}

impl Direction {
    /// All directions in expansion order.
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
        Direction::NorthWest,
        Direction::NorthEast,
        Direction::SouthWest,
        Direction::SouthEast,
    ];

    /// Offset as `(dx, dy)`.
    #[must_use]
    pub const fn delta(self) -> (i16, i16) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
            Direction::NorthWest => (-1, -1),
            Direction::NorthEast => (1, -1),
            Direction::SouthWest => (-1, 1),
            Direction::SouthEast => (1, 1),
        }
    }

    /// Whether this is a diagonal step.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        let (dx, dy) = self.delta();
        dx != 0 && dy != 0
    }

    /// Direction that points from `from` towards `to`, or `None` if equal.
    #[must_use]
    pub fn towards(from: Coord, to: Coord) -> Option<Direction> {
        let dx = i32::from(to.x) - i32::from(from.x);
        let dy = i32::from(to.y) - i32::from(from.y);
        let direction = match (dx.signum(), dy.signum()) {
            (0, -1) => Direction::North,
            (0, 1) => Direction::South,
            (-1, 0) => Direction::West,
            (1, 0) => Direction::East,
            (-1, -1) => Direction::NorthWest,
            (1, -1) => Direction::NorthEast,
            (-1, 1) => Direction::SouthWest,
            (1, 1) => Direction::SouthEast,
            _ => return None,
        };
        Some(direction)
    }
}

/// Kind of resource a tile can yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Mined from gold mines.
    Gold,
    /// Cut from forests.
    Lumber,
    /// Pumped from oil wells.
    Oil,
}

impl ResourceKind {
    /// All resource kinds.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Gold,
        ResourceKind::Lumber,
        ResourceKind::Oil,
    ];
}

/// A bundle of resource amounts, used both for balances and costs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(default)]
pub struct Resources {
    /// Gold amount.
    pub gold: u32,
    /// Lumber amount.
    pub lumber: u32,
    /// Oil amount.
    pub oil: u32,
}

impl Resources {
    /// Create a bundle.
    #[must_use]
    pub const fn new(gold: u32, lumber: u32, oil: u32) -> Self {
        Self {
            gold,
            lumber,
            oil,
        }
    }

    /// Amount of one resource.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Gold => self.gold,
            ResourceKind::Lumber => self.lumber,
            ResourceKind::Oil => self.oil,
        }
    }

    /// Mutable access to one resource.
    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut u32 {
        match kind {
            ResourceKind::Gold => &mut self.gold,
            ResourceKind::Lumber => &mut self.lumber,
            ResourceKind::Oil => &mut self.oil,
        }
    }

    /// First resource for which `self` cannot cover `cost`.
    #[must_use]
    pub fn shortfall(&self, cost: &Resources) -> Option<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .find(|&kind| self.get(kind) < cost.get(kind))
    }
}

/// Type of terrain on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainKind {
    /// Open ground.
    Grass,
    /// Impassable wall.
    Wall,
    /// Impassable water.
    Water,
    /// Trees; yields lumber.
    Forest,
    /// Gold mine; yields gold.
    GoldMine,
    /// Oil well; yields oil.
    Oil,
}

impl TerrainKind {
    /// Whether ground units can stand on this terrain.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, TerrainKind::Grass)
    }

    /// Whether structures can be raised on this terrain.
    #[must_use]
    pub const fn is_buildable(self) -> bool {
        matches!(self, TerrainKind::Grass)
    }

    /// The resource this terrain yields, if any.
    #[must_use]
    pub const fn resource(self) -> Option<ResourceKind> {
        match self {
            TerrainKind::Forest => Some(ResourceKind::Lumber),
            TerrainKind::GoldMine => Some(ResourceKind::Gold),
            TerrainKind::Oil => Some(ResourceKind::Oil),
            TerrainKind::Grass | TerrainKind::Wall | TerrainKind::Water => None,
        }
    }

    /// Character used in map descriptors.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            TerrainKind::Grass => '.',
            TerrainKind::Wall => '#',
            TerrainKind::Water => '~',
            TerrainKind::Forest => 'f',
            TerrainKind::GoldMine => 'g',
            TerrainKind::Oil => 'o',
        }
    }

    /// Parse a descriptor character.
    #[must_use]
    pub const fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' => Some(TerrainKind::Grass),
            '#' => Some(TerrainKind::Wall),
            '~' => Some(TerrainKind::Water),
            'f' => Some(TerrainKind::Forest),
            'g' => Some(TerrainKind::GoldMine),
            'o' => Some(TerrainKind::Oil),
            _ => None,
        }
    }
}

/// Harvestable payload of a resource tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Deposit {
    /// What the tile yields.
    pub kind: ResourceKind,
    /// What is left to harvest.
    pub remaining: u32,
}

/// A single tile on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    /// Type of terrain.
    pub terrain: TerrainKind,
    /// Resource payload (resource terrain only).
    pub deposit: Option<Deposit>,
    /// Ground unit standing here. Lookup only; the unit is owned elsewhere.
    pub occupant: Option<UnitId>,
}

impl Tile {
    /// Create a tile of the given terrain. Resource terrain gets a deposit of
    /// `amount`.
    #[must_use]
    pub fn new(terrain: TerrainKind, amount: u32) -> Self {
        Self {
            terrain,
            deposit: terrain.resource().map(|kind| Deposit {
                kind,
                remaining: amount,
            }),
            occupant: None,
        }
    }

    /// Open grass.
    #[must_use]
    pub fn grass() -> Self {
        Self::new(TerrainKind::Grass, 0)
    }

    /// Whether the terrain allows ground units (ignores occupancy).
    #[must_use]
    pub const fn is_terrain_walkable(&self) -> bool {
        self.terrain.is_walkable()
    }

    /// Whether a ground unit could enter now.
    #[must_use]
    pub const fn is_walkable(&self) -> bool {
        self.terrain.is_walkable() && self.occupant.is_none()
    }

    /// Whether a structure may be placed here. A builder standing on the
    /// tile does not count against it.
    #[must_use]
    pub const fn is_buildable(&self) -> bool {
        self.terrain.is_buildable() && self.deposit.is_none()
    }

    /// Whether this tile still has something to harvest.
    #[must_use]
    pub fn is_harvestable(&self) -> bool {
        self.deposit.is_some_and(|d| d.remaining > 0)
    }

    /// Take up to `amount` from the deposit. Returns the amount granted.
    ///
    /// A depleted tile reverts to grass.
    pub fn harvest(&mut self, amount: u32) -> u32 {
        let Some(deposit) = self.deposit.as_mut() else {
            return 0;
        };
        let granted = amount.min(deposit.remaining);
        deposit.remaining -= granted;
        if deposit.remaining == 0 {
            self.terrain = TerrainKind::Grass;
            self.deposit = None;
        }
        granted
    }
}

/// The game map.
///
/// Fixed in shape after construction; tile contents mutate. Every mutation
/// that can change walkability bumps [`Tilemap::version`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tilemap {
    /// Width of the map in tiles.
    width: u16,
    /// Height of the map in tiles.
    height: u16,
    /// Tiles stored in row-major order.
    tiles: Vec<Tile>,
    /// Player start locations, indexed by player id - 1.
    start_locations: Vec<Coord>,
    /// Bumped on every terrain or occupancy change.
    version: u64,
}

impl Tilemap {
    /// Create a map filled with grass.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MapLoad`] if width or height is zero.
    pub fn new(width: u16, height: u16) -> EngineResult<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::MapLoad(format!(
                "map dimensions must be non-zero, got {width}x{height}"
            )));
        }

        let size = usize::from(width) * usize::from(height);
        Ok(Self {
            width,
            height,
            tiles: vec![Tile::grass(); size],
            start_locations: Vec::new(),
            version: 0,
        })
    }

    /// Get the width of the map.
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Get the height of the map.
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Current map version.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Player start locations.
    #[must_use]
    pub fn start_locations(&self) -> &[Coord] {
        &self.start_locations
    }

    pub(crate) fn set_start_locations(&mut self, starts: Vec<Coord>) {
        self.start_locations = starts;
    }

    /// Raw tiles in row-major order.
    #[must_use]
    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Check if a coordinate is within the map bounds.
    #[must_use]
    pub const fn in_bounds(&self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    fn index(&self, coord: Coord) -> EngineResult<usize> {
        if self.in_bounds(coord) {
            Ok(usize::from(coord.y) * usize::from(self.width) + usize::from(coord.x))
        } else {
            Err(EngineError::OutOfBounds { coord })
        }
    }

    /// Get the tile at the given coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid.
    pub fn tile_at(&self, coord: Coord) -> EngineResult<&Tile> {
        let idx = self.index(coord)?;
        Ok(&self.tiles[idx])
    }

    fn tile_mut(&mut self, coord: Coord) -> EngineResult<&mut Tile> {
        let idx = self.index(coord)?;
        Ok(&mut self.tiles[idx])
    }

    /// Replace the terrain at `coord`, keeping any occupant.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid.
    pub fn set_terrain(
        &mut self,
        coord: Coord,
        terrain: TerrainKind,
        amount: u32,
    ) -> EngineResult<()> {
        let tile = self.tile_mut(coord)?;
        let occupant = tile.occupant;
        *tile = Tile::new(terrain, amount);
        tile.occupant = occupant;
        self.version += 1;
        Ok(())
    }

    /// Whether a ground unit could enter `coord` now. Out-of-bounds is never
    /// walkable.
    #[must_use]
    pub fn is_walkable(&self, coord: Coord) -> bool {
        self.tile_at(coord).is_ok_and(Tile::is_walkable)
    }

    /// Whether the terrain at `coord` allows ground units, ignoring occupancy.
    #[must_use]
    pub fn is_terrain_walkable(&self, coord: Coord) -> bool {
        self.tile_at(coord).is_ok_and(Tile::is_terrain_walkable)
    }

    /// Unit occupying `coord`, if any.
    #[must_use]
    pub fn occupant(&self, coord: Coord) -> Option<UnitId> {
        self.tile_at(coord).ok().and_then(|t| t.occupant)
    }

    /// Claim `coord` for `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid and
    /// [`EngineError::TileOccupied`] if another unit is there.
    pub fn set_occupant(&mut self, coord: Coord, unit: UnitId) -> EngineResult<()> {
        let tile = self.tile_mut(coord)?;
        if tile.occupant.is_some() {
            return Err(EngineError::TileOccupied { coord });
        }
        tile.occupant = Some(unit);
        self.version += 1;
        Ok(())
    }

    /// Release `coord`. Returns the previous occupant.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid.
    pub fn clear_occupant(&mut self, coord: Coord) -> EngineResult<Option<UnitId>> {
        let tile = self.tile_mut(coord)?;
        let previous = tile.occupant.take();
        if previous.is_some() {
            self.version += 1;
        }
        Ok(previous)
    }

    /// Harvest up to `amount` from the tile at `coord`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid.
    pub fn harvest(&mut self, coord: Coord, amount: u32) -> EngineResult<u32> {
        let tile = self.tile_mut(coord)?;
        let before = tile.terrain;
        let granted = tile.harvest(amount);
        if tile.terrain != before {
            self.version += 1;
        }
        Ok(granted)
    }

    /// In-bounds neighbours of `coord` in [`Direction::ALL`] order.
    pub fn neighbors(&self, coord: Coord) -> impl Iterator<Item = (Direction, Coord)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |d| coord.step(d, self.width, self.height).map(|c| (d, c)))
    }

    /// Iterate over all coordinates and tiles.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &Tile)> {
        let width = usize::from(self.width);
        self.tiles.iter().enumerate().map(move |(idx, tile)| {
            #[allow(clippy::cast_possible_truncation)]
            let coord = Coord::new((idx % width) as u16, (idx / width) as u16);
            (coord, tile)
        })
    }

    /// Remaining amount of `kind` over the whole map.
    #[must_use]
    pub fn total_remaining(&self, kind: ResourceKind) -> u64 {
        self.tiles
            .iter()
            .filter_map(|t| t.deposit)
            .filter(|d| d.kind == kind)
            .map(|d| u64::from(d.remaining))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_distance() {
        assert_eq!(Coord::new(0, 0).distance(Coord::new(9, 9)), 9);
        assert_eq!(Coord::new(3, 1).distance(Coord::new(1, 2)), 2);
        assert!(Coord::new(4, 4).is_adjacent(Coord::new(5, 5)));
        assert!(!Coord::new(4, 4).is_adjacent(Coord::new(4, 4)));
    }

    #[test]
    fn test_coord_step_corner() {
        let origin = Coord::new(0, 0);
        assert_eq!(origin.step(Direction::North, 10, 10), None);
        assert_eq!(origin.step(Direction::West, 10, 10), None);
        assert_eq!(origin.step(Direction::SouthEast, 10, 10), Some(Coord::new(1, 1)));
        assert_eq!(Coord::new(9, 9).step(Direction::East, 10, 10), None);
    }

    #[test]
    fn test_direction_towards() {
        let from = Coord::new(5, 5);
        assert_eq!(Direction::towards(from, Coord::new(5, 2)), Some(Direction::North));
        assert_eq!(Direction::towards(from, Coord::new(9, 9)), Some(Direction::SouthEast));
        assert_eq!(Direction::towards(from, from), None);
    }

    #[test]
    fn test_map_zero_size() {
        assert!(matches!(Tilemap::new(0, 10), Err(EngineError::MapLoad(_))));
        assert!(matches!(Tilemap::new(10, 0), Err(EngineError::MapLoad(_))));
    }

    #[test]
    fn test_tile_at_out_of_bounds() {
        let map = Tilemap::new(10, 10).unwrap();
        assert!(map.tile_at(Coord::new(9, 9)).is_ok());
        assert!(matches!(
            map.tile_at(Coord::new(10, 0)),
            Err(EngineError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_occupancy() {
        let mut map = Tilemap::new(4, 4).unwrap();
        let coord = Coord::new(1, 1);
        let version = map.version();

        map.set_occupant(coord, 7).unwrap();
        assert!(!map.is_walkable(coord));
        assert!(map.is_terrain_walkable(coord));
        assert!(map.version() > version);

        assert!(matches!(
            map.set_occupant(coord, 8),
            Err(EngineError::TileOccupied { .. })
        ));
        assert_eq!(map.clear_occupant(coord).unwrap(), Some(7));
        assert!(map.is_walkable(coord));
    }

    #[test]
    fn test_walls_not_walkable() {
        let mut map = Tilemap::new(4, 4).unwrap();
        map.set_terrain(Coord::new(2, 2), TerrainKind::Wall, 0).unwrap();
        assert!(!map.is_walkable(Coord::new(2, 2)));
        assert!(!map.is_walkable(Coord::new(4, 0)));
    }

    #[test]
    fn test_harvest_clamps_and_reverts() {
        let mut map = Tilemap::new(4, 4).unwrap();
        let mine = Coord::new(0, 0);
        map.set_terrain(mine, TerrainKind::GoldMine, 25).unwrap();
        assert!(!map.is_walkable(mine));

        assert_eq!(map.harvest(mine, 10).unwrap(), 10);
        assert_eq!(map.harvest(mine, 10).unwrap(), 10);
        let version = map.version();
        assert_eq!(map.harvest(mine, 10).unwrap(), 5);
        assert!(map.version() > version);

        let tile = map.tile_at(mine).unwrap();
        assert_eq!(tile.terrain, TerrainKind::Grass);
        assert!(tile.deposit.is_none());
        assert_eq!(map.harvest(mine, 10).unwrap(), 0);
    }

    #[test]
    fn test_neighbors_order() {
        let map = Tilemap::new(3, 3).unwrap();
        let around: Vec<_> = map.neighbors(Coord::new(1, 1)).map(|(_, c)| c).collect();
        assert_eq!(around.len(), 8);
        assert_eq!(around[0], Coord::new(1, 0));
        assert_eq!(around[7], Coord::new(2, 2));
        assert_eq!(map.neighbors(Coord::new(0, 0)).count(), 3);
    }

    #[test]
    fn test_resources_shortfall() {
        let balance = Resources::new(100, 20, 0);
        assert_eq!(balance.shortfall(&Resources::new(50, 20, 0)), None);
        assert_eq!(
            balance.shortfall(&Resources::new(50, 30, 0)),
            Some(ResourceKind::Lumber)
        );
    }

    #[test]
    fn test_buildable_terrain() {
        let mut map = Tilemap::new(3, 1).unwrap();
        map.set_terrain(Coord::new(1, 0), TerrainKind::Oil, 40).unwrap();
        map.set_terrain(Coord::new(2, 0), TerrainKind::Water, 0).unwrap();
        map.set_occupant(Coord::new(0, 0), 1).unwrap();

        assert!(map.tile_at(Coord::new(0, 0)).unwrap().is_buildable());
        assert!(!map.tile_at(Coord::new(1, 0)).unwrap().is_buildable());
        assert!(!map.tile_at(Coord::new(2, 0)).unwrap().is_buildable());
        assert_eq!(TerrainKind::from_symbol('o'), Some(TerrainKind::Oil));
        assert_eq!(TerrainKind::Oil.resource(), Some(ResourceKind::Oil));
    }
}
