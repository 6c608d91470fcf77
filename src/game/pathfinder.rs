//! A* search over the tilemap.
//!
//! Movement is 8-connected with unit step cost and a Chebyshev heuristic,
//! which is admissible and consistent for that cost model, so returned paths
//! are shortest. Ground units may not cut corners: a diagonal step needs
//! walkable terrain on both orthogonal tiles it passes. Ties on `f` are broken
//! by discovery order and neighbours expand in [`Direction::ALL`] order, so a
//! search is a pure function of the map and its endpoints.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{EngineError, EngineResult};
use crate::game::{Coord, Direction, Tilemap};

/// Movement capabilities that change what a search may cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    /// Ignore terrain and occupancy.
    pub flying: bool,
}

impl Capabilities {
    /// Ground movement.
    pub const GROUND: Self = Self { flying: false };
    /// Air movement.
    pub const AIR: Self = Self { flying: true };
}

fn passable(map: &Tilemap, coord: Coord, caps: Capabilities) -> bool {
    if caps.flying {
        map.in_bounds(coord)
    } else {
        map.is_walkable(coord)
    }
}

fn cuts_corner(map: &Tilemap, from: Coord, direction: Direction) -> bool {
    let (dx, dy) = direction.delta();
    let horizontal = from.x.checked_add_signed(dx).map(|x| Coord::new(x, from.y));
    let vertical = from.y.checked_add_signed(dy).map(|y| Coord::new(from.x, y));
    !(horizontal.is_some_and(|c| map.is_terrain_walkable(c))
        && vertical.is_some_and(|c| map.is_terrain_walkable(c)))
}

/// Shortest path from `start` to `goal`, both inclusive.
///
/// `start == goal` yields a single-element path. For ground units every tile
/// after `start` must be walkable now, so a goal occupied by another unit is
/// unreachable.
///
/// # Errors
///
/// Returns [`EngineError::OutOfBounds`] if either endpoint is off the map and
/// [`EngineError::Unreachable`] if no route exists.
pub fn find_path(
    map: &Tilemap,
    start: Coord,
    goal: Coord,
    caps: Capabilities,
) -> EngineResult<Vec<Coord>> {
    for coord in [start, goal] {
        if !map.in_bounds(coord) {
            return Err(EngineError::OutOfBounds { coord });
        }
    }
    if start == goal {
        return Ok(vec![start]);
    }
    let unreachable = EngineError::Unreachable {
        from: start,
        to: goal,
    };
    if !passable(map, goal, caps) {
        return Err(unreachable);
    }

    let width = usize::from(map.width());
    let index = |c: Coord| usize::from(c.y) * width + usize::from(c.x);
    let tiles = width * usize::from(map.height());

    let mut cost = vec![u32::MAX; tiles];
    let mut parent: Vec<Option<Coord>> = vec![None; tiles];
    let mut closed = vec![false; tiles];
    let mut open = BinaryHeap::new();
    let mut seq: u64 = 0;

    cost[index(start)] = 0;
    open.push(Reverse((start.distance(goal), seq, start)));

    while let Some(Reverse((_, _, current))) = open.pop() {
        let current_idx = index(current);
        if closed[current_idx] {
            continue;
        }
        closed[current_idx] = true;

        if current == goal {
            let mut path = vec![goal];
            let mut cursor = goal;
            while let Some(prev) = parent[index(cursor)] {
                path.push(prev);
                cursor = prev;
            }
            path.reverse();
            return Ok(path);
        }

        let next_cost = cost[current_idx] + 1;
        for (direction, next) in map.neighbors(current) {
            if !passable(map, next, caps) {
                continue;
            }
            if direction.is_diagonal() && !caps.flying && cuts_corner(map, current, direction) {
                continue;
            }
            let next_idx = index(next);
            if closed[next_idx] || next_cost >= cost[next_idx] {
                continue;
            }
            cost[next_idx] = next_cost;
            parent[next_idx] = Some(current);
            seq += 1;
            open.push(Reverse((next_cost + next.distance(goal), seq, next)));
        }
    }

    Err(unreachable)
}

/// Path search with a result cache.
///
/// Entries are valid for a single [`Tilemap::version`]; the cache is dropped
/// wholesale when the map changes. Unreachable results are cached too.
#[derive(Debug, Clone, Default)]
pub struct Pathfinder {
    version: u64,
    cache: HashMap<(Coord, Coord, Capabilities), Option<Vec<Coord>>>,
    hits: u64,
    misses: u64,
}

impl Pathfinder {
    /// Create an empty pathfinder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached [`find_path`].
    ///
    /// # Errors
    ///
    /// Same as [`find_path`].
    pub fn find_path(
        &mut self,
        map: &Tilemap,
        start: Coord,
        goal: Coord,
        caps: Capabilities,
    ) -> EngineResult<Vec<Coord>> {
        if map.version() != self.version {
            self.cache.clear();
            self.version = map.version();
        }

        let key = (start, goal, caps);
        if let Some(cached) = self.cache.get(&key) {
            self.hits += 1;
            return cached.clone().ok_or(EngineError::Unreachable {
                from: start,
                to: goal,
            });
        }

        self.misses += 1;
        match find_path(map, start, goal, caps) {
            Ok(path) => {
                self.cache.insert(key, Some(path.clone()));
                Ok(path)
            }
            Err(err @ EngineError::Unreachable { .. }) => {
                self.cache.insert(key, None);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of searches answered from the cache.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of searches that ran A*.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }
}
