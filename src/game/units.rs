//! Ownership of all units.
//!
//! The manager is the single owner of every [`Unit`]. Other parts of the
//! engine (tiles, players, combat states) refer to units by [`UnitId`] only.
//! Iteration is always in ascending id order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::UnitRegistry;
use crate::error::{EngineError, EngineResult};
use crate::game::{Coord, PlayerId, RejectReason, StateTag, Tilemap, Unit, UnitId, UnitKind};

/// Inclusive rectangle of tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Top-left corner.
    pub min: Coord,
    /// Bottom-right corner.
    pub max: Coord,
}

impl Region {
    /// Square of Chebyshev `radius` around `center`, clamped at zero.
    #[must_use]
    pub fn around(center: Coord, radius: u32) -> Self {
        let r = u16::try_from(radius).unwrap_or(u16::MAX);
        Self {
            min: Coord::new(center.x.saturating_sub(r), center.y.saturating_sub(r)),
            max: Coord::new(center.x.saturating_add(r), center.y.saturating_add(r)),
        }
    }

    /// Whether `coord` lies inside.
    #[must_use]
    pub const fn contains(&self, coord: Coord) -> bool {
        coord.x >= self.min.x
            && coord.x <= self.max.x
            && coord.y >= self.min.y
            && coord.y <= self.max.y
    }
}

/// Owner of all live units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitManager {
    units: BTreeMap<UnitId, Unit>,
    next_id: UnitId,
    spawned: u64,
    despawned: u64,
}

impl Default for UnitManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitManager {
    /// Create an empty manager. The first id handed out is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            units: BTreeMap::new(),
            next_id: 1,
            spawned: 0,
            despawned: 0,
        }
    }

    /// Create a unit of `kind` for `owner` at `position`, in `Spawning`.
    ///
    /// Ground units claim their tile; flying units never occupy tiles.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSpawnLocation`] if `position` is off the
    /// map, or for ground units, not walkable right now.
    pub fn spawn(
        &mut self,
        kind: UnitKind,
        owner: PlayerId,
        position: Coord,
        map: &mut Tilemap,
        registry: &UnitRegistry,
    ) -> EngineResult<UnitId> {
        let unit_type = registry.get(kind);
        let placeable = if unit_type.flying {
            map.in_bounds(position)
        } else {
            map.is_walkable(position)
        };
        if !placeable {
            return Err(EngineError::InvalidSpawnLocation { coord: position });
        }

        let id = self.next_id;
        if !unit_type.flying {
            map.set_occupant(position, id)?;
        }
        self.next_id += 1;
        self.spawned += 1;
        self.units
            .insert(id, Unit::new(id, kind, owner, position, unit_type));
        trace!(id, %kind, owner, %position, "unit spawned");
        Ok(id)
    }

    /// Remove a unit that has reached `Despawned`, releasing its tile if it
    /// still holds one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCommand`] if the unit does not exist or
    /// is in any other state.
    pub fn despawn(&mut self, id: UnitId, map: &mut Tilemap) -> EngineResult<Unit> {
        let state = self
            .units
            .get(&id)
            .map(Unit::tag)
            .ok_or(EngineError::InvalidCommand(RejectReason::UnknownUnit(id)))?;
        if state != StateTag::Despawned {
            return Err(EngineError::InvalidCommand(RejectReason::IllegalState {
                unit: id,
                state,
            }));
        }
        let unit = self
            .units
            .remove(&id)
            .ok_or(EngineError::InvalidCommand(RejectReason::UnknownUnit(id)))?;
        if map.occupant(unit.position) == Some(id) {
            map.clear_occupant(unit.position)?;
        }
        self.despawned += 1;
        trace!(id, "unit despawned");
        Ok(unit)
    }

    /// Look up a unit.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Look up a unit mutably.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Whether `id` is present.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Number of units held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no units are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Snapshot of all ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// All units in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Units owned by `player`.
    pub fn units_of(&self, player: PlayerId) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.owner == player)
    }

    /// Units standing inside `region`.
    pub fn units_in_region(&self, region: Region) -> impl Iterator<Item = &Unit> {
        self.units
            .values()
            .filter(move |u| region.contains(u.position))
    }

    /// Total units ever spawned.
    #[must_use]
    pub const fn spawned_total(&self) -> u64 {
        self.spawned
    }

    /// Total units ever despawned.
    #[must_use]
    pub const fn despawned_total(&self) -> u64 {
        self.despawned
    }

    /// Id the next spawn will receive.
    #[must_use]
    pub const fn next_id(&self) -> UnitId {
        self.next_id
    }

    /// Temporarily remove a unit so it can be mutated alongside the rest of
    /// the world. Must be paired with [`UnitManager::restore`].
    pub(crate) fn take(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Put back a unit removed by [`UnitManager::take`].
    pub(crate) fn restore(&mut self, unit: Unit) {
        self.units.insert(unit.id, unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{TerrainKind, UnitState};

    fn setup() -> (UnitManager, Tilemap, UnitRegistry) {
        (UnitManager::new(), Tilemap::new(5, 5).unwrap(), UnitRegistry::default())
    }

    #[test]
    fn test_spawn_claims_tile() {
        let (mut units, mut map, registry) = setup();
        let id = units
            .spawn(UnitKind::Peasant, 1, Coord::new(2, 2), &mut map, &registry)
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(map.occupant(Coord::new(2, 2)), Some(id));
        assert_eq!(units.get(id).unwrap().tag(), StateTag::Spawning);
        assert_eq!(units.spawned_total(), 1);
    }

    #[test]
    fn test_spawn_rejects_bad_tiles() {
        let (mut units, mut map, registry) = setup();
        map.set_terrain(Coord::new(0, 0), TerrainKind::Wall, 0).unwrap();
        units
            .spawn(UnitKind::Peasant, 1, Coord::new(1, 1), &mut map, &registry)
            .unwrap();

        for coord in [Coord::new(0, 0), Coord::new(1, 1), Coord::new(9, 9)] {
            let err = units
                .spawn(UnitKind::Footman, 1, coord, &mut map, &registry)
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidSpawnLocation { .. }));
        }
        assert_eq!(units.len(), 1);
        assert_eq!(units.next_id(), 2);
    }

    #[test]
    fn test_flying_units_do_not_occupy() {
        let (mut units, mut map, mut registry) = setup();
        registry.footman.flying = true;
        map.set_terrain(Coord::new(3, 3), TerrainKind::Water, 0).unwrap();
        units
            .spawn(UnitKind::Footman, 1, Coord::new(3, 3), &mut map, &registry)
            .unwrap();
        assert_eq!(map.occupant(Coord::new(3, 3)), None);
    }

    #[test]
    fn test_despawn_requires_despawned_state() {
        let (mut units, mut map, registry) = setup();
        let id = units
            .spawn(UnitKind::Peasant, 1, Coord::new(0, 0), &mut map, &registry)
            .unwrap();
        assert!(units.despawn(id, &mut map).is_err());

        units.get_mut(id).unwrap().state = UnitState::Despawned;
        let unit = units.despawn(id, &mut map).unwrap();
        assert_eq!(unit.id, id);
        assert!(units.is_empty());
        assert_eq!(map.occupant(Coord::new(0, 0)), None);
        assert_eq!(units.despawned_total(), 1);
        assert!(units.despawn(id, &mut map).is_err());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let (mut units, mut map, registry) = setup();
        let first = units
            .spawn(UnitKind::Peasant, 1, Coord::new(0, 0), &mut map, &registry)
            .unwrap();
        units.get_mut(first).unwrap().state = UnitState::Despawned;
        units.despawn(first, &mut map).unwrap();
        let second = units
            .spawn(UnitKind::Peasant, 1, Coord::new(0, 0), &mut map, &registry)
            .unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_region_queries() {
        let (mut units, mut map, registry) = setup();
        for (x, owner) in [(0, 1), (2, 2), (4, 1)] {
            units
                .spawn(UnitKind::Peasant, owner, Coord::new(x, 0), &mut map, &registry)
                .unwrap();
        }
        let near: Vec<_> = units
            .units_in_region(Region::around(Coord::new(1, 1), 1))
            .map(|u| u.id)
            .collect();
        assert_eq!(near, vec![1, 2]);
        assert_eq!(units.units_of(1).count(), 2);
    }
}
