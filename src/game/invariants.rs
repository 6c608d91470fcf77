//! Game invariants - sanity checks that detect bugs.
//!
//! These should never trigger in a correctly implemented engine. When
//! [`crate::GameConfig::check_invariants`] is set, [`crate::Game::step`] runs
//! them after every step and rolls the step back on any violation.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::game::{Game, StateTag, Target, UnitId};

/// Invariant violation error.
#[derive(Debug, Clone, Error)]
#[error("Invariant violation: {message}")]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

/// Check all game invariants.
///
/// Returns a list of violations found, or empty if all invariants hold.
#[must_use]
pub fn check_invariants(game: &Game) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut fail = |message: String| violations.push(InvariantViolation { message });

    let map = game.map();
    let units = game.units();
    let config = game.config();

    // Conservation: nothing appears or vanishes outside spawn and despawn.
    let expected = units.spawned_total() - units.despawned_total();
    if expected != units.len() as u64 {
        fail(format!(
            "{} units held but {} spawned and {} despawned",
            units.len(),
            units.spawned_total(),
            units.despawned_total()
        ));
    }

    for unit in units.iter() {
        let unit_type = config.unit_type(unit.kind);

        if !map.in_bounds(unit.position) {
            fail(format!("unit {} is off the map at {}", unit.id, unit.position));
        }
        if unit.tag() == StateTag::Despawned {
            fail(format!("unit {} is despawned but still present", unit.id));
        }
        if unit.health > unit_type.max_health {
            fail(format!(
                "unit {} has health {} above maximum {}",
                unit.id, unit.health, unit_type.max_health
            ));
        }
        if unit.is_alive() == (unit.health == 0) {
            fail(format!(
                "unit {} is {} with health {}",
                unit.id,
                unit.tag(),
                unit.health
            ));
        }

        match unit.target() {
            Some(Target::Unit(target)) if target == unit.id => {
                fail(format!("unit {} targets itself", unit.id));
            }
            Some(Target::Tile(coord)) if !map.in_bounds(coord) => {
                fail(format!("unit {} targets {coord} off the map", unit.id));
            }
            _ => {}
        }

        let holds_tile = unit.is_alive() && !unit_type.flying;
        let occupant = map.occupant(unit.position);
        if holds_tile && occupant != Some(unit.id) {
            fail(format!(
                "unit {} at {} does not occupy its tile (occupant {occupant:?})",
                unit.id, unit.position
            ));
        }

        match game.player(unit.owner) {
            Some(owner) if owner.units.contains(&unit.id) => {}
            _ => fail(format!(
                "unit {} is not registered with player {}",
                unit.id, unit.owner
            )),
        }
    }

    // Every occupied tile points back at a live ground unit standing there.
    for (coord, tile) in map.iter() {
        let Some(id) = tile.occupant else {
            continue;
        };
        let valid = units.get(id).is_some_and(|u| {
            u.position == coord && u.is_alive() && !config.unit_type(u.kind).flying
        });
        if !valid {
            fail(format!("tile {coord} claims stale occupant {id}"));
        }
        if !tile.is_terrain_walkable() {
            fail(format!("unit {id} stands on unwalkable terrain at {coord}"));
        }
    }

    for player in game.players() {
        let owned: BTreeSet<UnitId> = units.units_of(player.id).map(|u| u.id).collect();
        if owned != player.units {
            fail(format!(
                "player {} tracks {} units but owns {}",
                player.id,
                player.units.len(),
                owned.len()
            ));
        }
        if player.defeated && !owned.is_empty() {
            fail(format!(
                "defeated player {} still owns {} units",
                player.id,
                owned.len()
            ));
        }
    }

    if let Some(winner) = game.winner() {
        if !game.is_game_over() || game.player(winner).is_none_or(|p| p.defeated) {
            fail(format!("winner {winner} is inconsistent with the game result"));
        }
    }

    violations
}

/// Assert all game invariants hold, panicking if any are violated.
///
/// Only active in debug builds. No-op in release builds.
///
/// # Panics
///
/// Panics with detailed message if any invariant is violated.
#[cfg(debug_assertions)]
pub fn assert_invariants(game: &Game) {
    let violations = check_invariants(game);
    if !violations.is_empty() {
        let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        panic!("Game invariant violations:\n  - {}", messages.join("\n  - "));
    }
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
pub fn assert_invariants(_game: &Game) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::{Coord, MapDescriptor, UnitState};

    fn create_valid_game() -> Game {
        let descriptor = MapDescriptor::open(6, 6, vec![Coord::new(0, 0), Coord::new(5, 5)]);
        Game::new(descriptor, GameConfig::default()).unwrap()
    }

    #[test]
    fn test_valid_game_passes() {
        let mut game = create_valid_game();
        assert!(check_invariants(&game).is_empty());
        game.step(&[]).unwrap();
        assert!(check_invariants(&game).is_empty());
    }

    #[test]
    fn test_detects_stale_occupancy() {
        let mut game = create_valid_game();
        game.world.map.clear_occupant(Coord::new(0, 0)).unwrap();
        let violations = check_invariants(&game);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("does not occupy"));
    }

    #[test]
    fn test_detects_lingering_despawned_unit() {
        let mut game = create_valid_game();
        if let Some(unit) = game.world.units.get_mut(1) {
            unit.state = UnitState::Despawned;
            unit.health = 0;
        }
        let violations = check_invariants(&game);
        assert!(violations.iter().any(|v| v.message.contains("despawned")));
    }

    #[test]
    fn test_detects_untracked_unit() {
        let mut game = create_valid_game();
        game.world.players[0].units.clear();
        let violations = check_invariants(&game);
        assert!(violations.iter().any(|v| v.message.contains("not registered")));
    }

    #[test]
    fn test_detects_self_target() {
        let mut game = create_valid_game();
        if let Some(unit) = game.world.units.get_mut(1) {
            unit.state = UnitState::Combat { target: 1 };
        }
        let violations = check_invariants(&game);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].to_string(),
            "Invariant violation: unit 1 targets itself"
        );
    }

    #[test]
    #[should_panic(expected = "invariant violations")]
    #[cfg(debug_assertions)]
    fn test_assert_invariants_panics() {
        let mut game = create_valid_game();
        game.world.players[1].defeated = true;
        assert_invariants(&game);
    }
}
