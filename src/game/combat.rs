//! Combat resolution.
//!
//! A unit in `Combat` strikes its target once per tick. Damage is
//! `max(attack - defense, 1)`, so every hit does at least one point. A victim
//! reduced to zero health dies immediately. Victims that can fight back and
//! are idle, walking or harvesting switch to combat against the attacker when
//! retaliation is enabled.

use tracing::debug;

use crate::error::EngineResult;
use crate::game::fsm::{self, TickContext};
use crate::game::{Direction, Region, StateTag, Unit, UnitId, UnitManager, UnitState};

/// Damage dealt by one hit.
#[must_use]
pub fn damage(attack: u32, defense: u32) -> u32 {
    attack.saturating_sub(defense).max(1)
}

/// Whether `target` can be attacked by `attacker` with the given reach.
#[must_use]
pub fn is_valid_target(attacker: &Unit, target: &Unit, range: u32) -> bool {
    target.id != attacker.id
        && target.is_alive()
        && target.owner != attacker.owner
        && attacker.position.distance(target.position) <= range
}

/// Nearest valid target within `range`; ties go to the lowest id.
#[must_use]
pub fn acquire_target(attacker: &Unit, range: u32, units: &UnitManager) -> Option<UnitId> {
    units
        .units_in_region(Region::around(attacker.position, range))
        .filter(|u| is_valid_target(attacker, u, range))
        .min_by_key(|u| (attacker.position.distance(u.position), u.id))
        .map(|u| u.id)
}

/// Combat state tick: validate or replace the target, then strike.
pub(crate) fn tick_combat(unit: &mut Unit, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let config = ctx.config;
    let range = config.unit_type(unit.kind).range;
    let UnitState::Combat { target } = unit.state else {
        return Ok(());
    };

    let current = ctx
        .units
        .get(target)
        .is_some_and(|t| is_valid_target(unit, t, range));
    let chosen = if current {
        Some(target)
    } else if config.auto_acquire {
        acquire_target(unit, range, ctx.units)
    } else {
        None
    };

    let Some(target) = chosen else {
        return fsm::transition(unit, UnitState::Idle, ctx);
    };
    unit.state = UnitState::Combat { target };
    strike(unit, target, ctx)
}

fn strike(attacker: &mut Unit, target: UnitId, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let Some(mut victim) = ctx.units.take(target) else {
        return Ok(());
    };
    if let Some(direction) = Direction::towards(attacker.position, victim.position) {
        attacker.direction = direction;
    }
    let result = apply_damage(attacker, &mut victim, ctx);
    ctx.units.restore(victim);
    result
}

fn apply_damage(attacker: &Unit, victim: &mut Unit, ctx: &mut TickContext<'_>) -> EngineResult<()> {
    let config = ctx.config;
    let attacker_type = config.unit_type(attacker.kind);
    let victim_type = config.unit_type(victim.kind);

    let dealt = damage(attacker_type.attack, victim_type.defense).min(victim.health);
    victim.health -= dealt;

    if let Some(owner) = ctx.player_mut(attacker.owner) {
        owner.stats.damage_done += u64::from(dealt);
    }
    if let Some(owner) = ctx.player_mut(victim.owner) {
        owner.stats.damage_taken += u64::from(dealt);
    }

    if victim.health == 0 {
        fsm::transition(victim, UnitState::Dead { since: ctx.tick }, ctx)?;
        if let Some(owner) = ctx.player_mut(attacker.owner) {
            owner.stats.kills += 1;
        }
        debug!(
            tick = ctx.tick,
            attacker = attacker.id,
            victim = victim.id,
            "unit killed"
        );
        return Ok(());
    }

    let can_retaliate = config.retaliate
        && victim_type.attack > 0
        && matches!(
            victim.tag(),
            StateTag::Idle | StateTag::Walking | StateTag::Harvesting
        )
        && victim.position.distance(attacker.position) <= victim_type.range;
    if can_retaliate {
        fsm::transition(victim, UnitState::Combat { target: attacker.id }, ctx)?;
        if let Some(direction) = Direction::towards(victim.position, attacker.position) {
            victim.direction = direction;
        }
    }
    Ok(())
}
