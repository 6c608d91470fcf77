//! Player state management.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::game::{Coord, ResourceKind, Resources, UnitId};

/// Unique identifier for a player. Players are numbered from 1.
pub type PlayerId = u8;

/// Running totals kept per player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Resources credited by harvesting.
    pub gathered: Resources,
    /// Resources debited for units and structures.
    pub spent: Resources,
    /// Damage dealt by this player's units.
    pub damage_done: u64,
    /// Damage taken by this player's units.
    pub damage_taken: u64,
    /// Units spawned for this player, start units included.
    pub units_created: u32,
    /// Units of this player that died.
    pub units_lost: u32,
    /// Enemy units killed by this player's units.
    pub kills: u32,
}

/// State for a single player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Unique identifier for this player.
    pub id: PlayerId,
    /// Start location.
    pub start: Coord,
    /// Bank.
    pub resources: Resources,
    /// Units owned by this player that have not been despawned.
    pub units: BTreeSet<UnitId>,
    /// Set once the player has no units left. Never cleared.
    pub defeated: bool,
    /// Running totals.
    pub stats: PlayerStats,
}

impl Player {
    /// Create a new player with the given ID, start location and bank.
    #[must_use]
    pub fn new(id: PlayerId, start: Coord, resources: Resources) -> Self {
        Self {
            id,
            start,
            resources,
            units: BTreeSet::new(),
            defeated: false,
            stats: PlayerStats::default(),
        }
    }

    /// Current balance of `kind`.
    #[must_use]
    pub const fn balance(&self, kind: ResourceKind) -> u32 {
        self.resources.get(kind)
    }

    /// Add `amount` of `kind`, saturating at `u32::MAX`.
    pub fn credit(&mut self, kind: ResourceKind, amount: u32) {
        let balance = self.resources.get_mut(kind);
        *balance = balance.saturating_add(amount);
    }

    /// Remove `amount` of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InsufficientResources`] and leaves the balance
    /// untouched if `amount` exceeds it.
    pub fn debit(&mut self, kind: ResourceKind, amount: u32) -> EngineResult<()> {
        let balance = self.resources.get_mut(kind);
        if *balance < amount {
            return Err(EngineError::InsufficientResources {
                kind,
                requested: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        let spent = self.stats.spent.get_mut(kind);
        *spent = spent.saturating_add(amount);
        Ok(())
    }

    /// Pay `cost` in full or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InsufficientResources`] for the first resource
    /// that runs short; no balance changes in that case.
    pub fn pay(&mut self, cost: &Resources) -> EngineResult<()> {
        if let Some(kind) = self.resources.shortfall(cost) {
            return Err(EngineError::InsufficientResources {
                kind,
                requested: cost.get(kind),
                available: self.balance(kind),
            });
        }
        for kind in ResourceKind::ALL {
            self.debit(kind, cost.get(kind))?;
        }
        Ok(())
    }

    /// Mark the player defeated if it has no units left. Returns `true` when
    /// this call is the one that defeated the player.
    pub fn evaluate_defeat(&mut self) -> bool {
        if self.defeated || !self.units.is_empty() {
            return false;
        }
        self.defeated = true;
        true
    }
}
