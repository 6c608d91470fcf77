//! Game configuration and the unit-type registry.
//!
//! Everything here deserializes from JSON with per-field defaults, so a
//! config file only needs the keys it changes:
//!
//! ```json
//! { "decay_ticks": 5, "starting_resources": { "gold": 1000 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::game::{Resources, UnitKind, UnitType};

/// Ticks a dead unit lingers before it is despawned.
pub const DEFAULT_DECAY_TICKS: u32 = 10;

/// Starting bank for each player.
pub const DEFAULT_STARTING_RESOURCES: Resources = Resources::new(200, 150, 50);

/// Per-kind unit descriptors. Each kind deserializes over its default, so
/// `{"peasant": {"speed": 250}}` changes one field of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RegistryPatch")]
pub struct UnitRegistry {
    /// Peasant stats.
    pub peasant: UnitType,
    /// Footman stats.
    pub footman: UnitType,
    /// Archer stats.
    pub archer: UnitType,
    /// Town hall stats.
    pub town_hall: UnitType,
    /// Barracks stats.
    pub barracks: UnitType,
    /// Farm stats.
    pub farm: UnitType,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self {
            peasant: UnitType::peasant(),
            footman: UnitType::footman(),
            archer: UnitType::archer(),
            town_hall: UnitType::town_hall(),
            barracks: UnitType::barracks(),
            farm: UnitType::farm(),
        }
    }
}

/// Fields of a [`UnitType`] present in a config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UnitTypePatch {
    max_health: Option<u32>,
    attack: Option<u32>,
    defense: Option<u32>,
    range: Option<u32>,
    speed: Option<u32>,
    structure: Option<bool>,
    flying: Option<bool>,
    build_rate: Option<u32>,
    build_time: Option<u32>,
    harvest_amount: Option<u32>,
    harvest_interval: Option<u32>,
    harvest_duration: Option<u32>,
    spawn_duration: Option<u32>,
    cost: Option<Resources>,
    builds: Option<Vec<UnitKind>>,
    trains: Option<Vec<UnitKind>>,
}

impl UnitTypePatch {
    fn apply(self, base: UnitType) -> UnitType {
        UnitType {
            max_health: self.max_health.unwrap_or(base.max_health),
            attack: self.attack.unwrap_or(base.attack),
            defense: self.defense.unwrap_or(base.defense),
            range: self.range.unwrap_or(base.range),
            speed: self.speed.unwrap_or(base.speed),
            structure: self.structure.unwrap_or(base.structure),
            flying: self.flying.unwrap_or(base.flying),
            build_rate: self.build_rate.unwrap_or(base.build_rate),
            build_time: self.build_time.unwrap_or(base.build_time),
            harvest_amount: self.harvest_amount.unwrap_or(base.harvest_amount),
            harvest_interval: self.harvest_interval.unwrap_or(base.harvest_interval),
            harvest_duration: self.harvest_duration.unwrap_or(base.harvest_duration),
            spawn_duration: self.spawn_duration.unwrap_or(base.spawn_duration),
            cost: self.cost.unwrap_or(base.cost),
            builds: self.builds.unwrap_or(base.builds),
            trains: self.trains.unwrap_or(base.trains),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegistryPatch {
    peasant: UnitTypePatch,
    footman: UnitTypePatch,
    archer: UnitTypePatch,
    town_hall: UnitTypePatch,
    barracks: UnitTypePatch,
    farm: UnitTypePatch,
}

impl From<RegistryPatch> for UnitRegistry {
    fn from(patch: RegistryPatch) -> Self {
        Self {
            peasant: patch.peasant.apply(UnitType::peasant()),
            footman: patch.footman.apply(UnitType::footman()),
            archer: patch.archer.apply(UnitType::archer()),
            town_hall: patch.town_hall.apply(UnitType::town_hall()),
            barracks: patch.barracks.apply(UnitType::barracks()),
            farm: patch.farm.apply(UnitType::farm()),
        }
    }
}

impl UnitRegistry {
    /// Descriptor for `kind`.
    #[must_use]
    pub const fn get(&self, kind: UnitKind) -> &UnitType {
        match kind {
            UnitKind::Peasant => &self.peasant,
            UnitKind::Footman => &self.footman,
            UnitKind::Archer => &self.archer,
            UnitKind::TownHall => &self.town_hall,
            UnitKind::Barracks => &self.barracks,
            UnitKind::Farm => &self.farm,
        }
    }

    /// Mutable descriptor for `kind`.
    pub fn get_mut(&mut self, kind: UnitKind) -> &mut UnitType {
        match kind {
            UnitKind::Peasant => &mut self.peasant,
            UnitKind::Footman => &mut self.footman,
            UnitKind::Archer => &mut self.archer,
            UnitKind::TownHall => &mut self.town_hall,
            UnitKind::Barracks => &mut self.barracks,
            UnitKind::Farm => &mut self.farm,
        }
    }
}

/// Rules and tunables for a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Resources each player starts with.
    pub starting_resources: Resources,
    /// Units each player receives at its start location, in order.
    pub start_units: Vec<UnitKind>,
    /// Ticks a unit stays `Dead` before it is despawned.
    pub decay_ticks: u32,
    /// Attacked units that can fight back switch to combat.
    pub retaliate: bool,
    /// Units in combat pick a new target in range when theirs is gone.
    pub auto_acquire: bool,
    /// Check invariants after every step and roll back on violation.
    pub check_invariants: bool,
    /// Unit descriptors.
    pub units: UnitRegistry,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_resources: DEFAULT_STARTING_RESOURCES,
            start_units: vec![UnitKind::Peasant],
            decay_ticks: DEFAULT_DECAY_TICKS,
            retaliate: true,
            auto_acquire: true,
            check_invariants: true,
            units: UnitRegistry::default(),
        }
    }
}

impl GameConfig {
    /// Parse a JSON config; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Json`] if the JSON is malformed.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an I/O or JSON error.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Descriptor for `kind`.
    #[must_use]
    pub const fn unit_type(&self, kind: UnitKind) -> &UnitType {
        self.units.get(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GameConfig::from_json(r#"{"decay_ticks": 3, "retaliate": false}"#).unwrap();
        assert_eq!(config.decay_ticks, 3);
        assert!(!config.retaliate);
        assert!(config.auto_acquire);
        assert_eq!(config.start_units, vec![UnitKind::Peasant]);
        assert_eq!(config.units, UnitRegistry::default());
    }

    #[test]
    fn test_partial_unit_type_override() {
        let json = r#"{"units": {"peasant": {"speed": 250}, "farm": {"cost": {"oil": 5}}}}"#;
        let config = GameConfig::from_json(json).unwrap();
        assert_eq!(config.units.peasant.speed, 250);
        assert_eq!(config.units.peasant.max_health, 30);
        assert_eq!(config.units.peasant.builds, UnitType::peasant().builds);
        assert_eq!(config.units.farm.cost, Resources::new(0, 0, 5));
        assert_eq!(config.units.footman, UnitType::footman());
    }

    #[test]
    fn test_registry_lookup_matches_kind() {
        let registry = UnitRegistry::default();
        assert!(registry.get(UnitKind::TownHall).structure);
        assert_eq!(registry.get(UnitKind::Archer).range, 4);
        assert!(registry.get(UnitKind::Barracks).trains.contains(&UnitKind::Footman));
    }

    #[test]
    fn test_override_single_unit_type() {
        let mut config = GameConfig::default();
        config.units.get_mut(UnitKind::Peasant).speed = 250;
        let json = serde_json::to_string(&config).unwrap();
        let parsed = GameConfig::from_json(&json).unwrap();
        assert_eq!(parsed.unit_type(UnitKind::Peasant).speed, 250);
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(GameConfig::from_json("[1, 2]").is_err());
    }
}
