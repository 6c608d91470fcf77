//! Map descriptors: the validated input a [`Tilemap`] is built from.
//!
//! A descriptor is plain JSON:
//!
//! ```json
//! {
//!   "name": "duel",
//!   "width": 4,
//!   "height": 2,
//!   "rows": ["..g.", "#..f"],
//!   "deposits": { "gold": 500, "lumber": 250, "oil": 300 },
//!   "starts": [{ "x": 0, "y": 0 }, { "x": 3, "y": 0 }]
//! }
//! ```
//!
//! Rows use the terrain symbols from [`TerrainKind::symbol`]. Every resource
//! tile starts with the deposit amount configured for its kind. Malformed
//! descriptors are rejected here, before any game exists.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::game::{Coord, MAX_PLAYERS, Resources, TerrainKind, Tilemap};

/// Default deposit per resource tile.
pub const DEFAULT_DEPOSITS: Resources = Resources::new(500, 250, 300);

const fn default_deposits() -> Resources {
    DEFAULT_DEPOSITS
}

/// Map construction descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDescriptor {
    /// Human-readable map name.
    #[serde(default)]
    pub name: String,
    /// Width in tiles.
    pub width: u16,
    /// Height in tiles.
    pub height: u16,
    /// One string per row, one terrain symbol per tile.
    pub rows: Vec<String>,
    /// Initial amount on each resource tile, per resource kind.
    #[serde(default = "default_deposits")]
    pub deposits: Resources,
    /// Start location per player; player `i + 1` starts at `starts[i]`.
    pub starts: Vec<Coord>,
}

impl MapDescriptor {
    /// An all-grass map with the given start locations.
    #[must_use]
    pub fn open(width: u16, height: u16, starts: Vec<Coord>) -> Self {
        let row: String =
            std::iter::repeat_n(TerrainKind::Grass.symbol(), usize::from(width)).collect();
        Self {
            name: format!("open-{width}x{height}"),
            width,
            height,
            rows: vec![row; usize::from(height)],
            deposits: DEFAULT_DEPOSITS,
            starts,
        }
    }

    /// Parse and validate a JSON descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MapLoad`] if the JSON is malformed or the
    /// descriptor fails validation.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let descriptor: Self =
            serde_json::from_str(json).map_err(|e| EngineError::MapLoad(e.to_string()))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Read, parse and validate a descriptor file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file cannot be read and
    /// [`EngineError::MapLoad`] if it is malformed.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Json`] if serialization fails.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Terrain at `coord`, assuming the descriptor is valid.
    fn terrain_at(&self, coord: Coord) -> Option<TerrainKind> {
        self.rows
            .get(usize::from(coord.y))?
            .chars()
            .nth(usize::from(coord.x))
            .and_then(TerrainKind::from_symbol)
    }

    /// Check the descriptor for structural errors.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MapLoad`] describing the first problem found.
    pub fn validate(&self) -> EngineResult<()> {
        let fail = |msg: String| Err(EngineError::MapLoad(msg));

        if self.width == 0 || self.height == 0 {
            return fail(format!(
                "map dimensions must be non-zero, got {}x{}",
                self.width, self.height
            ));
        }
        if self.rows.len() != usize::from(self.height) {
            return fail(format!(
                "expected {} rows, found {}",
                self.height,
                self.rows.len()
            ));
        }
        for (y, row) in self.rows.iter().enumerate() {
            let len = row.chars().count();
            if len != usize::from(self.width) {
                return fail(format!("row {y} has {len} tiles, expected {}", self.width));
            }
            if let Some((x, symbol)) = row
                .chars()
                .enumerate()
                .find(|(_, c)| TerrainKind::from_symbol(*c).is_none())
            {
                return fail(format!("unknown terrain symbol {symbol:?} at ({x}, {y})"));
            }
        }

        // A resource tile must start with something to harvest.
        if let Some(kind) = self
            .rows
            .iter()
            .flat_map(|row| row.chars())
            .filter_map(|c| TerrainKind::from_symbol(c).and_then(TerrainKind::resource))
            .find(|&kind| self.deposits.get(kind) == 0)
        {
            return fail(format!("map has {kind:?} tiles but a zero {kind:?} deposit"));
        }

        if self.starts.is_empty() {
            return fail("map has no start locations".to_string());
        }
        if self.starts.len() > MAX_PLAYERS {
            return fail(format!(
                "map has {} start locations, maximum is {MAX_PLAYERS}",
                self.starts.len()
            ));
        }

        let mut seen = BTreeSet::new();
        for &start in &self.starts {
            if start.x >= self.width || start.y >= self.height {
                return fail(format!("start location {start} is out of bounds"));
            }
            if !self.terrain_at(start).is_some_and(TerrainKind::is_walkable) {
                return fail(format!("start location {start} is not walkable"));
            }
            if !seen.insert(start) {
                return fail(format!("start location {start} is used twice"));
            }
        }

        Ok(())
    }

    /// Build the tilemap described here.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MapLoad`] if the descriptor is invalid.
    pub fn build_tilemap(&self) -> EngineResult<Tilemap> {
        self.validate()?;

        let mut map = Tilemap::new(self.width, self.height)?;
        for (y, row) in self.rows.iter().enumerate() {
            for (x, symbol) in row.chars().enumerate() {
                let terrain = TerrainKind::from_symbol(symbol).ok_or_else(|| {
                    EngineError::MapLoad(format!("unknown terrain symbol {symbol:?}"))
                })?;
                if terrain == TerrainKind::Grass {
                    continue;
                }
                let amount = terrain.resource().map_or(0, |kind| self.deposits.get(kind));
                #[allow(clippy::cast_possible_truncation)]
                let coord = Coord::new(x as u16, y as u16);
                map.set_terrain(coord, terrain, amount)?;
            }
        }
        map.set_start_locations(self.starts.clone());
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ResourceKind;

    fn duel() -> MapDescriptor {
        MapDescriptor {
            name: "duel".to_string(),
            width: 4,
            height: 2,
            rows: vec!["..g.".to_string(), "#..f".to_string()],
            deposits: DEFAULT_DEPOSITS,
            starts: vec![Coord::new(0, 0), Coord::new(3, 0)],
        }
    }

    #[test]
    fn test_build_tilemap() {
        let map = duel().build_tilemap().unwrap();
        assert_eq!(map.width(), 4);
        assert_eq!(map.height(), 2);
        assert_eq!(map.start_locations().len(), 2);

        let mine = map.tile_at(Coord::new(2, 0)).unwrap();
        assert_eq!(mine.terrain, TerrainKind::GoldMine);
        assert_eq!(mine.deposit.unwrap().remaining, DEFAULT_DEPOSITS.gold);
        assert_eq!(map.tile_at(Coord::new(0, 1)).unwrap().terrain, TerrainKind::Wall);
        assert_eq!(map.total_remaining(ResourceKind::Lumber), u64::from(DEFAULT_DEPOSITS.lumber));
    }

    #[test]
    fn test_json_round_trip_keeps_layout() {
        let json = duel().to_json().unwrap();
        let parsed = MapDescriptor::from_json(&json).unwrap();
        assert_eq!(parsed, duel());
    }

    #[test]
    fn test_deposits_default_when_missing() {
        let json = r#"{"width":2,"height":1,"rows":[".g"],"starts":[{"x":0,"y":0}]}"#;
        let parsed = MapDescriptor::from_json(json).unwrap();
        assert_eq!(parsed.deposits, DEFAULT_DEPOSITS);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            MapDescriptor::from_json("{ not json"),
            Err(EngineError::MapLoad(_))
        ));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let mut desc = duel();
        desc.rows[1] = "#.".to_string();
        let err = desc.validate().unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_rejects_unknown_symbol() {
        let mut desc = duel();
        desc.rows[0] = "..X.".to_string();
        assert!(matches!(desc.validate(), Err(EngineError::MapLoad(_))));
    }

    #[test]
    fn test_rejects_bad_starts() {
        let mut desc = duel();
        desc.starts = vec![Coord::new(0, 1)];
        assert!(desc.validate().unwrap_err().to_string().contains("not walkable"));

        desc.starts = vec![Coord::new(9, 0)];
        assert!(desc.validate().unwrap_err().to_string().contains("out of bounds"));

        desc.starts = vec![Coord::new(0, 0), Coord::new(0, 0)];
        assert!(desc.validate().unwrap_err().to_string().contains("twice"));

        desc.starts = Vec::new();
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_deposit() {
        let mut desc = duel();
        desc.deposits = Resources::new(500, 0, 300);
        let err = desc.build_tilemap().unwrap_err();
        assert!(matches!(err, EngineError::MapLoad(_)));
        assert!(err.to_string().contains("Lumber"));

        // Unused kinds may be empty.
        desc.deposits = Resources::new(500, 250, 0);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_open_map() {
        let desc = MapDescriptor::open(10, 10, vec![Coord::new(0, 0)]);
        assert!(desc.validate().is_ok());
        let map = desc.build_tilemap().unwrap();
        assert!(map.tiles().iter().all(|t| t.terrain == TerrainKind::Grass));
    }
}
