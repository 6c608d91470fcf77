//! Deterministic map generation.
//!
//! The same seed, size and player count always produce the same
//! [`MapDescriptor`]. Start locations are spread around the map centre and
//! every start is guaranteed a ground route to every other.

// Map generation uses intentional casts for coordinate/RNG operations
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::error::{EngineError, EngineResult};
use crate::game::pathfinder::{Capabilities, find_path};
use crate::game::{Coord, DEFAULT_DEPOSITS, MAX_PLAYERS, MapDescriptor, TerrainKind};

/// Smallest side length accepted by [`generate_map`].
pub const MIN_GENERATED_SIZE: u16 = 8;

/// Deterministic PRNG using xorshift64.
#[derive(Debug, Clone, Copy)]
struct Rng {
    state: u64,
}

impl Rng {
    /// Create a new RNG with the given seed.
    const fn new(seed: u64) -> Self {
        // Ensure non-zero state
        let state = if seed == 0 { 0x5555_5555_5555_5555 } else { seed };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Random u32 in [0, max).
    fn next_u32(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % u64::from(max)) as u32
    }

    /// Random f64 in [0, 1).
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }
}

/// Row-major terrain grid under construction.
struct Grid {
    width: u16,
    height: u16,
    cells: Vec<TerrainKind>,
}

impl Grid {
    fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![TerrainKind::Grass; usize::from(width) * usize::from(height)],
        }
    }

    fn index(&self, coord: Coord) -> usize {
        usize::from(coord.y) * usize::from(self.width) + usize::from(coord.x)
    }

    fn get(&self, coord: Coord) -> TerrainKind {
        self.cells[self.index(coord)]
    }

    fn set(&mut self, coord: Coord, terrain: TerrainKind) {
        let idx = self.index(coord);
        self.cells[idx] = terrain;
    }

    fn coords(&self) -> impl Iterator<Item = Coord> + use<> {
        let (width, height) = (self.width, self.height);
        (0..height).flat_map(move |y| (0..width).map(move |x| Coord::new(x, y)))
    }

    /// In-bounds tiles at exactly Chebyshev `radius` from `center`, row by row.
    fn ring(&self, center: Coord, radius: i32) -> Vec<Coord> {
        let (cx, cy) = (i32::from(center.x), i32::from(center.y));
        let mut out = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs().max(dy.abs()) != radius {
                    continue;
                }
                let (x, y) = (cx + dx, cy + dy);
                if x >= 0 && y >= 0 && x < i32::from(self.width) && y < i32::from(self.height) {
                    out.push(Coord::new(x as u16, y as u16));
                }
            }
        }
        out
    }

    fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(usize::from(self.width))
            .map(|row| row.iter().map(|t| t.symbol()).collect())
            .collect()
    }
}

/// Generate a map descriptor.
///
/// # Arguments
///
/// * `seed` - Random seed for deterministic generation
/// * `width` - Map width in tiles
/// * `height` - Map height in tiles
/// * `num_players` - Number of players (1-8)
///
/// # Errors
///
/// Returns [`EngineError::MapLoad`] if the size or player count is invalid.
pub fn generate_map(
    seed: u64,
    width: u16,
    height: u16,
    num_players: usize,
) -> EngineResult<MapDescriptor> {
    if num_players == 0 || num_players > MAX_PLAYERS {
        return Err(EngineError::MapLoad(format!(
            "player count must be between 1 and {MAX_PLAYERS}, got {num_players}"
        )));
    }
    if width < MIN_GENERATED_SIZE || height < MIN_GENERATED_SIZE {
        return Err(EngineError::MapLoad(format!(
            "generated maps need {MIN_GENERATED_SIZE} tiles per side, got {width}x{height}"
        )));
    }

    let mut rng = Rng::new(seed);
    let mut grid = Grid::new(width, height);

    generate_terrain(&mut grid, &mut rng);
    place_deposits(&mut grid, &mut rng);
    let starts = find_starting_positions(&grid, num_players, &mut rng)?;
    prepare_bases(&mut grid, &starts);

    let mut descriptor = MapDescriptor {
        name: format!("generated-{seed}"),
        width,
        height,
        rows: grid.rows(),
        deposits: DEFAULT_DEPOSITS,
        starts,
    };
    connect_starts(&mut grid, &mut descriptor)?;
    descriptor.validate()?;
    Ok(descriptor)
}

/// Scatter walls, water and forest.
fn generate_terrain(grid: &mut Grid, rng: &mut Rng) {
    for coord in grid.coords() {
        let noise = rng.next_f64();
        let terrain = if noise < 0.05 {
            TerrainKind::Wall
        } else if noise < 0.09 {
            TerrainKind::Water
        } else if noise < 0.15 {
            TerrainKind::Forest
        } else {
            continue;
        };
        grid.set(coord, terrain);
    }
}

/// One gold mine per 8x8 cell and an occasional oil well.
fn place_deposits(grid: &mut Grid, rng: &mut Rng) {
    let cell = 8u16;
    for base_y in (0..grid.height).step_by(usize::from(cell)) {
        for base_x in (0..grid.width).step_by(usize::from(cell)) {
            let cell_w = cell.min(grid.width - base_x);
            let cell_h = cell.min(grid.height - base_y);
            let x = base_x + rng.next_u32(u32::from(cell_w)) as u16;
            let y = base_y + rng.next_u32(u32::from(cell_h)) as u16;
            grid.set(Coord::new(x, y), TerrainKind::GoldMine);

            if rng.next_u32(4) == 0 {
                let x = base_x + rng.next_u32(u32::from(cell_w)) as u16;
                let y = base_y + rng.next_u32(u32::from(cell_h)) as u16;
                grid.set(Coord::new(x, y), TerrainKind::Oil);
            }
        }
    }
}

/// Spread players evenly on a circle around the centre.
fn find_starting_positions(
    grid: &Grid,
    num_players: usize,
    rng: &mut Rng,
) -> EngineResult<Vec<Coord>> {
    let center_x = f64::from(grid.width) / 2.0;
    let center_y = f64::from(grid.height) / 2.0;
    let radius = f64::from(grid.width.min(grid.height)) * 0.35;

    // Keep starts away from the edge so every base has room.
    let margin = 2;
    let candidates: Vec<Coord> = grid
        .coords()
        .filter(|c| {
            c.x >= margin
                && c.y >= margin
                && c.x + margin < grid.width
                && c.y + margin < grid.height
        })
        .collect();

    let mut positions: Vec<Coord> = Vec::with_capacity(num_players);
    let angle_step = std::f64::consts::TAU / (num_players as f64);
    let angle_offset = rng.next_f64() * std::f64::consts::TAU;

    for i in 0..num_players {
        let angle = angle_offset + (i as f64) * angle_step;
        let target_x = center_x + radius * angle.cos();
        let target_y = center_y + radius * angle.sin();

        let best = candidates
            .iter()
            .filter(|c| positions.iter().all(|p| p.distance(**c) > 2))
            .min_by_key(|c| {
                let dx = f64::from(c.x) - target_x;
                let dy = f64::from(c.y) - target_y;
                ((dx * dx + dy * dy) * 1000.0) as u64
            })
            .copied()
            .ok_or_else(|| {
                EngineError::MapLoad(format!("no room for {num_players} start locations"))
            })?;
        positions.push(best);
    }

    Ok(positions)
}

/// Clear the area around each start and give it a gold mine and a forest.
fn prepare_bases(grid: &mut Grid, starts: &[Coord]) {
    for &start in starts {
        for radius in 0..=2 {
            for coord in grid.ring(start, radius) {
                grid.set(coord, TerrainKind::Grass);
            }
        }
        let outer = grid.ring(start, 3);
        let mut spots = outer
            .into_iter()
            .filter(|c| starts.iter().all(|s| s.distance(*c) > 2));
        if let Some(gold) = spots.next() {
            grid.set(gold, TerrainKind::GoldMine);
        }
        if let Some(forest) = spots.last() {
            grid.set(forest, TerrainKind::Forest);
        }
    }
}

/// Carve a grass corridor between starts that cannot reach each other.
fn connect_starts(grid: &mut Grid, descriptor: &mut MapDescriptor) -> EngineResult<()> {
    let Some((&first, rest)) = descriptor.starts.split_first() else {
        return Ok(());
    };
    for &other in rest {
        let map = descriptor.build_tilemap()?;
        if find_path(&map, first, other, Capabilities::GROUND).is_ok() {
            continue;
        }
        let mut cursor = first;
        while cursor != other {
            if cursor.x != other.x {
                cursor.x = if cursor.x < other.x { cursor.x + 1 } else { cursor.x - 1 };
            } else {
                cursor.y = if cursor.y < other.y { cursor.y + 1 } else { cursor.y - 1 };
            }
            if !grid.get(cursor).is_walkable() {
                grid.set(cursor, TerrainKind::Grass);
            }
        }
        descriptor.rows = grid.rows();
    }
    Ok(())
}
