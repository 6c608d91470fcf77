//! Property-based tests for the simulation.
//!
//! These tests drive games with arbitrary command streams and check the
//! properties every step must preserve: determinism, legal state changes,
//! unit conservation, resource accounting and world consistency. Pathfinding
//! is checked against a breadth-first reference.
//!
//! Run with: cargo test --release prop_game

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};

use proptest::prelude::*;

use deeprts::game::{
    Capabilities, Direction, ResourceKind, Tilemap, check_invariants, find_path,
    is_legal_transition,
};
use deeprts::{Command, Coord, EngineError, Game, GameConfig, MapDescriptor, TerrainKind, UnitKind};

const SIZE: u16 = 8;

fn arb_coord() -> impl Strategy<Value = Coord> {
    (0..SIZE + 2, 0..SIZE + 2).prop_map(|(x, y)| Coord::new(x, y))
}

fn arb_kind() -> impl Strategy<Value = UnitKind> {
    prop::sample::select(UnitKind::ALL.to_vec())
}

fn arb_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        4 => (1u32..12, arb_coord()).prop_map(|(unit, to)| Command::Move { unit, to }),
        3 => (1u32..12, 1u32..12).prop_map(|(unit, target)| Command::Attack { unit, target }),
        2 => (1u32..12, arb_coord()).prop_map(|(unit, at)| Command::Harvest { unit, at }),
        1 => (1u32..12, arb_kind()).prop_map(|(unit, kind)| Command::Build { unit, kind }),
        2 => (0u8..4, arb_kind(), arb_coord())
            .prop_map(|(player, kind, at)| Command::Spawn { player, kind, at }),
    ]
}

fn arb_script() -> impl Strategy<Value = Vec<Vec<Command>>> {
    prop::collection::vec(prop::collection::vec(arb_command(), 0..4), 1..40)
}

fn arb_rows() -> impl Strategy<Value = Vec<String>> {
    let symbol = prop_oneof![
        6 => Just('.'),
        1 => Just('#'),
        1 => Just('~'),
        1 => Just('f'),
        1 => Just('g'),
    ];
    prop::collection::vec(
        prop::collection::vec(symbol, usize::from(SIZE)).prop_map(|r| r.into_iter().collect()),
        usize::from(SIZE),
    )
}

/// Two-player map with a free corner for each start.
fn descriptor(mut rows: Vec<String>) -> MapDescriptor {
    let last = usize::from(SIZE - 1);
    rows[0].replace_range(0..1, ".");
    rows[last].replace_range(last..=last, ".");
    MapDescriptor {
        name: "prop".to_string(),
        width: SIZE,
        height: SIZE,
        rows,
        deposits: deeprts::game::Resources::new(40, 40, 40),
        starts: vec![Coord::new(0, 0), Coord::new(SIZE - 1, SIZE - 1)],
    }
}

fn config() -> GameConfig {
    GameConfig {
        start_units: vec![
            UnitKind::TownHall,
            UnitKind::Peasant,
            UnitKind::Footman,
            UnitKind::Archer,
        ],
        decay_ticks: 3,
        ..GameConfig::default()
    }
}

/// Run `script`, returning the state hash after every step.
fn run(game: &mut Game, script: &[Vec<Command>]) -> Vec<u64> {
    let mut hashes = Vec::with_capacity(script.len());
    for commands in script {
        match game.step(commands) {
            Ok(_) => hashes.push(game.state_hash()),
            Err(EngineError::GameOver) => break,
            Err(e) => panic!("step failed: {e}"),
        }
    }
    hashes
}

/// Reference shortest-path length by breadth-first search under the same
/// movement rules as the engine.
fn bfs_distance(map: &Tilemap, start: Coord, goal: Coord) -> Option<usize> {
    let mut dist = HashMap::from([(start, 0usize)]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        if current == goal {
            return dist.get(&current).copied();
        }
        let d = dist[&current];
        for (direction, next) in map.neighbors(current) {
            if !map.is_walkable(next) || dist.contains_key(&next) {
                continue;
            }
            if direction.is_diagonal() {
                let (dx, dy) = direction.delta();
                let h = Coord::new(current.x.checked_add_signed(dx).unwrap(), current.y);
                let v = Coord::new(current.x, current.y.checked_add_signed(dy).unwrap());
                if !(map.is_terrain_walkable(h) && map.is_terrain_walkable(v)) {
                    continue;
                }
            }
            dist.insert(next, d + 1);
            queue.push_back(next);
        }
    }
    None
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Identical command streams from a fresh start produce identical worlds,
    /// whether replayed on a new game or after reset.
    #[test]
    fn prop_determinism(rows in arb_rows(), script in arb_script()) {
        let descriptor = descriptor(rows);
        let mut first = Game::new(descriptor.clone(), config()).unwrap();
        let mut second = Game::new(descriptor, config()).unwrap();

        let a = run(&mut first, &script);
        let b = run(&mut second, &script);
        prop_assert_eq!(&a, &b);

        first.reset();
        let c = run(&mut first, &script);
        prop_assert_eq!(&a, &c);
    }

    /// Every step keeps the world consistent and only takes legal transitions.
    #[test]
    fn prop_step_preserves_invariants(rows in arb_rows(), script in arb_script()) {
        let config = config();
        let start_bank = config.starting_resources;
        let mut game = Game::new(descriptor(rows), config).unwrap();

        for commands in &script {
            let report = match game.step(commands) {
                Ok(report) => report,
                Err(EngineError::GameOver) => break,
                Err(e) => panic!("step failed: {e}"),
            };
            prop_assert_eq!(report.results.len(), commands.len());

            for t in &report.events.transitions {
                prop_assert!(
                    is_legal_transition(t.from, t.to),
                    "illegal transition {:?} -> {:?} for unit {}", t.from, t.to, t.unit
                );
            }

            let violations = check_invariants(&game);
            prop_assert!(violations.is_empty(), "{:?}", violations);

            let units = game.units();
            prop_assert_eq!(
                units.spawned_total() - units.despawned_total(),
                units.len() as u64
            );

            for player in game.players() {
                for kind in ResourceKind::ALL {
                    let expected = u64::from(start_bank.get(kind))
                        + u64::from(player.stats.gathered.get(kind))
                        - u64::from(player.stats.spent.get(kind));
                    prop_assert_eq!(u64::from(player.balance(kind)), expected);
                }
            }
        }
    }

    /// A* returns shortest paths and agrees with BFS on reachability.
    #[test]
    fn prop_path_is_shortest(
        rows in arb_rows(),
        sx in 0..SIZE, sy in 0..SIZE, gx in 0..SIZE, gy in 0..SIZE
    ) {
        let map = descriptor(rows).build_tilemap().unwrap();
        let start = Coord::new(sx, sy);
        let goal = Coord::new(gx, gy);
        prop_assume!(map.is_walkable(start));

        let expected = bfs_distance(&map, start, goal);
        match find_path(&map, start, goal, Capabilities::GROUND) {
            Ok(path) => {
                prop_assert_eq!(Some(path.len() - 1), expected);
                prop_assert_eq!(path.first(), Some(&start));
                prop_assert_eq!(path.last(), Some(&goal));
                for pair in path.windows(2) {
                    prop_assert_eq!(pair[0].distance(pair[1]), 1);
                    prop_assert!(map.is_walkable(pair[1]));
                    let dir = Direction::towards(pair[0], pair[1]).unwrap();
                    prop_assert!(map.neighbors(pair[0]).any(|(d, _)| d == dir));
                }
            }
            Err(EngineError::Unreachable { .. }) => prop_assert_eq!(expected, None),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    /// The same search twice gives the same path.
    #[test]
    fn prop_path_is_deterministic(rows in arb_rows(), gx in 0..SIZE, gy in 0..SIZE) {
        let map = descriptor(rows).build_tilemap().unwrap();
        let goal = Coord::new(gx, gy);
        let a = find_path(&map, Coord::new(0, 0), goal, Capabilities::GROUND).ok();
        let b = find_path(&map, Coord::new(0, 0), goal, Capabilities::GROUND).ok();
        prop_assert_eq!(a, b);
    }

    /// Flyers ignore terrain: any in-bounds goal is reachable in Chebyshev
    /// distance steps.
    #[test]
    fn prop_flying_paths_are_direct(
        rows in arb_rows(),
        sx in 0..SIZE, sy in 0..SIZE, gx in 0..SIZE, gy in 0..SIZE
    ) {
        let map = descriptor(rows).build_tilemap().unwrap();
        let start = Coord::new(sx, sy);
        let goal = Coord::new(gx, gy);
        let path = find_path(&map, start, goal, Capabilities::AIR).unwrap();
        prop_assert_eq!(path.len() - 1, start.distance(goal) as usize);
    }
}

#[test]
fn test_descriptor_helper_keeps_starts_open() {
    let rows = vec!["#".repeat(usize::from(SIZE)); usize::from(SIZE)];
    let descriptor = descriptor(rows);
    let map = descriptor.build_tilemap().unwrap();
    assert_eq!(map.tile_at(Coord::new(0, 0)).unwrap().terrain, TerrainKind::Grass);
    assert_eq!(
        map.tile_at(Coord::new(SIZE - 1, SIZE - 1)).unwrap().terrain,
        TerrainKind::Grass
    );
}
