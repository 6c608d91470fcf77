#![no_main]

use arbitrary::Arbitrary;
use deeprts::game::{find_path, Capabilities, Direction, Pathfinder, Resources};
use deeprts::{Coord, EngineError, MapDescriptor};
use libfuzzer_sys::fuzz_target;

/// Structured input for pathfinder fuzzing.
#[derive(Arbitrary, Debug)]
struct PathInput {
    width: u8,
    height: u8,
    /// Blocked tiles, one bit per byte.
    blocked: Vec<u8>,
    start: (u8, u8),
    goal: (u8, u8),
    flying: bool,
}

fuzz_target!(|input: PathInput| {
    let width = u16::from(input.width % 24) + 1;
    let height = u16::from(input.height % 24) + 1;

    let start = Coord::new(u16::from(input.start.0) % width, u16::from(input.start.1) % height);
    let goal = Coord::new(u16::from(input.goal.0) % width, u16::from(input.goal.1) % height);

    // The start stays open so the map always has a valid start location
    let rows: Vec<String> = (0..height)
        .map(|y| {
            (0..width)
                .map(|x| {
                    let i = usize::from(y) * usize::from(width) + usize::from(x);
                    match input.blocked.get(i) {
                        Some(b) if b % 4 == 0 && Coord::new(x, y) != start => '#',
                        _ => '.',
                    }
                })
                .collect()
        })
        .collect();

    let descriptor = MapDescriptor {
        name: "fuzz".to_string(),
        width,
        height,
        rows,
        deposits: Resources::default(),
        starts: vec![start],
    };
    let Ok(map) = descriptor.build_tilemap() else {
        return;
    };

    let caps = if input.flying {
        Capabilities::AIR
    } else {
        Capabilities::GROUND
    };

    let result = find_path(&map, start, goal, caps);
    match &result {
        Ok(path) => {
            assert_eq!(path.first(), Some(&start));
            assert_eq!(path.last(), Some(&goal));
            assert!(path.len() as u32 - 1 >= start.distance(goal));
            if input.flying {
                assert_eq!(path.len() as u32 - 1, start.distance(goal));
            }
            for pair in path.windows(2) {
                assert_eq!(pair[0].distance(pair[1]), 1);
                assert!(Direction::towards(pair[0], pair[1]).is_some());
                if !input.flying {
                    assert!(map.is_walkable(pair[1]));
                }
            }
        }
        Err(EngineError::Unreachable { .. }) => assert!(!input.flying),
        Err(e) => panic!("unexpected error: {e}"),
    }

    // The cache must agree with a fresh search, including on repeat lookups
    let mut cache = Pathfinder::new();
    let first = cache.find_path(&map, start, goal, caps).ok();
    let second = cache.find_path(&map, start, goal, caps).ok();
    assert_eq!(first, result.ok());
    assert_eq!(first, second);
});
