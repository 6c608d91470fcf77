#![no_main]

use arbitrary::Arbitrary;
use deeprts::game::{check_invariants, is_legal_transition, Resources};
use deeprts::{Command, Coord, EngineError, Game, GameConfig, MapDescriptor, UnitKind};
use libfuzzer_sys::fuzz_target;

const SIZE: u16 = 10;

/// One fuzzed command.
#[derive(Arbitrary, Debug)]
enum FuzzCommand {
    Move { unit: u8, x: u8, y: u8 },
    Attack { unit: u8, target: u8 },
    Harvest { unit: u8, x: u8, y: u8 },
    Build { unit: u8, kind: u8 },
    Spawn { player: u8, kind: u8, x: u8, y: u8 },
}

/// Structured input for step fuzzing.
#[derive(Arbitrary, Debug)]
struct StepInput {
    /// Terrain symbols, one byte per tile.
    terrain: [u8; 100],
    /// Commands per step.
    steps: Vec<Vec<FuzzCommand>>,
}

fn terrain_symbol(byte: u8) -> char {
    match byte % 10 {
        0 => '#',
        1 => '~',
        2 => 'f',
        3 => 'g',
        4 => 'o',
        _ => '.',
    }
}

fn kind(byte: u8) -> UnitKind {
    UnitKind::ALL[usize::from(byte) % UnitKind::ALL.len()]
}

// Coordinates may land one tile outside the map to cover bounds checks.
fn coord(x: u8, y: u8) -> Coord {
    Coord::new(u16::from(x) % (SIZE + 1), u16::from(y) % (SIZE + 1))
}

impl FuzzCommand {
    fn to_command(&self) -> Command {
        match *self {
            Self::Move { unit, x, y } => Command::Move {
                unit: u32::from(unit % 16),
                to: coord(x, y),
            },
            Self::Attack { unit, target } => Command::Attack {
                unit: u32::from(unit % 16),
                target: u32::from(target % 16),
            },
            Self::Harvest { unit, x, y } => Command::Harvest {
                unit: u32::from(unit % 16),
                at: coord(x, y),
            },
            Self::Build { unit, kind: k } => Command::Build {
                unit: u32::from(unit % 16),
                kind: kind(k),
            },
            Self::Spawn { player, kind: k, x, y } => Command::Spawn {
                player: player % 4,
                kind: kind(k),
                at: coord(x, y),
            },
        }
    }
}

fuzz_target!(|input: StepInput| {
    let width = usize::from(SIZE);
    let mut rows: Vec<String> = input
        .terrain
        .chunks(width)
        .map(|row| row.iter().copied().map(terrain_symbol).collect())
        .collect();
    rows[0].replace_range(0..1, ".");
    rows[width - 1].replace_range(width - 1..width, ".");

    let descriptor = MapDescriptor {
        name: "fuzz".to_string(),
        width: SIZE,
        height: SIZE,
        rows,
        deposits: Resources::new(30, 30, 30),
        starts: vec![Coord::new(0, 0), Coord::new(SIZE - 1, SIZE - 1)],
    };
    let config = GameConfig {
        start_units: vec![UnitKind::TownHall, UnitKind::Peasant, UnitKind::Footman],
        decay_ticks: 2,
        ..GameConfig::default()
    };

    let Ok(mut game) = Game::new(descriptor, config) else {
        return;
    };

    // Cap the number of steps to keep runs fast
    for step in input.steps.iter().take(64) {
        let commands: Vec<Command> = step.iter().take(8).map(FuzzCommand::to_command).collect();
        let before = game.state_hash();
        let report = match game.step(&commands) {
            Ok(report) => report,
            Err(EngineError::GameOver) => {
                assert_eq!(game.state_hash(), before, "game over step changed the world");
                break;
            }
            Err(e) => panic!("step failed: {e}"),
        };

        assert_eq!(report.results.len(), commands.len());
        for t in &report.events.transitions {
            assert!(
                is_legal_transition(t.from, t.to),
                "illegal transition {:?} -> {:?}",
                t.from,
                t.to
            );
        }

        let violations = check_invariants(&game);
        assert!(violations.is_empty(), "invariant violations: {violations:?}");
    }
});
