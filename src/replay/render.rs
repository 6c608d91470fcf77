//! ASCII renderer for terminal viewing with ANSI colors.

use std::fmt::Write as _;

use crate::game::{Coord, Game, PlayerId, StateTag, TerrainKind, Unit, UnitKind};

/// ANSI color codes for players.
const PLAYER_COLORS: [&str; 8] = [
    "\x1b[31m", // Player 1: Red
    "\x1b[34m", // Player 2: Blue
    "\x1b[32m", // Player 3: Green
    "\x1b[33m", // Player 4: Yellow
    "\x1b[35m", // Player 5: Magenta
    "\x1b[36m", // Player 6: Cyan
    "\x1b[91m", // Player 7: Bright Red
    "\x1b[94m", // Player 8: Bright Blue
];

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const WHITE: &str = "\x1b[37m";
const GRAY: &str = "\x1b[90m";

/// Render game state to ASCII with ANSI colors.
///
/// Output format:
/// ```text
/// Tick 42                                  [P1: 3 units] [P2: 2 units]
/// ┌─────────────────┐
/// │ . . # . p . . . │
/// │ . g . . . . F . │
/// └─────────────────┘
///
/// Legend: .=Grass #=Wall ~=Water f=Forest g=Gold o=Oil  unit letters: see below
///
/// Player 1:  Gold: 200  Lumber: 150  Oil: 50  Units: 3
/// ```
#[must_use]
pub fn render_ascii(game: &Game) -> String {
    let mut output = String::new();

    render_header(&mut output, game);
    render_map(&mut output, game);

    output.push_str(
        "\nLegend: .=Grass #=Wall ~=Water f=Forest g=Gold o=Oil  \
         P=Peasant F=Footman A=Archer H=Hall B=Barracks M=Farm x=Dead\n\n",
    );

    render_player_stats(&mut output, game);
    output
}

fn render_header(output: &mut String, game: &Game) {
    let title = format!("Tick {}", game.tick());
    output.push_str(&title);
    for _ in 0..40usize.saturating_sub(title.len()) {
        output.push(' ');
    }
    for player in game.players() {
        let color = get_player_color(player.id);
        let _ = write!(output, "{color}[P{}: {} units]{RESET} ", player.id, player.units.len());
    }
    if game.is_game_over() {
        match game.winner() {
            Some(winner) => {
                let _ = write!(output, "{BOLD}Winner: P{winner}{RESET}");
            }
            None => output.push_str(&format!("{BOLD}Draw{RESET}")),
        }
    }
    output.push('\n');
}

fn render_map(output: &mut String, game: &Game) {
    let map = game.map();
    let border: String = "─".repeat(usize::from(map.width()) * 2 + 1);

    let _ = writeln!(output, "┌{border}┐");
    for y in 0..map.height() {
        output.push_str("│ ");
        for x in 0..map.width() {
            render_tile(output, game, Coord::new(x, y));
            output.push(' ');
        }
        output.push_str("│\n");
    }
    let _ = writeln!(output, "└{border}┘");
}

/// Unit on `coord`, preferring live ground occupants over flyers and corpses.
fn unit_at(game: &Game, coord: Coord) -> Option<&Unit> {
    game.map()
        .occupant(coord)
        .and_then(|id| game.unit(id))
        .or_else(|| {
            game.units()
                .iter()
                .filter(|u| u.position == coord)
                .min_by_key(|u| (!u.is_alive(), u.id))
        })
}

fn render_tile(output: &mut String, game: &Game, coord: Coord) {
    if let Some(unit) = unit_at(game, coord) {
        let color = get_player_color(unit.owner);
        let symbol = if unit.tag() == StateTag::Dead {
            'x'
        } else {
            unit_symbol(unit.kind)
        };
        let _ = write!(output, "{color}{symbol}{RESET}");
        return;
    }

    let Ok(tile) = game.map().tile_at(coord) else {
        output.push('?');
        return;
    };
    let symbol = tile.terrain.symbol();
    match tile.terrain {
        TerrainKind::Grass => {
            let _ = write!(output, "{GRAY}{symbol}{RESET}");
        }
        TerrainKind::Wall => {
            let _ = write!(output, "{WHITE}{BOLD}{symbol}{RESET}");
        }
        _ => {
            let _ = write!(output, "{WHITE}{symbol}{RESET}");
        }
    }
}

const fn unit_symbol(kind: UnitKind) -> char {
    match kind {
        UnitKind::Peasant => 'P',
        UnitKind::Footman => 'F',
        UnitKind::Archer => 'A',
        UnitKind::TownHall => 'H',
        UnitKind::Barracks => 'B',
        UnitKind::Farm => 'M',
    }
}

/// Get ANSI color for a player.
fn get_player_color(player_id: PlayerId) -> &'static str {
    let idx = usize::from(player_id).saturating_sub(1);
    PLAYER_COLORS.get(idx).copied().unwrap_or(WHITE)
}

fn render_player_stats(output: &mut String, game: &Game) {
    for player in game.players() {
        if player.defeated {
            let _ = writeln!(output, "{DIM}Player {}: DEFEATED{RESET}", player.id);
            continue;
        }
        let color = get_player_color(player.id);
        let res = player.resources;
        let _ = writeln!(
            output,
            "{color}Player {}:{RESET}  Gold: {:<5} Lumber: {:<5} Oil: {:<5} Units: {:<3} Kills: {}",
            player.id,
            res.gold,
            res.lumber,
            res.oil,
            player.units.len(),
            player.stats.kills
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::MapDescriptor;

    fn create_test_game() -> Game {
        let mut descriptor = MapDescriptor::open(8, 8, vec![Coord::new(2, 2), Coord::new(5, 5)]);
        descriptor.rows[3] = "...##...".to_string();
        Game::new(descriptor, GameConfig::default()).unwrap()
    }

    #[test]
    fn test_render_ascii_basic() {
        let output = render_ascii(&create_test_game());

        assert!(output.contains("Tick 0"));
        assert!(output.contains("┌"));
        assert!(output.contains("┘"));
        assert!(output.contains("Legend"));
        assert!(output.contains("Player 1"));
        assert!(output.contains("Player 2"));
        assert!(output.contains('#'));
        assert!(output.contains('P'));
    }

    #[test]
    fn test_unit_symbols_are_distinct() {
        let mut symbols: Vec<char> = UnitKind::ALL.iter().map(|k| unit_symbol(*k)).collect();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), UnitKind::ALL.len());
    }

    #[test]
    fn test_get_player_color() {
        for i in 1..=8 {
            assert_ne!(get_player_color(i), WHITE);
        }
        assert_eq!(get_player_color(0), PLAYER_COLORS[0]);
        assert_eq!(get_player_color(9), WHITE);
    }
}
