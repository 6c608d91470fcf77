//! Output formatting utilities for CLI.

use deeprts::batch::{BatchStats, GameResult};
use std::fmt::Write as _;

/// Format a game result as human-readable text.
pub(super) fn format_text(result: &GameResult) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Game Result (seed: {})", result.seed);
    match (result.winner, result.finished) {
        (Some(winner), _) => {
            let _ = writeln!(output, "  Winner: Player {winner}");
        }
        (None, true) => output.push_str("  Winner: none (all players defeated)\n"),
        (None, false) => output.push_str("  Winner: undecided (tick limit)\n"),
    }
    let _ = writeln!(output, "  Ticks: {}", result.ticks_played);
    let _ = writeln!(output, "  State hash: {:016x}", result.final_hash);
    let _ = writeln!(output, "  Rejected commands: {}\n", result.rejected_commands);

    for player in &result.players {
        let stats = &player.stats;
        let _ = write!(
            output,
            "  Player {}: {} units, {} kills, {} lost, gathered {}g/{}l/{}o",
            player.id,
            player.units,
            stats.kills,
            stats.units_lost,
            stats.gathered.gold,
            stats.gathered.lumber,
            stats.gathered.oil
        );
        if player.defeated {
            output.push_str(" [defeated]");
        }
        output.push('\n');
    }

    output
}

/// Format batch stats as human-readable text.
#[allow(clippy::cast_precision_loss)]
pub(super) fn format_batch_text(stats: &BatchStats) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Batch Results ({} games)", stats.games_played);
    output.push_str("========================================\n\n");

    output.push_str("Win Rates:\n");
    for (i, wins) in stats.wins.iter().enumerate() {
        let rate = stats.win_rate(i) * 100.0;
        let _ = writeln!(output, "  Player {}: {rate:.1}% ({wins} wins)", i + 1);
    }
    let games = stats.games_played.max(1) as f64;
    let _ = writeln!(
        output,
        "  No winner: {} ({:.1}%)",
        stats.draws,
        stats.draws as f64 / games * 100.0
    );
    let _ = writeln!(
        output,
        "  Undecided: {} ({:.1}%)\n",
        stats.undecided,
        stats.undecided as f64 / games * 100.0
    );

    output.push_str("Kills:\n");
    for (i, kills) in stats.kills.iter().enumerate() {
        let _ = writeln!(output, "  Player {}: {kills}", i + 1);
    }

    let _ = writeln!(output, "\nAverage Game Length: {:.0} ticks", stats.avg_ticks());
    let _ = writeln!(output, "Rejected Commands: {}", stats.rejected_commands);
    if stats.errors > 0 {
        let _ = writeln!(output, "Failed Games: {}", stats.errors);
    }

    output
}

/// Format batch stats as CSV.
pub(super) fn format_batch_csv(stats: &BatchStats) -> String {
    let mut output = String::new();

    // Header
    output.push_str("player,wins,win_rate,kills\n");

    // Data rows
    for (i, wins) in stats.wins.iter().enumerate() {
        let _ = writeln!(
            output,
            "{},{},{:.4},{}",
            i + 1,
            wins,
            stats.win_rate(i),
            stats.kills.get(i).copied().unwrap_or(0)
        );
    }

    output
}
