//! Batch runner for scripted games.
//!
//! Provides a pure function interface: `(seed, config) -> GameResult`
//!
//! Every player is driven by the same deterministic skirmish script, so a
//! batch over a seed range measures the engine and the generated maps rather
//! than any particular strategy. Games run in parallel with rayon; a single
//! game is always simulated on one thread.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::config::GameConfig;
use crate::error::EngineResult;
use crate::game::{
    Command, Coord, Game, PlayerId, PlayerStats, Resources, StateTag, Tilemap, Unit, UnitKind,
    acquire_target, generate_map,
};

/// Configuration for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Ticks before an undecided game is stopped.
    pub max_ticks: u64,
    /// Generated map width.
    pub map_width: u16,
    /// Generated map height.
    pub map_height: u16,
    /// Number of players.
    pub players: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_ticks: 500,
            map_width: 32,
            map_height: 32,
            players: 2,
        }
    }
}

/// Rules used by scripted games: every player starts with a small army.
#[must_use]
pub fn skirmish_config() -> GameConfig {
    GameConfig {
        start_units: vec![
            UnitKind::TownHall,
            UnitKind::Peasant,
            UnitKind::Peasant,
            UnitKind::Footman,
            UnitKind::Archer,
        ],
        ..GameConfig::default()
    }
}

/// Final state of one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    /// Player identifier.
    pub id: PlayerId,
    /// Whether the player was defeated.
    pub defeated: bool,
    /// Units still owned at the end.
    pub units: usize,
    /// Final bank.
    pub resources: Resources,
    /// Running totals.
    pub stats: PlayerStats,
}

/// Final result of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameResult {
    /// The seed used for this game.
    pub seed: u64,
    /// The winning player (None if undecided or nobody is left).
    pub winner: Option<PlayerId>,
    /// Whether the game ended before the tick limit.
    pub finished: bool,
    /// Total ticks played.
    pub ticks_played: u64,
    /// State hash after the last tick.
    pub final_hash: u64,
    /// Commands the engine rejected.
    pub rejected_commands: u64,
    /// Per-player results, ordered by id.
    pub players: Vec<PlayerSummary>,
}

impl GameResult {
    /// Summarize `game` as it stands now.
    #[must_use]
    pub fn from_game(seed: u64, game: &Game, rejected_commands: u64) -> Self {
        Self {
            seed,
            winner: game.winner(),
            finished: game.is_game_over(),
            ticks_played: game.tick(),
            final_hash: game.state_hash(),
            rejected_commands,
            players: game
                .players()
                .iter()
                .map(|p| PlayerSummary {
                    id: p.id,
                    defeated: p.defeated,
                    units: p.units.len(),
                    resources: p.resources,
                    stats: p.stats,
                })
                .collect(),
        }
    }
}

/// Run a complete scripted game on a generated map.
///
/// # Determinism
///
/// Given the same seed and configuration, this function always produces the
/// same `GameResult`, including `final_hash`.
///
/// # Errors
///
/// Returns an error if the map cannot be generated or a step fails.
pub fn run_game(seed: u64, config: &GameConfig, batch: &BatchConfig) -> EngineResult<GameResult> {
    let descriptor = generate_map(seed, batch.map_width, batch.map_height, batch.players)?;
    let mut game = Game::new(descriptor, config.clone())?;
    let mut rejected_commands = 0u64;

    while !game.is_game_over() && game.tick() < batch.max_ticks {
        let commands = script_commands(&game);
        let report = game.step(&commands)?;
        rejected_commands += report.rejected() as u64;
    }

    debug!(
        seed,
        ticks = game.tick(),
        winner = ?game.winner(),
        rejected_commands,
        "scripted game finished"
    );

    Ok(GameResult::from_game(seed, &game, rejected_commands))
}

/// Run `games` games with consecutive seeds starting at `base_seed`.
///
/// Results are returned in seed order regardless of scheduling.
#[must_use]
pub fn run_batch(
    base_seed: u64,
    games: u64,
    config: &GameConfig,
    batch: &BatchConfig,
) -> Vec<EngineResult<GameResult>> {
    (0..games)
        .into_par_iter()
        .map(|i| run_game(base_seed.wrapping_add(i), config, batch))
        .collect()
}

/// Aggregated statistics over many games.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    /// Games that ran to completion or to the tick limit.
    pub games_played: u64,
    /// Games that failed with an engine error.
    pub errors: u64,
    /// Win count per player.
    pub wins: Vec<u64>,
    /// Games stopped at the tick limit.
    pub undecided: u64,
    /// Games that ended with nobody left.
    pub draws: u64,
    /// Kills per player.
    pub kills: Vec<u64>,
    /// Total ticks across all games.
    pub total_ticks: u64,
    /// Total rejected commands across all games.
    pub rejected_commands: u64,
}

impl BatchStats {
    /// Create new stats for n players.
    #[must_use]
    pub fn new(num_players: usize) -> Self {
        Self {
            wins: vec![0; num_players],
            kills: vec![0; num_players],
            ..Self::default()
        }
    }

    /// Add a game outcome to the stats.
    pub fn add(&mut self, result: &EngineResult<GameResult>) {
        let Ok(result) = result else {
            self.errors += 1;
            return;
        };
        self.games_played += 1;
        self.total_ticks += result.ticks_played;
        self.rejected_commands += result.rejected_commands;

        match (result.finished, result.winner) {
            (_, Some(winner)) => {
                if let Some(w) = self.wins.get_mut(usize::from(winner).saturating_sub(1)) {
                    *w += 1;
                }
            }
            (true, None) => self.draws += 1,
            (false, None) => self.undecided += 1,
        }

        for (slot, player) in self.kills.iter_mut().zip(&result.players) {
            *slot += u64::from(player.stats.kills);
        }
    }

    /// Merge another set of stats into this one.
    pub fn merge(&mut self, other: &Self) {
        self.games_played += other.games_played;
        self.errors += other.errors;
        self.undecided += other.undecided;
        self.draws += other.draws;
        self.total_ticks += other.total_ticks;
        self.rejected_commands += other.rejected_commands;
        for (a, b) in self.wins.iter_mut().zip(&other.wins) {
            *a += b;
        }
        for (a, b) in self.kills.iter_mut().zip(&other.kills) {
            *a += b;
        }
    }

    /// Get win rate for a player index (0.0-1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn win_rate(&self, player_idx: usize) -> f64 {
        if self.games_played == 0 {
            return 0.0;
        }
        self.wins.get(player_idx).copied().unwrap_or(0) as f64 / self.games_played as f64
    }

    /// Get average game length.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_ticks(&self) -> f64 {
        if self.games_played == 0 {
            return 0.0;
        }
        self.total_ticks as f64 / self.games_played as f64
    }
}

/// Aggregate a batch without keeping individual results.
///
/// Each rayon worker folds into its own [`BatchStats`]; the partial stats are
/// merged at the end. `on_game` is called once per finished game.
#[must_use]
pub fn run_batch_stats(
    base_seed: u64,
    games: u64,
    config: &GameConfig,
    batch: &BatchConfig,
    on_game: impl Fn() + Sync,
) -> BatchStats {
    (0..games)
        .into_par_iter()
        .fold(
            || BatchStats::new(batch.players),
            |mut local, i| {
                local.add(&run_game(base_seed.wrapping_add(i), config, batch));
                on_game();
                local
            },
        )
        .reduce(
            || BatchStats::new(batch.players),
            |mut a, b| {
                a.merge(&b);
                a
            },
        )
}

/// Commands the skirmish script issues this tick for every standing player.
///
/// Only idle units receive orders. Fighters attack anything in range or
/// close in on the nearest enemy; peasants put up a barracks once the bank
/// allows it and otherwise harvest; structures train while affordable.
#[must_use]
pub fn script_commands(game: &Game) -> Vec<Command> {
    let mut commands = Vec::new();
    for player in game.players().iter().filter(|p| !p.defeated) {
        let mut bank = player.resources;
        let mut has_barracks = game
            .units()
            .units_of(player.id)
            .any(|u| u.kind == UnitKind::Barracks);

        for unit in game.units().units_of(player.id) {
            if unit.tag() != StateTag::Idle {
                continue;
            }
            let unit_type = game.config().unit_type(unit.kind);

            if unit_type.structure {
                let Some(&kind) = unit_type.trains.iter().rev().find(|k| {
                    bank.shortfall(&game.config().unit_type(**k).cost).is_none()
                }) else {
                    continue;
                };
                if let Some(at) = free_neighbour(game.map(), unit.position, unit.position) {
                    spend(&mut bank, &game.config().unit_type(kind).cost);
                    commands.push(Command::Spawn {
                        player: player.id,
                        kind,
                        at,
                    });
                }
                continue;
            }

            if unit_type.builds.contains(&UnitKind::Barracks) {
                let cost = &game.config().unit_type(UnitKind::Barracks).cost;
                if !has_barracks && bank.shortfall(cost).is_none() {
                    spend(&mut bank, cost);
                    has_barracks = true;
                    commands.push(Command::Build {
                        unit: unit.id,
                        kind: UnitKind::Barracks,
                    });
                } else if unit_type.harvest_amount > 0 {
                    commands.extend(harvest_order(game, unit));
                }
                continue;
            }

            if unit_type.attack > 0 {
                if let Some(target) = acquire_target(unit, unit_type.range, game.units()) {
                    commands.push(Command::Attack {
                        unit: unit.id,
                        target,
                    });
                } else if let Some(to) = nearest_enemy(game, unit)
                    .and_then(|enemy| free_neighbour(game.map(), enemy, unit.position))
                {
                    commands.push(Command::Move { unit: unit.id, to });
                }
            }
        }
    }
    commands
}

fn spend(bank: &mut Resources, cost: &Resources) {
    bank.gold = bank.gold.saturating_sub(cost.gold);
    bank.lumber = bank.lumber.saturating_sub(cost.lumber);
    bank.oil = bank.oil.saturating_sub(cost.oil);
}

/// Walkable neighbour of `center` closest to `from`.
fn free_neighbour(map: &Tilemap, center: Coord, from: Coord) -> Option<Coord> {
    map.neighbors(center)
        .map(|(_, c)| c)
        .filter(|&c| map.is_walkable(c))
        .min_by_key(|c| c.distance(from))
}

fn nearest_enemy(game: &Game, unit: &Unit) -> Option<Coord> {
    game.units()
        .iter()
        .filter(|u| u.owner != unit.owner && u.is_alive())
        .min_by_key(|u| (unit.position.distance(u.position), u.id))
        .map(|u| u.position)
}

fn harvest_order(game: &Game, unit: &Unit) -> Option<Command> {
    let map = game.map();
    let (deposit, _) = map
        .iter()
        .filter(|(_, tile)| tile.is_harvestable())
        .min_by_key(|(c, _)| c.distance(unit.position))?;

    if unit.position.is_adjacent(deposit) {
        return Some(Command::Harvest {
            unit: unit.id,
            at: deposit,
        });
    }
    free_neighbour(map, deposit, unit.position).map(|to| Command::Move { unit: unit.id, to })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_batch() -> BatchConfig {
        BatchConfig {
            max_ticks: 120,
            map_width: 16,
            map_height: 16,
            players: 2,
        }
    }

    #[test]
    fn test_run_game_is_deterministic() {
        let config = skirmish_config();
        let a = run_game(42, &config, &small_batch()).unwrap();
        let b = run_game(42, &config, &small_batch()).unwrap();
        assert_eq!(a, b);
        assert!(a.ticks_played <= 120);
        assert_eq!(a.players.len(), 2);
    }

    #[test]
    fn test_script_issues_orders() {
        let descriptor = generate_map(3, 16, 16, 2).unwrap();
        let mut game = Game::new(descriptor, skirmish_config()).unwrap();
        game.step(&[]).unwrap();
        let commands = script_commands(&game);
        assert!(!commands.is_empty());
        let report = game.step(&commands).unwrap();
        assert!(report.results.iter().any(|r| r.is_accepted()));
    }

    #[test]
    fn test_run_batch_preserves_seed_order() {
        let results = run_batch(10, 4, &skirmish_config(), &small_batch());
        let seeds: Vec<u64> = results.iter().map(|r| r.as_ref().unwrap().seed).collect();
        assert_eq!(seeds, vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_stats_fold_matches_sequential() {
        let config = skirmish_config();
        let batch = small_batch();
        let mut sequential = BatchStats::new(2);
        for result in run_batch(0, 3, &config, &batch) {
            sequential.add(&result);
        }
        let folded = run_batch_stats(0, 3, &config, &batch, || {});
        assert_eq!(folded, sequential);
        assert_eq!(folded.games_played, 3);
    }

    #[test]
    fn test_stats_counts_errors() {
        let mut stats = BatchStats::new(2);
        let bad = BatchConfig {
            players: 0,
            ..small_batch()
        };
        stats.add(&run_game(1, &skirmish_config(), &bad));
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.games_played, 0);
        assert!(stats.win_rate(0).abs() < f64::EPSILON);
    }
}
