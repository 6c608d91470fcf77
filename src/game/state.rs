//! Game state management.
//!
//! [`Game`] owns the tilemap, the unit manager and the players, and advances
//! them one tick per [`Game::step`]. A step runs in a fixed order:
//!
//! 1. apply commands in submission order;
//! 2. tick every unit present at the start of the tick, ascending by id;
//! 3. move units that have been dead long enough to `Despawned`, then
//!    remove them;
//! 4. mark players with no units left as defeated;
//! 5. advance the tick counter and decide the winner.
//!
//! The step is atomic: if anything fails, including an invariant check, the
//! world is restored to its state before the step.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, enabled, info, trace, warn, Level};

use crate::config::GameConfig;
use crate::error::{EngineError, EngineResult};
use crate::game::command::{self, Command, CommandResult};
use crate::game::fsm::{self, TickContext, Transition};
use crate::game::invariants::check_invariants;
use crate::game::{
    Coord, MapDescriptor, Pathfinder, Player, PlayerId, StateTag, Tilemap, Unit, UnitId,
    UnitManager,
};

/// Maximum number of players in a game.
pub const MAX_PLAYERS: usize = 8;

/// Everything that happened during one step besides command outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvents {
    /// State transitions, in the order they happened.
    pub transitions: Vec<Transition>,
    /// Units created by commands or finished construction.
    pub spawned: Vec<UnitId>,
    /// Units removed at the end of the step.
    pub despawned: Vec<UnitId>,
    /// Players defeated this step.
    pub defeated: Vec<PlayerId>,
}

/// Result of a successful [`Game::step`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Tick counter after the step.
    pub tick: u64,
    /// One result per submitted command, in order.
    pub results: Vec<CommandResult>,
    /// Side effects.
    pub events: StepEvents,
    /// Whether the game ended.
    pub game_over: bool,
    /// Winner, if the game ended with one.
    pub winner: Option<PlayerId>,
}

impl StepReport {
    /// Number of rejected commands.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.results.iter().filter(|r| !r.is_accepted()).count()
    }
}

/// Mutable simulation data. Cloned as a checkpoint before every step.
#[derive(Debug, Clone)]
pub(crate) struct World {
    pub(crate) map: Tilemap,
    pub(crate) units: UnitManager,
    pub(crate) players: Vec<Player>,
    pub(crate) pathfinder: Pathfinder,
    pub(crate) tick: u64,
    pub(crate) game_over: bool,
    pub(crate) winner: Option<PlayerId>,
}

/// Nearest free tile to `center`, scanning rings of growing radius row by row.
fn free_tile_near(map: &Tilemap, center: Coord, flying: bool) -> Option<Coord> {
    let free = |c: Coord| {
        if flying {
            map.in_bounds(c)
        } else {
            map.is_walkable(c)
        }
    };
    let cx = i32::from(center.x);
    let cy = i32::from(center.y);
    let max_radius = i32::from(map.width().max(map.height()));

    (0..=max_radius).find_map(|r| {
        (-r..=r)
            .flat_map(move |dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(move |(dx, dy)| dx.abs().max(dy.abs()) == r)
            .filter_map(|(dx, dy)| {
                let x = u16::try_from(cx + dx).ok()?;
                let y = u16::try_from(cy + dy).ok()?;
                Some(Coord::new(x, y))
            })
            .find(|&c| free(c))
    })
}

impl World {
    /// Fresh world for a validated descriptor: one player per start location,
    /// each with the configured start units placed on and around its start.
    fn build(descriptor: &MapDescriptor, config: &GameConfig) -> EngineResult<Self> {
        let mut map = descriptor.build_tilemap()?;
        let mut units = UnitManager::new();
        let mut players = Vec::with_capacity(descriptor.starts.len());

        for (idx, &start) in descriptor.starts.iter().enumerate() {
            let id = PlayerId::try_from(idx + 1)
                .map_err(|_| EngineError::MapLoad(format!("too many players: {}", idx + 1)))?;
            let mut player = Player::new(id, start, config.starting_resources);

            for &kind in &config.start_units {
                let flying = config.unit_type(kind).flying;
                let position = free_tile_near(&map, start, flying).ok_or_else(|| {
                    EngineError::MapLoad(format!("no room for the start units of player {id}"))
                })?;
                let unit = units.spawn(kind, id, position, &mut map, &config.units)?;
                player.units.insert(unit);
                player.stats.units_created += 1;
            }
            players.push(player);
        }

        Ok(Self {
            map,
            units,
            players,
            pathfinder: Pathfinder::new(),
            tick: 0,
            game_over: false,
            winner: None,
        })
    }

    fn advance(&mut self, commands: &[Command], config: &GameConfig) -> EngineResult<StepReport> {
        let tick = self.tick;
        let mut events = StepEvents::default();
        let mut ctx = TickContext {
            map: &mut self.map,
            units: &mut self.units,
            players: &mut self.players,
            pathfinder: &mut self.pathfinder,
            config,
            events: &mut events,
            tick,
        };

        let results = commands
            .iter()
            .map(|c| command::apply(c, &mut ctx))
            .collect::<EngineResult<Vec<_>>>()?;

        for id in ctx.units.ids() {
            let Some(mut unit) = ctx.units.take(id) else {
                continue;
            };
            let result = fsm::tick(&mut unit, &mut ctx);
            ctx.units.restore(unit);
            result?;
        }

        for id in ctx.units.ids() {
            let Some(mut unit) = ctx.units.take(id) else {
                continue;
            };
            let result = fsm::decay(&mut unit, &mut ctx);
            ctx.units.restore(unit);
            result?;
        }

        let departed: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| u.tag() == StateTag::Despawned)
            .map(|u| u.id)
            .collect();
        for id in departed {
            let unit = self.units.despawn(id, &mut self.map)?;
            if let Some(owner) = self.players.get_mut(usize::from(unit.owner).saturating_sub(1)) {
                owner.units.remove(&id);
            }
            events.despawned.push(id);
        }

        for player in &mut self.players {
            if player.evaluate_defeat() {
                events.defeated.push(player.id);
                info!(tick, player = player.id, "player defeated");
            }
        }

        self.tick += 1;

        let standing: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| !p.defeated)
            .map(|p| p.id)
            .collect();
        match standing.as_slice() {
            [] => {
                self.game_over = true;
                self.winner = None;
            }
            [last] if self.players.len() >= 2 => {
                self.game_over = true;
                self.winner = Some(*last);
            }
            _ => {}
        }
        if self.game_over {
            info!(tick = self.tick, winner = ?self.winner, "game over");
        }

        Ok(StepReport {
            tick: self.tick,
            results,
            events,
            game_over: self.game_over,
            winner: self.winner,
        })
    }
}

/// A running game.
#[derive(Debug, Clone)]
pub struct Game {
    descriptor: MapDescriptor,
    config: GameConfig,
    initial: World,
    pub(crate) world: World,
}

impl Game {
    /// Create a game from a map descriptor and a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MapLoad`] if the descriptor is invalid or the
    /// start units do not fit on the map.
    pub fn new(descriptor: MapDescriptor, config: GameConfig) -> EngineResult<Self> {
        let world = World::build(&descriptor, &config)?;
        info!(
            map = %descriptor.name,
            width = descriptor.width,
            height = descriptor.height,
            players = world.players.len(),
            units = world.units.len(),
            "game created"
        );
        Ok(Self {
            descriptor,
            config,
            initial: world.clone(),
            world,
        })
    }

    /// Advance the simulation by one tick.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GameOver`] once the game has a result. Internal
    /// faults, including invariant violations when checking is enabled, are
    /// returned after the world has been rolled back to its state before the
    /// step. Invalid commands are not errors; see [`StepReport::results`].
    pub fn step(&mut self, commands: &[Command]) -> EngineResult<StepReport> {
        if self.world.game_over {
            return Err(EngineError::GameOver);
        }

        let checkpoint = self.world.clone();
        let outcome = self
            .world
            .advance(commands, &self.config)
            .and_then(|report| {
                if self.config.check_invariants {
                    self.verify()?;
                }
                Ok(report)
            });

        match outcome {
            Ok(report) => {
                debug!(
                    tick = report.tick,
                    units = self.world.units.len(),
                    transitions = report.events.transitions.len(),
                    rejected = report.rejected(),
                    "step complete"
                );
                if enabled!(Level::TRACE) {
                    trace!(tick = report.tick, hash = self.state_hash(), "state hash");
                }
                Ok(report)
            }
            Err(err) => {
                self.world = checkpoint;
                warn!(tick = self.world.tick, %err, "step rolled back");
                Err(err)
            }
        }
    }

    pub(crate) fn verify(&self) -> EngineResult<()> {
        let violations = check_invariants(self);
        if violations.is_empty() {
            return Ok(());
        }
        let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        Err(EngineError::InvariantViolation(messages.join("; ")))
    }

    /// Return to the state right after construction.
    pub fn reset(&mut self) {
        self.world = self.initial.clone();
        debug!("game reset");
    }

    /// Current tick; zero before the first step.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.world.tick
    }

    /// The tilemap.
    #[must_use]
    pub const fn map(&self) -> &Tilemap {
        &self.world.map
    }

    /// All units.
    #[must_use]
    pub const fn units(&self) -> &UnitManager {
        &self.world.units
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.world.units.get(id)
    }

    /// All players, ordered by id.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.world.players
    }

    /// Look up a player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.world.players.get(usize::from(id).checked_sub(1)?)
    }

    /// Whether the game has a result.
    #[must_use]
    pub const fn is_game_over(&self) -> bool {
        self.world.game_over
    }

    /// Winner, if the game ended with one.
    #[must_use]
    pub const fn winner(&self) -> Option<PlayerId> {
        self.world.winner
    }

    /// Rules in effect.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Map the game was built from.
    #[must_use]
    pub const fn descriptor(&self) -> &MapDescriptor {
        &self.descriptor
    }

    /// Path cache, for its hit statistics.
    #[must_use]
    pub const fn pathfinder(&self) -> &Pathfinder {
        &self.world.pathfinder
    }

    /// Hash of the whole observable state. Two games fed the same descriptor,
    /// config and commands produce the same sequence of hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.world.tick.hash(&mut hasher);
        self.world.map.hash(&mut hasher);
        self.world.units.hash(&mut hasher);
        self.world.players.hash(&mut hasher);
        self.world.game_over.hash(&mut hasher);
        self.world.winner.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Resources, TerrainKind, UnitKind, UnitState};

    fn duel() -> Game {
        let descriptor = MapDescriptor::open(8, 8, vec![Coord::new(0, 0), Coord::new(7, 7)]);
        Game::new(descriptor, GameConfig::default()).unwrap()
    }

    #[test]
    fn test_game_creation() {
        let game = duel();
        assert_eq!(game.tick(), 0);
        assert_eq!(game.players().len(), 2);
        assert_eq!(game.units().len(), 2);
        assert_eq!(game.map().occupant(Coord::new(0, 0)), Some(1));
        assert_eq!(game.player(2).unwrap().units.len(), 1);
        assert!(game.player(0).is_none());
        assert!(!game.is_game_over());
    }

    #[test]
    fn test_start_units_fill_nearby_tiles() {
        let descriptor = MapDescriptor::open(4, 4, vec![Coord::new(0, 0)]);
        let config = GameConfig {
            start_units: vec![UnitKind::TownHall, UnitKind::Peasant, UnitKind::Peasant],
            ..GameConfig::default()
        };
        let game = Game::new(descriptor, config).unwrap();
        let positions: Vec<_> = game.units().iter().map(|u| u.position).collect();
        assert_eq!(
            positions,
            vec![Coord::new(0, 0), Coord::new(1, 0), Coord::new(0, 1)]
        );
    }

    #[test]
    fn test_start_units_must_fit() {
        let descriptor = MapDescriptor::open(1, 1, vec![Coord::new(0, 0)]);
        let config = GameConfig {
            start_units: vec![UnitKind::Peasant, UnitKind::Peasant],
            ..GameConfig::default()
        };
        assert!(matches!(
            Game::new(descriptor, config),
            Err(EngineError::MapLoad(_))
        ));
    }

    #[test]
    fn test_first_step_finishes_spawning() {
        let mut game = duel();
        let report = game.step(&[]).unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(report.events.transitions.len(), 2);
        assert!(game.units().iter().all(|u| u.tag() == StateTag::Idle));
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut game = duel();
        let initial = game.state_hash();
        game.step(&[]).unwrap();
        assert_ne!(game.state_hash(), initial);
        game.reset();
        assert_eq!(game.tick(), 0);
        assert_eq!(game.state_hash(), initial);
    }

    #[test]
    fn test_single_player_game_runs() {
        let descriptor = MapDescriptor::open(4, 4, vec![Coord::new(0, 0)]);
        let mut game = Game::new(descriptor, GameConfig::default()).unwrap();
        for _ in 0..5 {
            let report = game.step(&[]).unwrap();
            assert!(!report.game_over);
        }
    }

    #[test]
    fn test_no_start_units_ends_without_winner() {
        let descriptor = MapDescriptor::open(4, 4, vec![Coord::new(0, 0), Coord::new(3, 3)]);
        let config = GameConfig {
            start_units: Vec::new(),
            ..GameConfig::default()
        };
        let mut game = Game::new(descriptor, config).unwrap();
        let report = game.step(&[]).unwrap();
        assert!(report.game_over);
        assert_eq!(report.winner, None);
        assert_eq!(report.events.defeated, vec![1, 2]);
        assert!(matches!(game.step(&[]), Err(EngineError::GameOver)));
    }

    #[test]
    fn test_failed_step_rolls_back() {
        let mut game = duel();
        game.step(&[]).unwrap();

        // Break player bookkeeping so the post-step check fails.
        game.world.players[0].units.clear();
        let tick = game.tick();
        let hash = game.state_hash();
        let ids = game.units().ids();
        let before = game.unit(1).unwrap().clone();

        let walk = Command::Move {
            unit: 1,
            to: Coord::new(3, 3),
        };
        assert!(matches!(
            game.step(&[walk]),
            Err(EngineError::InvariantViolation(_))
        ));

        assert_eq!(game.tick(), tick);
        assert_eq!(game.state_hash(), hash);
        assert_eq!(game.units().ids(), ids);
        assert_eq!(game.unit(1), Some(&before));
        assert!(!game.player(1).unwrap().defeated);
        assert!(!game.is_game_over());
    }

    #[test]
    fn test_builder_waits_without_room() {
        let descriptor = MapDescriptor {
            name: "cell".to_string(),
            width: 3,
            height: 3,
            rows: vec!["###".to_string(), "#.#".to_string(), "###".to_string()],
            deposits: Resources::default(),
            starts: vec![Coord::new(1, 1)],
        };
        let config = GameConfig {
            start_units: vec![UnitKind::Peasant],
            ..GameConfig::default()
        };
        let required = config.units.farm.build_time;
        let mut game = Game::new(descriptor, config).unwrap();
        game.step(&[]).unwrap();

        let build = Command::Build {
            unit: 1,
            kind: UnitKind::Farm,
        };
        let report = game.step(&[build]).unwrap();
        assert!(report.results[0].is_accepted());
        for _ in 0..20 {
            game.step(&[]).unwrap();
        }

        let builder = game.unit(1).unwrap();
        assert_eq!(
            builder.state,
            UnitState::Building {
                kind: UnitKind::Farm,
                progress: required,
            }
        );
        assert_eq!(builder.position, Coord::new(1, 1));
        assert_eq!(game.units().len(), 1);

        game.world
            .map
            .set_terrain(Coord::new(1, 0), TerrainKind::Grass, 0)
            .unwrap();
        let report = game.step(&[]).unwrap();
        assert_eq!(report.events.spawned, vec![2]);

        let farm = game.unit(2).unwrap();
        assert_eq!(farm.kind, UnitKind::Farm);
        assert_eq!(farm.position, Coord::new(1, 1));
        let builder = game.unit(1).unwrap();
        assert_eq!(builder.tag(), StateTag::Idle);
        assert_eq!(builder.position, Coord::new(1, 0));
    }
}
