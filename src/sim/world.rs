/// SimulationState: the complete snapshot of a running session.
///
/// ## Level data
///
/// `maze` and `portals` are fixed once a level is built. `gates` is the
/// only level data that changes during play (mode and pending timer).
///
/// ## Agents
///
/// The player and every unicorn own their countdowns (teleport, respawn
/// pause, random burst) inside their own structs. Nothing is global: the
/// host owns one `SimulationState` and passes it to `step`.
///
/// ## Phases
///
///   Playing ⇄ Invincible      (power item / timer)
///   Playing, Invincible → Paused → back   (`toggle_pause`)
///   → LifeLost → Playing      (`resume`)
///   → LevelComplete → next    (`advance_level`)
///   → GameOver, Victory → new session (`restart`)

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::config::{GameConfig, SessionConfig};
use crate::domain::ai::AiTuning;
use crate::domain::entity::{Gem, Player, Unicorn};
use crate::domain::gate::GateSet;
use crate::domain::grid::{GridPos, Maze};
use crate::domain::movement::Stepping;
use crate::domain::particle::Particles;
use crate::domain::physics::LevelView;
use crate::domain::portal::PortalSet;
use crate::domain::profile::ProfileBook;
use crate::domain::rng::SimRng;
use crate::error::LevelError;
use crate::sim::level::{self, Level, LevelPlan, SpawnTable};

/// Seconds the level title stays on screen.
pub const LEVEL_INTRO_SECONDS: f32 = 1.5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Playing,
    Invincible,
    Paused,
    LifeLost,
    LevelComplete,
    GameOver,
    Victory,
}

impl Phase {
    /// Phases in which `step` advances the simulation.
    pub fn is_running(self) -> bool {
        matches!(self, Phase::Playing | Phase::Invincible)
    }
}

pub struct SimulationState {
    // ── Level ──
    pub levels: Vec<LevelPlan>,
    pub current_level: usize,
    pub level_name: String,
    pub maze: Maze,
    pub gates: GateSet,
    pub portals: PortalSet,
    pub spawns: SpawnTable,
    /// Where tagged unicorns reappear.
    pub respawn_cell: GridPos,

    // ── Entities ──
    pub player: Player,
    pub unicorns: Vec<Unicorn>,
    pub dots: BTreeSet<GridPos>,
    /// `None` while the power item is on cooldown or used up.
    pub gem: Option<Gem>,
    pub gem_cooldown: f32,
    pub gems_collected: u32,

    // ── Tuning (injected once, read-only) ──
    pub session: SessionConfig,
    pub stepping: Stepping,
    pub tuning: AiTuning,
    pub player_speed: f32,
    pub gate_delay: f32,
    pub tile_size: f32,
    pub max_frame_dt: f32,
    pub start_level: usize,
    pub profiles: ProfileBook,

    // ── Meta ──
    pub phase: Phase,
    /// Phase to return to when a menu pause ends.
    pub resume_phase: Phase,
    pub score: u32,
    pub lives: u32,
    pub next_extra_life: u32,
    pub invincible_timer: f32,
    pub tick: u64,
    /// Seconds of simulated play; drives particle hues.
    pub clock: f32,

    // ── Effects ──
    pub particles: Particles,
    pub rng: SimRng,

    // ── UI ──
    pub message: String,
    pub message_timer: f32,
}

// ── Construction ──

impl SimulationState {
    /// Start a session on `config.debug.start_level` of `levels`.
    pub fn new(config: &GameConfig, levels: Vec<LevelPlan>, seed: u64) -> Result<Self, LevelError> {
        if levels.is_empty() {
            return Err(LevelError::NoLevels);
        }
        let start_level = if config.debug.start_level < levels.len() {
            config.debug.start_level
        } else {
            warn!(start = config.debug.start_level, count = levels.len(), "start level out of range, using 0");
            0
        };

        let profiles = ProfileBook::with_overrides(&config.profiles);
        let mut rng = SimRng::seeded(seed);
        let built = level::build_level(&levels[start_level], start_level, &profiles, config.tile_size, &mut rng)?;
        let player = Player::new(&built.maze, built.spawns.player, config.speed.player);

        let mut world = SimulationState {
            levels,
            current_level: start_level,
            level_name: String::new(),
            respawn_cell: built.spawns.player,
            player,
            unicorns: vec![],
            dots: BTreeSet::new(),
            gem: None,
            gem_cooldown: 0.0,
            gems_collected: 0,
            maze: built.maze.clone(),
            gates: GateSet::default(),
            portals: PortalSet::default(),
            spawns: built.spawns.clone(),
            session: config.session.clone(),
            stepping: config.stepping(),
            tuning: config.ai_tuning(),
            player_speed: config.speed.player,
            gate_delay: config.gate_delay,
            tile_size: config.tile_size,
            max_frame_dt: config.timing.max_frame_dt,
            start_level,
            profiles,
            phase: Phase::Playing,
            resume_phase: Phase::Playing,
            score: 0,
            lives: config.session.initial_lives,
            next_extra_life: config.session.extra_life_score,
            invincible_timer: 0.0,
            tick: 0,
            clock: 0.0,
            particles: Particles::default(),
            rng,
            message: String::new(),
            message_timer: 0.0,
        };
        world.install(built);
        info!(seed, level = start_level, "session started");
        Ok(world)
    }

    /// Narrow view handed to movement and AI.
    pub fn view(&self) -> LevelView<'_> {
        LevelView { maze: &self.maze, gates: &self.gates, portals: &self.portals }
    }

    pub fn set_message(&mut self, msg: &str, seconds: f32) {
        self.message = msg.to_string();
        self.message_timer = seconds;
    }
}

// ── Level loading ──

impl SimulationState {
    /// Build and enter level `index`. Preserves score and lives.
    pub fn load_level(&mut self, index: usize) -> Result<(), LevelError> {
        let plan = self.levels.get(index).ok_or(LevelError::NoLevels)?;
        let built = level::build_level(plan, index, &self.profiles, self.tile_size, &mut self.rng)?;
        self.current_level = index;
        self.install(built);
        Ok(())
    }

    fn install(&mut self, built: Level) {
        self.level_name = built.name;
        self.gates = GateSet::new(built.gates, self.gate_delay);
        self.portals = built.portals;
        self.respawn_cell = level::respawn_point(&built.maze);
        self.dots = level::seed_dots(&built.maze, &built.spawns);
        self.maze = built.maze;
        self.spawns = built.spawns;

        self.unicorns = self.spawns.unicorns.iter().enumerate()
            .map(|(id, s)| Unicorn::new(id, &self.maze, s.cell, s.heading, s.profile.clone(), self.tuning.base_speed))
            .collect();
        self.player = Player::new(&self.maze, self.spawns.player, self.player_speed);

        self.gems_collected = 0;
        self.gem_cooldown = 0.0;
        self.gem = None;
        self.place_gem();
        self.invincible_timer = 0.0;
        self.particles.clear();
        self.phase = Phase::Playing;
        self.resume_phase = Phase::Playing;

        let title = format!("Level {}: {}", self.current_level + 1, self.level_name);
        self.set_message(&title, LEVEL_INTRO_SECONDS);
        info!(
            level = self.current_level,
            name = %self.level_name,
            dots = self.dots.len(),
            unicorns = self.unicorns.len(),
            "level loaded"
        );
    }

    /// Put the power item on a random cell that still holds a dot.
    pub fn place_gem(&mut self) -> Option<GridPos> {
        let cells: Vec<GridPos> = self.dots.iter().copied().collect();
        let cell = *self.rng.pick(&cells)?;
        self.gem = Some(Gem::at(&self.maze, cell));
        debug!(row = cell.row, col = cell.col, "gem placed");
        Some(cell)
    }

    /// Put every agent back on its spawn after a death.
    pub fn reset_agents(&mut self) {
        self.player = Player::new(&self.maze, self.spawns.player, self.player_speed);
        for u in &mut self.unicorns {
            u.reset(&self.maze);
        }
        self.invincible_timer = 0.0;
        self.particles.clear();
    }
}

// ── Host operations ──

impl SimulationState {
    /// Menu pause. Only running phases can be paused.
    pub fn toggle_pause(&mut self) {
        match self.phase {
            Phase::Playing | Phase::Invincible => {
                self.resume_phase = self.phase;
                self.phase = Phase::Paused;
                info!("paused");
            }
            Phase::Paused => {
                self.phase = self.resume_phase;
                info!("unpaused");
            }
            _ => {}
        }
    }

    /// Continue after a lost life or a menu pause.
    pub fn resume(&mut self) {
        match self.phase {
            Phase::LifeLost => {
                self.phase = Phase::Playing;
                info!(lives = self.lives, "resumed after lost life");
            }
            Phase::Paused => self.phase = self.resume_phase,
            _ => {}
        }
    }

    /// Move on from a cleared level. Returns false when not applicable.
    pub fn advance_level(&mut self) -> Result<bool, LevelError> {
        if self.phase != Phase::LevelComplete {
            return Ok(false);
        }
        let next = self.current_level + 1;
        if next >= self.levels.len() {
            self.phase = Phase::Victory;
            return Ok(false);
        }
        self.load_level(next)?;
        Ok(true)
    }

    /// Fresh session on the starting level: score and lives reset.
    pub fn restart(&mut self) -> Result<(), LevelError> {
        self.score = 0;
        self.lives = self.session.initial_lives;
        self.next_extra_life = self.session.extra_life_score;
        self.tick = 0;
        self.clock = 0.0;
        self.load_level(self.start_level)?;
        info!("session restarted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> SimulationState {
        let mut cfg = GameConfig::default();
        cfg.debug.seed = Some(7);
        SimulationState::new(&cfg, level::builtin_levels(), 7).unwrap()
    }

    #[test]
    fn new_session_spawns_from_the_level_table() {
        let w = world();
        assert_eq!(w.phase, Phase::Playing);
        assert_eq!(w.lives, 3);
        assert_eq!(w.player.body.cell, GridPos::new(1, 1));
        assert_eq!(w.unicorns.len(), 1);
        assert_eq!(w.unicorns[0].body.cell, GridPos::new(13, 19));
        assert_eq!(w.level_name, "Classic");
        assert_eq!(w.message, "Level 1: Classic");
        let gem = w.gem.as_ref().unwrap();
        assert!(w.dots.contains(&gem.cell));
    }

    #[test]
    fn empty_level_table_is_an_error() {
        let cfg = GameConfig::default();
        assert!(matches!(SimulationState::new(&cfg, vec![], 1), Err(LevelError::NoLevels)));
    }

    #[test]
    fn pause_returns_to_the_phase_it_interrupted() {
        let mut w = world();
        w.phase = Phase::Invincible;
        w.toggle_pause();
        assert_eq!(w.phase, Phase::Paused);
        w.toggle_pause();
        assert_eq!(w.phase, Phase::Invincible);

        w.phase = Phase::GameOver;
        w.toggle_pause();
        assert_eq!(w.phase, Phase::GameOver);
    }

    #[test]
    fn advancing_past_the_last_level_is_victory() {
        let mut w = world();
        w.phase = Phase::LevelComplete;
        assert!(w.advance_level().unwrap());
        assert_eq!(w.current_level, 1);
        assert_eq!(w.level_name, "Bridges");
        assert_eq!(w.phase, Phase::Playing);

        w.current_level = 3;
        w.phase = Phase::LevelComplete;
        assert!(!w.advance_level().unwrap());
        assert_eq!(w.phase, Phase::Victory);
    }

    #[test]
    fn restart_resets_score_and_lives() {
        let mut w = world();
        w.score = 420;
        w.lives = 0;
        w.phase = Phase::GameOver;
        w.load_level(2).unwrap();
        w.restart().unwrap();
        assert_eq!((w.score, w.lives, w.current_level), (0, 3, 0));
        assert_eq!(w.phase, Phase::Playing);
    }

    #[test]
    fn same_seed_same_gem() {
        let a = world();
        let b = world();
        assert_eq!(a.gem.map(|g| g.cell), b.gem.map(|g| g.cell));
    }
}
