/// Game tuning from `config.toml`.
///
/// Every key is optional and defaults to the stock game. A missing or
/// unreadable file is logged and ignored; `from_toml_str` is the strict
/// entry point used by tests.
/// Debug switches live here and are handed to the simulation at
/// construction; nothing deeper reads globals.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::domain::ai::{AiTuning, BlockedAxisPolicy, TurnDelayPolicy};
use crate::domain::movement::Stepping;
use crate::domain::profile::{FleeResponse, UnicornProfile};
use crate::error::ConfigError;

// ── Resolved config ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub tile_size: f32,
    pub timing: TimingConfig,
    pub speed: SpeedConfig,
    pub session: SessionConfig,
    pub gate_delay: f32,
    pub teleport_seconds: f32,
    pub ai: AiConfig,
    pub debug: DebugConfig,
    pub profiles: Vec<UnicornProfile>,
    pub gamepad: GamepadConfig,
    pub levels_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct TimingConfig {
    pub max_frame_dt: f32, // seconds
    pub max_substep: f32,  // px
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub player: f32,  // px/s
    pub unicorn: f32, // px/s, before profile multiplier
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub initial_lives: u32,
    pub extra_life_score: u32,
    pub invincible_seconds: f32,
    pub gem_respawn_seconds: f32,
    pub max_gems_per_level: u32,
    pub respawn_pause_seconds: f32,
    pub dot_points: u32,
    pub gem_points: u32,
    pub tag_points: u32,
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub random_intersection_count: u32,
    pub turn_delay: TurnDelayPolicy,
    pub blocked_axis: BlockedAxisPolicy,
}

#[derive(Clone, Debug, Default)]
pub struct DebugConfig {
    pub force_chase: bool,
    pub start_level: usize,
    pub debug_maze: bool,
    pub seed: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub confirm: Vec<String>,
    pub pause: Vec<String>,
    pub quit: Vec<String>,
}

// ── File schema ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    grid: TomlGrid,
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    session: TomlSession,
    #[serde(default)]
    gates: TomlGates,
    #[serde(default)]
    portals: TomlPortals,
    #[serde(default)]
    ai: TomlAi,
    #[serde(default)]
    debug: TomlDebug,
    #[serde(default)]
    profiles: BTreeMap<String, TomlProfile>,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlGrid {
    #[serde(default = "default_tile_size")]
    tile_size: u32,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_max_frame_dt")]
    max_frame_dt_ms: u64,
    #[serde(default = "default_max_substep")]
    max_substep_px: f32,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_player_speed")]
    player: f32,
    #[serde(default = "default_unicorn_speed")]
    unicorn: f32,
}

#[derive(Deserialize, Debug)]
struct TomlSession {
    #[serde(default = "default_lives")]
    initial_lives: u32,
    #[serde(default = "default_extra_life")]
    extra_life_score: u32,
    #[serde(default = "default_invincible")]
    invincible_seconds: f32,
    #[serde(default = "default_gem_respawn")]
    gem_respawn_ms: u64,
    #[serde(default = "default_max_gems")]
    max_gems_per_level: u32,
    #[serde(default = "default_respawn_pause")]
    respawn_pause_seconds: f32,
    #[serde(default = "default_dot_points")]
    dot_points: u32,
    #[serde(default = "default_gem_points")]
    gem_points: u32,
    #[serde(default = "default_tag_points")]
    tag_points: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGates {
    #[serde(default = "default_gate_delay")]
    toggle_delay_seconds: f32,
}

#[derive(Deserialize, Debug)]
struct TomlPortals {
    #[serde(default = "default_teleport")]
    teleport_seconds: f32,
}

#[derive(Deserialize, Debug)]
struct TomlAi {
    #[serde(default = "default_random_count")]
    random_intersection_count: u32,
    #[serde(default = "default_turn_delay_policy")]
    turn_delay_policy: String,
    #[serde(default = "default_blocked_axis_policy")]
    blocked_axis_policy: String,
}

#[derive(Deserialize, Debug, Default)]
struct TomlDebug {
    #[serde(default)]
    force_chase: bool,
    #[serde(default)]
    start_level: usize,
    #[serde(default)]
    debug_maze: bool,
    #[serde(default)]
    seed: Option<u64>,
}

/// A profile table. Missing keys inherit from the built-in of the same
/// name, or from `classic` for new names.
#[derive(Deserialize, Debug, Default)]
struct TomlProfile {
    speed_multiplier: Option<f32>,
    speed_variance: Option<f32>,
    turn_delay_chance: Option<f32>,
    chase_bias: Option<f32>,
    random_bias: Option<f32>,
    flee_response: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_pause")]
    pause: Vec<String>,
    #[serde(default = "default_quit")]
    quit: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
}

// ── Defaults ──

fn default_tile_size() -> u32 { 32 }
fn default_max_frame_dt() -> u64 { 100 }
fn default_max_substep() -> f32 { 4.0 }
fn default_player_speed() -> f32 { 180.0 }
fn default_unicorn_speed() -> f32 { 115.0 }
fn default_lives() -> u32 { 3 }
fn default_extra_life() -> u32 { 1000 }
fn default_invincible() -> f32 { 6.0 }
fn default_gem_respawn() -> u64 { 2500 }
fn default_max_gems() -> u32 { 5 }
fn default_respawn_pause() -> f32 { 3.0 }
fn default_dot_points() -> u32 { 1 }
fn default_gem_points() -> u32 { 5 }
fn default_tag_points() -> u32 { 10 }
fn default_gate_delay() -> f32 { 2.0 }
fn default_teleport() -> f32 { 0.3 }
fn default_random_count() -> u32 { 2 }
fn default_turn_delay_policy() -> String { "corridor_only".into() }
fn default_blocked_axis_policy() -> String { "zero_axis".into() }

fn default_confirm() -> Vec<String> { vec!["Start".into(), "A".into()] }
fn default_pause() -> Vec<String> { vec!["Select".into()] }
fn default_quit() -> Vec<String> { vec!["Mode".into()] }
fn default_levels_dir() -> String { "levels".into() }

impl Default for TomlGrid {
    fn default() -> Self {
        TomlGrid { tile_size: default_tile_size() }
    }
}

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming { max_frame_dt_ms: default_max_frame_dt(), max_substep_px: default_max_substep() }
    }
}

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed { player: default_player_speed(), unicorn: default_unicorn_speed() }
    }
}

impl Default for TomlSession {
    fn default() -> Self {
        TomlSession {
            initial_lives: default_lives(),
            extra_life_score: default_extra_life(),
            invincible_seconds: default_invincible(),
            gem_respawn_ms: default_gem_respawn(),
            max_gems_per_level: default_max_gems(),
            respawn_pause_seconds: default_respawn_pause(),
            dot_points: default_dot_points(),
            gem_points: default_gem_points(),
            tag_points: default_tag_points(),
        }
    }
}

impl Default for TomlGates {
    fn default() -> Self {
        TomlGates { toggle_delay_seconds: default_gate_delay() }
    }
}

impl Default for TomlPortals {
    fn default() -> Self {
        TomlPortals { teleport_seconds: default_teleport() }
    }
}

impl Default for TomlAi {
    fn default() -> Self {
        TomlAi {
            random_intersection_count: default_random_count(),
            turn_delay_policy: default_turn_delay_policy(),
            blocked_axis_policy: default_blocked_axis_policy(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad { confirm: default_confirm(), pause: default_pause(), quit: default_quit() }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral { levels_dir: default_levels_dir() }
    }
}

// ── Conversion ──

impl Default for GameConfig {
    fn default() -> Self {
        let session = TomlSession::default();
        GameConfig {
            tile_size: default_tile_size() as f32,
            timing: TimingConfig {
                max_frame_dt: default_max_frame_dt() as f32 / 1000.0,
                max_substep: default_max_substep(),
            },
            speed: SpeedConfig { player: default_player_speed(), unicorn: default_unicorn_speed() },
            session: SessionConfig {
                initial_lives: session.initial_lives,
                extra_life_score: session.extra_life_score,
                invincible_seconds: session.invincible_seconds,
                gem_respawn_seconds: session.gem_respawn_ms as f32 / 1000.0,
                max_gems_per_level: session.max_gems_per_level,
                respawn_pause_seconds: session.respawn_pause_seconds,
                dot_points: session.dot_points,
                gem_points: session.gem_points,
                tag_points: session.tag_points,
            },
            gate_delay: default_gate_delay(),
            teleport_seconds: default_teleport(),
            ai: AiConfig {
                random_intersection_count: default_random_count(),
                turn_delay: TurnDelayPolicy::CorridorOnly,
                blocked_axis: BlockedAxisPolicy::ZeroAxis,
            },
            debug: DebugConfig::default(),
            profiles: vec![],
            gamepad: GamepadConfig { confirm: default_confirm(), pause: default_pause(), quit: default_quit() },
            levels_dir: PathBuf::from(default_levels_dir()),
        }
    }
}

fn parse_turn_delay(s: &str) -> Result<TurnDelayPolicy, ConfigError> {
    match s {
        "corridor_only" => Ok(TurnDelayPolicy::CorridorOnly),
        "anywhere" => Ok(TurnDelayPolicy::Anywhere),
        other => Err(ConfigError::Invalid(format!("ai.turn_delay_policy: unknown value {other:?}"))),
    }
}

fn parse_blocked_axis(s: &str) -> Result<BlockedAxisPolicy, ConfigError> {
    match s {
        "zero_axis" => Ok(BlockedAxisPolicy::ZeroAxis),
        "reverse_both" => Ok(BlockedAxisPolicy::ReverseBoth),
        other => Err(ConfigError::Invalid(format!("ai.blocked_axis_policy: unknown value {other:?}"))),
    }
}

fn parse_flee(s: &str) -> Result<FleeResponse, ConfigError> {
    match s {
        "flee" => Ok(FleeResponse::Flee),
        "chase" => Ok(FleeResponse::Chase),
        other => Err(ConfigError::Invalid(format!("flee_response: unknown value {other:?}"))),
    }
}

fn unit(name: &str, v: f32) -> Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(ConfigError::Invalid(format!("{name} must be within 0..=1, got {v}")))
    }
}

fn positive(name: &str, v: f32) -> Result<f32, ConfigError> {
    if v > 0.0 && v.is_finite() {
        Ok(v)
    } else {
        Err(ConfigError::Invalid(format!("{name} must be positive, got {v}")))
    }
}

fn convert_profile(name: &str, t: &TomlProfile) -> Result<UnicornProfile, ConfigError> {
    let mut p = match name {
        "drunky" => UnicornProfile::drunky(),
        "stalker" => UnicornProfile::stalker(),
        _ => UnicornProfile::classic(),
    };
    p.name = name.to_string();
    let key = |k: &str| format!("profiles.{name}.{k}");
    if let Some(v) = t.speed_multiplier { p.speed_multiplier = positive(&key("speed_multiplier"), v)?; }
    if let Some(v) = t.speed_variance { p.speed_variance = unit(&key("speed_variance"), v)?; }
    if let Some(v) = t.turn_delay_chance { p.turn_delay_chance = unit(&key("turn_delay_chance"), v)?; }
    if let Some(v) = t.chase_bias { p.chase_bias = unit(&key("chase_bias"), v)?; }
    if let Some(v) = t.random_bias { p.random_bias = unit(&key("random_bias"), v)?; }
    if let Some(v) = &t.flee_response { p.flee_response = parse_flee(v)?; }
    Ok(p)
}

fn convert(t: TomlConfig) -> Result<GameConfig, ConfigError> {
    if t.grid.tile_size == 0 {
        return Err(ConfigError::Invalid("grid.tile_size must be at least 1".into()));
    }
    let profiles = t.profiles.iter()
        .map(|(name, p)| convert_profile(name, p))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GameConfig {
        tile_size: t.grid.tile_size as f32,
        timing: TimingConfig {
            max_frame_dt: positive("timing.max_frame_dt_ms", t.timing.max_frame_dt_ms as f32)? / 1000.0,
            max_substep: positive("timing.max_substep_px", t.timing.max_substep_px)?,
        },
        speed: SpeedConfig {
            player: positive("speed.player", t.speed.player)?,
            unicorn: positive("speed.unicorn", t.speed.unicorn)?,
        },
        session: SessionConfig {
            initial_lives: t.session.initial_lives,
            extra_life_score: t.session.extra_life_score,
            invincible_seconds: t.session.invincible_seconds.max(0.0),
            gem_respawn_seconds: t.session.gem_respawn_ms as f32 / 1000.0,
            max_gems_per_level: t.session.max_gems_per_level,
            respawn_pause_seconds: t.session.respawn_pause_seconds.max(0.0),
            dot_points: t.session.dot_points,
            gem_points: t.session.gem_points,
            tag_points: t.session.tag_points,
        },
        gate_delay: t.gates.toggle_delay_seconds.max(0.0),
        teleport_seconds: t.portals.teleport_seconds.max(0.0),
        ai: AiConfig {
            random_intersection_count: t.ai.random_intersection_count,
            turn_delay: parse_turn_delay(&t.ai.turn_delay_policy)?,
            blocked_axis: parse_blocked_axis(&t.ai.blocked_axis_policy)?,
        },
        debug: DebugConfig {
            force_chase: t.debug.force_chase,
            start_level: t.debug.start_level,
            debug_maze: t.debug.debug_maze,
            seed: t.debug.seed,
        },
        profiles,
        gamepad: GamepadConfig {
            confirm: t.gamepad.confirm,
            pause: t.gamepad.pause,
            quit: t.gamepad.quit,
        },
        levels_dir: PathBuf::from(t.general.levels_dir),
    })
}

// ── Loading ──

impl GameConfig {
    /// Strict parse: malformed TOML or out-of-range values are errors.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: TomlConfig = toml::from_str(text)?;
        convert(raw)
    }

    /// First `config.toml` found beside the executable, in the working
    /// directory, or under `~/.local/share/unicorn-run`. Never fails.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let mut cfg = load_toml(&search_dirs);

        // Resolve levels directory against the same search path
        if !cfg.levels_dir.is_absolute() {
            if let Some(found) = search_dirs.iter().map(|d| d.join(&cfg.levels_dir)).find(|p| p.is_dir()) {
                cfg.levels_dir = found;
            }
        }
        cfg
    }

    pub fn stepping(&self) -> Stepping {
        Stepping { max_substep: self.timing.max_substep, teleport_seconds: self.teleport_seconds }
    }

    pub fn ai_tuning(&self) -> AiTuning {
        AiTuning {
            base_speed: self.speed.unicorn,
            random_intersection_count: self.ai.random_intersection_count,
            turn_delay: self.ai.turn_delay,
            blocked_axis: self.ai.blocked_axis,
            force_chase: self.debug.force_chase,
        }
    }

    /// Cap a wall-clock frame delta.
    pub fn clamp_dt(&self, dt: f32) -> f32 {
        dt.clamp(0.0, self.timing.max_frame_dt)
    }
}

/// Candidate directories to search: exe dir + CWD + data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/unicorn-run");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }
    dirs
}

/// First readable, valid config.toml in the search path; defaults otherwise.
fn load_toml(search_dirs: &[PathBuf]) -> GameConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => match GameConfig::from_toml_str(&text) {
                Ok(cfg) => {
                    info!(path = %path.display(), "loaded config");
                    return cfg;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "config rejected, using defaults");
                    return GameConfig::default();
                }
            },
            Err(e) => warn!(path = %path.display(), error = %e, "could not read config"),
        }
    }
    GameConfig::default()
}
