/// Entry point and frame loop.

mod ui;

use std::fs::File;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use unicorn_run::config::GameConfig;
use unicorn_run::domain::entity::{FrameInput, Heading};
use unicorn_run::sim::event::GameEvent;
use unicorn_run::sim::level::level_table;
use unicorn_run::sim::step;
use unicorn_run::sim::world::{Phase, SimulationState};
use ui::gamepad::GamepadState;
use ui::input::{InputState, KEYS_CONFIRM, KEYS_PAUSE, KEYS_QUIT};
use ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(8);
const LOG_FILE: &str = "unicorn-run.log";

fn main() -> Result<()> {
    init_tracing();
    let config = GameConfig::load();
    let seed = config.debug.seed.unwrap_or_else(rand::random);
    let mut world = SimulationState::new(&config, level_table(&config), seed)
        .context("could not build the first level")?;

    let mut renderer = Renderer::new();
    let key_release = renderer.init().context("terminal init failed")?;
    let result = game_loop(&mut world, &mut renderer, &config, key_release);
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    result?;

    println!();
    println!("Thanks for playing Unicorn Run!");
    println!("Final Score: {}", world.score);
    Ok(())
}

/// The terminal belongs to the renderer, so logs go to a file.
fn init_tracing() {
    let Ok(file) = File::create(LOG_FILE) else { return };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn game_loop(
    world: &mut SimulationState,
    renderer: &mut Renderer,
    config: &GameConfig,
    key_release: bool,
) -> Result<()> {
    let mut kb = InputState::new();
    kb.honor_release = key_release;
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    let mut last_frame = Instant::now();

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() || kb.any_pressed(KEYS_QUIT) || gp.quit_pressed() {
            info!(score = world.score, "quit");
            break;
        }
        handle_meta(world, &kb, &gp)?;

        let now = Instant::now();
        let dt = config.clamp_dt(now.duration_since(last_frame).as_secs_f32());
        last_frame = now;

        let input = FrameInput { movement: detect_movement(&kb, &gp) };
        let events = step::step(world, input, dt);
        log_events(&events);

        renderer.gamepad = gp.connected;
        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn detect_movement(kb: &InputState, gp: &GamepadState) -> Heading {
    match kb.movement() {
        Heading::Idle => gp.movement(),
        held => held,
    }
}

/// Pause, resume and level transitions.
fn handle_meta(world: &mut SimulationState, kb: &InputState, gp: &GamepadState) -> Result<()> {
    if kb.any_pressed(KEYS_PAUSE) || gp.pause_pressed() {
        world.toggle_pause();
        return Ok(());
    }
    if !(kb.any_pressed(KEYS_CONFIRM) || gp.confirm_pressed()) {
        return Ok(());
    }
    match world.phase {
        Phase::Paused | Phase::LifeLost => world.resume(),
        Phase::LevelComplete => {
            world.advance_level()?;
        }
        Phase::GameOver | Phase::Victory => world.restart()?,
        Phase::Playing | Phase::Invincible => {}
    }
    Ok(())
}

fn log_events(events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::DotCollected { .. } | GameEvent::GateArmed { .. } => {}
            GameEvent::RuleViolation { id, cell } => warn!(id, ?cell, "unicorn corrected"),
            other => debug!(?other, "event"),
        }
    }
}
