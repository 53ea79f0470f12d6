/// The step function: advances the session by one frame.
///
/// Processing order:
///   1. Player movement (input → heading → collision → portals)
///   2. Unicorn movement, in list order, against the updated player
///   3. Gates: cells entered this tick arm toggles, then timers run
///   4. Particles and popups
///   5. Dot pickup
///   6. Power item (cooldown, placement, pickup)
///   7. Invincibility countdown
///   8. Encounters (tag or death)
///   9. Extra life
///  10. Win check
///
/// `dt` is clamped before use, so a long stall never becomes a long leap.

use tracing::{debug, info};

use crate::domain::ai::{choose_avoid_direction, update_unicorn, Target};
use crate::domain::entity::{FrameInput, Heading};
use crate::domain::grid::GridPos;
use crate::domain::movement::update_player;
use crate::domain::physics::LevelView;
use super::event::{GameEvent, Traveller};
use super::world::{Phase, SimulationState};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut SimulationState, input: FrameInput, dt: f32) -> Vec<GameEvent> {
    if !world.phase.is_running() { return vec![]; }

    let dt = dt.clamp(0.0, world.max_frame_dt);
    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;
    world.clock += dt;

    if world.message_timer > 0.0 {
        world.message_timer = (world.message_timer - dt).max(0.0);
        if world.message_timer == 0.0 { world.message.clear(); }
    }

    let mut entered = resolve_player_movement(world, input, dt, &mut events);
    entered.extend(resolve_unicorn_movement(world, dt, &mut events));
    resolve_gates(world, &entered, dt, &mut events);
    resolve_particles(world, dt);
    resolve_dots(world, &mut events);
    resolve_gem(world, dt, &mut events);
    resolve_invincibility(world, dt, &mut events);
    if resolve_encounters(world, &mut events) { return events; }
    resolve_extra_life(world, &mut events);
    resolve_win(world, &mut events);

    events
}

// ══════════════════════════════════════════════════════════════
// Movement
// ══════════════════════════════════════════════════════════════

fn resolve_player_movement(
    world: &mut SimulationState,
    input: FrameInput,
    dt: f32,
    events: &mut Vec<GameEvent>,
) -> Vec<GridPos> {
    let view = LevelView { maze: &world.maze, gates: &world.gates, portals: &world.portals };
    let report = update_player(&view, &mut world.player, input, dt, &world.stepping);
    if let Some(outcome) = report.portal {
        events.push(GameEvent::Teleported { who: Traveller::Player, outcome });
    }
    report.entered
}

fn resolve_unicorn_movement(world: &mut SimulationState, dt: f32, events: &mut Vec<GameEvent>) -> Vec<GridPos> {
    let target = Target {
        x: world.player.body.x,
        y: world.player.body.y,
        invincible: world.phase == Phase::Invincible,
    };
    let SimulationState { maze, gates, portals, unicorns, rng, tuning, stepping, .. } = world;
    let view = LevelView { maze, gates, portals };

    let mut entered = vec![];
    for u in unicorns.iter_mut() {
        let report = update_unicorn(&view, u, target, tuning, stepping, rng, dt);
        entered.extend(report.step.entered);
        if let Some(outcome) = report.step.portal {
            events.push(GameEvent::Teleported { who: Traveller::Unicorn(u.id), outcome });
        }
        if let Some(cell) = report.violation {
            events.push(GameEvent::RuleViolation { id: u.id, cell });
        }
    }
    entered
}

// ══════════════════════════════════════════════════════════════
// Gates
// ══════════════════════════════════════════════════════════════

fn resolve_gates(world: &mut SimulationState, entered: &[GridPos], dt: f32, events: &mut Vec<GameEvent>) {
    for &pos in entered {
        if world.gates.arm(pos) {
            debug!(row = pos.row, col = pos.col, "gate armed");
            events.push(GameEvent::GateArmed { pos });
        }
    }
    for (pos, mode) in world.gates.update(dt) {
        debug!(row = pos.row, col = pos.col, ?mode, "gate toggled");
        events.push(GameEvent::GateToggled { pos, mode });
    }
}

// ══════════════════════════════════════════════════════════════
// Effects
// ══════════════════════════════════════════════════════════════

fn resolve_particles(world: &mut SimulationState, dt: f32) {
    world.particles.update(dt);
    let sparkle = world.phase == Phase::Invincible;
    for u in &world.unicorns {
        if u.is_paused() { continue; }
        world.particles.trail(u.body.x, u.body.y, world.clock);
        if sparkle {
            world.particles.sparks(u.body.x, u.body.y, world.clock, &mut world.rng);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Pickups
// ══════════════════════════════════════════════════════════════

fn resolve_dots(world: &mut SimulationState, events: &mut Vec<GameEvent>) {
    let body = &world.player.body;
    let cell = world.maze.cell_of(body.x, body.y);
    if !world.maze.exists_on(cell, body.layer) { return; }
    if world.dots.remove(&cell) {
        world.score += world.session.dot_points;
        events.push(GameEvent::DotCollected { cell });
    }
}

fn resolve_gem(world: &mut SimulationState, dt: f32, events: &mut Vec<GameEvent>) {
    let Some(gem) = world.gem.clone() else {
        if world.gems_collected >= world.session.max_gems_per_level { return; }
        world.gem_cooldown = (world.gem_cooldown - dt).max(0.0);
        if world.gem_cooldown == 0.0 {
            if let Some(cell) = world.place_gem() {
                events.push(GameEvent::PowerItemPlaced { cell });
            }
        }
        return;
    };

    if !world.player.body.overlaps(gem.x, gem.y, gem.size, gem.size) { return; }

    world.gem = None;
    world.gems_collected += 1;
    world.gem_cooldown = world.session.gem_respawn_seconds;
    world.score += world.session.gem_points;
    world.invincible_timer = world.session.invincible_seconds;
    world.phase = Phase::Invincible;
    events.push(GameEvent::PowerItemCollected { cell: gem.cell });
    info!(gems = world.gems_collected, "power item collected");

    let target = Target { x: world.player.body.x, y: world.player.body.y, invincible: true };
    let SimulationState { maze, gates, portals, unicorns, tuning, .. } = world;
    let view = LevelView { maze, gates, portals };
    for u in unicorns.iter_mut() {
        u.tagged = false;
        choose_avoid_direction(&view, u, target);
        u.random_burst = tuning.random_intersection_count;
        u.last_decision = Some(u.body.cell);
    }
}

fn resolve_invincibility(world: &mut SimulationState, dt: f32, events: &mut Vec<GameEvent>) {
    if world.phase != Phase::Invincible { return; }
    world.invincible_timer = (world.invincible_timer - dt).max(0.0);
    if world.invincible_timer == 0.0 {
        world.phase = Phase::Playing;
        events.push(GameEvent::InvincibilityEnded);
        info!("invincibility ended");
    }
}

// ══════════════════════════════════════════════════════════════
// Encounters
// ══════════════════════════════════════════════════════════════

/// Returns true when the player died (the rest of the tick is skipped).
fn resolve_encounters(world: &mut SimulationState, events: &mut Vec<GameEvent>) -> bool {
    if world.player.body.portal.is_animating() { return false; }

    for i in 0..world.unicorns.len() {
        let u = &world.unicorns[i];
        if u.is_paused() || u.body.portal.is_animating() { continue; }
        if !world.player.body.overlaps_body(&u.body) { continue; }

        if world.phase == Phase::Invincible {
            if u.tagged { continue; }
            tag_unicorn(world, i, events);
        } else {
            player_die(world, events);
            return true;
        }
    }
    false
}

/// Score the tag and park the unicorn at the respawn cell. Invincibility
/// keeps running so the other unicorns can still be tagged.
fn tag_unicorn(world: &mut SimulationState, i: usize, events: &mut Vec<GameEvent>) {
    let points = world.session.tag_points;
    world.score += points;

    let u = &mut world.unicorns[i];
    world.particles.popup(u.body.x, u.body.y, format!("+{points}"));
    u.tagged = true;
    u.body.place(&world.maze, world.respawn_cell);
    u.body.heading = Heading::Idle;
    u.respawn_pause = world.session.respawn_pause_seconds;
    u.last_decision = None;
    u.stuck_ticks = 0;
    u.deferred = false;

    info!(id = u.id, score = world.score, "unicorn tagged");
    events.push(GameEvent::UnicornTagged { id: u.id, points });
}

fn player_die(world: &mut SimulationState, events: &mut Vec<GameEvent>) {
    world.lives = world.lives.saturating_sub(1);
    events.push(GameEvent::PlayerDied { lives_left: world.lives });

    if world.lives == 0 {
        world.phase = Phase::GameOver;
        events.push(GameEvent::GameOver);
        info!(score = world.score, "game over");
    } else {
        world.reset_agents();
        world.phase = Phase::LifeLost;
        info!(lives = world.lives, "life lost");
    }
}

// ══════════════════════════════════════════════════════════════
// Score milestones and win check
// ══════════════════════════════════════════════════════════════

fn resolve_extra_life(world: &mut SimulationState, events: &mut Vec<GameEvent>) {
    let every = world.session.extra_life_score;
    if every == 0 { return; }
    while world.score >= world.next_extra_life {
        world.lives += 1;
        world.next_extra_life += every;
        events.push(GameEvent::ExtraLife { lives: world.lives });
        info!(lives = world.lives, "extra life");
    }
}

fn resolve_win(world: &mut SimulationState, events: &mut Vec<GameEvent>) {
    if !world.dots.is_empty() { return; }
    let index = world.current_level;
    events.push(GameEvent::LevelCleared { index });
    world.phase = if index + 1 < world.levels.len() { Phase::LevelComplete } else { Phase::Victory };
    info!(level = index, score = world.score, phase = ?world.phase, "level cleared");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::domain::entity::Gem;
    use crate::domain::gate::GateMode;
    use crate::sim::level::{self, parse_level_file, LevelPlan};

    const DT: f32 = 1.0 / 60.0;

    fn custom(text: &str) -> SimulationState {
        let def = parse_level_file(text).unwrap();
        SimulationState::new(&GameConfig::default(), vec![LevelPlan::File(def)], 3).unwrap()
    }

    fn classic() -> SimulationState {
        SimulationState::new(&GameConfig::default(), level::builtin_levels(), 3).unwrap()
    }

    fn idle() -> FrameInput {
        FrameInput::default()
    }

    #[test]
    fn nothing_runs_outside_play() {
        let mut w = classic();
        for phase in [Phase::Paused, Phase::LifeLost, Phase::LevelComplete, Phase::GameOver, Phase::Victory] {
            w.phase = phase;
            assert!(step(&mut w, FrameInput { movement: Heading::RIGHT }, DT).is_empty());
            assert_eq!(w.tick, 0);
        }
    }

    #[test]
    fn walking_collects_dots() {
        let mut w = classic();
        let before = w.dots.len();
        let mut events = vec![];
        for _ in 0..30 {
            events.extend(step(&mut w, FrameInput { movement: Heading::RIGHT }, DT));
        }
        assert!(events.contains(&GameEvent::DotCollected { cell: GridPos::new(1, 2) }));
        assert!(w.dots.len() < before);
        assert!(w.score >= 1);
    }

    #[test]
    fn clearing_the_last_dot_finishes_the_level() {
        let mut w = custom("# Short\n#####\n#P..#\n#####\n");
        // the gem sits on one of the two dots; keep it out of the way
        w.gem = None;
        w.gems_collected = w.session.max_gems_per_level;
        let mut cleared = false;
        for _ in 0..60 {
            let events = step(&mut w, FrameInput { movement: Heading::RIGHT }, DT);
            if events.contains(&GameEvent::LevelCleared { index: 0 }) {
                cleared = true;
                break;
            }
        }
        assert!(cleared);
        assert_eq!(w.phase, Phase::Victory);
        assert_eq!(w.score, 2);
    }

    #[test]
    fn power_item_starts_invincibility_and_scatters_unicorns() {
        let mut w = classic();
        // mid-corridor on the bottom row, where backing off gains distance
        let spot = GridPos::new(13, 12);
        w.unicorns[0].body.place(&w.maze, spot);
        w.unicorns[0].body.heading = Heading::LEFT;
        w.unicorns[0].tagged = true;
        let cell = GridPos::new(1, 1);
        w.gem = Some(Gem::at(&w.maze, cell));
        let events = step(&mut w, idle(), DT);

        assert!(events.contains(&GameEvent::PowerItemCollected { cell }));
        assert_eq!(w.phase, Phase::Invincible);
        assert_eq!(w.score, 5);
        assert!(w.gem.is_none());
        assert_eq!(w.gems_collected, 1);
        let p = (w.player.body.x, w.player.body.y);
        for u in &w.unicorns {
            assert!(!u.tagged);
            assert_eq!(u.random_burst, w.tuning.random_intersection_count);
            let now = u.body.distance_to(p.0, p.1);
            let after = ((u.body.x + u.body.heading.dx() * 32.0 - p.0).powi(2)
                + (u.body.y + u.body.heading.dy() * 32.0 - p.1).powi(2)).sqrt();
            assert!(after >= now);
        }
        assert_eq!(w.unicorns[0].body.heading, Heading::RIGHT);
    }

    #[test]
    fn invincibility_runs_out() {
        let mut w = classic();
        w.phase = Phase::Invincible;
        w.invincible_timer = 0.05;
        let mut ended = false;
        for _ in 0..5 {
            ended |= step(&mut w, idle(), DT).contains(&GameEvent::InvincibilityEnded);
        }
        assert!(ended);
        assert_eq!(w.phase, Phase::Playing);
    }

    #[test]
    fn gem_returns_after_cooldown_until_the_cap() {
        let mut w = classic();
        w.gem = None;
        w.gem_cooldown = 0.1;
        let mut placed = 0;
        for _ in 0..10 {
            placed += step(&mut w, idle(), DT).iter()
                .filter(|e| matches!(e, GameEvent::PowerItemPlaced { .. }))
                .count();
        }
        assert_eq!(placed, 1);
        assert!(w.gem.is_some());

        w.gem = None;
        w.gems_collected = w.session.max_gems_per_level;
        w.gem_cooldown = 0.0;
        step(&mut w, idle(), DT);
        assert!(w.gem.is_none());
    }

    fn put_unicorn_on_player(w: &mut SimulationState) {
        let (x, y) = (w.player.body.x, w.player.body.y);
        let u = &mut w.unicorns[0];
        u.body.x = x;
        u.body.y = y;
        u.body.cell = w.spawns.player;
        u.body.heading = Heading::Idle;
    }

    #[test]
    fn touching_a_unicorn_costs_a_life() {
        let mut w = classic();
        put_unicorn_on_player(&mut w);
        let events = step(&mut w, idle(), DT);
        assert!(events.contains(&GameEvent::PlayerDied { lives_left: 2 }));
        assert_eq!(w.phase, Phase::LifeLost);
        assert_eq!(w.unicorns[0].body.cell, GridPos::new(13, 19));
        assert_eq!(w.player.body.cell, GridPos::new(1, 1));

        w.resume();
        assert_eq!(w.phase, Phase::Playing);
    }

    #[test]
    fn last_life_ends_the_game() {
        let mut w = classic();
        w.lives = 1;
        put_unicorn_on_player(&mut w);
        let events = step(&mut w, idle(), DT);
        assert!(events.contains(&GameEvent::GameOver));
        assert_eq!(w.phase, Phase::GameOver);
    }

    #[test]
    fn invincible_touch_tags_once_per_window() {
        let mut w = classic();
        w.phase = Phase::Invincible;
        w.invincible_timer = 5.0;
        put_unicorn_on_player(&mut w);

        let events = step(&mut w, idle(), DT);
        assert!(events.contains(&GameEvent::UnicornTagged { id: 0, points: 10 }));
        assert_eq!(w.score, 10);
        assert_eq!(w.phase, Phase::Invincible);
        let u = &w.unicorns[0];
        assert!(u.tagged && u.is_paused());
        assert_eq!(u.body.cell, w.respawn_cell);
        assert!(u.body.heading.is_idle());
        assert_eq!(w.particles.texts[0].text, "+10");

        // overlapping again in the same window scores nothing
        put_unicorn_on_player(&mut w);
        w.unicorns[0].respawn_pause = 0.0;
        let events = step(&mut w, idle(), DT);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::UnicornTagged { .. })));
        assert_eq!(w.score, 10);
    }

    #[test]
    fn paused_unicorn_is_harmless() {
        let mut w = classic();
        put_unicorn_on_player(&mut w);
        w.unicorns[0].respawn_pause = 1.0;
        let events = step(&mut w, idle(), DT);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::PlayerDied { .. })));
        assert_eq!(w.phase, Phase::Playing);
    }

    #[test]
    fn score_milestones_grant_lives() {
        let mut w = classic();
        w.score = 999;
        w.gem = None;
        w.gems_collected = w.session.max_gems_per_level;
        let mut events = vec![];
        for _ in 0..30 {
            events.extend(step(&mut w, FrameInput { movement: Heading::RIGHT }, DT));
        }
        assert!(events.contains(&GameEvent::ExtraLife { lives: 4 }));
        assert_eq!(w.next_extra_life, 2000);
    }

    #[test]
    fn huge_frame_delta_is_clamped() {
        let mut w = classic();
        step(&mut w, FrameInput { movement: Heading::RIGHT }, 5.0);
        // 180 px/s for at most 0.1 s
        assert!(w.player.body.x - 48.0 <= 18.0 + 1e-3);
        assert!((w.clock - 0.1).abs() < 1e-6);
    }

    #[test]
    fn walking_through_a_gate_arms_and_later_flips_it() {
        // (1,3) is sealed off so the level cannot be cleared mid-test
        let mut w = custom("# Gate\n#####\n#P#.#\n#.###\n#+###\n#.###\n#.###\n#####\n");
        w.gem = None;
        w.gems_collected = w.session.max_gems_per_level;
        let gate = GridPos::new(3, 1);
        let mut armed = 0;
        let mut toggled = vec![];
        for _ in 0..(3.0 / DT) as usize {
            for e in step(&mut w, FrameInput { movement: Heading::DOWN }, DT) {
                match e {
                    GameEvent::GateArmed { pos } if pos == gate => armed += 1,
                    GameEvent::GateToggled { pos, mode } if pos == gate => toggled.push(mode),
                    _ => {}
                }
            }
        }
        assert_eq!(w.player.body.cell, GridPos::new(5, 1));
        assert_eq!(armed, 1);
        assert_eq!(toggled, vec![GateMode::HorizontalOpen]);
        assert!(w.phase.is_running());
    }
}
