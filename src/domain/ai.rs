/// Unicorn pursuit AI: a greedy chase/flee/random blend.
///
/// Two phases per tick:
///   1. **Decision** (`choose_unicorn_dir`): only when exactly centered on
///      a cell, at most once per visit, never inside a bridge or tunnel.
///   2. **Movement** (`update_unicorn`): speed jitter and look-ahead reversal
///      before bridges/gates that would refuse the agent, then clamping
///      and integration with stuck recovery.
///
/// No search: the AI only ever compares the four neighbouring directions.

use tracing::{debug, trace, warn};

use super::entity::{Body, Heading, Unicorn};
use super::grid::GridPos;
use super::movement::{StepReport, Stepping};
use super::physics::{
    allowed_axis, clamp_move, forbids, inside_structure, integrate, layer_entering, probe_clear, LevelView,
};
use super::portal::{advance_teleport, apply_portal};
use super::profile::FleeResponse;
use super::rng::SimRng;
use super::tile::{Axis, Layer, Tile};

/// Probe distance for "is this direction open", in tiles.
pub const DIRECTION_PROBE: f32 = 0.6;
/// Max distance from a cell center that still counts as centered, in px.
pub const CENTERED_EPS: f32 = 1.0;
/// Consecutive motionless ticks before recentring and picking at random.
pub const STUCK_LIMIT: u32 = 2;

// ══════════════════════════════════════════════════════════════
// Policy and context
// ══════════════════════════════════════════════════════════════

/// When may the turn-delay roll hold a unicorn back?
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TurnDelayPolicy {
    /// Only corridor continuation; real intersections always decide.
    #[default]
    CorridorOnly,
    /// Intersections and corners too: the unicorn hesitates one tick.
    Anywhere,
}

/// What a collision on the travel axis does to the heading.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BlockedAxisPolicy {
    #[default]
    ZeroAxis,
    ReverseBoth,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PursuitMode {
    Chase,
    Flee,
}

impl PursuitMode {
    /// Flee only while the player is invincible, the profile flees, and
    /// debugging hasn't pinned everyone to chase.
    pub fn select(flee_response: FleeResponse, invincible: bool, force_chase: bool) -> Self {
        if invincible && !force_chase && flee_response == FleeResponse::Flee {
            PursuitMode::Flee
        } else {
            PursuitMode::Chase
        }
    }

    /// Odds of acting on the greedy heuristic. A keen chaser is a poor runner.
    pub fn bias(self, chase_bias: f32) -> f32 {
        match self {
            PursuitMode::Chase => chase_bias,
            PursuitMode::Flee => 1.0 - chase_bias,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AiTuning {
    pub base_speed: f32,
    pub random_intersection_count: u32,
    pub turn_delay: TurnDelayPolicy,
    pub blocked_axis: BlockedAxisPolicy,
    pub force_chase: bool,
}

impl Default for AiTuning {
    fn default() -> Self {
        AiTuning {
            base_speed: 115.0,
            random_intersection_count: 2,
            turn_delay: TurnDelayPolicy::CorridorOnly,
            blocked_axis: BlockedAxisPolicy::ZeroAxis,
            force_chase: false,
        }
    }
}

/// Where the player is and whether the AI should run from it.
#[derive(Clone, Copy, Debug)]
pub struct Target {
    pub x: f32,
    pub y: f32,
    pub invincible: bool,
}

// ══════════════════════════════════════════════════════════════
// Decision phase
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Decision {
    NotCentered,
    AlreadyDecided,
    InsideStructure,
    /// Straight corridor (or dead end) outside a burst: keep going.
    Corridor,
    /// Turn-delay roll won at an intersection: hold still this tick.
    Hesitate,
    Burst(Heading),
    Random(Heading),
    Pursue(Heading),
    Scored(Heading),
    Fallback(Heading),
    NoExit,
}

impl Decision {
    pub fn heading(self) -> Option<Heading> {
        match self {
            Decision::Burst(h) | Decision::Random(h) | Decision::Pursue(h)
            | Decision::Scored(h) | Decision::Fallback(h) => Some(h),
            _ => None,
        }
    }
}

/// Directions a body could set off in from (`x`, `y`).
pub fn valid_directions_from(view: &LevelView, body: &Body, x: f32, y: f32) -> Vec<Heading> {
    let reach = view.maze.tile_size() * DIRECTION_PROBE;
    Heading::CARDINALS
        .into_iter()
        .filter(|&h| probe_clear(view, body, x, y, h, reach))
        .collect()
}

pub fn valid_directions(view: &LevelView, body: &Body) -> Vec<Heading> {
    valid_directions_from(view, body, body.x, body.y)
}

pub fn choose_unicorn_dir(
    view: &LevelView,
    unicorn: &mut Unicorn,
    target: Target,
    tuning: &AiTuning,
    rng: &mut SimRng,
) -> Decision {
    let maze = view.maze;
    let cell = maze.cell_of(unicorn.body.x, unicorn.body.y);
    let (cx, cy) = maze.center_of(cell);
    if (unicorn.body.x - cx).abs() > CENTERED_EPS || (unicorn.body.y - cy).abs() > CENTERED_EPS {
        return Decision::NotCentered;
    }
    if unicorn.last_decision == Some(cell) {
        return Decision::AlreadyDecided;
    }
    if inside_structure(maze, cell, unicorn.body.layer) {
        return Decision::InsideStructure;
    }
    unicorn.body.x = cx;
    unicorn.body.y = cy;

    let heading = unicorn.body.heading;
    let valid = valid_directions(view, &unicorn.body);
    let reverse = heading.reversed();
    let onward: Vec<Heading> = valid.iter().copied().filter(|&h| heading.is_idle() || h != reverse).collect();
    let intersection = onward.len() >= 2;
    let corner = onward.len() == 1 && onward[0] != heading;
    let junction = intersection || corner;

    // ── Turn delay ──
    if unicorn.profile.turn_delay_chance > 0.0 && rng.chance(unicorn.profile.turn_delay_chance) {
        match tuning.turn_delay {
            _ if !junction => return Decision::Corridor,
            TurnDelayPolicy::Anywhere if !unicorn.deferred => {
                unicorn.deferred = true;
                return Decision::Hesitate;
            }
            _ => {}
        }
    }

    if unicorn.random_burst == 0 && !junction {
        return Decision::Corridor;
    }

    let decision = decide(unicorn, &valid, &onward, target, tuning, rng, maze.tile_size());
    if let Some(h) = decision.heading() {
        unicorn.body.heading = h;
    }
    unicorn.last_decision = Some(cell);
    trace!(id = unicorn.id, row = cell.row, col = cell.col, ?decision, "unicorn decision");
    decision
}

fn decide(
    unicorn: &mut Unicorn,
    valid: &[Heading],
    onward: &[Heading],
    target: Target,
    tuning: &AiTuning,
    rng: &mut SimRng,
    tile: f32,
) -> Decision {
    if unicorn.random_burst > 0 {
        unicorn.random_burst -= 1;
        return match rng.pick(valid) {
            Some(&h) => Decision::Burst(h),
            None => Decision::NoExit,
        };
    }

    let profile = &unicorn.profile;
    let mode = PursuitMode::select(profile.flee_response, target.invincible, tuning.force_chase);
    if rng.chance(profile.random_bias) {
        if let Some(&h) = rng.pick(valid) {
            return Decision::Random(h);
        }
    } else if rng.chance(mode.bias(profile.chase_bias)) {
        let body = &unicorn.body;
        let dx = target.x - body.x;
        let dy = target.y - body.y;
        let away = if mode == PursuitMode::Flee { -1.0 } else { 1.0 };
        let h = Heading::along(Axis::Horizontal, dx * away);
        let v = Heading::along(Axis::Vertical, dy * away);
        let primary = if dx.abs() > dy.abs() { [h, v] } else { [v, h] };
        if let Some(&pick) = primary.iter().find(|c| !c.is_idle() && onward.contains(c)) {
            return Decision::Pursue(pick);
        }
        if let Some(pick) = best_by_distance(body, onward, target, mode, tile) {
            return Decision::Scored(pick);
        }
    }

    match onward.first().or(valid.first()) {
        Some(&h) => Decision::Fallback(h),
        None => Decision::NoExit,
    }
}

/// Distance to the target after one tile in `heading`.
fn distance_after(body: &Body, heading: Heading, target: Target, tile: f32) -> f32 {
    let nx = body.x + heading.dx() * tile;
    let ny = body.y + heading.dy() * tile;
    ((target.x - nx).powi(2) + (target.y - ny).powi(2)).sqrt()
}

fn best_by_distance(body: &Body, options: &[Heading], target: Target, mode: PursuitMode, tile: f32) -> Option<Heading> {
    let mut best: Option<(Heading, f32)> = None;
    for &h in options {
        let d = distance_after(body, h, target, tile);
        let better = match (best, mode) {
            (None, _) => true,
            (Some((_, b)), PursuitMode::Chase) => d < b,
            (Some((_, b)), PursuitMode::Flee) => d > b,
        };
        if better {
            best = Some((h, d));
        }
    }
    best.map(|(h, _)| h)
}

/// One-shot escape on power-item pickup, outside the normal decision gate.
/// Reverse if that gains distance; otherwise the open direction gaining the
/// most; otherwise the least-bad open direction.
pub fn choose_avoid_direction(view: &LevelView, unicorn: &mut Unicorn, target: Target) {
    let body = &unicorn.body;
    let valid = valid_directions(view, body);
    if valid.is_empty() {
        return;
    }
    let tile = view.maze.tile_size();
    let now = body.distance_to(target.x, target.y);
    let scored: Vec<(Heading, f32)> = valid.iter().map(|&h| (h, distance_after(body, h, target, tile))).collect();

    let reverse = body.heading.reversed();
    let pick = scored.iter()
        .find(|&&(h, d)| !reverse.is_idle() && h == reverse && d > now)
        .or_else(|| scored.iter().filter(|&&(_, d)| d > now).max_by(|a, b| a.1.total_cmp(&b.1)))
        .or_else(|| scored.iter().max_by(|a, b| a.1.total_cmp(&b.1)))
        .map(|&(h, _)| h);

    if let Some(h) = pick {
        trace!(id = unicorn.id, ?h, "avoid direction");
        unicorn.body.heading = h;
    }
}

// ══════════════════════════════════════════════════════════════
// Movement phase
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnicornReport {
    pub step: StepReport,
    pub decision: Option<Decision>,
    /// Cell where the agent was caught turning inside a bridge or tunnel.
    pub violation: Option<GridPos>,
    pub recovered: bool,
}

pub fn update_unicorn(
    view: &LevelView,
    unicorn: &mut Unicorn,
    target: Target,
    tuning: &AiTuning,
    stepping: &Stepping,
    rng: &mut SimRng,
    dt: f32,
) -> UnicornReport {
    if unicorn.is_paused() {
        unicorn.respawn_pause = (unicorn.respawn_pause - dt).max(0.0);
        return UnicornReport::default();
    }
    if unicorn.body.portal.is_animating() {
        let portal = advance_teleport(&mut unicorn.body, view.maze, dt, stepping.teleport_seconds);
        if portal.is_some() {
            forget_visit(unicorn);
        }
        return UnicornReport { step: StepReport { entered: vec![], portal }, ..Default::default() };
    }

    let start = (unicorn.body.x, unicorn.body.y);
    let start_cell = unicorn.body.cell;
    let start_heading = unicorn.body.heading;

    let mut report = drive(view, unicorn, target, tuning, stepping, rng, dt);
    if report.decision == Some(Decision::Hesitate) {
        return report;
    }

    // ── Progress ──
    if (unicorn.body.x, unicorn.body.y) == start && report.step.portal.is_none() {
        unicorn.stuck_ticks += 1;
        if unicorn.stuck_ticks >= STUCK_LIMIT {
            recover(view, unicorn, tuning, rng);
            report.recovered = true;
        }
    } else {
        unicorn.stuck_ticks = 0;
    }

    // ── Consistency ──
    if let Some(cell) = turned_inside_structure(view, unicorn, start_cell, start_heading) {
        warn!(id = unicorn.id, row = cell.row, col = cell.col, "unicorn turned inside a bridge or tunnel");
        if let (Some(axis), Heading::Moving { axis: was, sign }) =
            (allowed_axis(view, cell, unicorn.body.layer), start_heading)
        {
            unicorn.body.heading = if was == axis { start_heading } else { Heading::Moving { axis, sign } };
        }
        report.violation = Some(cell);
    }

    if unicorn.body.cell != start_cell || report.step.portal.is_some() {
        forget_visit(unicorn);
    }
    report
}

fn drive(
    view: &LevelView,
    unicorn: &mut Unicorn,
    target: Target,
    tuning: &AiTuning,
    stepping: &Stepping,
    rng: &mut SimRng,
    dt: f32,
) -> UnicornReport {
    let maze = view.maze;
    let mut report = UnicornReport::default();
    let start = (unicorn.body.x, unicorn.body.y);

    let decision = choose_unicorn_dir(view, unicorn, target, tuning, rng);
    report.decision = Some(decision);
    if decision == Decision::Hesitate {
        return report;
    }

    unicorn.body.speed = unicorn.profile.sample_speed(tuning.base_speed, rng);

    // ── Look-ahead ──
    if let Heading::Moving { axis, .. } = unicorn.body.heading {
        let body = &unicorn.body;
        let reach = body.w * 0.5;
        let here = maze.cell_of(body.x, body.y);
        let ahead = maze.cell_of(body.x + body.heading.dx() * reach, body.y + body.heading.dy() * reach);
        if ahead != here && refuses(view, body.layer, here, ahead, axis) {
            debug!(id = unicorn.id, row = ahead.row, col = ahead.col, "reversing before special tile");
            reverse_into_burst(unicorn, tuning);
            return report;
        }
    }

    // ── Clamp ──
    let heading = unicorn.body.heading;
    if !heading.is_idle() {
        let dist = unicorn.body.speed * dt;
        let (mut mx, mut my) = clamp_move(view, &unicorn.body, heading.dx() * dist, heading.dy() * dist);
        if mx == 0.0 && my == 0.0 {
            reverse_into_burst(unicorn, tuning);
            return report;
        }
        truncate_at_center(view, &unicorn.body, &mut mx, &mut my);

        let motion = integrate(view, &mut unicorn.body, mx, my, stepping.max_substep);
        let hit = match heading.axis() {
            Some(Axis::Horizontal) => motion.blocked_x,
            Some(Axis::Vertical) => motion.blocked_y,
            None => false,
        };
        if hit {
            unicorn.body.heading = match tuning.blocked_axis {
                BlockedAxisPolicy::ZeroAxis => Heading::Idle,
                BlockedAxisPolicy::ReverseBoth => heading.reversed(),
            };
        }
        report.step.entered = motion.entered;

        // ── Stuck ──
        if (unicorn.body.x, unicorn.body.y) == start {
            if unicorn.body.heading == heading {
                unstick(view, unicorn, rng);
            }
            unicorn.random_burst = tuning.random_intersection_count;
            report.recovered = true;
        }
    }

    // ── Scan ──
    if unicorn.body.heading.is_idle() {
        snap_to_center(view, &mut unicorn.body);
        if let Some(&h) = valid_directions(view, &unicorn.body).first() {
            unicorn.body.heading = h;
        }
    }

    report.step.portal = apply_portal(&mut unicorn.body, maze, view.portals);
    report
}

/// Would the tile `ahead` refuse travel along `axis`? Only bridges seen
/// from the upper plane and gates count; walls are left to collision.
fn refuses(view: &LevelView, layer: Layer, here: GridPos, ahead: GridPos, axis: Axis) -> bool {
    match view.maze.tile_at(ahead) {
        Tile::Bridge => {
            let entering = layer_entering(view.maze, layer, here, ahead);
            entering == Layer::Upper && forbids(view, ahead, entering, axis)
        }
        Tile::Gate => view.gates.forbids(ahead, axis),
        _ => false,
    }
}

fn reverse_into_burst(unicorn: &mut Unicorn, tuning: &AiTuning) {
    unicorn.body.heading = unicorn.body.heading.reversed();
    unicorn.random_burst = tuning.random_intersection_count;
}

/// Shorten a move so it stops exactly on the next cell center ahead.
fn truncate_at_center(view: &LevelView, body: &Body, mx: &mut f32, my: &mut f32) {
    let maze = view.maze;
    let tile = maze.tile_size();
    let (cx, cy) = maze.center_of(maze.cell_of(body.x, body.y));
    let clip = |pos: f32, center: f32, delta: &mut f32| {
        if *delta == 0.0 {
            return;
        }
        let next = if *delta > 0.0 {
            if pos < center { center } else { center + tile }
        } else if pos > center {
            center
        } else {
            center - tile
        };
        if (*delta > 0.0 && pos + *delta > next) || (*delta < 0.0 && pos + *delta < next) {
            *delta = next - pos;
        }
    };
    clip(body.x, cx, mx);
    clip(body.y, cy, my);
}

fn snap_to_center(view: &LevelView, body: &mut Body) {
    let (cx, cy) = view.maze.center_of(view.maze.cell_of(body.x, body.y));
    body.x = cx;
    body.y = cy;
}

/// A motionless tick with the heading intact: turn around, or if the way
/// back is shut too, recentre and take any open direction.
fn unstick(view: &LevelView, unicorn: &mut Unicorn, rng: &mut SimRng) {
    let body = &unicorn.body;
    let back = body.heading.reversed();
    let reach = view.maze.tile_size() * DIRECTION_PROBE;
    if probe_clear(view, body, body.x, body.y, back, reach) {
        unicorn.body.heading = back;
    } else {
        pick_any_open(view, unicorn, rng);
    }
    debug!(id = unicorn.id, heading = ?unicorn.body.heading, "unicorn unstuck");
}

fn pick_any_open(view: &LevelView, unicorn: &mut Unicorn, rng: &mut SimRng) {
    snap_to_center(view, &mut unicorn.body);
    unicorn.last_decision = None;
    let valid = valid_directions(view, &unicorn.body);
    if let Some(&h) = rng.pick(&valid) {
        unicorn.body.heading = h;
    }
}

/// Backstop once turning around has not helped either: recentre, forget
/// the visit, and head off in any open direction at random.
fn recover(view: &LevelView, unicorn: &mut Unicorn, tuning: &AiTuning, rng: &mut SimRng) {
    pick_any_open(view, unicorn, rng);
    unicorn.random_burst = tuning.random_intersection_count;
    unicorn.stuck_ticks = 0;
    debug!(id = unicorn.id, heading = ?unicorn.body.heading, "stuck recovery");
}

fn forget_visit(unicorn: &mut Unicorn) {
    unicorn.last_decision = None;
    unicorn.deferred = false;
}

fn turned_inside_structure(view: &LevelView, unicorn: &Unicorn, start_cell: GridPos, start_heading: Heading) -> Option<GridPos> {
    let body = &unicorn.body;
    if body.cell != start_cell || !inside_structure(view.maze, start_cell, body.layer) {
        return None;
    }
    // mouths are inside for decisions but lock nothing
    let allowed = allowed_axis(view, start_cell, body.layer)?;
    match (start_heading.axis(), body.heading.axis()) {
        (Some(a), Some(b)) if a != b && b != allowed => Some(start_cell),
        _ => None,
    }
}
