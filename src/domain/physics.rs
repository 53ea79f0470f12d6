/// Layer-aware box-vs-tile collision and sub-stepped motion.
///
/// ## Blocking (`blocked`)
/// The four corners of the box are mapped to cells. A corner cell blocks if
///   - it is a `Wall`;
///   - it is a `Gate` whose mode forbids the tested movement axis
///     (gate cells the box is leaving are ignored);
///   - it exists neither on the current layer nor on the target layer.
///     Bridges never block an agent that is, or is becoming, `Lower`.
///
/// ## Layers
/// Callers compute the target layer with `transition_target` before
/// testing, and commit the layer with `settle_layer` once the center cell
/// is known. Tunnel paths pin `Lower`; plain floor and gates pin `Upper`;
/// bridges and mouths keep whatever the agent had. A portal keeps the
/// layer only while a tunnel path touches it; otherwise it is `Upper`.
///
/// ## Orientation locks
/// `allowed_axis` gives the only axis a bridge, tunnel or gate lets an
/// agent move along. Both the turn probe and the per-tick clamp use it.

use super::entity::{Body, Heading};
use super::gate::GateSet;
use super::grid::{GridPos, Maze};
use super::portal::{self, PortalSet};
use super::tile::{Axis, Layer, Tile};

/// Keeps a box flush against a cell edge out of the neighbouring cell.
const EDGE_EPS: f32 = 1e-3;

/// Read-only view of the level geometry handed to movement code.
#[derive(Clone, Copy)]
pub struct LevelView<'a> {
    pub maze: &'a Maze,
    pub gates: &'a GateSet,
    pub portals: &'a PortalSet,
}

// ══════════════════════════════════════════════════════════════
// Blocking predicate
// ══════════════════════════════════════════════════════════════

#[allow(clippy::too_many_arguments)]
pub fn blocked(
    view: &LevelView,
    x: f32, y: f32, w: f32, h: f32,
    layer: Layer,
    target: Option<Layer>,
    heading: Heading,
) -> bool {
    let center = view.maze.cell_of(x, y);
    box_cells(view.maze, x, y, w, h)
        .into_iter()
        .any(|cell| cell_blocks(view, cell, center, layer, target, heading))
}

/// Cells under the four corners of a center-based box.
pub fn box_cells(maze: &Maze, x: f32, y: f32, w: f32, h: f32) -> [GridPos; 4] {
    let (left, right) = (x - w / 2.0, x + w / 2.0 - EDGE_EPS);
    let (top, bottom) = (y - h / 2.0, y + h / 2.0 - EDGE_EPS);
    [
        maze.cell_of(left, top),
        maze.cell_of(right, top),
        maze.cell_of(left, bottom),
        maze.cell_of(right, bottom),
    ]
}

fn cell_blocks(
    view: &LevelView,
    cell: GridPos,
    center: GridPos,
    layer: Layer,
    target: Option<Layer>,
    heading: Heading,
) -> bool {
    let maze = view.maze;
    match maze.tile_at(cell) {
        Tile::Wall => return true,
        Tile::Gate => {
            if let Some(axis) = heading.axis() {
                if view.gates.forbids(cell, axis) && !lies_behind(cell, center, heading) {
                    return true;
                }
            }
        }
        Tile::Bridge if layer == Layer::Lower || target == Some(Layer::Lower) => return false,
        _ => {}
    }
    if maze.exists_on(cell, layer) {
        return false;
    }
    match target {
        Some(t) => !maze.exists_on(cell, t),
        None => true,
    }
}

/// A cell on the trailing side of the box: the agent is leaving it.
fn lies_behind(cell: GridPos, center: GridPos, heading: Heading) -> bool {
    let (dx, dy) = heading.components();
    (cell.col - center.col) * dx + (cell.row - center.row) * dy < 0
}

// ══════════════════════════════════════════════════════════════
// Layer transitions
// ══════════════════════════════════════════════════════════════

/// Layer an agent may pass into when its center moves `from` -> `to`.
/// Only tunnel mouths open the other plane.
pub fn transition_target(maze: &Maze, layer: Layer, from: GridPos, to: GridPos) -> Option<Layer> {
    if !(maze.is_tunnel_mouth(from) || maze.is_tunnel_mouth(to)) {
        return None;
    }
    match layer {
        Layer::Upper => Some(Layer::Lower),
        Layer::Lower => Some(Layer::Upper),
    }
}

/// Layer once the agent's center sits in `cell`.
pub fn settle_layer(maze: &Maze, layer: Layer, cell: GridPos) -> Layer {
    match maze.tile_at(cell) {
        Tile::TunnelPath => Layer::Lower,
        Tile::Gate => Layer::Upper,
        Tile::Floor if !maze.is_tunnel_mouth(cell) => Layer::Upper,
        Tile::WrapPortal if !maze.touches_tunnel(cell) => Layer::Upper,
        _ => layer,
    }
}

/// Layer the agent will have after its center crosses `from` -> `to`.
pub fn layer_entering(maze: &Maze, layer: Layer, from: GridPos, to: GridPos) -> Layer {
    let through = transition_target(maze, layer, from, to).unwrap_or(layer);
    settle_layer(maze, through, to)
}

// ══════════════════════════════════════════════════════════════
// Orientation locks
// ══════════════════════════════════════════════════════════════

/// The only axis `cell` allows for an agent on `layer`; `None` = any.
/// Agents under a bridge follow the tunnel, across its crossing axis.
pub fn allowed_axis(view: &LevelView, cell: GridPos, layer: Layer) -> Option<Axis> {
    let maze = view.maze;
    match maze.tile_at(cell) {
        Tile::Bridge => {
            let crossing = maze.bridge_axis(cell);
            Some(match layer {
                Layer::Upper => crossing,
                Layer::Lower => crossing.other(),
            })
        }
        Tile::TunnelPath => maze.tunnel_axis(cell),
        Tile::Gate => view.gates.get(cell).map(|g| g.mode.open_axis()),
        _ => None,
    }
}

pub fn forbids(view: &LevelView, cell: GridPos, layer: Layer, axis: Axis) -> bool {
    allowed_axis(view, cell, layer).is_some_and(|a| a != axis)
}

/// Inside a bridge or tunnel structure: no turning allowed here.
pub fn inside_structure(maze: &Maze, cell: GridPos, layer: Layer) -> bool {
    match layer {
        Layer::Upper => maze.tile_at(cell) == Tile::Bridge,
        Layer::Lower => matches!(maze.tile_at(cell), Tile::TunnelPath | Tile::Bridge)
            || maze.is_tunnel_mouth(cell),
    }
}

// ══════════════════════════════════════════════════════════════
// Probes and clamps
// ══════════════════════════════════════════════════════════════

/// Could `body` set off in `heading` from (`from_x`, `from_y`)?
/// Tests the box `reach` pixels ahead, plus orientation locks on the
/// current and destination cells. A tunnel may not be turned out of
/// straight onto a bridge.
pub fn probe_clear(view: &LevelView, body: &Body, from_x: f32, from_y: f32, heading: Heading, reach: f32) -> bool {
    let maze = view.maze;
    let Some(axis) = heading.axis() else { return false };
    let here = maze.cell_of(from_x, from_y);
    let tx = from_x + heading.dx() * reach;
    let ty = from_y + heading.dy() * reach;
    let target = transition_target(maze, body.layer, here, maze.cell_of(tx, ty));
    if blocked(view, tx, ty, body.w, body.h, body.layer, target, heading) {
        return false;
    }
    if forbids(view, here, body.layer, axis) {
        return false;
    }
    let dest = heading.step(here);
    if maze.tile_at(here) == Tile::TunnelPath && maze.tile_at(dest) == Tile::Bridge {
        return false;
    }
    let dest_layer = layer_entering(maze, body.layer, here, dest);
    !forbids(view, dest, dest_layer, axis)
}

/// Zero any move component the current cell, or the cell the move
/// would land in, does not allow.
pub fn clamp_move(view: &LevelView, body: &Body, mut mx: f32, mut my: f32) -> (f32, f32) {
    let maze = view.maze;
    let here = maze.cell_of(body.x, body.y);
    if mx != 0.0 && forbids(view, here, body.layer, Axis::Horizontal) { mx = 0.0; }
    if my != 0.0 && forbids(view, here, body.layer, Axis::Vertical) { my = 0.0; }

    let there = maze.cell_of(body.x + mx, body.y + my);
    if there != here {
        let layer = layer_entering(maze, body.layer, here, there);
        if mx != 0.0 && forbids(view, there, layer, Axis::Horizontal) { mx = 0.0; }
        if my != 0.0 && forbids(view, there, layer, Axis::Vertical) { my = 0.0; }
    }
    (mx, my)
}

// ══════════════════════════════════════════════════════════════
// Motion
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Motion {
    pub blocked_x: bool,
    pub blocked_y: bool,
    /// Cells the center entered, in order.
    pub entered: Vec<GridPos>,
}

/// Move `body` by (`mx`, `my`) in sub-steps of at most `max_step` pixels,
/// X then Y per sub-step, each against `blocked`. Stops early once the
/// center reaches a live portal trigger zone.
pub fn integrate(view: &LevelView, body: &mut Body, mx: f32, my: f32, max_step: f32) -> Motion {
    let maze = view.maze;
    let mut motion = Motion::default();
    let dist = mx.abs().max(my.abs());
    if dist == 0.0 {
        return motion;
    }
    let steps = if max_step > 0.0 { (dist / max_step).ceil().max(1.0) as usize } else { 1 };
    let (sx, sy) = (mx / steps as f32, my / steps as f32);

    for _ in 0..steps {
        if sx != 0.0 && !motion.blocked_x {
            let nx = body.x + sx;
            let target = transition_target(maze, body.layer, maze.cell_of(body.x, body.y), maze.cell_of(nx, body.y));
            if blocked(view, nx, body.y, body.w, body.h, body.layer, target, Heading::along(Axis::Horizontal, sx)) {
                motion.blocked_x = true;
            } else {
                body.x = nx;
            }
        }
        if sy != 0.0 && !motion.blocked_y {
            let ny = body.y + sy;
            let target = transition_target(maze, body.layer, maze.cell_of(body.x, body.y), maze.cell_of(body.x, ny));
            if blocked(view, body.x, ny, body.w, body.h, body.layer, target, Heading::along(Axis::Vertical, sy)) {
                motion.blocked_y = true;
            } else {
                body.y = ny;
            }
        }

        let cell = maze.cell_of(body.x, body.y);
        if cell != body.cell {
            body.cell = cell;
            motion.entered.push(cell);
        }
        body.layer = settle_layer(maze, body.layer, cell);

        if portal::is_armed(view, &body.portal, body.x, body.y) {
            break;
        }
        if (sx == 0.0 || motion.blocked_x) && (sy == 0.0 || motion.blocked_y) {
            break;
        }
    }
    motion
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::gate::{Gate, GateMode};

    pub(crate) fn maze(rows: &[&str]) -> Maze {
        let grid = rows.iter()
            .map(|r| r.chars().map(|c| Tile::from_glyph(c).unwrap()).collect())
            .collect();
        Maze::from_rows(grid, 32.0).unwrap()
    }

    fn body_at(m: &Maze, row: i32, col: i32, layer: Layer) -> Body {
        let mut b = Body::at_cell(m, GridPos::new(row, col), 24.0, 100.0);
        b.layer = layer;
        b
    }

    #[test]
    fn walls_block_any_layer() {
        let m = maze(&["###", "#.#", "###"]);
        let (g, p) = (GateSet::default(), PortalSet::default());
        let view = LevelView { maze: &m, gates: &g, portals: &p };
        // centered: box fits inside the cell
        assert!(!blocked(&view, 48.0, 48.0, 24.0, 24.0, Layer::Upper, None, Heading::RIGHT));
        // 5px right: right edge at 65 crosses into the wall
        assert!(blocked(&view, 53.0, 48.0, 24.0, 24.0, Layer::Upper, None, Heading::RIGHT));
        assert!(blocked(&view, 53.0, 48.0, 24.0, 24.0, Layer::Lower, Some(Layer::Upper), Heading::RIGHT));
    }

    #[test]
    fn off_grid_blocks() {
        let m = maze(&["..."]);
        let (g, p) = (GateSet::default(), PortalSet::default());
        let view = LevelView { maze: &m, gates: &g, portals: &p };
        assert!(blocked(&view, 10.0, 16.0, 24.0, 24.0, Layer::Upper, None, Heading::LEFT));
    }

    #[test]
    fn bridge_blocks_by_layer_and_orientation() {
        // 3x3 fixture: vertical bridge in the middle, tunnels left and right.
        let m = maze(&[
            "#.#",
            "t=t",
            "#.#",
        ]);
        let (g, p) = (GateSet::default(), PortalSet::default());
        let view = LevelView { maze: &m, gates: &g, portals: &p };
        let bridge = GridPos::new(1, 1);

        // Lower agents occupy the bridge's space
        assert!(!blocked(&view, 48.0, 48.0, 24.0, 24.0, Layer::Lower, None, Heading::RIGHT));
        // Upper agents stand on it too...
        assert!(!blocked(&view, 48.0, 48.0, 24.0, 24.0, Layer::Upper, None, Heading::DOWN));
        // ...but may not run along it sideways
        assert!(forbids(&view, bridge, Layer::Upper, Axis::Horizontal));
        assert!(!forbids(&view, bridge, Layer::Upper, Axis::Vertical));
        // Underneath, the tunnel runs horizontally
        assert!(!forbids(&view, bridge, Layer::Lower, Axis::Horizontal));
        assert!(forbids(&view, bridge, Layer::Lower, Axis::Vertical));

        // Upper agent centered on the bridge: horizontal move zeroed, vertical kept
        let upper = body_at(&m, 1, 1, Layer::Upper);
        assert_eq!(clamp_move(&view, &upper, 3.0, 0.0), (0.0, 0.0));
        assert_eq!(clamp_move(&view, &upper, 0.0, 3.0), (0.0, 3.0));
        // Lower agent beneath it: the converse
        let lower = body_at(&m, 1, 1, Layer::Lower);
        assert_eq!(clamp_move(&view, &lower, 3.0, 0.0), (3.0, 0.0));
        assert_eq!(clamp_move(&view, &lower, 0.0, 3.0), (0.0, 0.0));
    }

    #[test]
    fn tunnel_path_needs_lower_or_a_mouth() {
        let m = maze(&[
            "#####",
            "..t..",
            "#####",
        ]);
        let (g, p) = (GateSet::default(), PortalSet::default());
        let view = LevelView { maze: &m, gates: &g, portals: &p };
        // (1,1) is a mouth, so stepping from it into the tunnel is allowed
        let from = GridPos::new(1, 1);
        let to = GridPos::new(1, 2);
        let target = transition_target(&m, Layer::Upper, from, to);
        assert_eq!(target, Some(Layer::Lower));
        assert!(!blocked(&view, 80.0, 48.0, 24.0, 24.0, Layer::Upper, target, Heading::RIGHT));
        // Without a transition the upper plane has no tunnel
        assert!(blocked(&view, 80.0, 48.0, 24.0, 24.0, Layer::Upper, None, Heading::RIGHT));
        assert_eq!(settle_layer(&m, Layer::Upper, to), Layer::Lower);
        assert_eq!(settle_layer(&m, Layer::Lower, GridPos::new(1, 0)), Layer::Upper);
        // the mouth itself keeps the current layer
        assert_eq!(settle_layer(&m, Layer::Lower, from), Layer::Lower);
    }

    #[test]
    fn portals_away_from_tunnels_settle_upper() {
        let m = maze(&[
            "#######",
            "o.t..to",
            "#######",
        ]);
        // nothing tunnels into the left portal
        assert_eq!(settle_layer(&m, Layer::Lower, GridPos::new(1, 0)), Layer::Upper);
        // the right one is fed straight from a tunnel
        assert_eq!(settle_layer(&m, Layer::Lower, GridPos::new(1, 6)), Layer::Lower);
        assert_eq!(settle_layer(&m, Layer::Upper, GridPos::new(1, 6)), Layer::Upper);
    }

    #[test]
    fn gate_blocks_only_its_closed_axis() {
        let m = maze(&[
            "#.#",
            "...",
            "#.#",
        ]);
        let gate_cell = GridPos::new(1, 1);
        let mut rows = vec![];
        for r in 0..3 {
            let mut row = vec![];
            for c in 0..3 {
                let pos = GridPos::new(r, c);
                row.push(if pos == gate_cell { Tile::Gate } else { m.tile_at(pos) });
            }
            rows.push(row);
        }
        let m = Maze::from_rows(rows, 32.0).unwrap();
        let g = GateSet::new(vec![Gate::new(gate_cell, GateMode::VerticalOpen)], 2.0);
        let p = PortalSet::default();
        let view = LevelView { maze: &m, gates: &g, portals: &p };

        // Approaching from the left, box poking into the gate cell
        assert!(blocked(&view, 28.0, 48.0, 24.0, 24.0, Layer::Upper, None, Heading::RIGHT));
        // Approaching from above
        assert!(!blocked(&view, 48.0, 28.0, 24.0, 24.0, Layer::Upper, None, Heading::DOWN));
        // Leaving the gate cell to the left is not blocked by the gate behind
        assert!(!blocked(&view, 30.0, 48.0, 24.0, 24.0, Layer::Upper, None, Heading::LEFT));
    }

    #[test]
    fn integrate_stops_at_wall_and_never_enters_it() {
        let m = maze(&["#####", "#...#", "#####"]);
        let (g, p) = (GateSet::default(), PortalSet::default());
        let view = LevelView { maze: &m, gates: &g, portals: &p };
        let mut b = body_at(&m, 1, 1, Layer::Upper);
        let motion = integrate(&view, &mut b, 200.0, 0.0, 4.0);
        assert!(motion.blocked_x);
        assert_eq!(motion.entered, vec![GridPos::new(1, 2), GridPos::new(1, 3)]);
        // right edge still left of the wall at x = 128
        assert!(b.x + b.w / 2.0 <= 128.0);
        for cell in box_cells(&m, b.x, b.y, b.w, b.h) {
            assert_ne!(m.tile_at(cell), Tile::Wall);
        }
    }
}
