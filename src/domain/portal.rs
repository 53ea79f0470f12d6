/// Portal resolution.
///
/// Three kinds of pair, classified from geometry at load time:
///   - **Wrap**: the two ends of one row at the maze edges. Instant jump
///     to the opposite end, which is then remembered so the entity can
///     walk off it without bouncing back.
///   - **BridgeTunnel**: portals either side of a bridge on one row.
///     Instant jump two cells past the bridge in the direction of travel.
///   - **Paired**: anything else. Plays a short teleport animation, during
///     which the entity does not move, then lands on the other portal.
///
/// A portal only fires once the entity's center is within an eighth of a
/// tile of the portal cell's center.

use std::collections::HashMap;

use tracing::trace;

use super::entity::Body;
use super::grid::{GridPos, Maze};
use super::physics::{settle_layer, LevelView};
use super::tile::Tile;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PortalKind {
    Wrap,
    BridgeTunnel,
    Paired,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PortalPair {
    pub a: GridPos,
    pub b: GridPos,
    pub kind: PortalKind,
}

impl PortalPair {
    pub fn classify(maze: &Maze, a: GridPos, b: GridPos) -> Self {
        let last_col = maze.cols() as i32 - 1;
        let kind = if a.row == b.row
            && (a.col - b.col).abs() == 2
            && maze.tile_at(GridPos::new(a.row, (a.col + b.col) / 2)) == Tile::Bridge
        {
            PortalKind::BridgeTunnel
        } else if a.row == b.row && a.col.min(b.col) == 0 && a.col.max(b.col) == last_col {
            PortalKind::Wrap
        } else {
            PortalKind::Paired
        };
        PortalPair { a, b, kind }
    }

    pub fn other(&self, pos: GridPos) -> Option<GridPos> {
        if pos == self.a {
            Some(self.b)
        } else if pos == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn midpoint(&self) -> GridPos {
        GridPos::new((self.a.row + self.b.row) / 2, (self.a.col + self.b.col) / 2)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PortalSet {
    pairs: Vec<PortalPair>,
    index: HashMap<GridPos, usize>,
}

impl PortalSet {
    pub fn new(pairs: Vec<PortalPair>) -> Self {
        let mut index = HashMap::new();
        for (i, p) in pairs.iter().enumerate() {
            index.insert(p.a, i);
            index.insert(p.b, i);
        }
        PortalSet { pairs, index }
    }

    pub fn find(&self, pos: GridPos) -> Option<&PortalPair> {
        self.index.get(&pos).map(|&i| &self.pairs[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortalPair> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A running paired-portal teleport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TeleportAnim {
    pub progress: f32, // 0..=1
    pub from: GridPos,
    pub target: GridPos,
    pub target_x: f32,
    pub target_y: f32,
}

impl TeleportAnim {
    /// Draw scale: shrinks to nothing over the first half, grows back
    /// over the second. Alpha follows the same curve.
    pub fn scale(&self) -> f32 {
        (1.0 - 2.0 * self.progress).abs()
    }

    /// Past the halfway point the entity is drawn at the destination.
    pub fn shows_target(&self) -> bool {
        self.progress >= 0.5
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortalState {
    pub last_portal: Option<GridPos>,
    pub anim: Option<TeleportAnim>,
}

impl PortalState {
    pub fn is_animating(&self) -> bool {
        self.anim.is_some()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PortalOutcome {
    Wrapped { from: GridPos, to: GridPos },
    Tunnelled { from: GridPos, to: GridPos },
    AnimationStarted { from: GridPos, to: GridPos },
    Arrived { to: GridPos },
}

pub fn trigger_radius(tile: f32) -> f32 {
    tile / 8.0
}

fn in_trigger_zone(maze: &Maze, cell: GridPos, x: f32, y: f32) -> bool {
    let (cx, cy) = maze.center_of(cell);
    let r = trigger_radius(maze.tile_size());
    (x - cx).abs() <= r && (y - cy).abs() <= r
}

/// Would `apply_portal` fire at this position?
pub fn is_armed(view: &LevelView, state: &PortalState, x: f32, y: f32) -> bool {
    let cell = view.maze.cell_of(x, y);
    view.maze.tile_at(cell).is_portal()
        && state.last_portal != Some(cell)
        && view.portals.find(cell).is_some()
        && in_trigger_zone(view.maze, cell, x, y)
}

/// Resolve the portal under `body`, if any. Call once per tick after movement.
pub fn apply_portal(body: &mut Body, maze: &Maze, portals: &PortalSet) -> Option<PortalOutcome> {
    if body.portal.is_animating() {
        return None;
    }
    let cell = maze.cell_of(body.x, body.y);
    if !maze.tile_at(cell).is_portal() {
        body.portal.last_portal = None;
        return None;
    }
    if body.portal.last_portal == Some(cell) {
        return None;
    }
    if !in_trigger_zone(maze, cell, body.x, body.y) {
        return None;
    }
    let Some(pair) = portals.find(cell).copied() else {
        trace!(row = cell.row, col = cell.col, "portal tile without a pair");
        return None;
    };
    let other = pair.other(cell)?;

    match pair.kind {
        PortalKind::Wrap => {
            move_to(body, maze, other);
            body.portal.last_portal = Some(other);
            trace!(?cell, ?other, "wrap portal");
            Some(PortalOutcome::Wrapped { from: cell, to: other })
        }
        PortalKind::BridgeTunnel => {
            let bridge = pair.midpoint();
            let dir = (bridge.col - cell.col).signum();
            let dest = GridPos::new(bridge.row, bridge.col + dir * 2);
            move_to(body, maze, dest);
            trace!(?cell, ?dest, "bridge tunnel");
            Some(PortalOutcome::Tunnelled { from: cell, to: dest })
        }
        PortalKind::Paired => {
            let (target_x, target_y) = maze.center_of(other);
            body.portal.anim = Some(TeleportAnim { progress: 0.0, from: cell, target: other, target_x, target_y });
            trace!(?cell, ?other, "teleport started");
            Some(PortalOutcome::AnimationStarted { from: cell, to: other })
        }
    }
}

/// Advance a running teleport by `dt`. Returns `Arrived` on the tick the
/// entity lands; the landing cell becomes the remembered portal.
pub fn advance_teleport(body: &mut Body, maze: &Maze, dt: f32, duration: f32) -> Option<PortalOutcome> {
    let anim = body.portal.anim.as_mut()?;
    anim.progress = if duration <= 0.0 { 1.0 } else { (anim.progress + dt / duration).min(1.0) };
    if anim.progress < 1.0 {
        return None;
    }
    let done = *anim;
    body.portal.anim = None;
    body.x = done.target_x;
    body.y = done.target_y;
    body.cell = done.target;
    body.layer = settle_layer(maze, body.layer, done.target);
    body.portal.last_portal = Some(done.target);
    Some(PortalOutcome::Arrived { to: done.target })
}

fn move_to(body: &mut Body, maze: &Maze, dest: GridPos) {
    let (x, y) = maze.center_of(dest);
    body.x = x;
    body.y = y;
    body.cell = dest;
    body.layer = settle_layer(maze, body.layer, dest);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Heading;
    use crate::domain::gate::GateSet;
    use crate::domain::physics::{integrate, tests::maze};
    use crate::domain::tile::Layer;

    fn body(m: &Maze, row: i32, col: i32) -> Body {
        Body::at_cell(m, GridPos::new(row, col), 20.0, 100.0)
    }

    #[test]
    fn classification() {
        let m = maze(&[
            "o.....o",
            "#o=o#o#",
            "#.....#",
        ]);
        let wrap = PortalPair::classify(&m, GridPos::new(0, 0), GridPos::new(0, 6));
        let tunnel = PortalPair::classify(&m, GridPos::new(1, 1), GridPos::new(1, 3));
        let paired = PortalPair::classify(&m, GridPos::new(1, 3), GridPos::new(1, 5));
        assert_eq!(wrap.kind, PortalKind::Wrap);
        assert_eq!(tunnel.kind, PortalKind::BridgeTunnel);
        assert_eq!(paired.kind, PortalKind::Paired);
        assert_eq!(tunnel.midpoint(), GridPos::new(1, 2));
    }

    #[test]
    fn wrap_lands_on_far_end_and_does_not_bounce() {
        let m = maze(&["o...o"]);
        let portals = PortalSet::new(vec![PortalPair::classify(&m, GridPos::new(0, 0), GridPos::new(0, 4))]);
        let mut b = body(&m, 0, 0);
        b.heading = Heading::LEFT;

        let out = apply_portal(&mut b, &m, &portals);
        assert_eq!(out, Some(PortalOutcome::Wrapped { from: GridPos::new(0, 0), to: GridPos::new(0, 4) }));
        assert_eq!((b.x, b.y), m.center_of(GridPos::new(0, 4)));
        // standing on the landing portal does nothing
        assert_eq!(apply_portal(&mut b, &m, &portals), None);
        // stepping off clears the memo
        b.x -= 32.0;
        assert_eq!(apply_portal(&mut b, &m, &portals), None);
        assert_eq!(b.portal.last_portal, None);
    }

    #[test]
    fn wrap_after_a_tunnel_lands_on_the_upper_plane() {
        let m = maze(&[
            "#######",
            "o.t...o",
            "#######",
        ]);
        let portals = PortalSet::new(vec![PortalPair::classify(&m, GridPos::new(1, 0), GridPos::new(1, 6))]);
        let gates = GateSet::default();
        let view = LevelView { maze: &m, gates: &gates, portals: &portals };

        // just out of the tunnel, still underneath
        let mut b = body(&m, 1, 1);
        b.layer = Layer::Lower;
        integrate(&view, &mut b, -40.0, 0.0, 4.0);
        let out = apply_portal(&mut b, &m, &portals);
        assert_eq!(out, Some(PortalOutcome::Wrapped { from: GridPos::new(1, 0), to: GridPos::new(1, 6) }));
        assert_eq!(b.layer, Layer::Upper);

        // and can walk off the far end
        let motion = integrate(&view, &mut b, -32.0, 0.0, 4.0);
        assert!(!motion.blocked_x);
        assert_eq!(b.cell, GridPos::new(1, 5));
    }

    #[test]
    fn glancing_pass_does_not_trigger() {
        let m = maze(&["o...o"]);
        let portals = PortalSet::new(vec![PortalPair::classify(&m, GridPos::new(0, 0), GridPos::new(0, 4))]);
        let mut b = body(&m, 0, 0);
        b.x += 6.0; // still on the tile, outside the 4px radius
        assert_eq!(apply_portal(&mut b, &m, &portals), None);
    }

    #[test]
    fn bridge_tunnel_skips_two_past_bridge() {
        let m = maze(&["..o=o.."]);
        let portals = PortalSet::new(vec![PortalPair::classify(&m, GridPos::new(0, 2), GridPos::new(0, 4))]);
        let mut b = body(&m, 0, 2);
        let out = apply_portal(&mut b, &m, &portals);
        assert_eq!(out, Some(PortalOutcome::Tunnelled { from: GridPos::new(0, 2), to: GridPos::new(0, 5) }));
        assert_eq!(b.portal.last_portal, None);

        // and back the other way
        let mut b = body(&m, 0, 4);
        apply_portal(&mut b, &m, &portals);
        assert_eq!(b.cell, GridPos::new(0, 1));
    }

    #[test]
    fn missing_pair_is_noop() {
        let m = maze(&["..o.."]);
        let mut b = body(&m, 0, 2);
        let before = (b.x, b.y);
        assert_eq!(apply_portal(&mut b, &m, &PortalSet::default()), None);
        assert_eq!((b.x, b.y), before);
    }

    #[test]
    fn paired_portal_round_trip() {
        let m = maze(&[
            "#######",
            "#o...o#",
            "#######",
        ]);
        let a = GridPos::new(1, 1);
        let b_end = GridPos::new(1, 5);
        let portals = PortalSet::new(vec![PortalPair::classify(&m, a, b_end)]);
        let gates = GateSet::default();
        let view = LevelView { maze: &m, gates: &gates, portals: &portals };

        // Walk from (1,2) left onto A
        let mut b = body(&m, 1, 2);
        let origin = (b.x, b.y);
        integrate(&view, &mut b, -40.0, 0.0, 4.0);
        assert_eq!(apply_portal(&mut b, &m, &portals), Some(PortalOutcome::AnimationStarted { from: a, to: b_end }));

        // Frozen until the animation completes
        let mut arrived = None;
        for _ in 0..20 {
            if let Some(o) = advance_teleport(&mut b, &m, 0.05, 0.3) {
                arrived = Some(o);
                break;
            }
        }
        assert_eq!(arrived, Some(PortalOutcome::Arrived { to: b_end }));
        assert_eq!(b.portal.last_portal, Some(b_end));
        // No second trigger while standing on the exit tile
        assert_eq!(apply_portal(&mut b, &m, &portals), None);

        // Leave the exit tile, then come straight back in
        integrate(&view, &mut b, -32.0, 0.0, 4.0);
        assert_eq!(apply_portal(&mut b, &m, &portals), None);
        assert_eq!(b.portal.last_portal, None);
        integrate(&view, &mut b, 40.0, 0.0, 4.0);
        assert!(matches!(apply_portal(&mut b, &m, &portals), Some(PortalOutcome::AnimationStarted { .. })));
        while advance_teleport(&mut b, &m, 0.05, 0.3).is_none() {}

        // Back at A: within one tile of where we started
        assert!((b.x - origin.0).abs() <= 32.0 && (b.y - origin.1).abs() <= 32.0);
        assert_eq!(b.cell, a);
    }

    #[test]
    fn teleport_scale_curve() {
        let anim = TeleportAnim { progress: 0.25, from: GridPos::new(0, 0), target: GridPos::new(0, 1), target_x: 0.0, target_y: 0.0 };
        assert!((anim.scale() - 0.5).abs() < 1e-6);
        assert!(!anim.shows_target());
    }
}
