/// Player movement state machine.
///
/// Per tick:
///   0. A running teleport freezes the player until it lands.
///   1. Non-idle input replaces `desired`; releasing keys keeps it.
///   2. Snap the idle axis to the cell center when close.
///   3. Near the center, turn to `desired` if a probe 0.4 tiles out is clear.
///   4. From idle, start moving the same way from wherever the player is.
///   5. Clamp the move against bridge/gate orientation here and at the target.
///   6. Integrate; a blocked travel axis drops the player to `Idle`.
///   7. Resolve portals.

use super::entity::{FrameInput, Heading, Player};
use super::grid::GridPos;
use super::physics::{clamp_move, integrate, probe_clear, LevelView};
use super::portal::{advance_teleport, apply_portal, PortalOutcome};
use super::tile::Axis;

pub const TURN_SNAP: f32 = 0.3;
pub const TURN_PROBE: f32 = 0.4;

/// Movement tuning shared by the player and unicorns.
#[derive(Clone, Copy, Debug)]
pub struct Stepping {
    pub max_substep: f32,
    pub teleport_seconds: f32,
}

impl Default for Stepping {
    fn default() -> Self {
        Stepping { max_substep: 4.0, teleport_seconds: 0.3 }
    }
}

/// What happened to an agent this tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    pub entered: Vec<GridPos>,
    pub portal: Option<PortalOutcome>,
}

pub fn update_player(view: &LevelView, player: &mut Player, input: FrameInput, dt: f32, stepping: &Stepping) -> StepReport {
    let maze = view.maze;
    let tile = maze.tile_size();

    if player.body.portal.is_animating() {
        let portal = advance_teleport(&mut player.body, maze, dt, stepping.teleport_seconds);
        return StepReport { entered: vec![], portal };
    }

    if !input.movement.is_idle() {
        player.desired = input.movement;
    }

    // ── Snap ──
    let snap = tile * TURN_SNAP;
    let cell = maze.cell_of(player.body.x, player.body.y);
    let (cx, cy) = maze.center_of(cell);
    snap_idle_axes(player, cx, cy, snap);

    // ── Turn at center ──
    let body = &player.body;
    let near_center = (body.x - cx).abs() < snap && (body.y - cy).abs() < snap;
    if near_center
        && !player.desired.is_idle()
        && player.desired != body.heading
        && probe_clear(view, body, cx, cy, player.desired, tile * TURN_PROBE)
    {
        player.body.heading = player.desired;
        snap_idle_axes(player, cx, cy, snap);
    }

    // ── Start from idle ──
    let body = &player.body;
    if body.heading.is_idle()
        && !player.desired.is_idle()
        && probe_clear(view, body, body.x, body.y, player.desired, tile * TURN_PROBE)
    {
        player.body.heading = player.desired;
    }

    // ── Clamp ──
    let heading = player.body.heading;
    let dist = player.body.speed * dt;
    let (mx, my) = clamp_move(view, &player.body, heading.dx() * dist, heading.dy() * dist);
    if mx == 0.0 && my == 0.0 {
        player.body.heading = Heading::Idle;
        let portal = apply_portal(&mut player.body, maze, view.portals);
        return StepReport { entered: vec![], portal };
    }

    // ── Integrate ──
    let motion = integrate(view, &mut player.body, mx, my, stepping.max_substep);
    let stopped = match heading.axis() {
        Some(Axis::Horizontal) => motion.blocked_x,
        Some(Axis::Vertical) => motion.blocked_y,
        None => false,
    };
    if stopped {
        player.body.heading = Heading::Idle;
    }

    let portal = apply_portal(&mut player.body, maze, view.portals);
    StepReport { entered: motion.entered, portal }
}

fn snap_idle_axes(player: &mut Player, cx: f32, cy: f32, snap: f32) {
    let body = &mut player.body;
    if body.heading.axis() != Some(Axis::Horizontal) && (body.x - cx).abs() < snap {
        body.x = cx;
    }
    if body.heading.axis() != Some(Axis::Vertical) && (body.y - cy).abs() < snap {
        body.y = cy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gate::GateSet;
    use crate::domain::physics::tests::maze;
    use crate::domain::portal::PortalSet;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn no_input_no_motion() {
        let m = maze(&["#####", "#...#", "#####"]);
        let (g, p) = (GateSet::default(), PortalSet::default());
        let view = LevelView { maze: &m, gates: &g, portals: &p };
        let mut player = Player::new(&m, GridPos::new(1, 1), 180.0);
        let before = (player.body.x, player.body.y);
        update_player(&view, &mut player, FrameInput::default(), DT, &Stepping::default());
        assert_eq!((player.body.x, player.body.y), before);
        assert!(player.body.heading.is_idle());
    }

    #[test]
    fn queued_turn_waits_for_an_opening() {
        let m = maze(&[
            "#####",
            "#...#",
            "###.#",
            "###.#",
            "#####",
        ]);
        let (g, p) = (GateSet::default(), PortalSet::default());
        let view = LevelView { maze: &m, gates: &g, portals: &p };
        let mut player = Player::new(&m, GridPos::new(1, 1), 180.0);

        update_player(&view, &mut player, FrameInput { movement: Heading::RIGHT }, DT, &Stepping::default());
        assert_eq!(player.body.heading, Heading::RIGHT);

        for _ in 0..200 {
            update_player(&view, &mut player, FrameInput { movement: Heading::DOWN }, DT, &Stepping::default());
            let (dx, dy) = player.body.heading.components();
            assert!(dx == 0 || dy == 0);
            // the down turn is never taken before column 3
            if player.body.y > 48.0 {
                assert_eq!(m.cell_of(player.body.x, 48.0).col, 3);
            }
        }
        assert_eq!(player.body.cell, GridPos::new(3, 3));
        assert!(player.body.heading.is_idle());
        // keys released: desired survives
        assert_eq!(player.desired, Heading::DOWN);
    }

    #[test]
    fn player_cannot_leave_bridge_sideways() {
        let m = maze(&[
            "#.#",
            "t=t",
            "#.#",
        ]);
        let (g, p) = (GateSet::default(), PortalSet::default());
        let view = LevelView { maze: &m, gates: &g, portals: &p };
        let mut player = Player::new(&m, GridPos::new(1, 1), 180.0);

        update_player(&view, &mut player, FrameInput { movement: Heading::LEFT }, DT, &Stepping::default());
        assert_eq!((player.body.x, player.body.y), (48.0, 48.0));
        assert!(player.body.heading.is_idle());

        update_player(&view, &mut player, FrameInput { movement: Heading::DOWN }, DT, &Stepping::default());
        assert_eq!(player.body.heading, Heading::DOWN);
        assert!(player.body.y > 48.0);
        assert_eq!(player.body.x, 48.0);
    }

    #[test]
    fn oversized_dt_never_enters_a_wall() {
        let m = maze(&["#######", "#.....#", "#######"]);
        let (g, p) = (GateSet::default(), PortalSet::default());
        let view = LevelView { maze: &m, gates: &g, portals: &p };
        let mut player = Player::new(&m, GridPos::new(1, 1), 180.0);
        for _ in 0..10 {
            update_player(&view, &mut player, FrameInput { movement: Heading::RIGHT }, 0.1, &Stepping::default());
            assert!(player.body.x + player.body.w / 2.0 <= 192.0);
        }
        assert_eq!(player.body.cell, GridPos::new(1, 5));
    }
}
