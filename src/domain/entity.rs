/// Entities: Player, Unicorn, Gem, and the shared moving Body.
/// Movement state is an explicit `Heading`, never a loose (dx, dy) pair.

use super::grid::{GridPos, Maze};
use super::portal::PortalState;
use super::profile::UnicornProfile;
use super::tile::{Axis, Layer};

/// Box sizes as fractions of the tile size.
pub const PLAYER_SIZE: f32 = 0.625;
pub const UNICORN_SIZE: f32 = 0.75;
pub const GEM_SIZE: f32 = 0.5625;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Sign {
    Neg,
    Pos,
}

impl Sign {
    pub fn value(self) -> i32 {
        match self {
            Sign::Neg => -1,
            Sign::Pos => 1,
        }
    }

    pub fn flipped(self) -> Sign {
        match self {
            Sign::Neg => Sign::Pos,
            Sign::Pos => Sign::Neg,
        }
    }

    fn of(v: f32) -> Option<Sign> {
        if v > 0.0 {
            Some(Sign::Pos)
        } else if v < 0.0 {
            Some(Sign::Neg)
        } else {
            None
        }
    }
}

/// Movement state: idle, or moving along exactly one axis.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Heading {
    #[default]
    Idle,
    Moving { axis: Axis, sign: Sign },
}

impl Heading {
    pub const RIGHT: Heading = Heading::Moving { axis: Axis::Horizontal, sign: Sign::Pos };
    pub const LEFT: Heading = Heading::Moving { axis: Axis::Horizontal, sign: Sign::Neg };
    pub const DOWN: Heading = Heading::Moving { axis: Axis::Vertical, sign: Sign::Pos };
    pub const UP: Heading = Heading::Moving { axis: Axis::Vertical, sign: Sign::Neg };

    /// Scan order used wherever "the first open direction" matters.
    pub const CARDINALS: [Heading; 4] = [Heading::RIGHT, Heading::LEFT, Heading::DOWN, Heading::UP];

    /// Build from a raw axis pair. Horizontal wins if both are set.
    pub fn from_components(dx: i32, dy: i32) -> Heading {
        if dx != 0 {
            Heading::Moving { axis: Axis::Horizontal, sign: if dx > 0 { Sign::Pos } else { Sign::Neg } }
        } else if dy != 0 {
            Heading::Moving { axis: Axis::Vertical, sign: if dy > 0 { Sign::Pos } else { Sign::Neg } }
        } else {
            Heading::Idle
        }
    }

    /// Heading of a move along one axis, by the sign of `delta`.
    pub fn along(axis: Axis, delta: f32) -> Heading {
        match Sign::of(delta) {
            Some(sign) => Heading::Moving { axis, sign },
            None => Heading::Idle,
        }
    }

    pub fn components(self) -> (i32, i32) {
        match self {
            Heading::Idle => (0, 0),
            Heading::Moving { axis: Axis::Horizontal, sign } => (sign.value(), 0),
            Heading::Moving { axis: Axis::Vertical, sign } => (0, sign.value()),
        }
    }

    pub fn dx(self) -> f32 {
        self.components().0 as f32
    }

    pub fn dy(self) -> f32 {
        self.components().1 as f32
    }

    pub fn axis(self) -> Option<Axis> {
        match self {
            Heading::Idle => None,
            Heading::Moving { axis, .. } => Some(axis),
        }
    }

    pub fn is_idle(self) -> bool {
        self == Heading::Idle
    }

    pub fn reversed(self) -> Heading {
        match self {
            Heading::Idle => Heading::Idle,
            Heading::Moving { axis, sign } => Heading::Moving { axis, sign: sign.flipped() },
        }
    }

    /// The neighbouring cell in this heading.
    pub fn step(self, pos: GridPos) -> GridPos {
        let (dx, dy) = self.components();
        pos.offset(dy, dx)
    }
}

/// Per-tick input, already normalized by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub movement: Heading,
}

impl FrameInput {
    pub fn from_axes(dx: i32, dy: i32) -> Self {
        FrameInput { movement: Heading::from_components(dx.signum(), dy.signum()) }
    }
}

/// Continuous-position box shared by every moving agent.
#[derive(Clone, Debug)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub heading: Heading,
    pub speed: f32,
    pub layer: Layer,
    pub cell: GridPos, // last center cell, for cell-entered edges
    pub portal: PortalState,
}

impl Body {
    pub fn at_cell(maze: &Maze, pos: GridPos, size: f32, speed: f32) -> Self {
        let (x, y) = maze.center_of(pos);
        Body {
            x, y,
            w: size,
            h: size,
            heading: Heading::Idle,
            speed,
            layer: Layer::Upper,
            cell: pos,
            portal: PortalState::default(),
        }
    }

    /// Put the body back at a cell center with no motion or transient state.
    pub fn place(&mut self, maze: &Maze, pos: GridPos) {
        let (x, y) = maze.center_of(pos);
        self.x = x;
        self.y = y;
        self.heading = Heading::Idle;
        self.layer = Layer::Upper;
        self.cell = pos;
        self.portal = PortalState::default();
    }

    pub fn overlaps(&self, other_x: f32, other_y: f32, other_w: f32, other_h: f32) -> bool {
        rectangles_overlap(self.x, self.y, self.w, self.h, other_x, other_y, other_w, other_h)
    }

    pub fn overlaps_body(&self, other: &Body) -> bool {
        self.overlaps(other.x, other.y, other.w, other.h)
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}

/// Center-based box overlap test.
#[allow(clippy::too_many_arguments)]
pub fn rectangles_overlap(ax: f32, ay: f32, aw: f32, ah: f32, bx: f32, by: f32, bw: f32, bh: f32) -> bool {
    (ax - bx).abs() * 2.0 < aw + bw && (ay - by).abs() * 2.0 < ah + bh
}

#[derive(Clone, Debug)]
pub struct Player {
    pub body: Body,
    pub desired: Heading,
}

impl Player {
    pub fn new(maze: &Maze, spawn: GridPos, speed: f32) -> Self {
        Player {
            body: Body::at_cell(maze, spawn, maze.tile_size() * PLAYER_SIZE, speed),
            desired: Heading::Idle,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Unicorn {
    pub id: usize,
    pub body: Body,
    pub profile: UnicornProfile,
    pub spawn: GridPos,
    pub spawn_heading: Heading,
    pub random_burst: u32,         // intersections left to decide at random
    pub tagged: bool,              // tagged during the current power window
    pub respawn_pause: f32,        // seconds frozen after being tagged
    pub last_decision: Option<GridPos>,
    pub stuck_ticks: u32,          // consecutive ticks without moving
    pub deferred: bool,            // already hesitated at this intersection
}

impl Unicorn {
    pub fn new(id: usize, maze: &Maze, spawn: GridPos, heading: Heading, profile: UnicornProfile, speed: f32) -> Self {
        let mut body = Body::at_cell(maze, spawn, maze.tile_size() * UNICORN_SIZE, speed);
        body.heading = heading;
        Unicorn {
            id,
            body,
            profile,
            spawn,
            spawn_heading: heading,
            random_burst: 0,
            tagged: false,
            respawn_pause: 0.0,
            last_decision: None,
            stuck_ticks: 0,
            deferred: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.respawn_pause > 0.0
    }

    /// Back to the spawn cell with every countdown cleared.
    pub fn reset(&mut self, maze: &Maze) {
        self.body.place(maze, self.spawn);
        self.body.heading = self.spawn_heading;
        self.random_burst = 0;
        self.tagged = false;
        self.respawn_pause = 0.0;
        self.last_decision = None;
        self.stuck_ticks = 0;
        self.deferred = false;
    }
}

/// The power item.
#[derive(Clone, Debug)]
pub struct Gem {
    pub cell: GridPos,
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl Gem {
    pub fn at(maze: &Maze, cell: GridPos) -> Self {
        let (x, y) = maze.center_of(cell);
        Gem { cell, x, y, size: maze.tile_size() * GEM_SIZE }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_are_never_diagonal() {
        for dx in -1..=1 {
            for dy in -1..=1 {
                let (x, y) = Heading::from_components(dx, dy).components();
                assert!(x == 0 || y == 0);
            }
        }
        // horizontal wins when both axes are pressed
        assert_eq!(Heading::from_components(1, -1), Heading::RIGHT);
    }

    #[test]
    fn reverse_and_step() {
        assert_eq!(Heading::LEFT.reversed(), Heading::RIGHT);
        assert_eq!(Heading::UP.reversed(), Heading::DOWN);
        assert_eq!(Heading::Idle.reversed(), Heading::Idle);
        assert_eq!(Heading::UP.step(GridPos::new(3, 3)), GridPos::new(2, 3));
        assert_eq!(Heading::RIGHT.step(GridPos::new(3, 3)), GridPos::new(3, 4));
    }

    #[test]
    fn along_uses_delta_sign() {
        assert_eq!(Heading::along(Axis::Vertical, -0.5), Heading::UP);
        assert_eq!(Heading::along(Axis::Horizontal, 2.0), Heading::RIGHT);
        assert_eq!(Heading::along(Axis::Horizontal, 0.0), Heading::Idle);
    }

    #[test]
    fn frame_input_normalizes_magnitude() {
        assert_eq!(FrameInput::from_axes(-5, 0).movement, Heading::LEFT);
        assert_eq!(FrameInput::from_axes(0, 0).movement, Heading::Idle);
    }

    #[test]
    fn overlap_is_center_based() {
        assert!(rectangles_overlap(0.0, 0.0, 20.0, 20.0, 21.0, 0.0, 24.0, 24.0));
        assert!(!rectangles_overlap(0.0, 0.0, 20.0, 20.0, 22.0, 0.0, 24.0, 24.0));
        assert!(!rectangles_overlap(0.0, 0.0, 20.0, 20.0, 0.0, 30.0, 20.0, 20.0));
    }
}
