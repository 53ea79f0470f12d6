/// Directional gates ("switches").
///
/// A gate lets one axis through its tile. Entering the tile arms a
/// delayed toggle; the flip fires after the delay whether or not anyone
/// is still standing there. Re-entering while armed changes nothing.

use std::collections::HashMap;

use super::grid::GridPos;
use super::tile::Axis;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GateMode {
    VerticalOpen,   // blocks horizontal crossing
    HorizontalOpen, // blocks vertical crossing
}

impl GateMode {
    pub fn open_axis(self) -> Axis {
        match self {
            GateMode::VerticalOpen => Axis::Vertical,
            GateMode::HorizontalOpen => Axis::Horizontal,
        }
    }

    pub fn forbids(self, axis: Axis) -> bool {
        self.open_axis() != axis
    }

    pub fn flipped(self) -> GateMode {
        match self {
            GateMode::VerticalOpen => GateMode::HorizontalOpen,
            GateMode::HorizontalOpen => GateMode::VerticalOpen,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Gate {
    pub pos: GridPos,
    pub mode: GateMode,
    pub pending: bool,
    pub timer: f32, // seconds until the pending flip
}

impl Gate {
    pub fn new(pos: GridPos, mode: GateMode) -> Self {
        Gate { pos, mode, pending: false, timer: 0.0 }
    }
}

/// All gates of a level, with O(1) lookup by cell.
#[derive(Clone, Debug, Default)]
pub struct GateSet {
    gates: Vec<Gate>,
    index: HashMap<GridPos, usize>,
    delay: f32,
}

impl GateSet {
    pub fn new(gates: Vec<Gate>, delay: f32) -> Self {
        let index = gates.iter().enumerate().map(|(i, g)| (g.pos, i)).collect();
        GateSet { gates, index, delay }
    }

    pub fn get(&self, pos: GridPos) -> Option<&Gate> {
        self.index.get(&pos).map(|&i| &self.gates[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gate> {
        self.gates.iter()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Does the gate at `pos` currently stop motion along `axis`?
    /// A cell with no registered gate stops nothing.
    pub fn forbids(&self, pos: GridPos, axis: Axis) -> bool {
        self.get(pos).is_some_and(|g| g.mode.forbids(axis))
    }

    /// Arm the toggle for the gate at `pos`. Returns true only when a new
    /// toggle was armed.
    pub fn arm(&mut self, pos: GridPos) -> bool {
        let Some(&i) = self.index.get(&pos) else { return false };
        let gate = &mut self.gates[i];
        if gate.pending {
            return false;
        }
        gate.pending = true;
        gate.timer = self.delay;
        true
    }

    /// Count pending timers down. Returns the gates that flipped this tick.
    pub fn update(&mut self, dt: f32) -> Vec<(GridPos, GateMode)> {
        let mut flipped = vec![];
        for gate in self.gates.iter_mut().filter(|g| g.pending) {
            gate.timer = (gate.timer - dt).max(0.0);
            if gate.timer <= 0.0 {
                gate.pending = false;
                gate.mode = gate.mode.flipped();
                flipped.push((gate.pos, gate.mode));
            }
        }
        flipped
    }
}
