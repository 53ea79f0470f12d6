/// Events emitted during a simulation step.
/// The presentation layer consumes these for popups, HUD and logging.

use crate::domain::gate::GateMode;
use crate::domain::grid::GridPos;
use crate::domain::portal::PortalOutcome;

/// Who went through a portal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Traveller {
    Player,
    Unicorn(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    DotCollected { cell: GridPos },
    PowerItemPlaced { cell: GridPos },
    PowerItemCollected { cell: GridPos },
    InvincibilityEnded,
    UnicornTagged { id: usize, points: u32 },
    PlayerDied { lives_left: u32 },
    GameOver,
    ExtraLife { lives: u32 },
    LevelCleared { index: usize },
    GateArmed { pos: GridPos },
    GateToggled { pos: GridPos, mode: GateMode },
    Teleported { who: Traveller, outcome: PortalOutcome },
    /// A unicorn was caught turning inside a bridge or tunnel and was
    /// corrected in place.
    RuleViolation { id: usize, cell: GridPos },
}
