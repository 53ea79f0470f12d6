/// Keyboard state for the terminal host.
///
/// Movement is level-triggered: a direction counts while its key is held,
/// and when several are held the most recently pressed one wins, so the
/// simulation always receives a single axis. Meta keys (pause, resume,
/// quit) are edge-triggered.
///
/// Key releases come from crossterm's enhanced keyboard protocol when the
/// renderer managed to enable it; otherwise a key counts as released once
/// its auto-repeat stops.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use unicorn_run::domain::entity::Heading;

/// Silence after which a key without Release reporting is treated as up.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
pub const KEYS_PAUSE: &[KeyCode] = &[KeyCode::Char('p'), KeyCode::Char('P')];
pub const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
pub const KEYS_QUIT: &[KeyCode] = &[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('Q')];

pub struct InputState {
    /// Last press or repeat per key.
    last_active: HashMap<KeyCode, Instant>,
    /// When each currently held key was first pressed.
    pressed_at: HashMap<KeyCode, Instant>,
    /// Keys that went from released to held during the last drain.
    fresh_presses: Vec<KeyCode>,
    raw_events: Vec<KeyEvent>,
    /// Set when the terminal reports releases reliably.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            pressed_at: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Read every pending terminal event. Once per frame, before `step`.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.record(key, Instant::now());
            }
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
        let live = &self.last_active;
        self.pressed_at.retain(|k, _| live.contains_key(k));
    }

    fn record(&mut self, key: KeyEvent, now: Instant) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
                self.pressed_at.remove(&key.code);
            }
            KeyEventKind::Release => {}
            _ => {
                if !self.is_held_at(key.code, now) {
                    self.fresh_presses.push(key.code);
                    self.pressed_at.insert(key.code, now);
                }
                self.last_active.insert(key.code, now);
            }
        }
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.is_held_at(code, Instant::now())
    }

    /// Edge trigger: was any of these keys pressed during the last drain?
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.fresh_presses.contains(c))
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    /// The held direction pressed most recently, or `Idle`.
    pub fn movement(&self) -> Heading {
        let groups = [
            (KEYS_LEFT, Heading::LEFT),
            (KEYS_RIGHT, Heading::RIGHT),
            (KEYS_UP, Heading::UP),
            (KEYS_DOWN, Heading::DOWN),
        ];
        groups.iter()
            .filter_map(|(keys, heading)| {
                keys.iter()
                    .filter(|k| self.is_held(**k))
                    .filter_map(|k| self.pressed_at.get(k))
                    .max()
                    .map(|t| (*t, *heading))
            })
            .max_by_key(|(t, _)| *t)
            .map_or(Heading::Idle, |(_, h)| h)
    }


    fn is_held_at(&self, code: KeyCode, now: Instant) -> bool {
        self.last_active.get(&code)
            .map(|t| now.duration_since(*t) < HOLD_TIMEOUT)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn latest_direction_wins() {
        let mut kb = InputState::new();
        let t0 = Instant::now();
        kb.record(press(KeyCode::Left), t0);
        kb.record(press(KeyCode::Up), t0 + Duration::from_millis(10));
        assert_eq!(kb.movement(), Heading::UP);
        assert!(kb.any_pressed(&[KeyCode::Left]));
    }

    #[test]
    fn repeats_do_not_count_as_fresh_presses() {
        let mut kb = InputState::new();
        let t0 = Instant::now();
        kb.record(press(KeyCode::Char('p')), t0);
        kb.fresh_presses.clear();
        kb.record(press(KeyCode::Char('p')), t0 + Duration::from_millis(20));
        assert!(!kb.any_pressed(KEYS_PAUSE));
    }

    #[test]
    fn nothing_held_is_idle() {
        assert!(InputState::new().movement().is_idle());
    }
}
