/// Gamepad state for the terminal host, fed by gilrs events.
///
/// `[gamepad]` in config.toml overrides the action buttons:
///   D-pad / Left Stick    →  Movement (latest direction wins)
///   Start / A             →  Resume / next level / restart
///   Select                →  Pause
///   Mode (guide)          →  Quit

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use unicorn_run::config::GamepadConfig;
use unicorn_run::domain::entity::Heading;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

/// Face, shoulder and menu buttons we can bind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A, // south
    B, // east
    X, // west
    Y, // north
    L1,
    R1,
    Start,
    Select,
    Mode,
}

const BTN_COUNT: usize = 9;

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH"  => Some(Btn::A),
            "B" | "EAST"   => Some(Btn::B),
            "X" | "WEST"   => Some(Btn::X),
            "Y" | "NORTH"  => Some(Btn::Y),
            "L1" | "LB" => Some(Btn::L1),
            "R1" | "RB" => Some(Btn::R1),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            "MODE" | "GUIDE" | "HOME" => Some(Btn::Mode),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South => Some(Btn::A),
            Button::East  => Some(Btn::B),
            Button::West  => Some(Btn::X),
            Button::North => Some(Btn::Y),
            Button::LeftTrigger  => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::Start  => Some(Btn::Start),
            Button::Select => Some(Btn::Select),
            Button::Mode   => Some(Btn::Mode),
            _ => None,
        }
    }
}

/// One movement direction, fed by both the D-pad and the stick.
#[derive(Clone, Copy, Debug, Default)]
struct DirState {
    dpad: bool,
    stick: bool,
    /// Press order; the highest held one wins.
    since: u64,
}

impl DirState {
    fn held(&self) -> bool {
        self.dpad || self.stick
    }
}

/// Buttons bound to each host action.
struct ActionMap {
    confirm: Vec<Btn>,
    pause: Vec<Btn>,
    quit: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            confirm: vec![Btn::Start, Btn::A],
            pause:   vec![Btn::Select],
            quit:    vec![Btn::Mode],
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    /// Buttons pressed since the last `update`.
    just_pressed: [bool; BTN_COUNT],
    /// Left, right, up, down.
    dirs: [DirState; 4],
    presses: u64,
    stick_x: f32,
    stick_y: f32,

    action_map: ActionMap,

    /// Shown in the footer.
    pub connected: bool,
}

const DIR_HEADINGS: [Heading; 4] = [Heading::LEFT, Heading::RIGHT, Heading::UP, Heading::DOWN];

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(_) => (None, false),
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            just_pressed: [false; BTN_COUNT],
            dirs: [DirState::default(); 4],
            presses: 0,
            stick_x: 0.0,
            stick_y: 0.0,
            action_map: ActionMap::default(),
            connected,
        }
    }

    /// Load button mapping from config. Empty or unknown lists keep the defaults.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        fn parse_list(names: &[String]) -> Vec<Btn> {
            names.iter().filter_map(|s| Btn::from_name(s)).collect()
        }
        let map = &mut self.action_map;
        for (target, names) in [(&mut map.confirm, &cfg.confirm), (&mut map.pause, &cfg.pause), (&mut map.quit, &cfg.quit)] {
            let parsed = parse_list(names);
            if !parsed.is_empty() {
                *target = parsed;
            }
        }
    }

    pub fn update(&mut self) {
        self.just_pressed = [false; BTN_COUNT];

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let gilrs = match &mut self.gilrs {
            Some(g) => g,
            None => return,
        };

        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, false);
                }
                EventType::AxisChanged(axis, value, _) => {
                    self.connected = true;
                    match axis {
                        Axis::LeftStickX => self.stick_x = value,
                        Axis::LeftStickY => self.stick_y = value,
                        _ => {}
                    }
                }
                EventType::Connected => { self.connected = true; }
                EventType::Disconnected => {
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }

        let (x, y) = (self.stick_x, self.stick_y);
        self.set_stick(0, x < -STICK_DEADZONE);
        self.set_stick(1, x > STICK_DEADZONE);
        self.set_stick(2, y > STICK_DEADZONE);
        self.set_stick(3, y < -STICK_DEADZONE);
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, gilrs_btn: Button, held: bool) {
        let dir = match gilrs_btn {
            Button::DPadLeft  => Some(0),
            Button::DPadRight => Some(1),
            Button::DPadUp    => Some(2),
            Button::DPadDown  => Some(3),
            _ => None,
        };
        if let Some(i) = dir {
            self.set_dpad(i, held);
            return;
        }
        if let Some(btn) = Btn::from_gilrs(gilrs_btn) {
            if held {
                self.just_pressed[btn as usize] = true;
            }
        }
    }

    fn set_dpad(&mut self, i: usize, held: bool) {
        let was = self.dirs[i].held();
        self.dirs[i].dpad = held;
        self.note_press(i, was);
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn set_stick(&mut self, i: usize, held: bool) {
        let was = self.dirs[i].held();
        self.dirs[i].stick = held;
        self.note_press(i, was);
    }

    fn note_press(&mut self, i: usize, was_held: bool) {
        if self.dirs[i].held() && !was_held {
            self.presses += 1;
            self.dirs[i].since = self.presses;
        }
    }

    // ── Actions ──

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.just_pressed[b as usize])
    }

    pub fn confirm_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.confirm)
    }
    pub fn pause_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.pause)
    }
    pub fn quit_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.quit)
    }

    /// The held direction pressed most recently, or `Idle`.
    pub fn movement(&self) -> Heading {
        self.dirs.iter()
            .zip(DIR_HEADINGS)
            .filter(|(d, _)| d.held())
            .max_by_key(|(d, _)| d.since)
            .map_or(Heading::Idle, |(_, h)| h)
    }

    fn release_all(&mut self) {
        self.just_pressed = [false; BTN_COUNT];
        self.dirs = [DirState::default(); 4];
        self.stick_x = 0.0;
        self.stick_y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_held_direction_wins() {
        let mut gp = GamepadState::new();
        gp.set_dpad(0, true);
        gp.set_dpad(3, true);
        assert_eq!(gp.movement(), Heading::DOWN);
        gp.set_dpad(3, false);
        assert_eq!(gp.movement(), Heading::LEFT);
        gp.release_all();
        assert!(gp.movement().is_idle());
    }

    #[test]
    fn presses_are_dropped_on_release_all() {
        let mut gp = GamepadState::new();
        gp.just_pressed[Btn::Select as usize] = true;
        assert!(gp.pause_pressed());
        assert!(!gp.confirm_pressed());
        gp.release_all();
        assert!(!gp.pause_pressed());
    }

    #[test]
    fn button_names_from_config() {
        let mut gp = GamepadState::new();
        gp.load_button_config(&GamepadConfig {
            confirm: vec!["south".into()],
            pause: vec!["nonsense".into()],
            quit: vec!["Guide".into(), "Y".into()],
        });
        assert_eq!(gp.action_map.confirm, vec![Btn::A]);
        assert_eq!(gp.action_map.pause, vec![Btn::Select]);
        assert_eq!(gp.action_map.quit, vec![Btn::Mode, Btn::Y]);
    }
}
