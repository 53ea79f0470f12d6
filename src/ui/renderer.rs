/// Presentation layer: double-buffered, diff-based terminal renderer.
///
///   1. Compose the next frame into `front` (one `Cell` per terminal column)
///   2. Compare with `back` (previous frame)
///   3. Queue terminal commands only for changed cells, flush once
///   4. Swap front/back
///
/// Each maze tile is two terminal columns wide. Agents are drawn at the
/// cell under their centre; the simulation itself stays in pixels.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use unicorn_run::domain::gate::GateMode;
use unicorn_run::domain::grid::GridPos;
use unicorn_run::domain::particle::ParticleKind;
use unicorn_run::domain::tile::{Axis, Layer, Tile};
use unicorn_run::sim::world::{Phase, SimulationState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BASE_BG: Color = Color::Rgb { r: 18, g: 14, b: 32 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Differs from every real cell, so the next flush repaints everything.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = if bg == Color::Reset { Self::BASE_BG } else { bg };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            *self = FrameBuffer::new(w, h);
        }
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Palette ──

const CELL_W: usize = 2;
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

const HUD_BG: Color = Color::Rgb { r: 40, g: 20, b: 70 };
const WALL_BG: Color = Color::Rgb { r: 70, g: 50, b: 140 };
const BRIDGE_FG: Color = Color::Rgb { r: 200, g: 160, b: 90 };
const TUNNEL_BG: Color = Color::Rgb { r: 30, g: 24, b: 50 };
const PORTAL_FG: Color = Color::Rgb { r: 80, g: 220, b: 255 };
const GATE_FG: Color = Color::Rgb { r: 255, g: 170, b: 60 };
const DOT_FG: Color = Color::Rgb { r: 255, g: 220, b: 240 };
const GEM_FG: Color = Color::Rgb { r: 120, g: 255, b: 200 };
const PLAYER_FG: Color = Color::Rgb { r: 255, g: 240, b: 80 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 120, b: 220 };

/// Unicorn body colours, cycled by id.
const UNICORN_FG: [Color; 4] = [
    Color::Rgb { r: 255, g: 110, b: 200 },
    Color::Rgb { r: 180, g: 130, b: 255 },
    Color::Rgb { r: 255, g: 150, b: 110 },
    Color::Rgb { r: 130, g: 200, b: 255 },
];

/// Hue in degrees to a saturated RGB colour, dimmed by `fade`.
fn hue_color(hue: f32, fade: f32) -> Color {
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let k = 255.0 * fade.clamp(0.2, 1.0);
    Color::Rgb { r: (r * k) as u8, g: (g * k) as u8, b: (b * k) as u8 }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
    enhanced_keys: bool,
    /// A gamepad is talking to us.
    pub gamepad: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
            enhanced_keys: false,
            gamepad: false,
        }
    }

    /// Enter raw mode and the alternate screen. Returns whether the
    /// terminal will report key releases.
    pub fn init(&mut self) -> io::Result<bool> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;
        self.enhanced_keys = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if self.enhanced_keys {
            execute!(
                self.writer,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        self.fit_terminal();
        Ok(self.enhanced_keys)
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.enhanced_keys {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
        }
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    /// Returns true when the terminal size changed.
    fn fit_terminal(&mut self) -> bool {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        let (tw, th) = (tw as usize, th as usize);
        if tw == self.term_w && th == self.term_h {
            return false;
        }
        self.term_w = tw;
        self.term_h = th;
        self.front.resize(tw, th);
        self.back.resize(tw, th);
        self.back.cells.fill(Cell::INVALID);
        true
    }

    pub fn render(&mut self, world: &SimulationState) -> io::Result<()> {
        let resized = self.fit_terminal();
        let phase_changed = self.last_phase != Some(world.phase);
        if resized || phase_changed {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }

        self.front.cells.fill(Cell::BLANK);
        self.compose_hud(world);
        self.compose_maze(world);
        self.compose_effects(world);
        self.compose_agents(world);
        self.compose_footer(world);
        match world.phase {
            Phase::Playing | Phase::Invincible => {}
            phase => self.compose_banner(world, phase),
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose ──

    /// Terminal position of a maze cell's left column.
    fn screen_of(&self, pos: GridPos) -> Option<(usize, usize)> {
        if pos.row < 0 || pos.col < 0 {
            return None;
        }
        let x = pos.col as usize * CELL_W;
        let y = MAP_ROW + pos.row as usize;
        (x + 1 < self.front.width && y < self.front.height).then_some((x, y))
    }

    fn put_tile(&mut self, pos: GridPos, glyph: [char; 2], fg: Color, bg: Color) {
        if let Some((x, y)) = self.screen_of(pos) {
            self.front.set(x, y, Cell::new(glyph[0], fg, bg));
            self.front.set(x + 1, y, Cell::new(glyph[1], fg, bg));
        }
    }

    /// Background of whatever is already drawn under `pos`.
    fn bg_at(&self, pos: GridPos) -> Color {
        self.screen_of(pos).map_or(Cell::BASE_BG, |(x, y)| self.front.get(x, y).bg)
    }

    fn compose_hud(&mut self, w: &SimulationState) {
        self.front.fill_row(HUD_ROW, HUD_BG);
        let power = if w.phase == Phase::Invincible {
            format!("  ★ {:.1}s", w.invincible_timer.max(0.0))
        } else {
            String::new()
        };
        let hud = format!(
            " Level {} {:<18} Score:{:<7} Lives:{}  Dots:{}{}",
            w.current_level + 1, w.level_name, w.score, w.lives, w.dots.len(), power,
        );
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
    }

    fn compose_maze(&mut self, w: &SimulationState) {
        for (pos, tile) in w.maze.cells() {
            match tile {
                Tile::Wall => self.put_tile(pos, [' ', ' '], Color::White, WALL_BG),
                Tile::Floor => self.put_tile(pos, [' ', ' '], Color::White, Cell::BASE_BG),
                Tile::TunnelPath => self.put_tile(pos, ['·', '·'], BRIDGE_FG, TUNNEL_BG),
                Tile::WrapPortal => self.put_tile(pos, ['(', ')'], PORTAL_FG, Cell::BASE_BG),
                Tile::Bridge => {
                    let glyph = match w.maze.bridge_axis(pos) {
                        Axis::Horizontal => ['═', '═'],
                        Axis::Vertical => ['║', ' '],
                    };
                    self.put_tile(pos, glyph, BRIDGE_FG, Cell::BASE_BG);
                }
                Tile::Gate => {
                    let (glyph, fg) = match w.gates.get(pos) {
                        Some(g) => {
                            let glyph = match g.mode {
                                GateMode::HorizontalOpen => ['─', '─'],
                                GateMode::VerticalOpen => ['│', ' '],
                            };
                            (glyph, if g.pending { Color::Red } else { GATE_FG })
                        }
                        None => (['+', ' '], GATE_FG),
                    };
                    self.put_tile(pos, glyph, fg, Cell::BASE_BG);
                }
            }
        }

        for &dot in &w.dots {
            let bg = self.bg_at(dot);
            if let Some((x, y)) = self.screen_of(dot) {
                self.front.set(x, y, Cell::new('•', DOT_FG, bg));
            }
        }

        if let Some(gem) = &w.gem {
            let bg = self.bg_at(gem.cell);
            self.put_tile(gem.cell, ['◆', ' '], GEM_FG, bg);
        }
    }

    fn compose_effects(&mut self, w: &SimulationState) {
        for p in &w.particles.particles {
            let pos = w.maze.cell_of(p.x, p.y);
            let ch = match p.kind {
                ParticleKind::Trail => '░',
                ParticleKind::Spark => '*',
            };
            let bg = self.bg_at(pos);
            if let Some((x, y)) = self.screen_of(pos) {
                let x = if p.x.rem_euclid(w.tile_size) < w.tile_size / 2.0 { x } else { x + 1 };
                self.front.set(x, y, Cell::new(ch, hue_color(p.hue, p.fade()), bg));
            }
        }
    }

    fn compose_agents(&mut self, w: &SimulationState) {
        for u in &w.unicorns {
            let pos = w.maze.cell_of(u.body.x, u.body.y);
            let fg = if u.is_paused() {
                Color::DarkGrey
            } else if w.phase == Phase::Invincible && !u.tagged {
                Color::Rgb { r: 90, g: 120, b: 255 }
            } else {
                UNICORN_FG[u.id % UNICORN_FG.len()]
            };
            let bg = self.bg_at(pos);
            let glyph = if u.body.layer == Layer::Lower { ['u', ' '] } else { ['U', ' '] };
            self.put_tile(pos, glyph, fg, bg);
        }

        let p = &w.player.body;
        let pos = w.maze.cell_of(p.x, p.y);
        let bg = self.bg_at(pos);
        let glyph = match (p.heading.components(), p.layer) {
            (_, Layer::Lower) => ['c', ' '],
            ((1, 0), _) => ['C', '>'],
            ((-1, 0), _) => ['<', 'C'],
            ((0, -1), _) => ['C', '^'],
            ((0, 1), _) => ['C', 'v'],
            _ => ['C', ' '],
        };
        let fg = if p.portal.is_animating() { Color::DarkYellow } else { PLAYER_FG };
        self.put_tile(pos, glyph, fg, bg);

        for t in &w.particles.texts {
            if let Some((x, y)) = self.screen_of(w.maze.cell_of(t.x, t.y)) {
                self.front.put_str(x, y, &t.text, Color::White, Cell::BASE_BG);
            }
        }
    }

    fn compose_footer(&mut self, w: &SimulationState) {
        let msg_row = MAP_ROW + w.maze.rows() + 1;
        if !w.message.is_empty() && w.message_timer > 0.0 {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(1, msg_row, &w.message, Color::Black, MSG_BG);
        }
        let help = " Arrows/WASD: Move   P: Pause   Space: Continue   Q: Quit";
        self.front.put_str(0, msg_row + 2, help, Color::DarkGrey, Color::Reset);
        if self.gamepad {
            self.front.put_str(help.len() + 3, msg_row + 2, "[pad]", Color::DarkGreen, Color::Reset);
        }
    }

    fn compose_banner(&mut self, w: &SimulationState, phase: Phase) {
        let (title, hint, fg) = match phase {
            Phase::Paused => ("PAUSED", "P / Space: resume", Color::Yellow),
            Phase::LifeLost => ("OUCH!", "Space: try again", Color::Rgb { r: 255, g: 120, b: 120 }),
            Phase::LevelComplete => ("LEVEL CLEAR", "Space: next level", Color::Rgb { r: 120, g: 255, b: 160 }),
            Phase::GameOver => ("GAME OVER", "Space: play again   Q: quit", Color::Red),
            Phase::Victory => ("ALL LEVELS CLEARED", "Space: play again   Q: quit", PLAYER_FG),
            Phase::Playing | Phase::Invincible => return,
        };
        let box_w = 34usize;
        let x0 = (w.maze.cols() * CELL_W).saturating_sub(box_w) / 2;
        let y0 = MAP_ROW + w.maze.rows().saturating_sub(5) / 2;
        let dim = Color::Rgb { r: 30, g: 20, b: 50 };
        for y in y0..y0 + 5 {
            for x in x0..x0 + box_w {
                self.front.set(x, y, Cell::new(' ', Color::White, dim));
            }
        }
        let centre = |s: &str| x0 + box_w.saturating_sub(s.chars().count()) / 2;
        self.front.put_str(centre(title), y0 + 1, title, fg, dim);
        let score = format!("Score {}", w.score);
        self.front.put_str(centre(&score), y0 + 2, &score, Color::White, dim);
        self.front.put_str(centre(hint), y0 + 3, hint, Color::Grey, dim);
    }
}
