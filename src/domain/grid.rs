/// Grid geometry: pixel <-> cell conversion and the per-level maze grid.
///
/// Pixel space has its origin at the top-left corner of cell (0, 0).
/// Cell centers sit at `col * tile + tile / 2`, so `pixel_to_grid` and
/// `grid_to_pixel` are exact inverses there.

use super::tile::{Axis, Layer, Tile};
use crate::error::LevelError;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct GridPos {
    pub row: i32,
    pub col: i32,
}

impl GridPos {
    pub const fn new(row: i32, col: i32) -> Self {
        GridPos { row, col }
    }

    pub fn offset(self, d_row: i32, d_col: i32) -> GridPos {
        GridPos { row: self.row + d_row, col: self.col + d_col }
    }

    /// The four orthogonal neighbours: up, down, left, right.
    pub fn neighbours(self) -> [GridPos; 4] {
        [self.offset(-1, 0), self.offset(1, 0), self.offset(0, -1), self.offset(0, 1)]
    }
}

pub fn pixel_to_grid(x: f32, y: f32, tile: f32) -> GridPos {
    GridPos {
        row: (y / tile).floor() as i32,
        col: (x / tile).floor() as i32,
    }
}

pub fn grid_to_pixel(pos: GridPos, tile: f32) -> (f32, f32) {
    (
        pos.col as f32 * tile + tile / 2.0,
        pos.row as f32 * tile + tile / 2.0,
    )
}

/// Immutable tile grid for one level.
#[derive(Clone, Debug)]
pub struct Maze {
    tiles: Vec<Tile>,
    rows: usize,
    cols: usize,
    tile_size: f32,
}

impl Maze {
    pub fn from_rows(rows: Vec<Vec<Tile>>, tile_size: f32) -> Result<Self, LevelError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(LevelError::Empty);
        }
        let mut tiles = Vec::with_capacity(width * height);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(LevelError::Ragged { row: i, expected: width, found: row.len() });
            }
            tiles.extend(row);
        }
        Ok(Maze { tiles, rows: height, cols: width, tile_size })
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }
    pub fn tile_size(&self) -> f32 { self.tile_size }

    pub fn width_px(&self) -> f32 { self.cols as f32 * self.tile_size }
    pub fn height_px(&self) -> f32 { self.rows as f32 * self.tile_size }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.row >= 0 && pos.col >= 0
            && (pos.row as usize) < self.rows
            && (pos.col as usize) < self.cols
    }

    /// Tile at `pos`. Anything off the grid is a wall.
    #[inline]
    pub fn tile_at(&self, pos: GridPos) -> Tile {
        if self.in_bounds(pos) {
            self.tiles[pos.row as usize * self.cols + pos.col as usize]
        } else {
            Tile::Wall
        }
    }

    #[inline]
    pub fn cell_of(&self, x: f32, y: f32) -> GridPos {
        pixel_to_grid(x, y, self.tile_size)
    }

    #[inline]
    pub fn center_of(&self, pos: GridPos) -> (f32, f32) {
        grid_to_pixel(pos, self.tile_size)
    }

    pub fn center_cell(&self) -> GridPos {
        GridPos::new(self.rows as i32 / 2, self.cols as i32 / 2)
    }

    /// Row-major iteration over every cell.
    pub fn cells(&self) -> impl Iterator<Item = (GridPos, Tile)> + '_ {
        let cols = self.cols;
        self.tiles.iter().enumerate().map(move |(i, &t)| {
            (GridPos::new((i / cols) as i32, (i % cols) as i32), t)
        })
    }

    /// A floor tile touching a tunnel path. Mouths exist on both planes
    /// and are where agents change layer.
    pub fn is_tunnel_mouth(&self, pos: GridPos) -> bool {
        self.tile_at(pos) == Tile::Floor && self.touches_tunnel(pos)
    }

    pub fn touches_tunnel(&self, pos: GridPos) -> bool {
        pos.neighbours().iter().any(|&n| self.tile_at(n) == Tile::TunnelPath)
    }

    pub fn exists_on(&self, pos: GridPos, layer: Layer) -> bool {
        self.is_tunnel_mouth(pos) || self.tile_at(pos).exists_on(layer)
    }

    /// Axis along which the upper plane may cross a bridge.
    /// Tunnels or portals on the left/right make it a vertical crossing;
    /// on the top/bottom, a horizontal one. Unmarked bridges cross vertically.
    pub fn bridge_axis(&self, pos: GridPos) -> Axis {
        let side = |p: GridPos| matches!(self.tile_at(p), Tile::TunnelPath | Tile::WrapPortal);
        let [up, down, left, right] = pos.neighbours();
        if side(left) || side(right) {
            Axis::Vertical
        } else if side(up) || side(down) {
            Axis::Horizontal
        } else {
            Axis::Vertical
        }
    }

    /// Corridor axis of a tunnel path tile, from which neighbour continues
    /// the tunnel. `None` for an isolated tile.
    pub fn tunnel_axis(&self, pos: GridPos) -> Option<Axis> {
        let runs = |p: GridPos| matches!(self.tile_at(p), Tile::TunnelPath | Tile::Bridge);
        let [up, down, left, right] = pos.neighbours();
        if runs(left) || runs(right) {
            Some(Axis::Horizontal)
        } else if runs(up) || runs(down) {
            Some(Axis::Vertical)
        } else {
            None
        }
    }
}
