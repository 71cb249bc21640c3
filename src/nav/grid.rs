//! Tile grid primitives
//!
//! Grid coordinates, facing directions, the collision oracle the navigation
//! core queries, and the tile/pixel conversion used by movement.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

// ============================================================================
// Grid Position
// ============================================================================

/// A discrete tile coordinate.
///
/// Ordering is row-major (`y` first, then `x`) and is only used to break ties
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPosition {
    /// Column
    pub x: i32,
    /// Row (grows downward)
    pub y: i32,
}

impl GridPosition {
    /// Create a new position
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position offset by a raw delta
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Position `steps` tiles away in `direction`
    #[must_use]
    pub fn step(self, direction: Direction, steps: i32) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx * steps, dy * steps)
    }

    /// Manhattan (L1) distance
    #[must_use]
    pub fn manhattan(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Euclidean (L2) distance
    #[must_use]
    pub fn euclidean(self, other: Self) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// The four cardinal neighbors, in `Direction::ALL` order
    #[must_use]
    pub fn cardinal_neighbors(self) -> [Self; 4] {
        Direction::ALL.map(|direction| self.step(direction, 1))
    }

    /// Whether `other` is exactly one king-move away
    #[must_use]
    pub fn is_adjacent(self, other: Self, diagonal: bool) -> bool {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        if diagonal {
            dx <= 1 && dy <= 1 && (dx, dy) != (0, 0)
        } else {
            dx + dy == 1
        }
    }
}

impl Ord for GridPosition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for GridPosition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl From<(i32, i32)> for GridPosition {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ============================================================================
// Direction
// ============================================================================

/// Cardinal facing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions, in neighbor expansion order
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit tile delta
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// The opposite direction
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Facing for a step delta. Horizontal wins on diagonals.
    #[must_use]
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx.signum(), dy.signum()) {
            (1, _) => Some(Direction::Right),
            (-1, _) => Some(Direction::Left),
            (0, 1) => Some(Direction::Down),
            (0, -1) => Some(Direction::Up),
            _ => None,
        }
    }
}

// ============================================================================
// World Grid
// ============================================================================

/// Read-only collision oracle over a rectangular tile grid.
///
/// The navigation core borrows this and never mutates it. Implementations
/// must report every out-of-range coordinate as blocked.
pub trait WorldGrid {
    /// Width in tiles
    fn width(&self) -> i32;

    /// Height in tiles
    fn height(&self) -> i32;

    /// Whether the tile at `(x, y)` cannot be entered
    fn is_blocked(&self, x: i32, y: i32) -> bool;

    /// Whether `pos` lies inside the grid
    fn in_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width() && pos.y < self.height()
    }

    /// Whether `pos` can be entered
    fn is_open(&self, pos: GridPosition) -> bool {
        !self.is_blocked(pos.x, pos.y)
    }
}

/// Dense boolean tile grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    width: i32,
    height: i32,
    /// Row-major, `true` = blocked
    blocked: Vec<bool>,
}

impl TileGrid {
    /// Create a new grid (all tiles open)
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            blocked: vec![false; (width * height) as usize],
        }
    }

    /// Build a grid from ASCII rows: `#` is blocked, anything else is open.
    ///
    /// Short rows are padded with open tiles up to the longest row.
    #[must_use]
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Self {
        let height = rows.len() as i32;
        let width = rows
            .iter()
            .map(|row| row.as_ref().chars().count())
            .max()
            .unwrap_or(0) as i32;

        let mut grid = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.as_ref().chars().enumerate() {
                if ch == '#' {
                    grid.set_blocked(GridPosition::new(x as i32, y as i32), true);
                }
            }
        }
        grid
    }

    /// Set a tile's blocking state. Out-of-range positions are ignored.
    pub fn set_blocked(&mut self, pos: GridPosition, blocked: bool) {
        if let Some(index) = self.index(pos) {
            self.blocked[index] = blocked;
        }
    }

    /// Number of blocked tiles
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|&&b| b).count()
    }

    fn index(&self, pos: GridPosition) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }
}

impl WorldGrid for TileGrid {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.index(GridPosition::new(x, y))
            .is_none_or(|index| self.blocked[index])
    }
}

// ============================================================================
// Tile Metrics
// ============================================================================

/// Fixed tile size used to convert between tiles and pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileMetrics {
    /// Tile edge length in pixels
    pub tile_size: f32,
}

impl TileMetrics {
    /// Create metrics for a tile size in pixels
    #[must_use]
    pub const fn new(tile_size: f32) -> Self {
        Self { tile_size }
    }

    /// Pixel position of a tile's center
    #[must_use]
    pub fn tile_center(&self, pos: GridPosition) -> Vec2 {
        Vec2::new(
            (pos.x as f32 + 0.5) * self.tile_size,
            (pos.y as f32 + 0.5) * self.tile_size,
        )
    }

    /// Tile containing a pixel position
    #[must_use]
    pub fn tile_at(&self, pixel: Vec2) -> GridPosition {
        GridPosition::new(
            (pixel.x / self.tile_size).floor() as i32,
            (pixel.y / self.tile_size).floor() as i32,
        )
    }
}

impl Default for TileMetrics {
    fn default() -> Self {
        Self::new(16.0)
    }
}
