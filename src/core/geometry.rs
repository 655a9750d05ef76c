//! Grid Geometry
//!
//! Integer tile coordinates, world positions and axis-aligned boxes.
//! Everything is `i32` so the simulation never touches floating point.

use std::fmt;
use serde::{Serialize, Deserialize};

// =============================================================================
// TILE COORDINATE
// =============================================================================

/// A grid cell, addressed by column and row.
///
/// Orders row-major (column first, then row) so BTreeSets iterate stably.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column (x axis).
    pub col: i32,
    /// Row (y axis, grows downward).
    pub row: i32,
}

impl TileCoord {
    /// Create a tile coordinate.
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Tile shifted by a column/row delta.
    #[inline]
    pub const fn offset(self, d_col: i32, d_row: i32) -> Self {
        Self::new(self.col + d_col, self.row + d_row)
    }

    /// Top-left corner of this tile in world units.
    #[inline]
    pub const fn to_world(self, tile_size: i32) -> Position {
        Position::new(self.col * tile_size, self.row * tile_size)
    }

    /// The full tile as a world-space rectangle.
    #[inline]
    pub const fn rect(self, tile_size: i32) -> Rect {
        Rect::new(self.col * tile_size, self.row * tile_size, tile_size, tile_size)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

// =============================================================================
// WORLD POSITION
// =============================================================================

/// A point in world units (tile size units per tile).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Position {
    /// Create a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The tile containing this point.
    #[inline]
    pub fn tile(self, tile_size: i32) -> TileCoord {
        TileCoord::new(self.x.div_euclid(tile_size), self.y.div_euclid(tile_size))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// =============================================================================
// AXIS-ALIGNED BOX
// =============================================================================

/// Axis-aligned rectangle in world units.
///
/// Half-open on both axes: `[x, x + w) x [y, y + h)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub w: i32,
    /// Height.
    pub h: i32,
}

impl Rect {
    /// Create a rectangle.
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Square of side `size` anchored at `pos`.
    pub const fn square(pos: Position, size: i32) -> Self {
        Self::new(pos.x, pos.y, size, size)
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> i32 {
        self.x + self.w
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Strict overlap test. Rectangles that only share an edge do not intersect.
    #[inline]
    pub const fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Whether this rectangle lies fully inside `[0, width) x [0, height)`.
    pub const fn within(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.right() <= width && self.bottom() <= height
    }

    /// Every tile this rectangle overlaps.
    pub fn tiles(&self, tile_size: i32) -> impl Iterator<Item = TileCoord> {
        let first_col = self.x.div_euclid(tile_size);
        let last_col = (self.right() - 1).div_euclid(tile_size);
        let first_row = self.y.div_euclid(tile_size);
        let last_row = (self.bottom() - 1).div_euclid(tile_size);

        (first_row..=last_row)
            .flat_map(move |row| (first_col..=last_col).map(move |col| TileCoord::new(col, row)))
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// One of the four cardinal movement directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards row 0.
    Up,
    /// Away from row 0.
    Down,
    /// Towards column 0.
    Left,
    /// Away from column 0.
    Right,
}

impl Direction {
    /// All directions, in the order explosions are expanded.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit step as `(dx, dy)`.
    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}
