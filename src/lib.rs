//! Tilefall - a falling-tile merge puzzle
//!
//! Core modules:
//! - `sim`: Deterministic simulation (tile motion, collisions, absorption, board state)
//! - `autoplay`: Heuristic agent driving the game through the same control inputs
//! - `scorer`: Score aggregation for the external scoring collaborator

pub mod autoplay;
pub mod scorer;
pub mod sim;

pub use autoplay::{Autoplayer, Decision};
pub use scorer::Scorer;
pub use sim::{Board, Mode, PlayerMove};

/// Game field constants
pub mod consts {
    /// Edge length of one grid cell, in pixel units
    pub const CELL_SIZE: i32 = 110;
    /// Number of columns in the field
    pub const COLS: i32 = 4;
    /// Number of rows, counting the spawn row above the visible field
    pub const ROWS: i32 = 5;
    /// Live-tile capacity: every visible cell plus the spawn cell
    pub const MAX_TILES: usize = (1 + (ROWS - 1) * COLS) as usize;

    /// Left edge of the field
    pub const LEFT_BOUNDARY: i32 = 10;
    /// Right edge of the field
    pub const RIGHT_BOUNDARY: i32 = LEFT_BOUNDARY + COLS * CELL_SIZE;
    /// A tile settling with its top above this line loses the session
    pub const UPPER_BOUNDARY: i32 = SPAWN_TOP + CELL_SIZE;
    /// Floor of the field
    pub const LOWER_BOUNDARY: i32 = SPAWN_TOP + ROWS * CELL_SIZE;

    /// Spawn cell: top-left, one row above the visible field
    pub const SPAWN_TOP: i32 = 150;
    pub const SPAWN_LEFT: i32 = LEFT_BOUNDARY;

    /// Frames needed to traverse one cell. Free fall and player moves share
    /// the same per-frame step, so a tile is laying over a single cell
    /// whenever it becomes eligible for a new command.
    pub const FRAMES_PER_CELL: i32 = 11;
    /// Distance covered per frame on any active axis
    pub const STEP_PER_FRAME: i32 = CELL_SIZE / FRAMES_PER_CELL;

    /// Reaching this tile value wins the session
    pub const WIN_VALUE: u32 = 2048;

    /// Frame rate the external driver targets
    pub const FPS: u32 = 85;
}

/// Column index (0 = leftmost) of a left-edge coordinate
#[inline]
pub fn col_of(left: i32) -> i32 {
    (left - consts::SPAWN_LEFT) / consts::CELL_SIZE
}

/// Row index counted from the floor (0 = bottom row) of a top-edge coordinate
#[inline]
pub fn row_from_bottom(top: i32) -> i32 {
    (consts::LOWER_BOUNDARY - top) / consts::CELL_SIZE - 1
}

/// True when a left-edge coordinate sits exactly on the column lattice
#[inline]
pub fn column_aligned(left: i32) -> bool {
    (left - consts::SPAWN_LEFT) % consts::CELL_SIZE == 0
}

/// True when a top-edge coordinate sits exactly on the row lattice
#[inline]
pub fn row_aligned(top: i32) -> bool {
    (top - consts::SPAWN_TOP) % consts::CELL_SIZE == 0
}
