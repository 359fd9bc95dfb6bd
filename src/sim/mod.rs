//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Explicit time arguments, no hidden clocks
//! - Seeded RNG only
//! - Stable entity ids and an explicit per-frame update order
//! - No rendering or platform dependencies

pub mod motion;
pub mod state;
pub mod tick;

pub use state::{Board, BoardSnapshot, Mode, PlayerMove, Tile, TileSnapshot};
