//! Board and tile state
//!
//! Everything the simulation needs to be replayed deterministically lives
//! here: the tile arena, the spawn policy, the fall schedule and the session
//! aggregates. Time enters only through explicit `Instant` arguments.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use glam::IVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::scorer::Scorer;

/// Difficulty mode. Hard mode falls twice as fast and biases spawns toward
/// low values, which makes merges scarcer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Easy,
    Hard,
}

impl Mode {
    /// Coerce a raw mode index; anything out of range maps to `Easy`.
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => Mode::Hard,
            _ => Mode::Easy,
        }
    }

    /// Time between adjacent free falls of the controlled tile
    pub fn fall_interval(self) -> Duration {
        match self {
            Mode::Easy => Duration::from_millis(1000),
            Mode::Hard => Duration::from_millis(500),
        }
    }

    /// Spawn weights for the values {2, 4, 8}
    pub fn spawn_weights(self) -> [u32; 3] {
        match self {
            Mode::Easy => [1, 3, 6],
            Mode::Hard => [6, 3, 1],
        }
    }
}

/// A discrete control input for the controlled tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerMove {
    Left,
    Right,
    /// Forced descent: run to the floor or the next obstacle, suppressing
    /// free fall until it completes
    Down,
}

/// One tile: value, position, and per-frame motion/merge state
#[derive(Debug, Clone)]
pub struct Tile {
    pub(crate) id: u32,
    pub(crate) value: u32,
    /// x = left edge, y = top edge
    pub(crate) pos: IVec2,
    pub(crate) falling: bool,
    pub(crate) moving_left: bool,
    pub(crate) moving_right: bool,
    pub(crate) moving_down: bool,
    /// Free fall suspended so an in-flight horizontal move can finish
    pub(crate) fall_held: bool,
    pub(crate) controlled: bool,
    /// Set once this tile has asked the board to spawn its successor
    pub(crate) spawn_requested: bool,
    pub(crate) remain_fall: i32,
    pub(crate) remain_move: i32,
    /// Id of the tile this one is consuming
    pub(crate) absorb_target: Option<u32>,
    /// Id of the tile consuming this one
    pub(crate) absorbed_by: Option<u32>,
}

impl Tile {
    pub(crate) fn new(id: u32, value: u32, pos: IVec2) -> Self {
        Self {
            id,
            value,
            pos,
            falling: false,
            moving_left: false,
            moving_right: false,
            moving_down: false,
            fall_held: false,
            controlled: true,
            spawn_requested: false,
            remain_fall: 0,
            remain_move: 0,
            absorb_target: None,
            absorbed_by: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn pos(&self) -> IVec2 {
        self.pos
    }

    pub fn is_controlled(&self) -> bool {
        self.controlled
    }

    pub fn is_absorbing(&self) -> bool {
        self.absorb_target.is_some()
    }

    pub fn is_being_absorbed(&self) -> bool {
        self.absorbed_by.is_some()
    }

    pub fn is_merging(&self) -> bool {
        self.is_absorbing() || self.is_being_absorbed()
    }

    /// False while any move, a merge, or loss of control blocks new commands.
    /// A request made while this is false fails without side effects.
    pub fn ready_for_new_move(&self) -> bool {
        !(self.moving_left
            || self.moving_right
            || self.moving_down
            || self.is_absorbing()
            || self.is_being_absorbed()
            || !self.controlled)
    }
}

/// The tile collection coordinator: owns the arena, spawns tiles, schedules
/// falls, tracks the session aggregates and resets between sessions.
#[derive(Debug)]
pub struct Board {
    mode: Mode,
    rng: Pcg32,
    pub(crate) tiles: Vec<Tile>,
    next_id: u32,
    /// Id of the latest spawned tile; only it can be player controlled
    pub(crate) latest: u32,
    next_value: u32,
    pub(crate) frame_count: u64,
    /// Frame on which settled tiles begin a synchronized fall
    pub(crate) settled_fall_frame: u64,
    /// Scheduled time of the controlled tile's next free fall
    next_fall_at: Instant,
    paused: bool,
    paused_at: Option<Instant>,
    highest_value: u32,
    exceeded_top: bool,
    pub(crate) scorer: Scorer,
    /// Deterministic override of upcoming spawn values, drained first
    forced_values: VecDeque<u32>,
}

impl Board {
    /// Create a session with one freshly spawned controlled tile.
    pub fn new(mode: Mode, seed: u64, now: Instant) -> Self {
        let mut board = Self {
            mode,
            rng: Pcg32::seed_from_u64(seed),
            tiles: Vec::with_capacity(MAX_TILES),
            next_id: 1,
            latest: 0,
            next_value: 2,
            frame_count: 0,
            settled_fall_frame: 0,
            next_fall_at: now,
            paused: false,
            paused_at: None,
            highest_value: 0,
            exceeded_top: false,
            scorer: Scorer::new(),
            forced_values: VecDeque::new(),
        };
        board.next_value = board.draw_value();
        board.spawn_next(now);
        board
    }

    // == spawn policy ==

    /// Spawn the next controlled tile at the spawn cell. Refuses when the
    /// field is at capacity.
    pub(crate) fn spawn_next(&mut self, now: Instant) -> bool {
        if self.tiles.len() >= MAX_TILES {
            return false;
        }
        let id = self.next_id;
        self.next_id += 1;
        let tile = Tile::new(id, self.next_value, IVec2::new(SPAWN_LEFT, SPAWN_TOP));
        log::debug!("spawn tile #{id} value {}", self.next_value);
        self.tiles.push(tile);
        self.latest = id;
        self.trigger_settled_fall();
        self.schedule_next_fall(now);
        self.next_value = self.draw_value();
        true
    }

    /// Weighted draw over {2, 4, 8}; forced values drain first.
    fn draw_value(&mut self) -> u32 {
        if let Some(v) = self.forced_values.pop_front() {
            return v;
        }
        let [w2, w4, w8] = self.mode.spawn_weights();
        let roll = self.rng.random_range(0..w2 + w4 + w8);
        if roll < w2 {
            2
        } else if roll < w2 + w4 {
            4
        } else {
            8
        }
    }

    /// Test hook: queue deterministic spawn values. The current controlled
    /// tile is replaced with the first queued value immediately.
    pub fn force_next_values<I: IntoIterator<Item = u32>>(&mut self, values: I, now: Instant) {
        self.forced_values.extend(values);
        if let Some(v) = self.forced_values.pop_front() {
            let latest = self.latest;
            self.tiles.retain(|t| t.id != latest);
            self.next_value = v;
            self.spawn_next(now);
        }
    }

    // == scheduling ==

    /// Reschedule the controlled tile's next free fall to now + interval.
    pub(crate) fn schedule_next_fall(&mut self, now: Instant) {
        self.next_fall_at = now + self.mode.fall_interval();
    }

    /// Same, but only while the given tile still holds player control.
    pub(crate) fn schedule_fall_for(&mut self, id: u32, now: Instant) {
        if self.tile(id).is_some_and(|t| t.controlled) {
            self.schedule_next_fall(now);
        }
    }

    pub(crate) fn fall_due(&self, now: Instant) -> bool {
        self.next_fall_at <= now
    }

    /// Flag this frame so settled tiles fall together, cascading in one pass.
    pub(crate) fn trigger_settled_fall(&mut self) {
        self.settled_fall_frame = self.frame_count;
    }

    /// Scheduled time of the next free fall (read-only, for drivers/tests)
    pub fn next_fall_at(&self) -> Instant {
        self.next_fall_at
    }

    // == pause ==

    /// Toggle pause. Resuming shifts the fall schedule forward by exactly
    /// the paused duration so no fall time is lost or gained.
    pub fn toggle_pause(&mut self, now: Instant) -> bool {
        if self.paused {
            if let Some(at) = self.paused_at.take() {
                self.next_fall_at += now - at;
            }
            self.paused = false;
        } else {
            self.paused_at = Some(now);
            self.paused = true;
        }
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // == mode ==

    /// Switch difficulty; takes effect on the next spawn and next scheduled
    /// fall, never retroactively.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    // == aggregates ==

    /// Track the highest value ever made, ignoring tiles mid-merge.
    pub(crate) fn note_highest(&mut self, id: u32) {
        let Some(tile) = self.tile(id) else { return };
        if tile.is_merging() {
            return;
        }
        if tile.value > self.highest_value {
            self.highest_value = tile.value;
        }
    }

    /// Latch the loss flag when a tile settles above the visible field.
    pub(crate) fn mark_exceeded_if_above(&mut self, top: i32) {
        if top < UPPER_BOUNDARY {
            log::debug!("tile settled above the field, session lost");
            self.exceeded_top = true;
        }
    }

    pub fn highest_value(&self) -> u32 {
        self.highest_value
    }

    pub fn has_won(&self) -> bool {
        self.highest_value >= WIN_VALUE
    }

    pub fn has_lost(&self) -> bool {
        self.exceeded_top
    }

    pub fn score(&self) -> u64 {
        self.scorer.current()
    }

    pub fn best_score(&self) -> u64 {
        self.scorer.best()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Value the next spawned tile will carry (display collaborators)
    pub fn next_value(&self) -> u32 {
        self.next_value
    }

    // == arena access ==

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn latest_tile(&self) -> Option<&Tile> {
        self.tile(self.latest)
    }

    pub(crate) fn tile(&self, id: u32) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.id == id)
    }

    pub(crate) fn tile_mut(&mut self, id: u32) -> Option<&mut Tile> {
        self.tiles.iter_mut().find(|t| t.id == id)
    }

    /// Probe a cell for a real tile. The position passed in is the
    /// "imaginary obstacle"; a hit means it is actually occupied.
    pub(crate) fn tile_at(&self, pos: IVec2) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.pos == pos)
    }

    // == reset ==

    /// Reset for a fresh session: all tiles cleared, counters zeroed, mode
    /// back to easy, one new controlled tile. The session-best score is the
    /// only survivor.
    pub fn clean_to_reuse(&mut self, now: Instant) {
        self.mode = Mode::Easy;
        self.tiles.clear();
        self.next_id = 1;
        self.latest = 0;
        self.frame_count = 0;
        self.settled_fall_frame = 0;
        self.paused = false;
        self.paused_at = None;
        self.highest_value = 0;
        self.exceeded_top = false;
        self.scorer.clean_to_reuse();
        self.next_value = self.draw_value();
        self.spawn_next(now);
    }

    // == snapshot ==

    /// Serializable view of the session for external collaborators.
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            mode: self.mode,
            frame: self.frame_count,
            score: self.scorer.current(),
            best_score: self.scorer.best(),
            highest_value: self.highest_value,
            next_value: self.next_value,
            won: self.has_won(),
            lost: self.has_lost(),
            tiles: self
                .tiles
                .iter()
                .map(|t| TileSnapshot {
                    id: t.id,
                    value: t.value,
                    left: t.pos.x,
                    top: t.pos.y,
                    merging: t.is_merging(),
                    controlled: t.controlled,
                })
                .collect(),
        }
    }

    /// Test helper: drop a settled tile straight onto the grid.
    #[cfg(test)]
    pub(crate) fn place_settled(&mut self, value: u32, col: i32, row: i32) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        let pos = IVec2::new(
            SPAWN_LEFT + col * CELL_SIZE,
            LOWER_BOUNDARY - (row + 1) * CELL_SIZE,
        );
        let mut tile = Tile::new(id, value, pos);
        tile.controlled = false;
        tile.spawn_requested = true;
        self.tiles.push(tile);
        id
    }
}

/// One tile as seen by external collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSnapshot {
    pub id: u32,
    pub value: u32,
    pub left: i32,
    pub top: i32,
    pub merging: bool,
    pub controlled: bool,
}

/// Read-only view of a session, serializable for rendering or dumps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub mode: Mode,
    pub frame: u64,
    pub score: u64,
    pub best_score: u64,
    pub highest_value: u32,
    pub next_value: u32,
    pub won: bool,
    pub lost: bool,
    pub tiles: Vec<TileSnapshot>,
}
