//! Movement and collision engine
//!
//! Advances one tile per frame: arms scheduled falls, predicts the next
//! position, corrects the path against the field boundaries and other tiles,
//! and drives the absorption state machine. Player moves are initiated here
//! too, because their legality depends on the same obstacle probes.
//!
//! Every tile follows a "path" (its active motion flags plus remaining
//! distances). Each frame the path is checked for problems first and fixed
//! where needed, then the position is updated along the corrected path.

use std::time::Instant;

use glam::IVec2;

use crate::consts::*;
use crate::sim::state::{Board, PlayerMove, Tile};
use crate::{column_aligned, row_aligned};

/// Outcome of probing an imaginary obstacle cell along a tile's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    /// No tile occupies the probed cell
    Vacant,
    /// A tile occupies the cell and blocks the path
    Blocked,
    /// A merge with the occupant started, or was already running
    Merging,
}

/// Position after applying one frame of the currently active motion deltas.
/// Horizontal and forced-down moves are mutually exclusive; free fall may
/// combine with either horizontal direction.
fn predicted_pos(tile: &Tile) -> IVec2 {
    let mut next = tile.pos;
    if tile.falling {
        next.y += STEP_PER_FRAME;
    }
    if tile.moving_left {
        next.x -= STEP_PER_FRAME;
    } else if tile.moving_right {
        next.x += STEP_PER_FRAME;
    } else if tile.moving_down {
        next.y += STEP_PER_FRAME;
    }
    next
}

/// Top coordinate of the next cell boundary at or below `y`.
fn cell_below(y: i32) -> i32 {
    ((y - SPAWN_TOP) / CELL_SIZE + 1) * CELL_SIZE + SPAWN_TOP
}

/// Left coordinate of the column containing `x` (plus `offset` columns).
fn column_left(x: i32, offset: i32) -> i32 {
    ((x - SPAWN_LEFT) / CELL_SIZE + offset) * CELL_SIZE + SPAWN_LEFT
}

impl Board {
    // == player move initiation ==

    /// Apply a control input to the latest tile. Returns false when the tile
    /// is not eligible or the move is refused; a refusal has no side effects.
    pub fn apply_move(&mut self, mv: PlayerMove) -> bool {
        match mv {
            PlayerMove::Left => self.begin_horizontal_move(true),
            PlayerMove::Right => self.begin_horizontal_move(false),
            PlayerMove::Down => self.begin_down_move(),
        }
    }

    fn begin_horizontal_move(&mut self, left: bool) -> bool {
        let latest = self.latest;
        let Some(tile) = self.tile_mut(latest) else {
            return false;
        };
        if !tile.ready_for_new_move() {
            return false;
        }
        if left {
            tile.moving_left = true;
        } else {
            tile.moving_right = true;
        }
        tile.remain_move = CELL_SIZE;
        true
    }

    fn begin_down_move(&mut self) -> bool {
        let latest = self.latest;
        let Some(tile) = self.tile(latest) else {
            return false;
        };
        if !tile.ready_for_new_move() {
            return false;
        }
        let pos = tile.pos;
        let value = tile.value;
        // A forced descent is refused while resting directly on the floor or
        // on a tile of a different value; otherwise endless forced moves
        // would starve the free fall entirely.
        if row_aligned(pos.y) {
            if pos.y == LOWER_BOUNDARY - CELL_SIZE {
                return false;
            }
            let below = IVec2::new(pos.x, pos.y + CELL_SIZE);
            if self.tile_at(below).is_some_and(|t| t.value != value) {
                return false;
            }
        }
        let Some(tile) = self.tile_mut(latest) else {
            return false;
        };
        tile.moving_down = true;
        // Destination set past the floor; boundary and obstacle checks clamp
        // the path frame by frame.
        tile.remain_move = CELL_SIZE * ROWS;
        if tile.falling {
            tile.falling = false;
            tile.remain_fall = 0;
        }
        true
    }

    // == per-frame advance ==

    /// Advance one tile by one frame.
    pub(crate) fn advance_tile(&mut self, id: u32, now: Instant) {
        self.begin_fall_if_due(id, now);
        self.check_boundary(id);
        self.check_fall_axis(id, now);
        self.check_down_axis(id, now);
        self.check_horizontal_axis(id);
        self.apply_motion(id);
        self.try_end_absorb(id, now);
        self.finish_moves(id, now);
        self.note_highest(id);
        self.maybe_request_spawn(id, now);
    }

    /// Arm a one-cell fall when the schedule (controlled tile) or the
    /// settled-fall trigger frame (settled tile) says so.
    fn begin_fall_if_due(&mut self, id: u32, now: Instant) {
        let frame = self.frame_count;
        let trigger = self.settled_fall_frame;
        let due = self.fall_due(now);
        let Some(tile) = self.tile_mut(id) else { return };
        // A merging pair keeps its original motion until resolution.
        if tile.is_merging() {
            return;
        }
        if tile.controlled {
            if !due || tile.falling {
                return;
            }
            // Forced descent suppresses free fall to keep its speed constant.
            if !tile.moving_down {
                tile.falling = true;
                tile.remain_fall = CELL_SIZE;
            }
            self.schedule_next_fall(now);
        } else {
            if frame != trigger || tile.falling {
                return;
            }
            tile.falling = true;
            tile.remain_fall = CELL_SIZE;
        }
    }

    /// Cancel any motion that would cross the field boundaries.
    fn check_boundary(&mut self, id: u32) {
        let Some(tile) = self.tile_mut(id) else { return };
        let next = predicted_pos(tile);
        if next.y + CELL_SIZE > LOWER_BOUNDARY {
            if tile.falling {
                tile.falling = false;
                tile.remain_fall = 0;
                tile.fall_held = false;
                // Landing on the floor ends player control, which queues the
                // next spawn once any horizontal move finishes.
                tile.controlled = false;
            }
            if tile.moving_down {
                tile.remain_move = LOWER_BOUNDARY - (tile.pos.y + CELL_SIZE);
            }
        }
        if next.x < LEFT_BOUNDARY {
            tile.moving_left = false;
            tile.remain_move = 0;
        } else if next.x + CELL_SIZE > RIGHT_BOUNDARY {
            tile.moving_right = false;
            tile.remain_move = 0;
        }
    }

    /// Obstacle checks for a free fall in progress.
    fn check_fall_axis(&mut self, id: u32, now: Instant) {
        let Some(tile) = self.tile(id) else { return };
        if !tile.falling {
            return;
        }
        let next = predicted_pos(tile);
        let cur = tile.pos;
        // While a horizontal move is mid-flight the tile lays across two
        // columns and both cells below must be checked.
        let span = if column_aligned(next.x) { 1 } else { 2 };
        // The current top anchors the probe so a move skimming just above a
        // stack is not blocked one frame early; a forced descent probes from
        // the predicted top instead so it stops exactly adjacent.
        let base_y = if tile.moving_down { next.y } else { cur.y };
        let obstacle_top = cell_below(base_y);

        if span == 1 {
            if let Some(t) = self.tile_mut(id) {
                t.fall_held = false;
            }
            let obstacle = IVec2::new(column_left(next.x, 0), obstacle_top);
            match self.try_start_absorb(id, obstacle) {
                Probe::Blocked => {
                    // Fall blocked by a tile of a different value: stop and
                    // release control.
                    if let Some(t) = self.tile_mut(id) {
                        t.falling = false;
                        t.remain_fall = 0;
                        t.controlled = false;
                    }
                }
                Probe::Vacant => {
                    let controlled = self.tile(id).is_some_and(|t| t.controlled);
                    if controlled {
                        self.schedule_next_fall(now);
                        self.trigger_settled_fall();
                    }
                }
                Probe::Merging => {}
            }
        } else {
            for i in 0..2 {
                let obstacle = IVec2::new(column_left(next.x, i), obstacle_top);
                if self.try_start_absorb(id, obstacle) == Probe::Blocked {
                    // Hold the fall rather than cancel it so the horizontal
                    // move finishes undisturbed. The hold is released once
                    // the tile lays over a single column again.
                    if let Some(t) = self.tile_mut(id) {
                        t.fall_held = true;
                    }
                }
            }
        }

        let fall_held = self.tile(id).is_some_and(|t| t.fall_held);
        if span == 2 || !fall_held {
            self.schedule_fall_for(id, now);
            self.trigger_settled_fall();
        }
    }

    /// Obstacle check for a forced descent: look one cell ahead and clamp
    /// the remaining distance so the tile stops exactly adjacent.
    fn check_down_axis(&mut self, id: u32, now: Instant) {
        let Some(tile) = self.tile(id) else { return };
        if !tile.moving_down {
            return;
        }
        let next = predicted_pos(tile);
        let cur_top = tile.pos.y;
        let obstacle_top = cell_below(next.y);
        let obstacle = IVec2::new(next.x, obstacle_top);
        if self.try_start_absorb(id, obstacle) == Probe::Blocked {
            if let Some(t) = self.tile_mut(id) {
                t.remain_move = obstacle_top - (cur_top + CELL_SIZE);
            }
            self.schedule_fall_for(id, now);
        }
    }

    /// Obstacle check at the instant a horizontal move begins. A begun move
    /// is guaranteed clear, so nothing is probed mid-flight.
    fn check_horizontal_axis(&mut self, id: u32) {
        let Some(tile) = self.tile(id) else { return };
        if !tile.moving_left && !tile.moving_right {
            return;
        }
        let cur = tile.pos;
        if !column_aligned(cur.x) {
            return;
        }
        let dx = if tile.moving_left { -CELL_SIZE } else { CELL_SIZE };
        let obstacle = if tile.falling {
            if !row_aligned(cur.y) {
                // Mid-fall: the move slides over the lower of the two rows
                // the tile is laying across.
                IVec2::new(cur.x + dx, cell_below(cur.y))
            } else {
                // Fall and move begin together: probe the diagonal cell.
                IVec2::new(cur.x + dx, cur.y + CELL_SIZE)
            }
        } else {
            IVec2::new(cur.x + dx, cur.y)
        };
        if self.try_start_absorb(id, obstacle) == Probe::Blocked {
            if let Some(t) = self.tile_mut(id) {
                t.moving_left = false;
                t.moving_right = false;
                t.remain_move = 0;
            }
        }
    }

    // == absorption coordinator ==

    /// Probe the imaginary obstacle cell. When a real tile of equal value
    /// sits there and the adjacency condition holds, start absorbing it.
    pub(crate) fn try_start_absorb(&mut self, id: u32, obstacle_pos: IVec2) -> Probe {
        let Some(tile) = self.tile(id) else {
            return Probe::Vacant;
        };
        if tile.is_absorbing() {
            return Probe::Merging;
        }
        let next = predicted_pos(tile);
        let value = tile.value;
        let Some(obstacle) = self.tiles.iter().find(|t| t.id != id && t.pos == obstacle_pos)
        else {
            return Probe::Vacant;
        };
        let (ob_id, ob_value, ob_pos) = (obstacle.id, obstacle.value, obstacle.pos);
        let ob_taken = obstacle.is_being_absorbed();
        // Adjacent when the paths coincide on one axis and sit within one
        // cell on the other.
        let adjacent = (next.y == ob_pos.y && (next.x - ob_pos.x).abs() <= CELL_SIZE)
            || (next.x == ob_pos.x && (next.y - ob_pos.y).abs() <= CELL_SIZE);
        if value != ob_value || ob_taken || !adjacent {
            return Probe::Blocked;
        }
        self.start_absorb(id, ob_id);
        Probe::Merging
    }

    /// Link the pair, double the mover and report the score increment. A
    /// start on a tile already merging is a no-op.
    fn start_absorb(&mut self, mover: u32, target: u32) {
        let Some(t) = self.tile_mut(mover) else { return };
        if t.is_merging() {
            return;
        }
        t.absorb_target = Some(target);
        t.value *= 2;
        let new_value = t.value;
        if let Some(tt) = self.tile_mut(target) {
            tt.absorbed_by = Some(mover);
        }
        self.scorer.add(i64::from(new_value));
        log::debug!("tile #{mover} absorbs #{target}, new value {new_value}");
    }

    /// Remove the absorbed tile and invalidate both merge links. Runs at
    /// most once per absorption.
    fn finish_absorb(&mut self, mover: u32) {
        let Some(tile) = self.tile(mover) else { return };
        let Some(target) = tile.absorb_target else { return };
        self.tiles.retain(|t| t.id != target);
        if let Some(t) = self.tile_mut(mover) {
            t.absorb_target = None;
        }
    }

    /// Resolve a running absorption: in the general case once the mover
    /// exactly covers its target, or early when a forced descent is about to
    /// jump past it.
    fn try_end_absorb(&mut self, id: u32, now: Instant) {
        let Some(tile) = self.tile(id) else { return };
        let Some(target_id) = tile.absorb_target else { return };
        let (pos, moving_down, value) = (tile.pos, tile.moving_down, tile.value);
        let Some(target) = self.tile(target_id) else {
            // Target vanished; drop the dangling link.
            if let Some(t) = self.tile_mut(id) {
                t.absorb_target = None;
            }
            return;
        };
        let target_pos = target.pos;
        if pos == target_pos {
            self.finish_absorb(id);
            return;
        }
        if !moving_down {
            return;
        }
        let next_top = pos.y + STEP_PER_FRAME;
        if next_top <= target_pos.y {
            return;
        }
        // Pass-through: the descent overshoots the target this frame. End
        // the merge now and look one cell beyond the former target.
        let beyond = IVec2::new(pos.x, target_pos.y + CELL_SIZE);
        let found = self
            .tiles
            .iter()
            .find(|t| t.id != id && t.pos == beyond)
            .map(|t| (t.id, t.value));
        self.finish_absorb(id);
        match found {
            Some((_, ob_value)) if ob_value != value => {
                // Stop adjacent to the mismatched obstacle below.
                if let Some(t) = self.tile_mut(id) {
                    t.remain_move = beyond.y - (pos.y + CELL_SIZE);
                }
                self.schedule_fall_for(id, now);
            }
            Some((ob_id, _)) => {
                // Equal value: chain straight into the next absorption.
                self.start_absorb(id, ob_id);
            }
            None => {}
        }
    }

    /// Apply the position deltas for every still-active axis.
    fn apply_motion(&mut self, id: u32) {
        let Some(tile) = self.tile_mut(id) else { return };
        if tile.falling && (!tile.controlled || !tile.fall_held) {
            tile.pos.y += STEP_PER_FRAME;
            tile.remain_fall -= STEP_PER_FRAME;
        }
        if tile.moving_left {
            tile.pos.x -= STEP_PER_FRAME;
            tile.remain_move -= STEP_PER_FRAME;
        } else if tile.moving_right {
            tile.pos.x += STEP_PER_FRAME;
            tile.remain_move -= STEP_PER_FRAME;
        } else if tile.moving_down {
            if tile.remain_move - STEP_PER_FRAME >= 0 {
                tile.pos.y += STEP_PER_FRAME;
                tile.remain_move -= STEP_PER_FRAME;
            } else {
                // The last frame of a clamped descent can be shorter than a
                // full step; land exactly instead of overshooting.
                tile.pos.y += tile.remain_move;
                tile.remain_move = 0;
            }
        }
    }

    /// Clear axis flags whose remaining distance ran out; a finished forced
    /// descent reschedules the free fall so the player keeps a window for a
    /// horizontal move.
    fn finish_moves(&mut self, id: u32, now: Instant) {
        let mut reschedule = false;
        if let Some(tile) = self.tile_mut(id) {
            if tile.remain_fall <= 0 {
                tile.falling = false;
            }
            if tile.remain_move <= 0 {
                if tile.moving_down {
                    tile.moving_down = false;
                    reschedule = true;
                }
                tile.moving_left = false;
                tile.moving_right = false;
            }
        }
        if reschedule {
            self.schedule_fall_for(id, now);
        }
    }

    /// Once a tile has lost control and finished any horizontal move, check
    /// the loss condition and ask the board for the next tile, exactly once.
    fn maybe_request_spawn(&mut self, id: u32, now: Instant) {
        let Some(tile) = self.tile(id) else { return };
        if tile.controlled || tile.spawn_requested {
            return;
        }
        if tile.moving_left || tile.moving_right {
            return;
        }
        let top = tile.pos.y;
        self.mark_exceeded_if_above(top);
        self.spawn_next(now);
        if let Some(t) = self.tile_mut(id) {
            t.spawn_requested = true;
        }
    }
}
