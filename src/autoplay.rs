//! Heuristic autoplay agent
//!
//! Observes settled tiles through the board's read accessors, plans a target
//! column whenever a fresh tile spawns, and drains the plan one control
//! input at a time as the tile becomes eligible for new commands. The agent
//! never mutates tiles directly; it only emits the same inputs a player
//! would.
//!
//! Strategy: keep filling a small set of columns so equal values end up
//! stacked for bottom-row merges, and chase those merges whenever the
//! controlled tile idles on the floor.

use std::collections::VecDeque;

use thiserror::Error;

use crate::consts::*;
use crate::row_aligned;
use crate::sim::{Board, PlayerMove, Tile};

/// Columns are tried in this order when planning a placement.
const COL_VISIT_ORDER: [usize; 3] = [0, 2, 3];

/// Internal agent fault, surfaced through [`Decision::Error`] so one bad
/// plan never aborts the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AutoplayError {
    #[error("no controlled tile to plan for")]
    MissingControlledTile,
    #[error("tile is ready for a command but the plan is empty")]
    EmptyPlan,
}

/// Agent verdict for one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Apply this input now; confirm with [`Autoplayer::command_taken`].
    Command(PlayerMove),
    /// Nothing to do this step; the tile is not eligible for a new move.
    Idle,
    /// Internal fault; the caller should skip this step without retrying.
    Error(AutoplayError),
}

/// One settled tile as the planner sees it.
#[derive(Debug, Clone, Copy)]
struct ColTile {
    top: i32,
    value: u32,
    merging: bool,
}

/// The autoplay agent. Stateless strategy; the only memory between calls is
/// the pending input queue and which tile it was planned for.
#[derive(Debug)]
pub struct Autoplayer {
    /// Id of the controlled tile the current plan belongs to
    latest_seen: Option<u32>,
    /// Settled tiles per column, sorted bottom-to-top
    columns: Vec<Vec<ColTile>>,
    plan: VecDeque<PlayerMove>,
}

impl Default for Autoplayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Autoplayer {
    pub fn new() -> Self {
        Self {
            latest_seen: None,
            columns: vec![Vec::new(); COLS as usize],
            plan: VecDeque::new(),
        }
    }

    /// Decide the next control input for the current step.
    pub fn next_command(&mut self, board: &Board) -> Decision {
        let Some(latest) = board.latest_tile() else {
            return Decision::Error(AutoplayError::MissingControlledTile);
        };
        if self.latest_seen.is_none() {
            // Very first tile of the session: just drop it where it spawned.
            self.latest_seen = Some(latest.id());
            self.plan.push_back(PlayerMove::Down);
        } else {
            if self.latest_seen != Some(latest.id()) {
                // A new tile spawned: replan from a fresh column snapshot.
                self.latest_seen = Some(latest.id());
                self.plan.clear();
                self.rebuild_columns(board);
                self.plan_placement(latest.value());
            }
            if on_bottom_row(latest) && latest.ready_for_new_move() {
                // Idle on the floor: chase a same-value merge with the
                // bottom tile of column 0, falling back to column 2.
                self.plan.clear();
                self.rebuild_columns(board);
                if !self.plan_bottom_merge(latest, 0) {
                    self.plan_bottom_merge(latest, 2);
                }
            }
        }
        if latest.ready_for_new_move() {
            return match self.plan.front() {
                Some(&mv) => Decision::Command(mv),
                None => Decision::Error(AutoplayError::EmptyPlan),
            };
        }
        Decision::Idle
    }

    /// Confirm that the board accepted the last returned command.
    pub fn command_taken(&mut self) {
        self.plan.pop_front();
    }

    /// Group settled tiles by column, sorted bottom-to-top.
    fn rebuild_columns(&mut self, board: &Board) {
        for col in &mut self.columns {
            col.clear();
        }
        let latest = self.latest_seen;
        let mut tiles: Vec<&Tile> = board
            .tiles()
            .iter()
            .filter(|t| Some(t.id()) != latest)
            .collect();
        tiles.sort_by(|a, b| b.pos().y.cmp(&a.pos().y));
        for tile in tiles {
            let col = crate::col_of(tile.pos().x) as usize;
            if let Some(slot) = self.columns.get_mut(col) {
                slot.push(ColTile {
                    top: tile.pos().y,
                    value: tile.value(),
                    merging: tile.is_merging(),
                });
            }
        }
    }

    /// Pick a column for a tile of `value` and queue the path to it.
    fn plan_placement(&mut self, value: u32) {
        for &col in &COL_VISIT_ORDER {
            if let Some(bottom) = choose_slot(&self.columns[col], value) {
                self.push_column_path(col, bottom);
                return;
            }
        }
        // Nothing qualified: dump it on top of the rightmost column.
        self.push_column_path(3, true);
    }

    /// Fixed input sequences that steer the spawn cell into each column.
    fn push_column_path(&mut self, col: usize, bottom: bool) {
        use PlayerMove::{Down, Right};
        let path: &[PlayerMove] = match (col, bottom) {
            (3, _) => &[Right, Right, Right, Down],
            (0, true) | (2, true) => &[Right, Down],
            (0, false) => &[Down],
            (2, false) => &[Right, Right, Down],
            _ => &[],
        };
        self.plan.extend(path.iter().copied());
    }

    /// Queue horizontal moves toward the bottom tile of `col` when its value
    /// matches. Returns true when commands were queued.
    fn plan_bottom_merge(&mut self, latest: &Tile, col: usize) -> bool {
        let Some(tile) = self.settled_tile_at(col, 0) else {
            return false;
        };
        if tile.merging || tile.value != latest.value() {
            return false;
        }
        let target_left = SPAWN_LEFT + (col as i32) * CELL_SIZE;
        let dist = latest.pos().x - target_left;
        let steps = (dist / CELL_SIZE).unsigned_abs();
        if steps == 0 {
            return false;
        }
        let mv = if dist > 0 {
            PlayerMove::Left
        } else {
            PlayerMove::Right
        };
        for _ in 0..steps {
            self.plan.push_back(mv);
        }
        true
    }

    /// Settled tile at (col, row) with row 0 at the floor, if any.
    fn settled_tile_at(&self, col: usize, row: i32) -> Option<ColTile> {
        let target_top = LOWER_BOUNDARY - (row + 1) * CELL_SIZE;
        for tile in self.columns.get(col)? {
            if tile.top == target_top {
                return Some(*tile);
            }
            if tile.top < target_top {
                // Sorted bottom-to-top: we passed above the slot.
                return None;
            }
        }
        None
    }
}

/// Column acceptance rule. `Some(bottom)` accepts the column, with `bottom`
/// telling whether the tile is meant to land on the column's lowest tile
/// for an eventual bottom merge.
fn choose_slot(column: &[ColTile], value: u32) -> Option<bool> {
    let Some(lowest) = column.first() else {
        // Empty column: place at the bottom.
        return Some(false);
    };
    if lowest.value == value {
        // Stack onto the matching lowest tile for a bottom merge.
        return Some(true);
    }
    if column.len() == 1 {
        return Some(false);
    }
    let top = column[column.len() - 1];
    if top.value >= value {
        // A column full to its second-highest row with a mismatched top
        // cannot take another tile.
        if column.len() == (ROWS - 1) as usize && top.value != value {
            return None;
        }
        return Some(false);
    }
    None
}

/// True when the tile rests on the floor row.
fn on_bottom_row(tile: &Tile) -> bool {
    crate::row_from_bottom(tile.pos().y) == 0 && row_aligned(tile.pos().y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Mode;
    use glam::IVec2;
    use std::time::Instant;

    fn settled(value: u32, row: i32) -> ColTile {
        ColTile {
            top: LOWER_BOUNDARY - (row + 1) * CELL_SIZE,
            value,
            merging: false,
        }
    }

    #[test]
    fn equal_value_bottom_match_beats_empty_column() {
        // col0 holds a 2, col2 holds a 4, the rest are empty; an incoming 2
        // must pick column 0 for the bottom merge
        let mut agent = Autoplayer::new();
        agent.columns[0] = vec![settled(2, 0)];
        agent.columns[2] = vec![settled(4, 0)];
        agent.plan_placement(2);
        assert_eq!(
            agent.plan,
            [PlayerMove::Right, PlayerMove::Down],
            "column 0 bottom slot"
        );
    }

    #[test]
    fn empty_first_column_takes_a_plain_drop() {
        let mut agent = Autoplayer::new();
        agent.plan_placement(4);
        assert_eq!(agent.plan, [PlayerMove::Down]);
    }

    #[test]
    fn single_mismatched_tile_still_accepts_a_stack() {
        let mut agent = Autoplayer::new();
        agent.columns[0] = vec![settled(8, 0)];
        agent.plan_placement(2);
        assert_eq!(agent.plan, [PlayerMove::Down]);
    }

    #[test]
    fn rejected_columns_fall_back_to_the_rightmost() {
        let mut agent = Autoplayer::new();
        // col0 and col2 are full with mismatched tops, col3 descends toward
        // a small top value; nothing qualifies for an incoming 4
        agent.columns[0] = vec![settled(8, 0), settled(16, 1), settled(32, 2), settled(64, 3)];
        agent.columns[2] = vec![settled(8, 0), settled(16, 1), settled(32, 2), settled(64, 3)];
        agent.columns[3] = vec![settled(8, 0), settled(2, 1)];
        agent.plan_placement(4);
        assert_eq!(
            agent.plan,
            [
                PlayerMove::Right,
                PlayerMove::Right,
                PlayerMove::Right,
                PlayerMove::Down
            ]
        );
    }

    #[test]
    fn ordered_column_takes_the_tile_on_top() {
        let mut agent = Autoplayer::new();
        agent.columns[0] = vec![settled(16, 0), settled(8, 1)];
        agent.plan_placement(4);
        // top value 8 >= 4 and the column is not full: stack on top
        assert_eq!(agent.plan, [PlayerMove::Down]);
    }

    #[test]
    fn bottom_merge_queues_moves_toward_the_match() {
        let mut agent = Autoplayer::new();
        agent.columns[2] = vec![settled(2, 0)];
        // controlled tile idling at the bottom of column 0
        let tile = Tile::new(
            9,
            2,
            IVec2::new(SPAWN_LEFT, LOWER_BOUNDARY - CELL_SIZE),
        );
        assert!(agent.plan_bottom_merge(&tile, 2));
        assert_eq!(agent.plan, [PlayerMove::Right, PlayerMove::Right]);
    }

    #[test]
    fn bottom_merge_skips_mismatches_and_merging_tiles() {
        let mut agent = Autoplayer::new();
        agent.columns[0] = vec![settled(4, 0)];
        let tile = Tile::new(
            9,
            2,
            IVec2::new(SPAWN_LEFT + 2 * CELL_SIZE, LOWER_BOUNDARY - CELL_SIZE),
        );
        assert!(!agent.plan_bottom_merge(&tile, 0));
        let mut busy = settled(2, 0);
        busy.merging = true;
        agent.columns[0] = vec![busy];
        assert!(!agent.plan_bottom_merge(&tile, 0));
        assert!(agent.plan.is_empty());
    }

    #[test]
    fn first_call_drops_the_opening_tile() {
        let t0 = Instant::now();
        let mut board = Board::new(Mode::Easy, 3, t0);
        let mut agent = Autoplayer::new();
        match agent.next_command(&board) {
            Decision::Command(PlayerMove::Down) => {}
            other => panic!("expected an opening Down, got {other:?}"),
        }
        assert!(board.apply_move(PlayerMove::Down));
        agent.command_taken();
        // mid-descent the agent has nothing to add
        board.update(t0);
        assert_eq!(agent.next_command(&board), Decision::Idle);
    }
}
