//! Frame loop
//!
//! One external driver calls [`Board::update`] at a fixed target rate. All
//! tile updates within a frame run sequentially in the order produced by
//! [`Board::frame_order`]; a tile only ever observes fully-updated peers
//! from earlier in the ordering. That dependency is load-bearing: it is what
//! makes merge priority and one-pass cascades work.

use std::time::Instant;

use crate::sim::state::{Board, Tile};

impl Board {
    /// Update order for this frame: the latest tile strictly first (it has
    /// merge priority when three equal tiles could combine at once), then
    /// the rest bottom-to-top so a falling stack cascades in a single pass.
    pub(crate) fn frame_order(&self) -> Vec<u32> {
        let mut order = Vec::with_capacity(self.tiles.len());
        if self.tile(self.latest).is_some() {
            order.push(self.latest);
        }
        let mut rest: Vec<&Tile> = self
            .tiles
            .iter()
            .filter(|t| t.id != self.latest)
            .collect();
        rest.sort_by(|a, b| b.pos.y.cmp(&a.pos.y));
        order.extend(rest.iter().map(|t| t.id));
        order
    }

    /// Advance the whole board by one frame. A paused board does not change.
    pub fn update(&mut self, now: Instant) {
        if self.is_paused() {
            return;
        }
        for id in self.frame_order() {
            // An absorption resolved earlier in the frame may have removed a
            // tile scheduled later in the order.
            if self.tile(id).is_none() {
                continue;
            }
            self.advance_tile(id, now);
        }
        self.frame_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::Mode;

    #[test]
    fn latest_tile_updates_first_then_bottom_to_top() {
        let t0 = Instant::now();
        let mut board = Board::new(Mode::Easy, 7, t0);
        let high = board.place_settled(4, 1, 2);
        let low = board.place_settled(8, 1, 0);
        let mid = board.place_settled(16, 1, 1);
        let latest = board.latest_tile().expect("controlled tile").id();

        let order = board.frame_order();
        assert_eq!(order, vec![latest, low, mid, high]);
    }

    #[test]
    fn frame_counter_advances_once_per_update() {
        let t0 = Instant::now();
        let mut board = Board::new(Mode::Easy, 7, t0);
        for _ in 0..3 {
            board.update(t0);
        }
        assert_eq!(board.frame_count(), 3);
    }
}
