//! Hole selection for each placement strategy.
//!
//! Every search is a pure query over the block list. Each returns a hole of at
//! least `requested` bytes or `None`.
use super::{arena::BlockIdx, Pool};

impl Pool {
    /// The lowest-addressed hole that fits.
    pub(super) fn first_fit(&self, requested: usize) -> Option<BlockIdx> {
        self.blocks
            .iter()
            .find(|(_, block)| block.is_hole() && block.size >= requested)
            .map(|(idx, _)| idx)
    }

    /// The hole minimizing `size - requested`. The lowest address wins a tie.
    pub(super) fn best_fit(&self, requested: usize) -> Option<BlockIdx> {
        let mut best: Option<(BlockIdx, usize)> = None;
        for (idx, block) in self.blocks.iter() {
            if !block.is_hole() || block.size < requested {
                continue;
            }
            let slack = block.size - requested;
            if best.map_or(true, |(_, best_slack)| slack < best_slack) {
                best = Some((idx, slack));
                if slack == 0 {
                    break;
                }
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// The largest hole, provided that it fits. Smaller holes are never
    /// considered, even if they would fit. The lowest address wins a tie.
    pub(super) fn worst_fit(&self, requested: usize) -> Option<BlockIdx> {
        let mut largest: Option<(BlockIdx, usize)> = None;
        for (idx, block) in self.blocks.iter() {
            if block.is_hole() && largest.map_or(true, |(_, size)| block.size > size) {
                largest = Some((idx, block.size));
            }
        }
        largest
            .filter(|&(_, size)| size >= requested)
            .map(|(idx, _)| idx)
    }

    /// The first hole that fits, scanning circularly from the block after the
    /// cursor. Every block is visited at most once.
    pub(super) fn next_fit(&self, requested: usize) -> Option<BlockIdx> {
        let start = self.blocks.next_wrapping(self.cursor?);
        let mut current = start;
        loop {
            let block = &self.blocks[current];
            if block.is_hole() && block.size >= requested {
                return Some(current);
            }

            current = self.blocks.next_wrapping(current);
            if current == start {
                return None;
            }
        }
    }
}
