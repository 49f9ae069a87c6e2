//! Human-readable summaries of a pool
use core::fmt;

use crate::Pool;

/// A snapshot of a pool's aggregate statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolStatus {
    pub allocated: usize,
    pub total: usize,
    pub free: usize,
    pub holes: usize,
    pub largest_free: usize,
}

impl PoolStatus {
    /// The mean size of a hole, or `0.0` if there are no holes.
    pub fn average_hole_size(&self) -> f64 {
        if self.holes == 0 {
            0.0
        } else {
            self.free as f64 / self.holes as f64
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} out of {} bytes allocated.",
            self.allocated, self.total
        )?;
        writeln!(
            f,
            "{} bytes are free in {} holes; maximum allocatable block is {} bytes.",
            self.free, self.holes, self.largest_free
        )?;
        writeln!(f, "Average hole size is {:.6}.", self.average_hole_size())
    }
}

/// Displays every block of a pool, one per line.
pub struct MemoryMap<'a>(&'a Pool);

impl fmt::Display for MemoryMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.0.blocks() {
            writeln!(
                f,
                "Allocated: {}\tSize: {}\tOffset: {}",
                block.allocated, block.size, block.offset
            )?;
        }
        Ok(())
    }
}

impl Pool {
    /// Take a [`PoolStatus`] snapshot.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            allocated: self.allocated_bytes(),
            total: self.total_size(),
            free: self.free_bytes(),
            holes: self.holes(),
            largest_free: self.largest_free(),
        }
    }

    /// Get a [`Display`](fmt::Display) adapter listing every block.
    #[inline]
    pub fn memory_map(&self) -> MemoryMap<'_> {
        MemoryMap(self)
    }
}
