//! The pool allocator core
use alloc::boxed::Box;
use core::{fmt, iter::FusedIterator, mem::MaybeUninit, ptr::NonNull};

use crate::{AllocError, FreeError, InvariantViolation, Strategy};

mod arena;
mod fit;
use self::arena::{Arena, Block, BlockIdx};

#[doc = svgbobdoc::transform!(
/// A fixed-capacity byte pool and its placement strategy.
///
/// # Data Structure Overview
///
/// <center>
/// ```svgbob
///   head                                                  cursor
///    |                                                      |
///    v                                                      v
///  ,-------------,     ,------------------,     ,----------------------,
///  | offset 0    |<--->| offset 10        |<--->| offset 11            |
///  | size 10     |     | size 1           |     | size 89              |
///  | free        |     | used             |     | free                 |
///  '-------------'     '------------------'     '----------------------'
///  |<--- hole -->|<------ allocation ---->|<--------- hole ----------->|
///  0             10                       11                           100
/// ```
/// </center>
///
/// The blocks partition the pool: they are sorted by offset, the first one
/// starts at `0`, each one ends where the next one starts, and the last one
/// ends at [`Self::total_size`]. No two adjacent blocks are both free.
///
/// # States
///
/// A pool starts out uninitialized ([`Self::INIT`]). [`Self::init`] makes it
/// ready, and can be called again to reset it. Every other operation panics
/// on an uninitialized pool.
)]
pub struct Pool {
    strategy: Strategy,
    storage: Option<Box<[MaybeUninit<u8>]>>,
    blocks: Arena,
    /// The most recently allocated block. Next-fit starts its search after
    /// it. Always live while the pool is ready.
    cursor: Option<BlockIdx>,
}

impl Default for Pool {
    fn default() -> Self {
        Self::INIT
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("strategy", &self.strategy)
            .field("size", &self.storage.as_ref().map(|s| s.len()))
            .field("blocks", &DebugBlocks(self))
            .finish()
    }
}

/// Helper for `<Pool as Debug>::fmt`.
struct DebugBlocks<'a>(&'a Pool);

impl fmt::Debug for DebugBlocks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.blocks_unchecked()).finish()
    }
}

impl Pool {
    /// An uninitialized pool.
    pub const INIT: Self = Self {
        strategy: Strategy::NotSet,
        storage: None,
        blocks: Arena::INIT,
        cursor: None,
    };

    /// Construct a ready pool. Equivalent to [`Self::INIT`] followed by
    /// [`Self::init`].
    ///
    /// # Panics
    ///
    /// This method panics if `size` is zero.
    pub fn new(strategy: Strategy, size: usize) -> Self {
        let mut pool = Self::INIT;
        pool.init(strategy, size);
        pool
    }

    /// Discard every block and the pool storage, then start over with a
    /// single hole spanning `size` fresh bytes.
    ///
    /// All offsets returned so far become invalid.
    ///
    /// # Panics
    ///
    /// This method panics if `size` is zero.
    pub fn init(&mut self, strategy: Strategy, size: usize) {
        assert!(size > 0, "pool size must not be zero");

        // Release the previous generation before reserving the next one
        self.blocks.clear();
        self.cursor = None;
        self.storage = None;

        self.storage = Some(Box::new_uninit_slice(size));
        self.strategy = strategy;

        let whole = self.blocks.push_only(Block {
            offset: 0,
            size,
            used: false,
            prev: None,
            next: None,
        });
        self.cursor = Some(whole);

        log::debug!("init: {} bytes, strategy {}", size, strategy);
    }

    /// Get a flag indicating whether [`Self::init`] has been called.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.storage.is_some()
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Change the placement strategy without touching any block.
    #[inline]
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    #[inline]
    #[track_caller]
    fn assert_ready(&self) {
        assert!(self.is_ready(), "pool is not initialized");
    }

    /// Attempt to allocate `requested` bytes.
    ///
    /// Returns the offset of the allocated range on success; `None` otherwise.
    /// See [`Self::try_allocate`] for the reasons an allocation can fail.
    ///
    /// # Panics
    ///
    /// This method panics if `requested` is zero or the pool is not
    /// initialized.
    #[inline]
    pub fn allocate(&mut self, requested: usize) -> Option<usize> {
        self.try_allocate(requested).ok()
    }

    /// Attempt to allocate `requested` bytes, reporting why it failed if it
    /// does.
    ///
    /// # Panics
    ///
    /// This method panics if `requested` is zero or the pool is not
    /// initialized.
    pub fn try_allocate(&mut self, requested: usize) -> Result<usize, AllocError> {
        self.assert_ready();
        assert!(requested > 0, "allocation size must not be zero");

        if !self.strategy.is_set() {
            log::debug!("allocate({}): no strategy", requested);
            return Err(AllocError::StrategyNotSet);
        }

        // Nothing can fit; don't bother searching
        let largest_free = self.largest_free();
        if requested > largest_free {
            log::debug!(
                "allocate({}): exceeds the largest hole ({})",
                requested,
                largest_free
            );
            return Err(AllocError::ExceedsLargestFree {
                requested,
                largest_free,
            });
        }

        let candidate = match self.strategy {
            Strategy::First => self.first_fit(requested),
            Strategy::Best => self.best_fit(requested),
            Strategy::Worst => self.worst_fit(requested),
            Strategy::Next => self.next_fit(requested),
            Strategy::NotSet => None,
        };

        match candidate {
            Some(hole) => Ok(self.place(hole, requested)),
            None => {
                log::debug!("allocate({}): {} found no hole", requested, self.strategy);
                Err(AllocError::NoFit { requested })
            }
        }
    }

    /// Carve `requested` bytes out of the start of `hole`. Returns the offset
    /// of the allocation.
    fn place(&mut self, hole: BlockIdx, requested: usize) -> usize {
        let block = &mut self.blocks[hole];
        debug_assert!(block.is_hole());
        debug_assert!(block.size >= requested);

        let offset = block.offset;
        let allocated = if block.size == requested {
            // The allocation completely fills this hole
            block.used = true;
            hole
        } else {
            // Shrink the hole from the front and put the allocation in the
            // vacated prefix
            block.offset += requested;
            block.size -= requested;
            log::trace!(
                "split {}..{} at {}",
                offset,
                block.end(),
                offset + requested
            );
            self.blocks.insert_before(
                hole,
                Block {
                    offset,
                    size: requested,
                    used: true,
                    prev: None,
                    next: None,
                },
            )
        };

        self.cursor = Some(allocated);
        offset
    }

    /// Deallocate the block starting at `offset`.
    ///
    /// Does nothing if no allocated block starts at `offset`.
    ///
    /// # Panics
    ///
    /// This method panics if the pool is not initialized.
    #[inline]
    pub fn free(&mut self, offset: usize) {
        if let Err(e) = self.try_free(offset) {
            log::debug!("free({}): ignored: {}", offset, e);
        }
    }

    /// Deallocate the block starting at `offset` and coalesce it with
    /// neighboring holes.
    ///
    /// Returns the number of bytes released. Nothing is modified on failure.
    ///
    /// # Panics
    ///
    /// This method panics if the pool is not initialized.
    pub fn try_free(&mut self, offset: usize) -> Result<usize, FreeError> {
        self.assert_ready();

        let idx = self
            .find_block(offset)
            .ok_or(FreeError::UnknownOffset { offset })?;

        let block = &mut self.blocks[idx];
        if !block.used {
            return Err(FreeError::NotAllocated { offset });
        }
        block.used = false;
        let released = block.size;

        // Merge with the previous block if it's a hole. The predecessor
        // survives.
        let mut survivor = idx;
        if let Some(prev) = self.blocks[idx].prev {
            if self.blocks[prev].is_hole() {
                self.absorb_next(prev);
                survivor = prev;
            }
        }

        // Merge with the next block if it's a hole
        if let Some(next) = self.blocks[survivor].next {
            if self.blocks[next].is_hole() {
                self.absorb_next(survivor);
            }
        }

        Ok(released)
    }

    /// Merge the successor of `idx` into `idx`, destroying the successor.
    fn absorb_next(&mut self, idx: BlockIdx) {
        let Some(victim) = self.blocks[idx].next else {
            unreachable!("absorb_next on the last block");
        };
        let removed = self.blocks.unlink(victim);
        let block = &mut self.blocks[idx];
        block.size += removed.size;
        log::trace!(
            "merge {}..{} into {}..{}",
            removed.offset,
            removed.end(),
            block.offset,
            block.end()
        );

        // Never leave the cursor dangling
        if self.cursor == Some(victim) {
            log::trace!("cursor moves to {}", block.offset);
            self.cursor = Some(idx);
        }
    }

    /// Find the block starting exactly at `offset`.
    fn find_block(&self, offset: usize) -> Option<BlockIdx> {
        self.blocks
            .iter()
            .take_while(|(_, block)| block.offset <= offset)
            .find(|(_, block)| block.offset == offset)
            .map(|(idx, _)| idx)
    }

    /// Get the number of holes (free blocks).
    pub fn holes(&self) -> usize {
        self.assert_ready();
        self.blocks.iter().filter(|(_, b)| b.is_hole()).count()
    }

    /// Get the number of allocated bytes.
    pub fn allocated_bytes(&self) -> usize {
        self.assert_ready();
        self.blocks
            .iter()
            .filter(|(_, b)| b.used)
            .map(|(_, b)| b.size)
            .sum()
    }

    /// Get the number of unallocated bytes. Always equal to
    /// `total_size() - allocated_bytes()`.
    #[inline]
    pub fn free_bytes(&self) -> usize {
        self.total_size() - self.allocated_bytes()
    }

    /// Get the size of the largest hole, or `0` if there is none.
    pub fn largest_free(&self) -> usize {
        self.assert_ready();
        self.blocks
            .iter()
            .filter(|(_, b)| b.is_hole())
            .map(|(_, b)| b.size)
            .max()
            .unwrap_or(0)
    }

    /// Get the number of holes no larger than `threshold` bytes.
    pub fn small_free_count(&self, threshold: usize) -> usize {
        self.assert_ready();
        self.blocks
            .iter()
            .filter(|(_, b)| b.is_hole() && b.size <= threshold)
            .count()
    }

    /// Get a flag indicating whether an allocated block starts exactly at
    /// `offset`.
    pub fn is_allocated(&self, offset: usize) -> bool {
        self.assert_ready();
        self.find_block(offset)
            .map_or(false, |idx| self.blocks[idx].used)
    }

    /// Get the capacity of the pool in bytes.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.storage().len()
    }

    /// Get a pointer to the start of the pool storage. Offsets returned by
    /// [`Self::allocate`] are relative to this.
    ///
    /// The storage is uninitialized; the allocator never reads or writes it.
    #[inline]
    pub fn pool_base(&self) -> NonNull<u8> {
        NonNull::from(self.storage()).cast()
    }

    #[inline]
    #[track_caller]
    fn storage(&self) -> &[MaybeUninit<u8>] {
        match &self.storage {
            Some(storage) => storage,
            None => panic!("pool is not initialized"),
        }
    }

    /// Iterate over every block in address order.
    ///
    /// # Panics
    ///
    /// This method panics if the pool is not initialized.
    pub fn blocks(&self) -> Blocks<'_> {
        self.assert_ready();
        self.blocks_unchecked()
    }

    fn blocks_unchecked(&self) -> Blocks<'_> {
        Blocks {
            inner: self.blocks.iter(),
        }
    }

    /// Verify the structural invariants of the block list.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if !self.is_ready() {
            return Err(InvariantViolation::Uninitialized);
        }

        let mut expected_offset = 0;
        let mut prev: Option<(BlockIdx, &Block)> = None;
        let mut visited = 0;

        for (idx, block) in self.blocks.iter() {
            if block.size == 0 {
                return Err(InvariantViolation::EmptyBlock {
                    offset: block.offset,
                });
            }
            if block.offset != expected_offset {
                return Err(InvariantViolation::Discontinuity {
                    expected: expected_offset,
                    found: block.offset,
                });
            }
            if block.prev != prev.map(|(idx, _)| idx) {
                return Err(InvariantViolation::BrokenLink {
                    offset: block.offset,
                });
            }
            if let Some((_, prev)) = prev {
                if prev.is_hole() && block.is_hole() {
                    return Err(InvariantViolation::AdjacentHoles {
                        first: prev.offset,
                        second: block.offset,
                    });
                }
            }

            expected_offset = block.end();
            prev = Some((idx, block));
            visited += 1;
        }

        if expected_offset != self.total_size() {
            return Err(InvariantViolation::Coverage {
                covered: expected_offset,
                total: self.total_size(),
            });
        }

        let unreachable = self.blocks.live_count() - visited;
        if unreachable != 0 {
            return Err(InvariantViolation::Unreachable { count: unreachable });
        }

        match self.cursor {
            Some(cursor) if self.blocks.is_live(cursor) => Ok(()),
            _ => Err(InvariantViolation::DanglingCursor),
        }
    }
}

/// A copy of a block's description. Returned by [`Pool::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    pub offset: usize,
    pub size: usize,
    pub allocated: bool,
}

impl BlockInfo {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// An iterator over the blocks of a [`Pool`] in address order.
#[derive(Clone)]
pub struct Blocks<'a> {
    inner: arena::Iter<'a>,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    #[inline]
    fn next(&mut self) -> Option<BlockInfo> {
        self.inner.next().map(|(_, block)| BlockInfo {
            offset: block.offset,
            size: block.size,
            allocated: block.used,
        })
    }
}

impl FusedIterator for Blocks<'_> {}
