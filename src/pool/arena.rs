//! Index-stable storage of block records forming a doubly linked list in
//! address order.
use alloc::vec::Vec;
use core::ops;

/// The index of a block record in [`Arena`]. Stays valid until the block is
/// unlinked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct BlockIdx(usize);

/// A contiguous range `[offset, offset + size)` of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Block {
    pub offset: usize,
    pub size: usize,
    pub used: bool,
    pub prev: Option<BlockIdx>,
    pub next: Option<BlockIdx>,
}

impl Block {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    #[inline]
    pub fn is_hole(&self) -> bool {
        !self.used
    }
}

#[derive(Debug)]
enum Slot {
    Occupied(Block),
    /// A slot vacated by a merge. Links to the next vacant slot.
    Vacant(Option<BlockIdx>),
}

#[derive(Debug)]
pub(super) struct Arena {
    slots: Vec<Slot>,
    first_vacant: Option<BlockIdx>,
    head: Option<BlockIdx>,
}

impl Arena {
    pub const INIT: Self = Self {
        slots: Vec::new(),
        first_vacant: None,
        head: None,
    };

    /// Drop every block record.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.shrink_to_fit();
        self.first_vacant = None;
        self.head = None;
    }

    #[inline]
    pub fn head(&self) -> Option<BlockIdx> {
        self.head
    }

    /// Make `block` the only element of an empty list.
    pub fn push_only(&mut self, block: Block) -> BlockIdx {
        debug_assert!(self.head.is_none());
        let idx = self.occupy(Block {
            prev: None,
            next: None,
            ..block
        });
        self.head = Some(idx);
        idx
    }

    /// Insert `block` immediately before `at`, preserving all neighbor links.
    pub fn insert_before(&mut self, at: BlockIdx, block: Block) -> BlockIdx {
        let prev = self[at].prev;
        let idx = self.occupy(Block {
            prev,
            next: Some(at),
            ..block
        });

        self[at].prev = Some(idx);
        match prev {
            Some(prev) => self[prev].next = Some(idx),
            None => self.head = Some(idx),
        }

        idx
    }

    /// Remove `idx` from the list and release its slot. Returns the removed
    /// record.
    pub fn unlink(&mut self, idx: BlockIdx) -> Block {
        let Block { prev, next, .. } = self[idx];

        if let Some(next) = next {
            self[next].prev = prev;
        }
        match prev {
            Some(prev) => self[prev].next = next,
            None => self.head = next,
        }

        let slot = core::mem::replace(&mut self.slots[idx.0], Slot::Vacant(self.first_vacant));
        self.first_vacant = Some(idx);
        match slot {
            Slot::Occupied(block) => block,
            Slot::Vacant(_) => unreachable!("unlinked a vacant slot"),
        }
    }

    /// The successor of `idx`, wrapping around to the head at the end of the
    /// list.
    #[inline]
    pub fn next_wrapping(&self, idx: BlockIdx) -> BlockIdx {
        self[idx].next.or(self.head).unwrap_or(idx)
    }

    #[inline]
    pub fn is_live(&self, idx: BlockIdx) -> bool {
        matches!(self.slots.get(idx.0), Some(Slot::Occupied(_)))
    }

    /// The number of live block records, reachable or not.
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Occupied(_)))
            .count()
    }

    /// Iterate over the list in address order.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            arena: self,
            next: self.head(),
        }
    }

    fn occupy(&mut self, block: Block) -> BlockIdx {
        if let Some(idx) = self.first_vacant {
            self.first_vacant = match self.slots[idx.0] {
                Slot::Vacant(next_vacant) => next_vacant,
                Slot::Occupied(_) => unreachable!("vacant chain points to a live slot"),
            };
            self.slots[idx.0] = Slot::Occupied(block);
            idx
        } else {
            self.slots.push(Slot::Occupied(block));
            BlockIdx(self.slots.len() - 1)
        }
    }
}

impl ops::Index<BlockIdx> for Arena {
    type Output = Block;

    #[inline]
    fn index(&self, idx: BlockIdx) -> &Block {
        match &self.slots[idx.0] {
            Slot::Occupied(block) => block,
            Slot::Vacant(_) => panic!("block {:?} is not live", idx),
        }
    }
}

impl ops::IndexMut<BlockIdx> for Arena {
    #[inline]
    fn index_mut(&mut self, idx: BlockIdx) -> &mut Block {
        match &mut self.slots[idx.0] {
            Slot::Occupied(block) => block,
            Slot::Vacant(_) => panic!("block {:?} is not live", idx),
        }
    }
}

#[derive(Clone)]
pub(super) struct Iter<'a> {
    arena: &'a Arena,
    next: Option<BlockIdx>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (BlockIdx, &'a Block);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let block = &self.arena[idx];
        self.next = block.next;
        Some((idx, block))
    }
}
