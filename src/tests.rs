extern crate std;

use std::{collections::BTreeMap, ops::Range};

use crate::Pool;

/// An independent model of which byte ranges of a pool are free or used.
pub struct ShadowAllocator {
    regions: BTreeMap<usize, SaRegion>,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SaRegion {
    Free,
    Used,
    Invalid,
}

impl ShadowAllocator {
    pub fn new(pool_size: usize) -> Self {
        let mut this = Self {
            regions: Some((0, SaRegion::Invalid)).into_iter().collect(),
        };
        this.convert_range(0..pool_size, SaRegion::Invalid, SaRegion::Free);
        this
    }

    pub fn convert_range(
        &mut self,
        range: Range<usize>,
        old_region: SaRegion,
        new_region: SaRegion,
    ) {
        if range.len() == 0 {
            return;
        }

        assert_ne!(old_region, new_region);
        log::trace!(
            "sa: converting {:?} from {:?} to {:?}",
            range,
            old_region,
            new_region
        );

        let (&addr, &region) = self.regions.range(0..range.end).rev().next().unwrap();
        if addr > range.start {
            panic!("there's a discontinuity in range {:?}", range);
        } else if region != old_region {
            panic!(
                "range {:?} is {:?} (expected {:?})",
                range, region, old_region
            );
        }

        // Insert an element at `range.start`
        if addr == range.start {
            *self.regions.get_mut(&addr).unwrap() = new_region;
        } else {
            self.regions.insert(range.start, new_region);
        }

        // Each element must represent a discontinuity. If it doesnt't represent
        // a discontinuity, it must be removed.
        if let Some((_, &region)) = self.regions.range(0..range.start).rev().next() {
            if region == new_region {
                self.regions.remove(&range.start);
            }
        }

        if let Some(&end_region) = self.regions.get(&range.end) {
            // Each element must represent a discontinuity. If it doesnt't
            // represent a discontinuity, it must be removed.
            if end_region == new_region {
                self.regions.remove(&range.end);
            }
        } else {
            // Insert an element at `range.end`
            self.regions.insert(range.end, old_region);
        }
    }

    pub fn allocate(&mut self, offset: usize, len: usize) {
        self.convert_range(offset..offset + len, SaRegion::Free, SaRegion::Used);
    }

    pub fn deallocate(&mut self, offset: usize, len: usize) {
        self.convert_range(offset..offset + len, SaRegion::Used, SaRegion::Free);
    }

    /// The region `range` uniformly belongs to, if any.
    pub fn classify(&self, range: Range<usize>) -> Option<SaRegion> {
        let (&addr, &region) = self.regions.range(0..=range.start).rev().next()?;
        debug_assert!(addr <= range.start);
        match self.regions.range(range.start + 1..range.end).next() {
            Some(_) => None,
            None => Some(region),
        }
    }

    /// Panic unless every block of `pool` agrees with this model.
    pub fn assert_agrees_with(&self, pool: &Pool) {
        for block in pool.blocks() {
            let expected = if block.allocated {
                SaRegion::Used
            } else {
                SaRegion::Free
            };

            assert_eq!(
                self.classify(block.offset..block.end()),
                Some(expected),
                "{:?}",
                block
            );
        }
    }
}
