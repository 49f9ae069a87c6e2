use fitpool::{AllocError, BlockInfo, Pool, Strategy};

/// Check the partition and no-adjacent-holes properties through the public
/// API only.
fn assert_partitioned(pool: &Pool) {
    let blocks: Vec<BlockInfo> = pool.blocks().collect();
    assert_eq!(blocks.first().map(|b| b.offset), Some(0));
    assert_eq!(blocks.last().map(|b| b.end()), Some(pool.total_size()));
    for pair in blocks.windows(2) {
        assert_eq!(pair[0].end(), pair[1].offset, "{:?}", pair);
        assert!(pair[0].allocated || pair[1].allocated, "{:?}", pair);
    }
    assert!(blocks.iter().all(|b| b.size > 0));
    assert_eq!(
        pool.allocated_bytes() + pool.free_bytes(),
        pool.total_size()
    );
    assert_eq!(pool.check_invariants(), Ok(()));
}

#[test]
fn strategy_names() {
    for name in ["best", "worst", "first", "next"] {
        let strategy = Strategy::from_name(name);
        assert!(strategy.is_set());
        assert_eq!(strategy.to_string(), name);
    }
    assert_eq!(Strategy::from_name("random"), Strategy::NotSet);
}

#[test]
fn worst_fit_fails_despite_enough_free_bytes() {
    for strategy in Strategy::ALL {
        let mut pool = Pool::new(strategy, 40);
        let offsets: Vec<_> = (0..4).map(|_| pool.allocate(10).unwrap()).collect();
        pool.free(offsets[0]);
        pool.free(offsets[2]);

        assert_eq!(pool.free_bytes(), 20);
        assert!(pool.largest_free() < 15);
        assert_eq!(
            pool.try_allocate(15),
            Err(AllocError::ExceedsLargestFree {
                requested: 15,
                largest_free: 10
            }),
            "{}",
            strategy
        );
        assert_partitioned(&pool);
    }
}

#[test]
fn churn_keeps_invariants() {
    for strategy in Strategy::ALL {
        let mut pool = Pool::new(strategy, 997);
        let mut live = Vec::new();
        let mut state = 0x12345689u32;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        for _ in 0..5000 {
            if next() % 3 != 0 {
                let len = (next() % 64 + 1) as usize;
                if let Some(offset) = pool.allocate(len) {
                    assert!(pool.is_allocated(offset));
                    live.push(offset);
                }
            } else if !live.is_empty() {
                let i = next() as usize % live.len();
                pool.free(live.swap_remove(i));
            }
            assert_partitioned(&pool);
        }

        for offset in live.drain(..) {
            pool.free(offset);
        }
        assert_eq!(pool.holes(), 1);
        assert_eq!(pool.largest_free(), 997);
    }
}

#[test]
fn independent_pools() {
    let mut a = Pool::new(Strategy::First, 10);
    let mut b = Pool::new(Strategy::Next, 10);
    assert_eq!(a.allocate(4), Some(0));
    assert_eq!(b.allocate(6), Some(0));
    assert_eq!(a.allocated_bytes(), 4);
    assert_eq!(b.allocated_bytes(), 6);
    assert_ne!(a.pool_base(), b.pool_base());
}

#[test]
fn reinit_discards_everything() {
    let mut pool = Pool::new(Strategy::Best, 100);
    for _ in 0..10 {
        pool.allocate(7).unwrap();
    }
    pool.init(Strategy::Best, 100);

    let fresh = Pool::new(Strategy::Best, 100);
    assert_eq!(pool.status(), fresh.status());
    assert_eq!(
        pool.blocks().collect::<Vec<_>>(),
        fresh.blocks().collect::<Vec<_>>()
    );
    assert_partitioned(&pool);
}
