//! The named checks run by `mem test`
use anyhow::{ensure, Context};
use fitpool::{stress, Pool, Strategy};
use std::path::PathBuf;

use crate::runner::TestEntry;

/// What every check gets to see.
#[derive(Debug, Clone)]
pub struct TestContext {
    /// Restricts checks to one strategy. [`Strategy::NotSet`] means all.
    pub strategy: Strategy,
    /// Where the stress check writes its statistics.
    pub log_path: PathBuf,
}

impl TestContext {
    fn strategies(&self) -> &'static [Strategy] {
        self.strategy.selection()
    }
}

pub const TESTS: &[TestEntry] = &[
    TestEntry {
        name: "alloc1",
        suite: "suite1",
        run: sequential_single_bytes,
    },
    TestEntry {
        name: "alloc2",
        suite: "suite2",
        run: alloc_alloc_free_alloc,
    },
    TestEntry {
        name: "alloc3",
        suite: "suite1",
        run: alternating_free,
    },
    TestEntry {
        name: "alloc4",
        suite: "suite2",
        run: alternating_refill,
    },
    TestEntry {
        name: "stress",
        suite: "suite3",
        run: stress_suite,
    },
];

fn fill_sequentially(pool: &mut Pool, strategy: Strategy) -> anyhow::Result<()> {
    for i in 0..pool.total_size() {
        let offset = pool.allocate(1);
        ensure!(
            offset == Some(i),
            "Allocation with {} was not sequential at {}; expected {}, actual {:?}",
            strategy,
            i,
            i,
            offset
        );
    }
    Ok(())
}

fn expect_totals(
    pool: &Pool,
    strategy: Strategy,
    holes: usize,
    allocated: usize,
    largest_free: usize,
) -> anyhow::Result<()> {
    ensure!(
        pool.holes() == holes,
        "Holes counted as {}, should be {} with {}",
        pool.holes(),
        holes,
        strategy
    );
    ensure!(
        pool.allocated_bytes() == allocated,
        "Allocated memory reported as {}, should be {} with {}",
        pool.allocated_bytes(),
        allocated,
        strategy
    );
    ensure!(
        pool.largest_free() == largest_free,
        "Largest free block reported as {}, should be {} with {}",
        pool.largest_free(),
        largest_free,
        strategy
    );
    Ok(())
}

/// Single-byte allocations fill the pool front to back.
fn sequential_single_bytes(ctx: &TestContext) -> anyhow::Result<()> {
    for &strategy in ctx.strategies() {
        let mut pool = Pool::new(strategy, 100);
        fill_sequentially(&mut pool, strategy)?;
        expect_totals(&pool, strategy, 0, 100, 0)?;
    }
    Ok(())
}

/// Allocate, allocate, free, allocate: where the third allocation lands
/// depends on the strategy.
fn alloc_alloc_free_alloc(ctx: &TestContext) -> anyhow::Result<()> {
    for &strategy in ctx.strategies() {
        let mut pool = Pool::new(strategy, 100);

        let first = pool.try_allocate(10)?;
        let second = pool.try_allocate(1)?;
        pool.free(first);
        let third = pool.try_allocate(1)?;

        ensure!(
            second == first + 10,
            "Second allocation failed; allocated at incorrect offset with strategy {}",
            strategy
        );

        let reuses_first_hole = matches!(strategy, Strategy::First | Strategy::Best);
        let (expected_third, largest_free) = if reuses_first_hole {
            (first, 89)
        } else {
            (second + 1, 88)
        };
        ensure!(
            third == expected_third,
            "Third allocation failed; allocated at {} instead of {} with {}",
            third,
            expected_third,
            strategy
        );

        let small = usize::from(reuses_first_hole);
        ensure!(
            pool.small_free_count(9) == small,
            "Small holes counted as {}, should be {} with {}",
            pool.small_free_count(9),
            small,
            strategy
        );

        expect_totals(&pool, strategy, 2, 2, largest_free)?;
    }
    Ok(())
}

/// Free every other byte of a full pool.
fn alternating_free(ctx: &TestContext) -> anyhow::Result<()> {
    for &strategy in ctx.strategies() {
        let mut pool = Pool::new(strategy, 100);
        fill_sequentially(&mut pool, strategy)?;

        for offset in (1..100).step_by(2) {
            pool.free(offset);
        }
        expect_totals(&pool, strategy, 50, 50, 1)?;

        for offset in 0..100 {
            let expected = offset % 2 == 0;
            ensure!(
                pool.is_allocated(offset) == expected,
                "Byte {} in memory claims to {}be allocated with {}",
                offset,
                if expected { "not " } else { "" },
                strategy
            );
        }
    }
    Ok(())
}

/// Free every other byte of a full pool, then fill the gaps again.
fn alternating_refill(ctx: &TestContext) -> anyhow::Result<()> {
    for &strategy in ctx.strategies() {
        let mut pool = Pool::new(strategy, 100);
        fill_sequentially(&mut pool, strategy)?;

        for offset in (1..100).step_by(2) {
            pool.free(offset);
        }

        for expected in (1..100).step_by(2) {
            let offset = pool.allocate(1);
            ensure!(
                offset == Some(expected),
                "Second allocation with {} was not sequential; expected {}, actual {:?}",
                strategy,
                expected,
                offset
            );
        }

        expect_totals(&pool, strategy, 0, 100, 0)?;
    }
    Ok(())
}

/// The randomized stress suite. Passes as long as nothing breaks.
fn stress_suite(ctx: &TestContext) -> anyhow::Result<()> {
    stress::run_standard_suite(ctx.strategy, &ctx.log_path)
        .with_context(|| format!("writing {}", ctx.log_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(strategy: Strategy) -> TestContext {
        TestContext {
            strategy,
            log_path: std::env::temp_dir().join("fitpool-checks-unused.log"),
        }
    }

    #[test]
    fn allocation_checks_pass_for_every_strategy() {
        let _ = env_logger::builder().is_test(true).try_init();

        for entry in TESTS.iter().filter(|e| e.name != "stress") {
            (entry.run)(&ctx(Strategy::NotSet))
                .unwrap_or_else(|e| panic!("{}: {:#}", entry.name, e));
            for strategy in Strategy::ALL {
                (entry.run)(&ctx(strategy))
                    .unwrap_or_else(|e| panic!("{} ({}): {:#}", entry.name, strategy, e));
            }
        }
    }

    #[test]
    fn strategy_restriction() {
        assert_eq!(ctx(Strategy::Worst).strategies(), [Strategy::Worst]);
        assert_eq!(ctx(Strategy::NotSet).strategies(), Strategy::ALL);
    }

    #[test]
    fn unique_names() {
        let mut names: Vec<_> = TESTS.iter().map(|e| e.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TESTS.len());
    }
}
