//! Randomized stress driver
//!
//! Repeatedly allocates and frees random-sized blocks and records how
//! fragmented the pool gets under each strategy.
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::Path,
    time::{Duration, Instant},
    vec::Vec,
};

use crate::{Pool, Strategy};

/// The parameters of a randomized run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressConfig {
    /// The strategy to exercise. [`Strategy::NotSet`] exercises all of them.
    pub strategy: Strategy,
    pub total_size: usize,
    /// A block is freed once the allocated bytes reach this fraction of
    /// `total_size`; otherwise a new block is allocated.
    pub fill_ratio: f64,
    /// Block sizes are uniformly distributed in
    /// `min_block_size..=max_block_size`.
    pub min_block_size: usize,
    pub max_block_size: usize,
    pub iterations: usize,
    /// Seeds the generator for every strategy. Taken from the OS if `None`.
    pub seed: Option<u64>,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::standard(Strategy::NotSet, STANDARD_RUNS[0])
    }
}

/// `(fill_ratio, min_block_size, max_block_size)` of every run of the
/// standard suite. Each uses a 10000-byte pool and 10000 iterations.
pub const STANDARD_RUNS: [(f64, usize, usize); 17] = [
    (0.25, 1, 1000),
    (0.25, 1, 2000),
    (0.25, 1000, 2000),
    (0.25, 1, 3000),
    (0.25, 1, 4000),
    (0.25, 1, 5000),
    (0.5, 1, 1000),
    (0.5, 1, 2000),
    (0.5, 1000, 2000),
    (0.5, 1, 3000),
    (0.5, 1, 4000),
    (0.5, 1, 5000),
    // Every block is the same size, so a freed block is always reusable
    (0.5, 1000, 1000),
    (0.75, 1, 1000),
    (0.75, 500, 1000),
    (0.75, 1, 2000),
    (0.9, 1, 500),
];

impl StressConfig {
    /// A run of the standard suite.
    pub const fn standard(
        strategy: Strategy,
        (fill_ratio, min_block_size, max_block_size): (f64, usize, usize),
    ) -> Self {
        Self {
            strategy,
            total_size: 10000,
            fill_ratio,
            min_block_size,
            max_block_size,
            iterations: 10000,
            seed: None,
        }
    }

    /// The strategies this run exercises.
    #[inline]
    pub fn strategies(&self) -> &'static [Strategy] {
        self.strategy.selection()
    }

    /// The largest hole counted as "small".
    #[inline]
    pub fn small_block_size(&self) -> usize {
        self.max_block_size / 10
    }

    #[track_caller]
    fn validate(&self) {
        assert!(self.total_size > 0, "pool size must not be zero");
        assert!(self.min_block_size > 0, "block size must not be zero");
        assert!(
            self.min_block_size <= self.max_block_size,
            "empty block size range {}..={}",
            self.min_block_size,
            self.max_block_size
        );
        assert!(
            (0.0..=1.0).contains(&self.fill_ratio),
            "fill ratio {} is out of range",
            self.fill_ratio
        );
    }
}

impl fmt::Display for StressConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pool size == {}, fill ratio == {:.6}, block size is from {} to {}, {} iterations",
            self.total_size,
            self.fill_ratio,
            self.min_block_size,
            self.max_block_size,
            self.iterations
        )
    }
}

/// Averages collected over one strategy's run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressReport {
    pub strategy: Strategy,
    pub elapsed: Duration,
    pub avg_hole_size: f64,
    pub avg_largest_free: f64,
    pub avg_allocated: f64,
    pub avg_small_blocks: f64,
    pub failed_allocations: usize,
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\t=== {} ===", self.strategy)?;
        writeln!(
            f,
            "\tTest took {:.2}ms.",
            self.elapsed.as_secs_f64() * 1000.0
        )?;
        writeln!(f, "\tAverage hole size: {:.6}", self.avg_hole_size)?;
        writeln!(
            f,
            "\tAverage largest free block: {:.6}",
            self.avg_largest_free
        )?;
        writeln!(f, "\tAverage allocated bytes: {:.6}", self.avg_allocated)?;
        writeln!(
            f,
            "\tAverage number of small blocks: {:.6}",
            self.avg_small_blocks
        )?;
        writeln!(f, "\tFailed allocations: {}", self.failed_allocations)
    }
}

/// Run `config` for one strategy.
pub fn run_one(config: &StressConfig, strategy: Strategy, rng: &mut impl Rng) -> StressReport {
    config.validate();

    let mut pool = Pool::new(strategy, config.total_size);
    let mut offsets: Vec<usize> = Vec::new();
    let free_threshold = config.total_size as f64 * (1.0 - config.fill_ratio);
    let small_block_size = config.small_block_size();

    let mut sum_hole_size = 0.0;
    let mut sum_largest_free = 0.0;
    let mut sum_allocated = 0.0;
    let mut sum_small = 0.0;
    let mut failed_allocations = 0;
    let mut force_free = false;

    let start = Instant::now();

    for _ in 0..config.iterations {
        if !force_free && pool.free_bytes() as f64 > free_threshold {
            let len = rng.random_range(config.min_block_size..=config.max_block_size);
            match pool.try_allocate(len) {
                Ok(offset) => offsets.push(offset),
                Err(e) => {
                    log::trace!("{}: {}", strategy, e);
                    failed_allocations += 1;
                    force_free = true;
                }
            }
        } else {
            force_free = false;

            if offsets.is_empty() {
                continue;
            }
            let chosen = rng.random_range(0..offsets.len());
            pool.free(offsets.swap_remove(chosen));
        }

        debug_assert_eq!(pool.check_invariants(), Ok(()));

        let status = pool.status();
        sum_largest_free += status.largest_free as f64;
        if let Some(hole_size) = status.free.checked_div(status.holes) {
            sum_hole_size += hole_size as f64;
        }
        sum_allocated += status.allocated as f64;
        sum_small += pool.small_free_count(small_block_size) as f64;
    }

    let elapsed = start.elapsed();
    let iterations = config.iterations.max(1) as f64;

    log::debug!(
        "{}: {} iterations in {:?}, {} failed allocations",
        strategy,
        config.iterations,
        elapsed,
        failed_allocations
    );

    StressReport {
        strategy,
        elapsed,
        avg_hole_size: sum_hole_size / iterations,
        avg_largest_free: sum_largest_free / iterations,
        avg_allocated: sum_allocated / iterations,
        avg_small_blocks: sum_small / iterations,
        failed_allocations,
    }
}

/// Run `config` for every selected strategy, writing a header line and one
/// section per strategy to `log`.
pub fn run_randomized(
    config: &StressConfig,
    log: &mut impl Write,
) -> io::Result<Vec<StressReport>> {
    writeln!(log, "Running randomized tests: {}", config)?;

    let mut reports = Vec::new();
    for &strategy in config.strategies() {
        let mut rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let report = run_one(config, strategy, &mut rng);
        write!(log, "{}", report)?;
        reports.push(report);
    }

    log.flush()?;
    Ok(reports)
}

/// Run every entry of [`STANDARD_RUNS`], replacing the contents of the log
/// file at `path`.
pub fn run_standard_suite(strategy: Strategy, path: &Path) -> io::Result<Vec<StressReport>> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut reports = Vec::new();
    for &run in STANDARD_RUNS.iter() {
        let config = StressConfig::standard(strategy, run);
        let mut log = OpenOptions::new().create(true).append(true).open(path)?;
        reports.extend(run_randomized(&config, &mut log)?);
    }

    log::info!("stress results appended to {}", path.display());
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;

    fn small_config(strategy: Strategy) -> StressConfig {
        StressConfig {
            strategy,
            total_size: 1000,
            fill_ratio: 0.5,
            min_block_size: 1,
            max_block_size: 100,
            iterations: 2000,
            seed: Some(0x12345689),
        }
    }

    #[test]
    fn every_strategy_by_default() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut log = Vec::new();
        let reports = run_randomized(&small_config(Strategy::NotSet), &mut log).unwrap();

        let strategies: Vec<_> = reports.iter().map(|r| r.strategy).collect();
        assert_eq!(strategies, Strategy::ALL);

        let text = String::from_utf8(log).unwrap();
        assert!(text.starts_with(
            "Running randomized tests: pool size == 1000, fill ratio == 0.500000, \
             block size is from 1 to 100, 2000 iterations\n"
        ));
        for strategy in Strategy::ALL {
            assert!(text.contains(&std::format!("\t=== {} ===\n", strategy)));
        }
        assert_eq!(text.matches("\tFailed allocations: ").count(), 4);
    }

    #[test]
    fn single_strategy() {
        let mut log = Vec::new();
        let reports = run_randomized(&small_config(Strategy::Next), &mut log).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].strategy, Strategy::Next);
    }

    #[test]
    fn averages_are_bounded() {
        for strategy in Strategy::ALL {
            let config = small_config(strategy);
            let report = run_one(&config, strategy, &mut SmallRng::seed_from_u64(1));
            assert!(report.avg_allocated <= config.total_size as f64);
            assert!(report.avg_largest_free <= config.total_size as f64);
            assert!(report.avg_hole_size <= config.total_size as f64);
            assert!(report.avg_allocated > 0.0);
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let config = small_config(Strategy::First);
        let a = run_one(&config, Strategy::First, &mut SmallRng::seed_from_u64(7));
        let b = run_one(&config, Strategy::First, &mut SmallRng::seed_from_u64(7));
        assert_eq!(a.failed_allocations, b.failed_allocations);
        assert_eq!(a.avg_allocated, b.avg_allocated);
        assert_eq!(a.avg_hole_size, b.avg_hole_size);
    }

    #[test]
    fn oversized_blocks_fail() {
        // Only one 60-byte block fits at a time
        let config = StressConfig {
            strategy: Strategy::Worst,
            total_size: 100,
            fill_ratio: 1.0,
            min_block_size: 60,
            max_block_size: 60,
            iterations: 10,
            seed: Some(3),
        };
        let report = run_one(&config, Strategy::Worst, &mut SmallRng::seed_from_u64(3));
        assert!(report.failed_allocations > 0);
        assert!(report.avg_allocated <= 60.0);
    }

    #[test]
    fn report_text() {
        let report = StressReport {
            strategy: Strategy::Best,
            elapsed: Duration::from_micros(1500),
            avg_hole_size: 1.0,
            avg_largest_free: 2.0,
            avg_allocated: 3.5,
            avg_small_blocks: 0.25,
            failed_allocations: 4,
        };
        assert_eq!(
            std::format!("{}", report),
            "\t=== best ===\n\
             \tTest took 1.50ms.\n\
             \tAverage hole size: 1.000000\n\
             \tAverage largest free block: 2.000000\n\
             \tAverage allocated bytes: 3.500000\n\
             \tAverage number of small blocks: 0.250000\n\
             \tFailed allocations: 4\n"
        );
    }

    #[test]
    #[should_panic(expected = "empty block size range")]
    fn inverted_block_range() {
        let config = StressConfig {
            min_block_size: 10,
            max_block_size: 5,
            ..StressConfig::default()
        };
        run_one(&config, Strategy::First, &mut SmallRng::seed_from_u64(0));
    }

    #[test]
    fn standard_suite_shape() {
        assert_eq!(STANDARD_RUNS.len(), 17);
        let config = StressConfig::default();
        assert_eq!(config.total_size, 10000);
        assert_eq!(config.iterations, 10000);
        assert_eq!(config.strategies(), &Strategy::ALL);
        assert_eq!(config.small_block_size(), 100);
    }
}
