//! Selects checks by name or suite and runs them, each in its own process
//! where the platform allows.
use std::{
    io::{self, Write},
    time::Duration,
};

use crate::checks::TestContext;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use self::unix as os;
    } else {
        mod os {
            pub use super::invoke_inline as invoke;
        }
    }
}

/// A named check.
#[derive(Clone, Copy)]
pub struct TestEntry {
    pub name: &'static str,
    pub suite: &'static str,
    pub run: fn(&TestContext) -> anyhow::Result<()>,
}

impl std::fmt::Debug for TestEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestEntry")
            .field("name", &self.name)
            .field("suite", &self.suite)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Stop after this many failures. `0` never stops early.
    pub max_failures: usize,
    /// Send each check's stdout/stderr to `stdout-<name>.txt` and
    /// `stderr-<name>.txt`.
    pub redirect: bool,
    /// Kill a check that runs longer than this.
    pub timeout: Duration,
    /// Run each check in a child process.
    pub isolate: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_failures: 1,
            redirect: false,
            timeout: Duration::from_secs(20),
            isolate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    TimedOut,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Outcome::Passed => "pass",
            Outcome::Failed => "FAIL *",
            Outcome::TimedOut => "TIMEOUT *",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TestStats {
    pub ran: usize,
    pub passed: usize,
    pub failed: usize,
}

impl TestStats {
    pub fn all_passed(&self) -> bool {
        self.ran > 0 && self.failed == 0
    }
}

/// The entries `target` names: a check, a suite, or `all`.
pub fn select<'a>(entries: &'a [TestEntry], target: &str) -> Vec<&'a TestEntry> {
    entries
        .iter()
        .filter(|e| target == "all" || e.name == target || e.suite == target)
        .collect()
}

/// Run every check `target` selects, writing the progress lines to `out`.
///
/// Returns `None` if `target` selects nothing.
pub fn run_tests(
    entries: &[TestEntry],
    target: &str,
    options: &RunnerOptions,
    ctx: &TestContext,
    out: &mut impl Write,
) -> io::Result<Option<TestStats>> {
    run_tests_with(entries, target, options, out, |entry| {
        if options.isolate {
            os::invoke(entry, options, ctx)
        } else {
            invoke_inline(entry, options, ctx)
        }
    })
}

fn run_tests_with(
    entries: &[TestEntry],
    target: &str,
    options: &RunnerOptions,
    out: &mut impl Write,
    mut invoke: impl FnMut(&TestEntry) -> Outcome,
) -> io::Result<Option<TestStats>> {
    let selected = select(entries, target);
    if selected.is_empty() {
        return Ok(None);
    }

    let mut stats = TestStats::default();
    writeln!(out, "Running tests...")?;

    for entry in selected {
        if options.max_failures != 0 && stats.failed >= options.max_failures {
            log::debug!(
                "stopping after {} failure(s); {} not run",
                stats.failed,
                entry.name
            );
            break;
        }

        stats.ran += 1;
        write!(out, "{:>2}.{:<20}:", stats.ran, entry.name)?;
        out.flush()?;

        let outcome = invoke(entry);
        match outcome {
            Outcome::Passed => stats.passed += 1,
            Outcome::Failed | Outcome::TimedOut => stats.failed += 1,
        }
        writeln!(out, "{}", outcome.label())?;
    }

    writeln!(
        out,
        "\nTest Results:{} tests,{} passed,{} failed.",
        stats.ran, stats.passed, stats.failed
    )?;
    Ok(Some(stats))
}

/// Run a check in this process.
pub fn invoke_inline(entry: &TestEntry, _options: &RunnerOptions, ctx: &TestContext) -> Outcome {
    log::debug!("running {} inline", entry.name);
    match (entry.run)(ctx) {
        Ok(()) => Outcome::Passed,
        Err(e) => {
            eprintln!("{:#}", e);
            Outcome::Failed
        }
    }
}

/// List every valid test name, suite and strategy.
pub fn write_targets(entries: &[TestEntry], out: &mut impl Write) -> io::Result<()> {
    let mut names: Vec<_> = entries.iter().map(|e| e.name).collect();
    names.sort_unstable();
    names.dedup();

    let mut suites: Vec<_> = entries.iter().map(|e| e.suite).collect();
    suites.sort_unstable();
    suites.dedup();

    write!(out, "\nValid tests : all")?;
    for name in names {
        write!(out, " {}", name)?;
    }
    write!(out, "\nValid suites:")?;
    for suite in suites {
        write!(out, " {}", suite)?;
    }
    write!(out, "\nValid strategies: all")?;
    for strategy in fitpool::Strategy::ALL {
        write!(out, " {}", strategy)?;
    }
    writeln!(out)
}
