//! `mem`: exercise the `fitpool` allocator from the command line.
use clap::{Args, Parser, Subcommand};
use fitpool::Strategy;
use std::{io, path::PathBuf, process::ExitCode, time::Duration};

mod checks;
mod demo;
mod runner;

#[derive(Parser, Debug)]
#[command(name = "mem", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a check, a suite of checks, or `all` of them
    #[command(long_flag = "test")]
    Test(TestArgs),

    /// Run a short allocate/free sequence and print the resulting pool
    #[command(long_flag = "try")]
    Try {
        /// Placement strategy: best, worst, first or next
        strategy: Option<String>,
    },
}

#[derive(Args, Debug)]
struct TestArgs {
    /// Check name, suite name, or `all`
    target: String,

    /// Restrict the checks to one strategy. Anything else runs them all.
    strategy: Option<String>,

    /// Stop after this many failures; 0 runs everything
    #[arg(short = 'f', long, default_value_t = 1)]
    max_failures: usize,

    /// Write each check's output to stdout-<name>.txt and stderr-<name>.txt
    #[arg(short, long)]
    redirect: bool,

    /// Seconds a check may run before it is killed
    #[arg(short, long, default_value_t = 20)]
    timeout: u64,

    /// Run checks in this process instead of forking
    #[arg(long)]
    no_fork: bool,

    /// Where the stress check writes its statistics
    #[arg(long, default_value = "tests.log")]
    log: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    log::debug!("{:?}", cli);

    let result = match cli.command {
        Command::Test(args) => run_tests(args),
        Command::Try { strategy } => {
            let strategy = strategy.map_or(Strategy::Next, |s| Strategy::from_name(&s));
            demo::run(strategy, &mut io::stdout()).map(|()| true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_tests(args: TestArgs) -> anyhow::Result<bool> {
    let ctx = checks::TestContext {
        strategy: args
            .strategy
            .as_deref()
            .map_or(Strategy::NotSet, Strategy::from_name),
        log_path: args.log,
    };
    let options = runner::RunnerOptions {
        max_failures: args.max_failures,
        redirect: args.redirect,
        timeout: Duration::from_secs(args.timeout),
        isolate: !args.no_fork,
    };

    let stats = runner::run_tests(
        checks::TESTS,
        &args.target,
        &options,
        &ctx,
        &mut io::stdout(),
    )?;

    match stats {
        Some(stats) => Ok(stats.all_passed()),
        None => {
            eprintln!("Test '{}' not found", args.target);
            runner::write_targets(checks::TESTS, &mut io::stderr().lock())?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn long_flags() {
        let cli = Cli::try_parse_from(["mem", "--test", "suite1", "best", "-f", "0"]).unwrap();
        match cli.command {
            Command::Test(args) => {
                assert_eq!(args.target, "suite1");
                assert_eq!(args.strategy.as_deref(), Some("best"));
                assert_eq!(args.max_failures, 0);
                assert_eq!(args.timeout, 20);
                assert_eq!(args.log, PathBuf::from("tests.log"));
            }
            other => panic!("{:?}", other),
        }

        let cli = Cli::try_parse_from(["mem", "try"]).unwrap();
        assert!(matches!(cli.command, Command::Try { strategy: None }));
    }
}
