use std::{
    fs::File,
    io::{self, Write},
    os::unix::io::AsRawFd,
    thread,
    time::{Duration, Instant},
};

use super::{invoke_inline, Outcome, RunnerOptions, TestEntry};
use crate::checks::TestContext;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run a check in a forked child, killing it once `options.timeout` passes.
///
/// Falls back to running the check inline if `fork` fails.
pub fn invoke(entry: &TestEntry, options: &RunnerOptions, ctx: &TestContext) -> Outcome {
    // The child inherits anything still sitting in the buffers
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    let pid = unsafe { libc::fork() };

    if pid == -1 {
        log::warn!("fork failed: {}", io::Error::last_os_error());
        eprint!("-fork failed so running test inline-");
        return invoke_inline(entry, options, ctx);
    }

    if pid == 0 {
        if options.redirect {
            if let Err(e) = redirect_output(entry.name) {
                eprintln!("could not redirect output of {}: {}", entry.name, e);
            }
        }

        let code = match invoke_inline(entry, options, ctx) {
            Outcome::Passed => 0,
            Outcome::Failed | Outcome::TimedOut => 1,
        };

        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        unsafe { libc::_exit(code) }
    }

    wait_with_timeout(pid, options.timeout)
}

fn redirect_output(name: &str) -> io::Result<()> {
    let stdout = File::create(format!("stdout-{}.txt", name))?;
    let stderr = File::create(format!("stderr-{}.txt", name))?;

    for (file, fd) in [(&stdout, libc::STDOUT_FILENO), (&stderr, libc::STDERR_FILENO)] {
        if unsafe { libc::dup2(file.as_raw_fd(), fd) } == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn wait_with_timeout(pid: libc::pid_t, timeout: Duration) -> Outcome {
    let deadline = Instant::now() + timeout;
    let mut status: libc::c_int = 0;

    loop {
        let ret = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };

        if ret == pid {
            break;
        }

        if ret == -1 {
            let e = io::Error::last_os_error();
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            log::error!("waitpid({}) failed: {}", pid, e);
            return Outcome::Failed;
        }

        if Instant::now() >= deadline {
            eprint!("-Timeout(Killing test process)-");
            unsafe {
                libc::kill(pid, libc::SIGKILL);
                libc::waitpid(pid, &mut status, 0);
            }
            return Outcome::TimedOut;
        }

        thread::sleep(POLL_INTERVAL);
    }

    if libc::WIFSIGNALED(status) {
        eprintln!(
            "testrunner:Test terminated by signal {}",
            libc::WTERMSIG(status)
        );
        return Outcome::Failed;
    }

    if libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0 {
        Outcome::Passed
    } else {
        Outcome::Failed
    }
}
