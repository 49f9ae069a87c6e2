use std::io::{self, Write};

use fitpool::{Pool, Strategy};

/// Allocate 10, allocate 1, free the first, allocate 1, and show where
/// everything ended up.
pub fn run(strategy: Strategy, out: &mut impl Write) -> anyhow::Result<()> {
    let mut pool = Pool::new(strategy, 100);

    let a = pool.try_allocate(10)?;
    let b = pool.try_allocate(1)?;
    pool.try_free(a)?;
    let c = pool.try_allocate(1)?;

    log::debug!("a = {}, b = {}, c = {}", a, b, c);

    writeln!(out, "b + 1: {}", b + 1)?;
    writeln!(out, "c: {}", c)?;
    write_report(&pool, out)?;
    Ok(())
}

fn write_report(pool: &Pool, out: &mut impl Write) -> io::Result<()> {
    write!(out, "{}", pool.memory_map())?;
    write!(out, "{}", pool.status())
}
