// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Dining philosophers
//!
//! The philosophers share their forks through one of two synchronizers: a mutex and condition
//! variable guarding a table of flags, or one semaphore per fork.  Each philosopher eats a fixed
//! number of meals, then the main thread joins them all and prints what they did.
//!
//! Run with `cargo run --example philosophers [cond|sem]`.

use std::sync::Arc;

use portos::sync::{Condvar, Mutex, Semaphore};
use portos::thread::{Builder, Thread};
use portos::time::Milliseconds;
use rand::Rng;
use rand_pcg::Pcg32;

/// How many philosophers.  There will be the same number of forks.
const NUM_PHIL: usize = 6;

/// How many times each philosopher eats before leaving the table.
const MEALS: usize = 20;

const PHIL_STACK_SIZE: usize = 64 * 1024;

/// Exclusive access to each fork, indexed the same way as the philosophers.
trait ForkSync: std::fmt::Debug + Sync + Send {
    /// Take the given fork, blocking until it is released.
    fn take(&self, index: usize);

    /// Release the given fork.
    fn release(&self, index: usize);
}

/// Forks as flags, protected by a mutex, with a condition variable to wait for one to be released.
#[derive(Debug)]
struct CondSync {
    lock: Mutex<[bool; NUM_PHIL]>,
    cond: Condvar,
}

impl CondSync {
    fn new() -> portos::Result<CondSync> {
        Ok(CondSync { lock: Mutex::new([false; NUM_PHIL])?, cond: Condvar::new()? })
    }
}

impl ForkSync for CondSync {
    fn take(&self, index: usize) {
        let lock = self.lock.lock().unwrap();
        let mut lock = self.cond.wait_while(lock, |forks| forks[index]).unwrap();
        lock[index] = true;
    }

    fn release(&self, index: usize) {
        let mut lock = self.lock.lock().unwrap();
        lock[index] = false;
        // No predictable waiter, so wake everyone.
        self.cond.notify_all();
    }
}

/// One semaphore per fork, each starting with a single token.
#[derive(Debug)]
struct SemSync {
    forks: [Semaphore; NUM_PHIL],
}

impl SemSync {
    fn new() -> portos::Result<SemSync> {
        let mut forks = Vec::with_capacity(NUM_PHIL);
        for _ in 0..NUM_PHIL {
            forks.push(Semaphore::new(1)?);
        }
        let forks = forks.try_into().unwrap_or_else(|_| unreachable!());
        Ok(SemSync { forks })
    }
}

impl ForkSync for SemSync {
    fn take(&self, index: usize) {
        self.forks[index].wait().unwrap();
    }

    fn release(&self, index: usize) {
        self.forks[index].post().unwrap();
    }
}

/// Totals for each philosopher, in milliseconds.
#[derive(Default)]
struct Stats {
    count: [u64; NUM_PHIL],
    eating: [i64; NUM_PHIL],
    thinking: [i64; NUM_PHIL],
}

impl Stats {
    fn record_eat(&mut self, index: usize, time: Milliseconds) {
        self.eating[index] += time.count();
    }

    fn record_think(&mut self, index: usize, time: Milliseconds) {
        self.thinking[index] += time.count();
        self.count[index] += 1;
    }

    fn show(&self) {
        println!("c:{:?}, e:{:?}, t:{:?}", self.count, self.eating, self.thinking);
    }
}

fn random_delay(rng: &mut Pcg32, period: i64) -> Milliseconds {
    // Never zero.
    Milliseconds::new(rng.gen_range(1..=4) * period)
}

fn phil_thread(n: usize, syncer: Arc<dyn ForkSync>, stats: Arc<Mutex<Stats>>) {
    log::info!("Philosopher {} started: {:?}", n, syncer);
    let mut rng = Pcg32::new(n as u64, 1);

    // The last philosopher reverses the order of the forks, or everyone can end up holding one.
    let forks = if n == NUM_PHIL - 1 { (0, n) } else { (n, n + 1) };

    for _ in 0..MEALS {
        syncer.take(forks.0);
        syncer.take(forks.1);

        let delay = random_delay(&mut rng, 5);
        portos::thread::this_thread::sleep_for(delay);
        stats.lock().unwrap().record_eat(n, delay);

        syncer.release(forks.1);
        syncer.release(forks.0);

        let delay = random_delay(&mut rng, 5);
        portos::thread::this_thread::sleep_for(delay);
        stats.lock().unwrap().record_think(n, delay);
    }
}

fn main() -> portos::Result<()> {
    unsafe {
        let _ = portos::set_logger();
    }

    let syncer: Arc<dyn ForkSync> = match std::env::args().nth(1).as_deref() {
        Some("sem") => Arc::new(SemSync::new()?),
        _ => Arc::new(CondSync::new()?),
    };
    println!("Using {:?}", syncer);

    let stats = Arc::new(Mutex::new(Stats::default())?);

    let mut threads: Vec<Thread> = Vec::with_capacity(NUM_PHIL);
    for i in 0..NUM_PHIL {
        let syncer = syncer.clone();
        let stats = stats.clone();
        let thread = Builder::new()
            .name("philosopher")
            .stack_size(PHIL_STACK_SIZE)
            .spawn(move || phil_thread(i, syncer, stats))?;
        threads.push(thread);
    }

    for thread in threads.iter_mut() {
        thread.join()?;
    }

    let stats = stats.lock()?;
    stats.show();
    assert!(stats.count.iter().all(|&c| c == MEALS as u64));
    Ok(())
}
