// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

use std::thread;
use std::time::{Duration as StdDuration, Instant};

use portos::sync::{Condvar, CvStatus, Mutex};
use portos::time::{Microseconds, Milliseconds, Seconds};
use rand::Rng;
use rand_pcg::Pcg32;

#[derive(Default)]
struct Queue {
    tokens: usize,
    woken: Vec<usize>,
}

// Poll until `ready` holds for the data behind `m`.
fn settle<T>(m: &Mutex<T>, mut ready: impl FnMut(&T) -> bool) {
    let start = Instant::now();
    while !ready(&*m.lock().unwrap()) {
        assert!(start.elapsed() < StdDuration::from_secs(10), "timed out waiting for threads");
        thread::sleep(StdDuration::from_millis(1));
    }
}

fn wait_for_waiters(cv: &Condvar, count: usize) {
    let start = Instant::now();
    while cv.waiters() != count {
        assert!(start.elapsed() < StdDuration::from_secs(10), "timed out waiting for waiters");
        thread::sleep(StdDuration::from_millis(1));
    }
}

#[test]
fn notify_without_waiters() {
    let cv: Condvar = Condvar::new().unwrap();
    cv.notify_one();
    cv.notify_all();
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn notify_one_is_fifo() {
    const THREADS: usize = 4;
    let m: Mutex<Queue> = Mutex::new(Queue::default()).unwrap();
    let cv: Condvar = Condvar::new().unwrap();

    thread::scope(|s| {
        for id in 0..THREADS {
            let (m, cv) = (&m, &cv);
            s.spawn(move || {
                let guard = m.lock().unwrap();
                let mut guard = cv.wait_while(guard, |q| q.tokens == 0).unwrap();
                guard.tokens -= 1;
                guard.woken.push(id);
            });
            // Queue the threads in order.
            wait_for_waiters(&cv, id + 1);
        }

        for round in 1..=THREADS {
            m.lock().unwrap().tokens += 1;
            cv.notify_one();
            settle(&m, |q| q.woken.len() == round);
        }
    });

    assert_eq!(m.lock().unwrap().woken, [0, 1, 2, 3]);
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn notify_all_wakes_everyone() {
    const THREADS: usize = 5;
    let m: Mutex<bool> = Mutex::new(false).unwrap();
    let cv: Condvar = Condvar::new().unwrap();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let guard = m.lock().unwrap();
                let guard = cv.wait_while(guard, |go| !*go).unwrap();
                assert!(*guard);
            });
        }
        wait_for_waiters(&cv, THREADS);
        *m.lock().unwrap() = true;
        cv.notify_all();
    });
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn timed_waits() {
    let m: Mutex<u32> = Mutex::new(0).unwrap();
    let cv: Condvar = Condvar::new().unwrap();

    let start = Instant::now();
    let (guard, status) = cv.wait_for(m.lock().unwrap(), Milliseconds::new(20)).unwrap();
    assert_eq!(status, CvStatus::Timeout);
    assert!(status.timed_out());
    assert!(start.elapsed() >= StdDuration::from_millis(20));
    assert_eq!(cv.waiters(), 0);

    // Zero and negative timeouts still go through the mutex.
    let (guard, status) = cv.wait_for(guard, Milliseconds::new(0)).unwrap();
    assert_eq!(status, CvStatus::Timeout);
    let (guard, status) = cv.wait_for(guard, Milliseconds::new(-3)).unwrap();
    assert_eq!(status, CvStatus::Timeout);

    let (guard, status) = cv.wait_for_while(guard, Milliseconds::new(10), |n| *n == 0).unwrap();
    assert_eq!(status, CvStatus::Timeout);
    assert_eq!(*guard, 0);

    // A condition that is already false doesn't wait at all.
    let (guard, status) = cv.wait_for_while(guard, Seconds::new(100), |n| *n != 0).unwrap();
    assert_eq!(status, CvStatus::NoTimeout);
    drop(guard);

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(StdDuration::from_millis(10));
            *m.lock().unwrap() = 7;
            cv.notify_one();
        });
        let (guard, status) =
            cv.wait_for_while(m.lock().unwrap(), Seconds::new(10), |n| *n == 0).unwrap();
        assert_eq!(status, CvStatus::NoTimeout);
        assert_eq!(*guard, 7);
    });
}

#[test]
fn unbounded_timeouts() {
    let m: Mutex<u32> = Mutex::new(1).unwrap();
    let cv: Condvar = Condvar::new().unwrap();

    // Nothing to wait for, however long the timeout.
    let (guard, status) = cv.wait_for_while(m.lock().unwrap(), Seconds::MAX, |n| *n == 0).unwrap();
    assert_eq!(status, CvStatus::NoTimeout);
    let (guard, status) = cv.wait_for_while(guard, Milliseconds::MAX, |n| *n == 0).unwrap();
    assert_eq!(status, CvStatus::NoTimeout);
    let (mut guard, status) = cv.wait_for_while(guard, Seconds::MIN, |n| *n == 0).unwrap();
    assert_eq!(status, CvStatus::NoTimeout);
    *guard = 0;
    drop(guard);

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(StdDuration::from_millis(10));
            *m.lock().unwrap() = 3;
            cv.notify_one();
        });
        let (guard, status) =
            cv.wait_for_while(m.lock().unwrap(), Seconds::MAX, |n| *n == 0).unwrap();
        assert_eq!(status, CvStatus::NoTimeout);
        assert_eq!(*guard, 3);
    });
    assert_eq!(cv.waiters(), 0);
}

#[derive(Default)]
struct PingPong {
    ping: bool,
    pings: usize,
    pongs: usize,
}

#[test]
fn round_trips() {
    const ROUNDS: usize = 300;
    let m: Mutex<PingPong> = Mutex::new(PingPong::default()).unwrap();
    let cv: Condvar = Condvar::new().unwrap();

    thread::scope(|s| {
        for (seed, ping) in [(1, true), (2, false)] {
            let (m, cv) = (&m, &cv);
            s.spawn(move || {
                let mut rng = Pcg32::new(seed, 1);
                for _ in 0..ROUNDS {
                    let guard = m.lock().unwrap();
                    // Ping goes when the flag is clear, pong when it is set.
                    let mut guard = cv.wait_while(guard, |p| p.ping == ping).unwrap();
                    guard.ping = ping;
                    if ping {
                        guard.pings += 1;
                    } else {
                        guard.pongs += 1;
                    }
                    drop(guard);
                    cv.notify_one();
                    if rng.gen_range(0..3) == 0 {
                        thread::sleep(StdDuration::from_micros(rng.gen_range(0..200)));
                    }
                }
            });
        }
    });

    let state = m.lock().unwrap();
    assert_eq!(state.pings, ROUNDS);
    assert_eq!(state.pongs, ROUNDS);
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn timeouts_racing_notifications() {
    const ROUNDS: usize = 200;
    let m: Mutex<(usize, usize)> = Mutex::new((0, 0)).unwrap();
    let cv: Condvar = Condvar::new().unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            let mut rng = Pcg32::new(3, 1);
            for round in 1..=ROUNDS {
                thread::sleep(StdDuration::from_micros(rng.gen_range(0..1500)));
                m.lock().unwrap().0 = round;
                if rng.gen_range(0..2) == 0 {
                    cv.notify_one();
                } else {
                    cv.notify_all();
                }
                settle(&m, |state| state.1 == round);
            }
        });

        let mut rng = Pcg32::new(4, 1);
        for round in 1..=ROUNDS {
            let mut guard = m.lock().unwrap();
            // Short timed waits, so that many of them expire just as a notification arrives.
            while guard.0 < round {
                let timeout = Microseconds::new(rng.gen_range(0..1000));
                guard = cv.wait_for(guard, timeout).unwrap().0;
            }
            guard.1 = round;
        }
    });

    // No waiter was left behind on the queue.
    assert_eq!(cv.waiters(), 0);
}
