// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

use std::thread;
use std::time::{Duration as StdDuration, Instant};

use portos::error::ErrorKind;
use portos::sync::{Mutex, Semaphore, TryLockError};
use portos::sys::sync::{Mutex as RawLock, MutexKind};
use portos::time::{Microseconds, Milliseconds, Seconds};

#[test]
fn relock_is_a_deadlock() {
    let m: Mutex<u32> = Mutex::new(5).unwrap();
    let guard = m.lock().unwrap();
    assert_eq!(m.lock().map(|_| ()).unwrap_err().kind(), ErrorKind::Deadlock);
    assert!(matches!(m.try_lock(), Err(TryLockError::WouldBlock)));
    assert!(matches!(m.try_lock_for(Milliseconds::new(5)), Err(TryLockError::WouldBlock)));
    assert_eq!(*guard, 5);
    drop(guard);

    // The failed attempts left the mutex unlocked.
    *m.lock().unwrap() += 1;
    assert_eq!(m.into_inner(), 6);
}

#[test]
fn guard_shared_by_reference() {
    let m: Mutex<u32> = Mutex::new(9).unwrap();
    let guard = m.lock().unwrap();
    // The guard stays with its owner, but other threads may read through it.
    thread::scope(|s| {
        s.spawn(|| assert_eq!(*guard, 9));
    });
    drop(guard);
    assert_eq!(*m.lock().unwrap(), 9);
}

#[test]
fn held_by_another_thread() {
    let m: Mutex<Vec<u32>> = Mutex::new(Vec::new()).unwrap();
    let guard = m.lock().unwrap();
    thread::scope(|s| {
        s.spawn(|| {
            assert!(matches!(m.try_lock(), Err(TryLockError::WouldBlock)));
            let start = Instant::now();
            assert!(matches!(m.try_lock_for(Milliseconds::new(20)), Err(TryLockError::WouldBlock)));
            assert!(start.elapsed() >= StdDuration::from_millis(20));
        });
    });
    drop(guard);

    thread::scope(|s| {
        s.spawn(|| {
            let mut v = m.try_lock_for(Seconds::new(1)).unwrap();
            v.push(1);
        });
    });
    assert_eq!(*m.lock().unwrap(), [1]);
}

#[test]
fn counter() {
    const THREADS: u32 = 4;
    const ROUNDS: u32 = 1000;
    let m: Mutex<u32> = Mutex::new(0).unwrap();
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    *m.lock().unwrap() += 1;
                }
            });
        }
    });
    assert_eq!(*m.lock().unwrap(), THREADS * ROUNDS);
}

#[test]
fn recursive_mutex() {
    let m: RawLock = RawLock::new_recursive().unwrap();
    assert_eq!(m.kind(), MutexKind::Recursive);
    m.lock().unwrap();
    m.lock().unwrap();
    assert_eq!(m.try_lock(), Ok(true));
    thread::scope(|s| {
        s.spawn(|| assert_eq!(m.try_lock(), Ok(false)));
    });
    unsafe {
        m.unlock().unwrap();
        m.unlock().unwrap();
        m.unlock().unwrap();
    }
    thread::scope(|s| {
        s.spawn(|| {
            assert_eq!(m.try_lock_for(Milliseconds::new(100)), Ok(true));
            unsafe { m.unlock().unwrap() };
        });
    });
}

#[test]
fn plain_mutex_unlock_errors() {
    let m: RawLock = RawLock::new().unwrap();
    assert_eq!(m.kind(), MutexKind::Plain);
    assert_eq!(unsafe { m.unlock() }.unwrap_err().kind(), ErrorKind::NotPermitted);
    m.lock().unwrap();
    assert_eq!(m.lock().unwrap_err().kind(), ErrorKind::Deadlock);
    assert_eq!(m.try_lock(), Ok(false));
    unsafe { m.unlock().unwrap() };
    assert_eq!(m.try_lock(), Ok(true));
    unsafe { m.unlock().unwrap() };
}

#[test]
fn semaphore() {
    let sem: Semaphore = Semaphore::new(0).unwrap();
    assert_eq!(sem.try_wait(), Ok(false));
    assert_eq!(sem.try_wait_for(Microseconds::new(0)), Ok(false));

    let start = Instant::now();
    assert_eq!(sem.try_wait_for(Milliseconds::new(15)), Ok(false));
    assert!(start.elapsed() >= StdDuration::from_millis(15));

    sem.post().unwrap();
    sem.post().unwrap();
    assert_eq!(sem.value(), 2);
    assert_eq!(sem.try_wait(), Ok(true));
    sem.wait().unwrap();
    assert_eq!(sem.value(), 0);

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(StdDuration::from_millis(10));
            sem.post().unwrap();
        });
        assert_eq!(sem.try_wait_for(Seconds::new(5)), Ok(true));
    });
}
