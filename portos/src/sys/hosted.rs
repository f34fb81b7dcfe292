// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Hosted kernel.
//!
//! Implements the kernel interface on top of `std::thread` and `std::sync`, so the crate can run,
//! and be tested, on a development machine.  The native objects behave like their CMSIS-RTOS
//! counterparts: mutexes are recursive and owner checked, semaphores count up to 65535, and every
//! thread has 16 signal flags.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use super::{Attributes, Entry, Kernel, RawMutex, RawSemaphore, SignalSet};
use crate::config;
use crate::error::{Error, ErrorKind, Result};

/// The hosted kernel.
#[derive(Debug)]
pub struct Hosted;

const NAME: &str = "hosted";

/// Most tokens a semaphore can hold.
pub const SEMAPHORE_MAX: u32 = 0xFFFF;

fn hosted_error(kind: ErrorKind) -> Error {
    Error::kernel(kind, NAME, 0)
}

// Locks in this module are never held across user code, so a poisoned lock still holds
// consistent state.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wait<'a, T>(cv: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

/// Wait on `cv` until `ready` holds or `deadline` passes.  Returns whether `ready` held.
fn wait_until<'a, T, F>(
    cv: &Condvar,
    mut guard: MutexGuard<'a, T>,
    deadline: Instant,
    mut ready: F,
) -> (MutexGuard<'a, T>, bool)
where
    F: FnMut(&mut T) -> bool,
{
    loop {
        if ready(&mut guard) {
            return (guard, true);
        }
        let now = Instant::now();
        if now >= deadline {
            return (guard, false);
        }
        guard = cv
            .wait_timeout(guard, deadline - now)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
}

fn deadline(ms: u32) -> Instant {
    Instant::now() + Duration::from_millis(ms as u64)
}

struct Owner {
    thread: Option<ThreadId>,
    depth: usize,
}

impl Owner {
    /// Take or re-enter the lock for `me` if possible.
    fn acquire(&mut self, me: ThreadId) -> bool {
        match self.thread {
            None => {
                self.thread = Some(me);
                self.depth = 1;
                true
            }
            Some(owner) if owner == me => {
                self.depth += 1;
                true
            }
            Some(_) => false,
        }
    }
}

/// A recursive, owner checked mutex.
pub struct HostedMutex {
    owner: Mutex<Owner>,
    released: Condvar,
}

impl RawMutex for HostedMutex {
    fn new() -> Result<Self> {
        Ok(HostedMutex {
            owner: Mutex::new(Owner { thread: None, depth: 0 }),
            released: Condvar::new(),
        })
    }

    fn lock(&self) -> Result<()> {
        let me = thread::current().id();
        let mut owner = lock(&self.owner);
        while !owner.acquire(me) {
            owner = wait(&self.released, owner);
        }
        Ok(())
    }

    fn try_lock(&self) -> Result<bool> {
        Ok(lock(&self.owner).acquire(thread::current().id()))
    }

    fn try_lock_ms(&self, ms: u32) -> Result<bool> {
        let me = thread::current().id();
        let owner = lock(&self.owner);
        let (_owner, acquired) = wait_until(&self.released, owner, deadline(ms), |o| o.acquire(me));
        Ok(acquired)
    }

    unsafe fn unlock(&self) -> Result<()> {
        let mut owner = lock(&self.owner);
        if owner.thread != Some(thread::current().id()) {
            return Err(hosted_error(ErrorKind::NotPermitted));
        }
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.thread = None;
            self.released.notify_one();
        }
        Ok(())
    }
}

/// A counting semaphore.
pub struct HostedSemaphore {
    count: Mutex<u32>,
    posted: Condvar,
}

impl RawSemaphore for HostedSemaphore {
    fn new(count: u32) -> Result<Self> {
        if count > SEMAPHORE_MAX {
            return Err(hosted_error(ErrorKind::InvalidArgument));
        }
        Ok(HostedSemaphore { count: Mutex::new(count), posted: Condvar::new() })
    }

    fn post(&self) -> Result<()> {
        let mut count = lock(&self.count);
        if *count >= SEMAPHORE_MAX {
            return Err(hosted_error(ErrorKind::ResourceUnavailable));
        }
        *count += 1;
        self.posted.notify_one();
        Ok(())
    }

    fn wait(&self) -> Result<()> {
        let mut count = lock(&self.count);
        while *count == 0 {
            count = wait(&self.posted, count);
        }
        *count -= 1;
        Ok(())
    }

    fn try_wait(&self) -> Result<bool> {
        let mut count = lock(&self.count);
        if *count == 0 {
            return Ok(false);
        }
        *count -= 1;
        Ok(true)
    }

    fn try_wait_ms(&self, ms: u32) -> Result<bool> {
        let count = lock(&self.count);
        let (_count, taken) = wait_until(&self.posted, count, deadline(ms), |c| {
            if *c == 0 {
                false
            } else {
                *c -= 1;
                true
            }
        });
        Ok(taken)
    }

    fn value(&self) -> u32 {
        *lock(&self.count)
    }
}

/// The signal flags of one thread.
#[derive(Default)]
struct Signals {
    flags: Mutex<SignalSet>,
    changed: Condvar,
}

type Registry = HashMap<ThreadId, Arc<Signals>>;

// Threads are only known by id, so their flags live in a registry.  A thread started by `spawn` is
// entered before `spawn` returns and removed when its entry function returns.  Any other thread
// is entered the first time it waits for signals, and stays for the life of the process.
fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

fn own_signals() -> Arc<Signals> {
    lock(registry()).entry(thread::current().id()).or_default().clone()
}

fn signals_of(id: ThreadId) -> Result<Arc<Signals>> {
    lock(registry()).get(&id).cloned().ok_or_else(|| hosted_error(ErrorKind::InvalidArgument))
}

/// Take the flags that satisfy a wait for `mask` (any flag if zero).
fn take_signals(flags: &mut SignalSet, mask: SignalSet) -> SignalSet {
    let taken = if mask == 0 {
        *flags
    } else if *flags & mask == mask {
        mask
    } else {
        0
    };
    *flags &= !taken;
    taken
}

struct SendPtr(*mut c_void);

// The pointer is handed to the new thread, which is the contract of `Kernel::spawn`.
unsafe impl Send for SendPtr {}

impl SendPtr {
    fn get(self) -> *mut c_void {
        self.0
    }
}

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

impl Kernel for Hosted {
    type Mutex = HostedMutex;
    type Semaphore = HostedSemaphore;
    type ThreadId = ThreadId;

    const NAME: &'static str = NAME;
    const MAX_WAIT_MS: u32 = config::MAX_WAIT_MS;

    fn ticks() -> i64 {
        let nanos = epoch().elapsed().as_nanos();
        (nanos * config::SYSTICK_HZ as u128 / 1_000_000_000) as i64
    }

    unsafe fn spawn(entry: Entry, arg: *mut c_void, attrs: &Attributes) -> Result<ThreadId> {
        // Host threads have no priorities, so that attribute is dropped.
        let mut builder = thread::Builder::new();
        if let Some(name) = attrs.name {
            builder = builder.name(name.into());
        }
        if let Some(size) = attrs.stack_size {
            builder = builder.stack_size(size);
        }
        let arg = SendPtr(arg);
        // Holding the registry until the new thread is entered keeps it from leaving first.
        let mut entered = lock(registry());
        let handle = builder
            .spawn(move || {
                unsafe { entry(arg.get()) };
                lock(registry()).remove(&thread::current().id());
            })
            .map_err(|_| hosted_error(ErrorKind::ResourceUnavailable))?;
        let id = handle.thread().id();
        entered.entry(id).or_default();
        Ok(id)
    }

    fn current() -> ThreadId {
        thread::current().id()
    }

    fn sleep_ms(ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }

    fn yield_now() {
        thread::yield_now();
    }

    fn set_signals(thread: ThreadId, signals_to_set: SignalSet) -> Result<SignalSet> {
        let slot = signals_of(thread)?;
        let mut flags = lock(&slot.flags);
        let previous = *flags;
        *flags |= signals_to_set;
        slot.changed.notify_all();
        Ok(previous)
    }

    fn clear_signals(thread: ThreadId, signals_to_clear: SignalSet) -> Result<SignalSet> {
        let slot = signals_of(thread)?;
        let mut flags = lock(&slot.flags);
        let previous = *flags;
        *flags &= !signals_to_clear;
        Ok(previous)
    }

    fn wait_signals(mask: SignalSet, ms: Option<u32>) -> Result<SignalSet> {
        let slot = own_signals();
        let mut flags = lock(&slot.flags);
        match ms {
            None => loop {
                let taken = take_signals(&mut flags, mask);
                if taken != 0 {
                    return Ok(taken);
                }
                flags = wait(&slot.changed, flags);
            },
            Some(ms) => {
                let mut taken = 0;
                let _ = wait_until(&slot.changed, flags, deadline(ms), |f| {
                    taken = take_signals(f, mask);
                    taken != 0
                });
                Ok(taken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutex_is_recursive_and_owned() {
        let m = HostedMutex::new().unwrap();
        m.lock().unwrap();
        assert_eq!(m.try_lock(), Ok(true));
        thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(m.try_lock(), Ok(false));
                assert_eq!(m.try_lock_ms(5), Ok(false));
                assert!(unsafe { m.unlock() }.is_err());
            });
        });
        unsafe {
            m.unlock().unwrap();
            m.unlock().unwrap();
        }
        thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(m.try_lock(), Ok(true));
                unsafe { m.unlock().unwrap() };
            });
        });
    }

    #[test]
    fn semaphore_limit() {
        let s = HostedSemaphore::new(SEMAPHORE_MAX).unwrap();
        assert_eq!(s.post().map_err(|e| e.kind()), Err(ErrorKind::ResourceUnavailable));
        assert_eq!(s.try_wait(), Ok(true));
        assert_eq!(s.value(), SEMAPHORE_MAX - 1);
        assert!(HostedSemaphore::new(SEMAPHORE_MAX + 1).is_err());
    }

    #[test]
    fn signal_masks() {
        let mut flags = 0b1011;
        assert_eq!(take_signals(&mut flags, 0b0110), 0);
        assert_eq!(take_signals(&mut flags, 0b0011), 0b0011);
        assert_eq!(flags, 0b1000);
        assert_eq!(take_signals(&mut flags, 0), 0b1000);
        assert_eq!(flags, 0);
    }

    unsafe extern "C" fn wait_for_go(arg: *mut c_void) {
        let go = &*arg.cast::<HostedSemaphore>();
        go.wait().unwrap();
    }

    #[test]
    fn finished_threads_leave_the_registry() {
        let go = HostedSemaphore::new(0).unwrap();
        let arg = &go as *const HostedSemaphore as *mut c_void;
        let id = unsafe { Hosted::spawn(wait_for_go, arg, &Attributes::new()) }.unwrap();

        assert!(lock(registry()).contains_key(&id));
        assert_eq!(Hosted::set_signals(id, 0b11), Ok(0));
        assert_eq!(Hosted::clear_signals(id, 0b01), Ok(0b11));
        go.post().unwrap();

        let start = Instant::now();
        while lock(registry()).contains_key(&id) {
            assert!(start.elapsed() < Duration::from_secs(10), "thread never left the registry");
            thread::sleep(Duration::from_millis(1));
        }
        let err = Hosted::set_signals(id, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(Hosted::clear_signals(id, 1).is_err());
    }
}
