// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! portos 'sys' module.
//!
//! This module describes what the rest of the crate needs from a kernel, as a set of capability
//! traits: a [`RawMutex`], a [`RawSemaphore`], and a [`Kernel`] providing threads, the tick
//! counter, sleeping, and per-thread signal flags.  Each backend implements these as thin
//! wrappers around its native calls, and the selected one is available as [`DefaultKernel`].
//!
//! Native timed waits only accept a bounded timeout ([`Kernel::MAX_WAIT_MS`]).  The wrappers in
//! [`sync`] turn a wait of any length into a series of native waits of at most that size.

use core::ffi::c_void;
use core::fmt;

use crate::error::Result;

pub mod sync;
pub mod thread;

pub use thread::{Attributes, Entry, Priority, SignalSet};

#[cfg(feature = "std")]
pub mod hosted;

#[cfg(feature = "cmsis")]
pub mod cmsis;

cfg_if::cfg_if! {
    if #[cfg(feature = "cmsis")] {
        /// The kernel selected at build time.
        pub type DefaultKernel = cmsis::Cmsis;
    } else if #[cfg(feature = "std")] {
        /// The kernel selected at build time.
        pub type DefaultKernel = hosted::Hosted;
    } else {
        compile_error!("Either the \"std\" or the \"cmsis\" feature must be enabled to select a kernel");
    }
}

/// A native mutex.
///
/// Native mutexes are recursive: the owner may lock again, and must unlock as many times.  Locks
/// are not tied to any Rust lifetime, so unlocking is unsafe.
pub trait RawMutex: Sized {
    /// Create a new mutex.
    fn new() -> Result<Self>;

    /// Lock, waiting as long as needed.
    fn lock(&self) -> Result<()>;

    /// Lock if it can be done without waiting.
    fn try_lock(&self) -> Result<bool>;

    /// Lock, waiting at most `ms` milliseconds.  `ms` is at most the kernel's `MAX_WAIT_MS`.
    fn try_lock_ms(&self, ms: u32) -> Result<bool>;

    /// Release one level of the lock.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock, and nothing may still rely on it being held.
    unsafe fn unlock(&self) -> Result<()>;
}

/// A native counting semaphore.
pub trait RawSemaphore: Sized {
    /// Create a semaphore holding `count` tokens.
    fn new(count: u32) -> Result<Self>;

    /// Add a token, waking one waiter if there is one.
    fn post(&self) -> Result<()>;

    /// Take a token, waiting as long as needed.
    fn wait(&self) -> Result<()>;

    /// Take a token if one is available.
    fn try_wait(&self) -> Result<bool>;

    /// Take a token, waiting at most `ms` milliseconds.  `ms` is at most the kernel's
    /// `MAX_WAIT_MS`.
    fn try_wait_ms(&self, ms: u32) -> Result<bool>;

    /// The number of tokens currently held.
    fn value(&self) -> u32;
}

/// A kernel backend.
pub trait Kernel: Sized + Send + Sync + 'static {
    /// The native mutex.
    type Mutex: RawMutex + Send + Sync;
    /// The native semaphore.
    type Semaphore: RawSemaphore + Send + Sync;
    /// A native thread identifier.
    type ThreadId: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    /// Name of the backend, used as the category of its errors.
    const NAME: &'static str;
    /// The longest timeout one native wait accepts.
    const MAX_WAIT_MS: u32;

    /// The kernel tick counter, in ticks of [`SysTick`](crate::time::SysTick).
    fn ticks() -> i64;

    /// Start a native thread running `entry(arg)`.
    ///
    /// # Safety
    ///
    /// `arg` must stay valid until `entry` is done with it.
    unsafe fn spawn(entry: Entry, arg: *mut c_void, attrs: &Attributes) -> Result<Self::ThreadId>;

    /// The calling thread.
    fn current() -> Self::ThreadId;

    /// Block the calling thread for `ms` milliseconds.
    fn sleep_ms(ms: u32);

    /// Let other ready threads of the same priority run.
    fn yield_now();

    /// Set signal flags of `thread`, returning the previous flags.
    fn set_signals(thread: Self::ThreadId, signals: SignalSet) -> Result<SignalSet>;

    /// Clear signal flags of `thread`, returning the previous flags.
    fn clear_signals(thread: Self::ThreadId, signals: SignalSet) -> Result<SignalSet>;

    /// Wait on the calling thread's signal flags.
    ///
    /// With a `mask` of zero, waits for any flag, otherwise for all flags in `mask`.  `None` waits
    /// forever, `Some(ms)` at most `ms` milliseconds.  Returns the flags that satisfied the wait,
    /// which are cleared, or zero on timeout.
    fn wait_signals(mask: SignalSet, ms: Option<u32>) -> Result<SignalSet>;
}

/// The native wait lengths covering a wait of `total` milliseconds.
///
/// Always yields at least once, so a zero timeout still polls.
#[derive(Clone, Debug)]
pub(crate) struct Chunks {
    remaining: u64,
    max: u32,
    started: bool,
}

impl Chunks {
    pub(crate) fn new(total: u64, max: u32) -> Chunks {
        Chunks { remaining: total, max: max.max(1), started: false }
    }
}

impl Iterator for Chunks {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.started && self.remaining == 0 {
            return None;
        }
        self.started = true;
        let chunk = self.remaining.min(self.max as u64);
        self.remaining -= chunk;
        Some(chunk as u32)
    }
}

/// Run a bounded native wait repeatedly until it succeeds or `total` milliseconds are used up.
pub(crate) fn wait_chunked<F>(total: u64, max: u32, mut wait: F) -> Result<bool>
where
    F: FnMut(u32) -> Result<bool>,
{
    for chunk in Chunks::new(total, max) {
        if wait(chunk)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks() {
        let all: Vec<u32> = Chunks::new(200_000, 0xFFFE).collect();
        assert_eq!(all, [0xFFFE, 0xFFFE, 0xFFFE, 200_000 - 3 * 0xFFFE]);
        assert_eq!(Chunks::new(0, 0xFFFE).collect::<Vec<_>>(), [0]);
        assert_eq!(Chunks::new(0xFFFE, 0xFFFE).collect::<Vec<_>>(), [0xFFFE]);
        assert_eq!(Chunks::new(5, 2).collect::<Vec<_>>(), [2, 2, 1]);
    }

    #[test]
    fn chunked_stops_early() {
        let mut calls = 0;
        let got = wait_chunked(10, 3, |_| {
            calls += 1;
            Ok(calls == 2)
        });
        assert_eq!(got, Ok(true));
        assert_eq!(calls, 2);

        let mut total = 0;
        assert_eq!(wait_chunked(10, 3, |ms| { total += ms; Ok(false) }), Ok(false));
        assert_eq!(total, 10);
    }
}
