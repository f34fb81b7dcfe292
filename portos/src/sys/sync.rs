// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! # Low-level synchronization primitives.
//!
//! These wrap a kernel's native mutex and semaphore, adding what the native objects lack:
//!
//! - Waits of any length.  A timed wait is broken into native waits of at most
//!   [`Kernel::MAX_WAIT_MS`](super::Kernel::MAX_WAIT_MS) each.
//! - Plain (non-recursive) mutexes.  Native mutexes nest, so a plain [`Mutex`] tracks whether it
//!   is held and reports a relock by its owner as a deadlock.
//!
//! Like the native objects, these are not tied to Rust's borrowing rules.  The module
//! [`crate::sync`] provides the data-owning mutex and the condition variable built on them.
//!
//! Two more [`RawMutex`] implementations live here, for the memory pools: [`NullMutex`], which
//! does nothing and is for pools only used by one thread, and [`CriticalSectionMutex`], which
//! masks interrupts and so can be used from interrupt handlers.

use core::cell::{Cell, UnsafeCell};
use core::fmt;
use core::marker::PhantomData;

use critical_section::RestoreState;

use super::RawMutex;
use crate::error::Result;

pub mod mutex;
pub mod semaphore;

pub use mutex::{Mutex, MutexKind};
pub use semaphore::Semaphore;

/// A mutex that does nothing.
///
/// Locking always succeeds at once.  It is `Send` but not `Sync`, so anything protected only by a
/// `NullMutex` stays on one thread.
#[derive(Default)]
pub struct NullMutex {
    _nosync: PhantomData<Cell<()>>,
}

impl NullMutex {
    /// Construct the (stateless) mutex.
    pub const fn new() -> NullMutex {
        NullMutex { _nosync: PhantomData }
    }
}

impl RawMutex for NullMutex {
    fn new() -> Result<Self> {
        Ok(NullMutex::new())
    }

    fn lock(&self) -> Result<()> {
        Ok(())
    }

    fn try_lock(&self) -> Result<bool> {
        Ok(true)
    }

    fn try_lock_ms(&self, _ms: u32) -> Result<bool> {
        Ok(true)
    }

    unsafe fn unlock(&self) -> Result<()> {
        Ok(())
    }
}

impl fmt::Debug for NullMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NullMutex")
    }
}

/// A mutex built on a critical section, from the `critical-section` crate.
///
/// Holding the lock means being inside the critical section, so it never waits, and must be held
/// only briefly.  It does not nest: the critical section is not re-entered while held.
pub struct CriticalSectionMutex {
    restore: UnsafeCell<Option<RestoreState>>,
}

// The restore state is only touched by the holder of the critical section.
unsafe impl Sync for CriticalSectionMutex {}
unsafe impl Send for CriticalSectionMutex {}

impl CriticalSectionMutex {
    /// Construct a new mutex.
    pub const fn new() -> CriticalSectionMutex {
        CriticalSectionMutex { restore: UnsafeCell::new(None) }
    }
}

impl Default for CriticalSectionMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMutex for CriticalSectionMutex {
    fn new() -> Result<Self> {
        Ok(CriticalSectionMutex::new())
    }

    fn lock(&self) -> Result<()> {
        let state = unsafe { critical_section::acquire() };
        unsafe { *self.restore.get() = Some(state) };
        Ok(())
    }

    fn try_lock(&self) -> Result<bool> {
        self.lock().map(|_| true)
    }

    fn try_lock_ms(&self, _ms: u32) -> Result<bool> {
        self.try_lock()
    }

    unsafe fn unlock(&self) -> Result<()> {
        if let Some(state) = (*self.restore.get()).take() {
            critical_section::release(state);
        }
        Ok(())
    }
}

impl fmt::Debug for CriticalSectionMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CriticalSectionMutex")
    }
}
