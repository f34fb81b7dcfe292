// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Kernel mutex wrapper.
//!
//! This module implements a thin wrapper around the native mutex of a [`Kernel`], adding timed
//! locks of any length, and the choice between plain and recursive locking.

use core::fmt;

use crate::error::{Error, ErrorKind, Result};
use crate::ratio::Period;
use crate::sync::atomic::{AtomicBool, Ordering};
use crate::sys::{wait_chunked, DefaultKernel, Kernel, RawMutex};
use crate::time::{wait_millis, Clock, Duration, Rep, TimePoint};

/// How a [`Mutex`] behaves when its owner locks it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutexKind {
    /// Relocking by the owner fails with [`ErrorKind::Deadlock`] (or `false` from the try
    /// variants).
    Plain,
    /// The owner may lock again, and must unlock once per lock.
    Recursive,
}

impl MutexKind {
    /// Called with the native lock just acquired.  Returns false if this acquisition was a relock
    /// that has to be undone.
    fn acquired(self, locked: &AtomicBool) -> bool {
        match self {
            // Only the native owner touches the flag, so relaxed is enough.
            MutexKind::Plain => !locked.swap(true, Ordering::Relaxed),
            MutexKind::Recursive => true,
        }
    }

    /// Called before the native lock is released.
    fn releasing(self, locked: &AtomicBool) -> Result<()> {
        match self {
            MutexKind::Plain => {
                if locked.swap(false, Ordering::Relaxed) {
                    Ok(())
                } else {
                    Err(Error::new(ErrorKind::NotPermitted))
                }
            }
            MutexKind::Recursive => Ok(()),
        }
    }
}

/// A kernel mutex usable from safe Rust code.
///
/// Note that this is Safe in the sense that memory safety is guaranteed, but nothing ties the
/// lock to a Rust lifetime, which is why [`unlock`] is unsafe.
///
/// This mutex type is of only limited use to application programs.  For a Mutex type that is
/// useful in a Rust type of manner, please see the regular [`sync::Mutex`] type.
///
/// [`unlock`]: Mutex::unlock
/// [`sync::Mutex`]: crate::sync::Mutex
pub struct Mutex<K: Kernel = DefaultKernel> {
    raw: K::Mutex,
    kind: MutexKind,
    locked: AtomicBool,
}

impl<K: Kernel> Mutex<K> {
    /// Create a new plain mutex.
    pub fn new() -> Result<Self> {
        Self::with_kind(MutexKind::Plain)
    }

    /// Create a new recursive mutex.
    pub fn new_recursive() -> Result<Self> {
        Self::with_kind(MutexKind::Recursive)
    }

    /// Create a new mutex of the given kind.
    pub fn with_kind(kind: MutexKind) -> Result<Self> {
        Ok(Mutex {
            raw: K::Mutex::new()?,
            kind,
            locked: AtomicBool::new(false),
        })
    }

    /// The kind this mutex was created with.
    pub fn kind(&self) -> MutexKind {
        self.kind
    }

    /// Lock the mutex, waiting as long as needed.
    ///
    /// A plain mutex already held by the calling thread returns [`ErrorKind::Deadlock`] and stays
    /// locked once.
    pub fn lock(&self) -> Result<()> {
        self.raw.lock()?;
        if self.kind.acquired(&self.locked) {
            Ok(())
        } else {
            unsafe { self.raw.unlock()? };
            Err(Error::new(ErrorKind::Deadlock))
        }
    }

    /// Lock the mutex if that can be done without waiting.
    pub fn try_lock(&self) -> Result<bool> {
        if !self.raw.try_lock()? {
            return Ok(false);
        }
        self.after_try()
    }

    /// Lock the mutex, waiting at most `timeout`.  Returns false on timeout.
    ///
    /// A plain mutex already held by the calling thread returns false at once, as waiting could
    /// never succeed.
    pub fn try_lock_for<R: Rep, P: Period>(&self, timeout: Duration<R, P>) -> Result<bool> {
        let ms = wait_millis(timeout);
        if !wait_chunked(ms, K::MAX_WAIT_MS, |chunk| self.raw.try_lock_ms(chunk))? {
            return Ok(false);
        }
        self.after_try()
    }

    /// Lock the mutex, waiting at most until `deadline`.  Returns false on timeout.
    pub fn try_lock_until<C: Clock>(&self, deadline: TimePoint<C>) -> Result<bool> {
        self.try_lock_for(deadline.remaining())
    }

    fn after_try(&self) -> Result<bool> {
        if self.kind.acquired(&self.locked) {
            Ok(true)
        } else {
            unsafe { self.raw.unlock()? };
            Ok(false)
        }
    }

    /// Unlock the mutex.
    ///
    /// Unlocking a plain mutex that isn't locked returns [`ErrorKind::NotPermitted`].
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock, and nothing may still rely on it being held.
    pub unsafe fn unlock(&self) -> Result<()> {
        self.kind.releasing(&self.locked)?;
        self.raw.unlock()
    }
}

impl<K: Kernel> fmt::Debug for Mutex<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sys::Mutex({:?}, {})", self.kind, K::NAME)
    }
}
