// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Kernel semaphore support
//!
//! This is a thin wrapper around the native semaphore of a [`Kernel`].  This is one of the few of
//! the `sys` primitives that is perfectly usable on its own, without needing additional wrappers.
//!
//! Semaphores count up to a kernel specific limit (65535 for CMSIS-RTOS).  Posting to a semaphore
//! that is at the limit is an error.

use core::fmt;

use crate::error::Result;
use crate::ratio::Period;
use crate::sys::{wait_chunked, DefaultKernel, Kernel, RawSemaphore};
use crate::time::{wait_millis, Clock, Duration, Rep, TimePoint};

/// A kernel counting semaphore usable from safe Rust code.
pub struct Semaphore<K: Kernel = DefaultKernel> {
    raw: K::Semaphore,
}

impl<K: Kernel> Semaphore<K> {
    /// Create a semaphore holding `count` tokens.
    pub fn new(count: u32) -> Result<Self> {
        Ok(Semaphore { raw: K::Semaphore::new(count)? })
    }

    /// Add a token, waking one waiting thread if there is one.
    pub fn post(&self) -> Result<()> {
        self.raw.post()
    }

    /// Take a token, waiting as long as needed.
    pub fn wait(&self) -> Result<()> {
        self.raw.wait()
    }

    /// Take a token if one is available.
    pub fn try_wait(&self) -> Result<bool> {
        self.raw.try_wait()
    }

    /// Take a token, waiting at most `timeout`.  Returns false on timeout.
    ///
    /// A zero or negative timeout still checks for a token once.
    pub fn try_wait_for<R: Rep, P: Period>(&self, timeout: Duration<R, P>) -> Result<bool> {
        wait_chunked(wait_millis(timeout), K::MAX_WAIT_MS, |ms| self.raw.try_wait_ms(ms))
    }

    /// Take a token, waiting at most until `deadline`.  Returns false on timeout.
    pub fn try_wait_until<C: Clock>(&self, deadline: TimePoint<C>) -> Result<bool> {
        self.try_wait_for(deadline.remaining())
    }

    /// Get the semaphore's count.
    pub fn value(&self) -> u32 {
        self.raw.value()
    }
}

impl<K: Kernel> fmt::Debug for Semaphore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sys::Semaphore({}, {})", self.raw.value(), K::NAME)
    }
}
