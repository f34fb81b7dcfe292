// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Higher level synchronization primitives.
//!
//! These are modeled after the synchronization primitives in
//! [`std::sync`](https://doc.rust-lang.org/stable/std/sync/index.html), notably `Mutex` and
//! `Condvar`, in as much as it makes sense.  They are generic over the [`Kernel`], defaulting to
//! the one selected at build time.
//!
//! Kernels generally don't provide a condition variable.  [`Condvar`] is built here from a
//! mutex and one semaphore per waiting thread.
//!
//! [`Kernel`]: crate::sys::Kernel

pub mod atomic {
    //! Re-export portable atomic.
    //!
    //! Although `core` contains a
    //! [`sync::atomic`](https://doc.rust-lang.org/stable/core/sync/atomic/index.html) module,
    //! these are dependent on the target having atomic instructions, and the types are missing
    //! when the platform cannot support them.  Small Cortex-M parts, for instance, have no
    //! compare-and-swap.  In the Rust-embedded world, this is done through the
    //! [`portable-atomic`](https://crates.io/crates/portable-atomic) crate, which will either just
    //! re-export the types from core, or provide an implementation using critical sections when
    //! those aren't available.

    pub use portable_atomic::*;
}

mod condvar;
mod mutex;

pub use condvar::{Condvar, CvStatus};
pub use mutex::{LockResult, Mutex, MutexGuard, TryLockError, TryLockResult};

pub use crate::sys::sync::Semaphore;
