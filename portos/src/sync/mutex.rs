// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! A mutex that owns the data it protects.
//!
//! The API follows [`std::sync::Mutex`](https://doc.rust-lang.org/stable/std/sync/struct.Mutex.html)
//! where the semantics carry over.

use core::{
    cell::UnsafeCell,
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
};

use crate::error::{or_raise, Error, Result};
use crate::ratio::Period;
use crate::sys::sync as sys;
use crate::sys::{DefaultKernel, Kernel};
use crate::time::{Clock, Duration, Rep, TimePoint};

/// The result of a blocking lock.  There is no poisoning; the error is a kernel failure, or
/// [`ErrorKind::Deadlock`](crate::error::ErrorKind::Deadlock) when the calling thread already
/// holds the lock.
pub type LockResult<Guard> = Result<Guard>;

/// The return type from [`Mutex::try_lock`].
///
/// The error indicates the reason for the failure.
pub type TryLockResult<Guard> = core::result::Result<Guard, TryLockError>;

/// Why a non-blocking or timed lock did not return a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryLockError {
    /// The lock is held, and stayed held for as long as the caller was willing to wait.
    WouldBlock,
    /// The kernel reported an error.
    Kernel(Error),
}

impl From<Error> for TryLockError {
    fn from(err: Error) -> Self {
        TryLockError::Kernel(err)
    }
}

impl fmt::Display for TryLockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryLockError::WouldBlock => write!(f, "try_lock failed because the operation would block"),
            TryLockError::Kernel(err) => write!(f, "try_lock failed: {}", err),
        }
    }
}

/// Data of type `T`, reachable only while holding a kernel mutex.
///
/// Differences from the `std` mutex:
/// - No poisoning. A panic on the target is not recoverable.
/// - Construction is fallible, as the kernel mutex has to be created.
/// - A thread locking a mutex it already holds gets an error, instead of deadlocking.
pub struct Mutex<T: ?Sized, K: Kernel = DefaultKernel> {
    inner: sys::Mutex<K>,
    data: UnsafeCell<T>,
}

// Access to `data` is serialized by `inner`.
unsafe impl<T: ?Sized + Send, K: Kernel> Send for Mutex<T, K> {}
unsafe impl<T: ?Sized + Send, K: Kernel> Sync for Mutex<T, K> {}

impl<T: ?Sized, K: Kernel> fmt::Debug for Mutex<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mutex {:?}", self.inner)
    }
}

/// Proof that a [`Mutex`] is held.  Dereferences to the data, and unlocks when dropped.
///
/// Kernel mutexes are owned by a thread, so a guard can't be sent to another one:
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<portos::sync::MutexGuard<'static, u32>>();
/// ```
pub struct MutexGuard<'a, T: ?Sized + 'a, K: Kernel = DefaultKernel> {
    lock: &'a Mutex<T, K>,
    // Not Send (negative impls are unstable).
    _nosend: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync, K: Kernel> Sync for MutexGuard<'_, T, K> {}

impl<T, K: Kernel> Mutex<T, K> {
    /// Construct a new wrapped Mutex, using the given underlying sys mutex.  The sys mutex should
    /// be a plain one; with a recursive one, a relock by the owner would hand out a second guard
    /// to the same data.
    pub const fn new_from(t: T, raw_mutex: sys::Mutex<K>) -> Mutex<T, K> {
        Mutex { inner: raw_mutex, data: UnsafeCell::new(t) }
    }

    /// Construct a new Mutex, creating the underlying kernel mutex.
    pub fn new(t: T) -> Result<Mutex<T, K>> {
        Ok(Mutex::new_from(t, sys::Mutex::new()?))
    }

    /// The protected data, consuming the mutex.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, K: Kernel> Mutex<T, K> {
    /// Block until the mutex is free, then take it.
    ///
    /// Locking a mutex the calling thread already holds fails with `Deadlock`.
    pub fn lock(&self) -> LockResult<MutexGuard<'_, T, K>> {
        self.inner.lock()?;
        unsafe { Ok(MutexGuard::new(self)) }
    }

    /// Take the mutex if it is free, without blocking.
    pub fn try_lock(&self) -> TryLockResult<MutexGuard<'_, T, K>> {
        self.guard_if(self.inner.try_lock())
    }

    /// Attempts to acquire this lock, waiting at most `timeout`.
    pub fn try_lock_for<R: Rep, P: Period>(
        &self,
        timeout: Duration<R, P>,
    ) -> TryLockResult<MutexGuard<'_, T, K>> {
        self.guard_if(self.inner.try_lock_for(timeout))
    }

    /// Attempts to acquire this lock, waiting at most until `deadline`.
    pub fn try_lock_until<C: Clock>(
        &self,
        deadline: TimePoint<C>,
    ) -> TryLockResult<MutexGuard<'_, T, K>> {
        self.guard_if(self.inner.try_lock_until(deadline))
    }

    /// Direct access to the data.  The exclusive borrow already rules out other users.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn guard_if(&self, locked: Result<bool>) -> TryLockResult<MutexGuard<'_, T, K>> {
        match locked {
            Ok(true) => unsafe { Ok(MutexGuard::new(self)) },
            Ok(false) => Err(TryLockError::WouldBlock),
            Err(err) => Err(TryLockError::Kernel(err)),
        }
    }
}

impl<'mutex, T: ?Sized, K: Kernel> MutexGuard<'mutex, T, K> {
    unsafe fn new(lock: &'mutex Mutex<T, K>) -> MutexGuard<'mutex, T, K> {
        MutexGuard { lock, _nosend: PhantomData }
    }

    /// The kernel mutex, for a condition variable to release and retake.
    pub(crate) fn raw(&self) -> &'mutex sys::Mutex<K> {
        &self.lock.inner
    }
}

impl<T: ?Sized, K: Kernel> Deref for MutexGuard<'_, T, K> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized, K: Kernel> DerefMut for MutexGuard<'_, T, K> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized, K: Kernel> Drop for MutexGuard<'_, T, K> {
    #[inline]
    fn drop(&mut self) {
        or_raise(unsafe { self.lock.inner.unlock() });
    }
}

impl<T: ?Sized + fmt::Debug, K: Kernel> fmt::Debug for MutexGuard<'_, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
