// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Object pools: memory pools that construct and drop their values.

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use super::MemoryPool;
use crate::error::Result;
use crate::sys::sync::NullMutex;
use crate::sys::RawMutex;

/// A pool of up to `N` values of `T`, guarded by the mutex `M`.
pub struct ObjectPool<T, const N: usize, M = NullMutex> {
    pool: MemoryPool<T, N, M>,
}

impl<T, const N: usize, M: RawMutex> ObjectPool<T, N, M> {
    /// Create an empty pool.
    pub fn new() -> Result<Self> {
        Ok(ObjectPool { pool: MemoryPool::new()? })
    }

    /// Create an empty pool guarded by `mutex`.
    pub fn with_mutex(mutex: M) -> Self {
        ObjectPool { pool: MemoryPool::with_mutex(mutex) }
    }

    /// The number of values the pool can hold.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether the pool is full.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Move `value` into the pool.  If the pool is full, `value` is handed back.
    pub fn construct(&self, value: T) -> core::result::Result<NonNull<T>, T> {
        match self.pool.allocate() {
            Some(chunk) => {
                unsafe { (*chunk.as_ptr()).write(value) };
                Ok(chunk.cast())
            }
            None => Err(value),
        }
    }

    /// Build a value in the pool.  `make` is only called if there is room.
    pub fn construct_with(&self, make: impl FnOnce() -> T) -> Option<NonNull<T>> {
        let chunk = self.pool.allocate()?;
        unsafe { (*chunk.as_ptr()).write(make()) };
        Some(chunk.cast())
    }

    /// Drop a value and return its chunk to the pool.
    ///
    /// # Safety
    ///
    /// `object` must have come from [`construct`](Self::construct) or
    /// [`construct_with`](Self::construct_with) on this pool, and must not be used after this
    /// call.
    pub unsafe fn destroy(&self, object: NonNull<T>) {
        core::ptr::drop_in_place(object.as_ptr());
        self.pool.free(object.cast());
    }

    /// Move `value` into the pool, returning an owning handle that destroys it when dropped.
    pub fn alloc(&self, value: T) -> core::result::Result<Pooled<'_, T, N, M>, T> {
        let object = self.construct(value)?;
        Ok(Pooled { pool: self, object })
    }
}

impl<T, const N: usize, M> fmt::Debug for ObjectPool<T, N, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPool(capacity {})", N)
    }
}

/// A value living in an [`ObjectPool`].  Dropping the handle destroys the value.
pub struct Pooled<'a, T, const N: usize, M: RawMutex = NullMutex> {
    pool: &'a ObjectPool<T, N, M>,
    object: NonNull<T>,
}

unsafe impl<T: Send, const N: usize, M: RawMutex + Sync> Send for Pooled<'_, T, N, M> {}
unsafe impl<T: Sync, const N: usize, M: RawMutex + Sync> Sync for Pooled<'_, T, N, M> {}

impl<'a, T, const N: usize, M: RawMutex> Pooled<'a, T, N, M> {
    /// Give up ownership without destroying the value.  It must later be passed to
    /// [`ObjectPool::destroy`].
    pub fn into_raw(self) -> NonNull<T> {
        let object = self.object;
        core::mem::forget(self);
        object
    }
}

impl<T, const N: usize, M: RawMutex> Deref for Pooled<'_, T, N, M> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.object.as_ref() }
    }
}

impl<T, const N: usize, M: RawMutex> DerefMut for Pooled<'_, T, N, M> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.object.as_mut() }
    }
}

impl<T, const N: usize, M: RawMutex> Drop for Pooled<'_, T, N, M> {
    fn drop(&mut self) {
        unsafe { self.pool.destroy(self.object) };
    }
}

impl<T: fmt::Debug, const N: usize, M: RawMutex> fmt::Debug for Pooled<'_, T, N, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
