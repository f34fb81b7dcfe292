// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Raw chunk pools.

use core::fmt;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use super::FreeList;
use crate::error::{or_raise, Error, ErrorKind, Result};
use crate::ratio::Period;
use crate::sys::sync::{NullMutex, Semaphore};
use crate::sys::{DefaultKernel, Kernel, RawMutex};
use crate::time::{Clock, Duration, Rep, TimePoint};

/// A pool of `N` chunks, each able to hold a `T`, guarded by the mutex `M`.
pub struct MemoryPool<T, const N: usize, M = NullMutex> {
    mutex: M,
    list: FreeList<T, N>,
}

// The list is only touched with the mutex held.
unsafe impl<T: Send, const N: usize, M: Send> Send for MemoryPool<T, N, M> {}
unsafe impl<T: Send, const N: usize, M: RawMutex + Sync> Sync for MemoryPool<T, N, M> {}

impl<T, const N: usize, M: RawMutex> MemoryPool<T, N, M> {
    /// Create a pool with all chunks free.
    pub fn new() -> Result<Self> {
        Ok(Self::with_mutex(M::new()?))
    }

    /// Create a pool with all chunks free, guarded by `mutex`.
    pub fn with_mutex(mutex: M) -> Self {
        MemoryPool { mutex, list: FreeList::new() }
    }

    /// The number of chunks.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether every chunk is allocated.
    pub fn is_empty(&self) -> bool {
        self.locked(|list| list.is_empty())
    }

    /// Take a chunk, or `None` if all are in use.  The chunk is uninitialized.
    pub fn allocate(&self) -> Option<NonNull<MaybeUninit<T>>> {
        self.locked(|list| list.allocate())
    }

    /// Return a chunk.
    ///
    /// # Safety
    ///
    /// `chunk` must have come from [`allocate`](Self::allocate) on this pool, and must not be
    /// used after this call.  Whatever it holds is not dropped.
    pub unsafe fn free(&self, chunk: NonNull<MaybeUninit<T>>) {
        self.locked(|list| list.free(chunk))
    }

    fn locked<R>(&self, f: impl FnOnce(&FreeList<T, N>) -> R) -> R {
        or_raise(self.mutex.lock());
        let result = f(&self.list);
        or_raise(unsafe { self.mutex.unlock() });
        result
    }
}

impl<T, const N: usize, M> fmt::Debug for MemoryPool<T, N, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryPool(capacity {})", N)
    }
}

/// A thread safe pool of `N` chunks, where allocation can wait for a chunk to be returned.
///
/// A semaphore counts the free chunks.  Freeing pushes the chunk back before posting the
/// semaphore, so a thread woken by the post always finds a chunk.
pub struct CountingMemoryPool<T, const N: usize, K: Kernel = DefaultKernel> {
    pool: MemoryPool<T, N, K::Mutex>,
    available: Semaphore<K>,
}

impl<T, const N: usize, K: Kernel> CountingMemoryPool<T, N, K> {
    /// Create a pool with all chunks free.
    pub fn new() -> Result<Self> {
        let count = u32::try_from(N).map_err(|_| Error::new(ErrorKind::InvalidArgument))?;
        Ok(CountingMemoryPool { pool: MemoryPool::new()?, available: Semaphore::new(count)? })
    }

    /// The number of chunks.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The number of free chunks.
    pub fn size(&self) -> usize {
        self.available.value() as usize
    }

    /// Whether every chunk is allocated.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Take a chunk, waiting for one to be freed if needed.
    pub fn allocate(&self) -> Result<NonNull<MaybeUninit<T>>> {
        self.available.wait()?;
        self.take()
    }

    /// Take a chunk if one is free.
    pub fn try_allocate(&self) -> Result<Option<NonNull<MaybeUninit<T>>>> {
        if self.available.try_wait()? {
            self.take().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Take a chunk, waiting at most `timeout` for one to be freed.
    pub fn try_allocate_for<R: Rep, P: Period>(
        &self,
        timeout: Duration<R, P>,
    ) -> Result<Option<NonNull<MaybeUninit<T>>>> {
        if self.available.try_wait_for(timeout)? {
            self.take().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Take a chunk, waiting at most until `deadline` for one to be freed.
    pub fn try_allocate_until<C: Clock>(
        &self,
        deadline: TimePoint<C>,
    ) -> Result<Option<NonNull<MaybeUninit<T>>>> {
        self.try_allocate_for(deadline.remaining())
    }

    /// Return a chunk, waking a thread waiting to allocate.
    ///
    /// # Safety
    ///
    /// `chunk` must have come from this pool, and must not be used after this call.  Whatever it
    /// holds is not dropped.
    pub unsafe fn free(&self, chunk: NonNull<MaybeUninit<T>>) -> Result<()> {
        self.pool.free(chunk);
        self.available.post()
    }

    // A successful wait on the semaphore reserves a chunk.
    fn take(&self) -> Result<NonNull<MaybeUninit<T>>> {
        self.pool.allocate().ok_or(Error::new(ErrorKind::ResourceUnavailable))
    }
}

impl<T, const N: usize, K: Kernel> fmt::Debug for CountingMemoryPool<T, N, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountingMemoryPool({}/{} free)", self.size(), N)
    }
}
