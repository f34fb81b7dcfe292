// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Intrusive free list.

use core::cell::{Cell, UnsafeCell};
use core::fmt;
use core::mem::{size_of, ManuallyDrop, MaybeUninit};
use core::ptr::NonNull;

/// Marks the end of the list.
const NIL: usize = usize::MAX;

/// One chunk: the index of the next free chunk while free, a value while allocated.
#[repr(C)]
union Chunk<T> {
    next: usize,
    value: ManuallyDrop<MaybeUninit<T>>,
}

/// A list of the free chunks of a block of `N` chunks.
///
/// This is the unsynchronized core of the pools.  It is neither `Sync` nor internally locked;
/// [`MemoryPool`](super::MemoryPool) puts a mutex around it.
pub struct FreeList<T, const N: usize> {
    chunks: [UnsafeCell<Chunk<T>>; N],
    head: Cell<usize>,
}

// Allocated chunks hold values of T, which may be handed to other threads with the list.
unsafe impl<T: Send, const N: usize> Send for FreeList<T, N> {}

impl<T, const N: usize> FreeList<T, N> {
    /// Build a list with every chunk free, in address order.
    pub fn new() -> Self {
        FreeList {
            chunks: core::array::from_fn(|i| {
                UnsafeCell::new(Chunk { next: if i + 1 < N { i + 1 } else { NIL } })
            }),
            head: Cell::new(if N == 0 { NIL } else { 0 }),
        }
    }

    /// The number of chunks.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether every chunk is allocated.
    pub fn is_empty(&self) -> bool {
        self.head.get() == NIL
    }

    /// Take the most recently freed chunk, or `None` if there are none left.
    pub fn allocate(&self) -> Option<NonNull<MaybeUninit<T>>> {
        let index = self.head.get();
        if index == NIL {
            return None;
        }
        let chunk = self.chunks[index].get();
        // Free chunks hold a link.
        self.head.set(unsafe { (*chunk).next });
        NonNull::new(chunk.cast::<MaybeUninit<T>>())
    }

    /// Return a chunk to the list.  It becomes the next chunk handed out.
    ///
    /// # Safety
    ///
    /// `chunk` must have come from [`allocate`](Self::allocate) on this list, and must not be
    /// used after this call.  Whatever it holds is not dropped.
    pub unsafe fn free(&self, chunk: NonNull<MaybeUninit<T>>) {
        let index = self.index_of(chunk);
        debug_assert!(!self.is_free(index), "pool chunk freed twice");
        (*self.chunks[index].get()).next = self.head.get();
        self.head.set(index);
    }

    /// The number of free chunks.  Walks the list.
    pub fn free_count(&self) -> usize {
        self.iter_free().count()
    }

    fn index_of(&self, chunk: NonNull<MaybeUninit<T>>) -> usize {
        let base = self.chunks.as_ptr() as usize;
        let offset = (chunk.as_ptr() as usize).wrapping_sub(base);
        let index = offset / size_of::<Chunk<T>>();
        assert!(
            offset % size_of::<Chunk<T>>() == 0 && index < N,
            "pointer is not a chunk of this pool"
        );
        index
    }

    fn is_free(&self, index: usize) -> bool {
        self.iter_free().any(|i| i == index)
    }

    fn iter_free(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = self.head.get();
        core::iter::from_fn(move || {
            if next == NIL {
                return None;
            }
            let index = next;
            next = unsafe { (*self.chunks[index].get()).next };
            Some(index)
        })
    }
}

impl<T, const N: usize> Default for FreeList<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> fmt::Debug for FreeList<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FreeList({}/{} free)", self.free_count(), N)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifo_reuse() {
        let list = FreeList::<u64, 3>::new();
        let a = list.allocate().unwrap();
        let b = list.allocate().unwrap();
        let c = list.allocate().unwrap();
        assert!(list.is_empty());
        assert!(list.allocate().is_none());

        unsafe {
            list.free(b);
            list.free(a);
        }
        assert_eq!(list.free_count(), 2);
        assert_eq!(list.allocate(), Some(a));
        assert_eq!(list.allocate(), Some(b));
        unsafe { list.free(c) };
        assert_eq!(list.allocate(), Some(c));
    }

    #[test]
    fn chunks_hold_a_link() {
        // A chunk is never smaller than a link, even for small values.
        let list = FreeList::<u8, 4>::new();
        let a = list.allocate().unwrap().as_ptr() as usize;
        let b = list.allocate().unwrap().as_ptr() as usize;
        assert_eq!(b - a, size_of::<usize>());
        assert_eq!(list.capacity(), 4);
    }

    #[test]
    fn empty_list() {
        let list = FreeList::<u32, 0>::new();
        assert!(list.is_empty());
        assert!(list.allocate().is_none());
    }

    #[test]
    #[should_panic]
    fn foreign_pointer() {
        let list = FreeList::<u32, 2>::new();
        let mut other = MaybeUninit::<u32>::uninit();
        unsafe { list.free(NonNull::from(&mut other)) };
    }
}
