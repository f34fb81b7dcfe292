// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Fixed capacity memory pools.
//!
//! A pool owns storage for exactly `N` values of one type, and hands out chunks of it in constant
//! time.  Free chunks are kept on a [`FreeList`] threaded through the unused chunks themselves, so
//! a chunk is as large as the larger of the value and a link, and there is no other overhead.
//! Chunks are reused last-in first-out.
//!
//! - [`MemoryPool`]: raw chunks, guarded by any [`RawMutex`](crate::sys::RawMutex).  With the
//!   default [`NullMutex`](crate::sys::sync::NullMutex) the pool is single threaded and free of
//!   locking cost.
//! - [`CountingMemoryPool`]: adds a semaphore counting the free chunks, so an allocation can wait
//!   for one to be returned.
//! - [`ObjectPool`]: constructs values in place in the chunks, and drops them on the way back.
//!
//! Chunks are addressed by pointer, so a pool must not move while anything is allocated from it.
//! In practice pools live in statics or in long lived structures that are only borrowed.

mod free_list;
mod memory;
mod object;

pub use free_list::FreeList;
pub use memory::{CountingMemoryPool, MemoryPool};
pub use object::{ObjectPool, Pooled};
