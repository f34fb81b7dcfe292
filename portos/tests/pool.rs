// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use portos::pool::{CountingMemoryPool, MemoryPool, ObjectPool};
use portos::sys::{DefaultKernel, Kernel};
use portos::time::Milliseconds;
use rand::Rng;
use rand_pcg::Pcg32;

#[test]
fn memory_pool_capacity_and_reuse() {
    let pool: MemoryPool<u32, 4> = MemoryPool::new().unwrap();
    assert_eq!(pool.capacity(), 4);
    assert!(!pool.is_empty());

    let chunks: Vec<_> = (0..4).map(|_| pool.allocate().unwrap()).collect();
    assert!(pool.is_empty());
    assert!(pool.allocate().is_none());
    for (i, a) in chunks.iter().enumerate() {
        for b in &chunks[i + 1..] {
            assert_ne!(a, b);
        }
    }

    // Freed chunks come back last in, first out.
    unsafe {
        pool.free(chunks[1]);
        pool.free(chunks[3]);
    }
    assert_eq!(pool.allocate(), Some(chunks[3]));
    assert_eq!(pool.allocate(), Some(chunks[1]));
    assert!(pool.allocate().is_none());
}

#[test]
fn memory_pool_chunks_hold_values() {
    let pool: MemoryPool<[u64; 3], 2> = MemoryPool::new().unwrap();
    let a = pool.allocate().unwrap();
    let b = pool.allocate().unwrap();
    unsafe {
        (*a.as_ptr()).write([1, 2, 3]);
        (*b.as_ptr()).write([4, 5, 6]);
        assert_eq!((*a.as_ptr()).assume_init(), [1, 2, 3]);
        assert_eq!((*b.as_ptr()).assume_init(), [4, 5, 6]);
        pool.free(a);
        pool.free(b);
    }
}

#[test]
fn shared_memory_pool() {
    const THREADS: usize = 4;
    let pool = MemoryPool::<u64, THREADS, <DefaultKernel as Kernel>::Mutex>::new().unwrap();

    thread::scope(|s| {
        for seed in 0..THREADS as u64 {
            let pool = &pool;
            s.spawn(move || {
                let mut rng = Pcg32::new(seed, 1);
                for i in 0..1000 {
                    // Each thread holds at most one chunk, so there is always one free.
                    let chunk = pool.allocate().unwrap();
                    unsafe { (*chunk.as_ptr()).write(i) };
                    if rng.gen_range(0..4) == 0 {
                        thread::yield_now();
                    }
                    assert_eq!(unsafe { (*chunk.as_ptr()).assume_init() }, i);
                    unsafe { pool.free(chunk) };
                }
            });
        }
    });
}

// Chunk pointers aren't Send; move them between threads as addresses.
fn addr<T>(chunk: NonNull<MaybeUninit<T>>) -> usize {
    chunk.as_ptr() as usize
}

fn chunk<T>(addr: usize) -> NonNull<MaybeUninit<T>> {
    NonNull::new(addr as *mut MaybeUninit<T>).unwrap()
}

#[test]
fn counting_pool_waits_for_free() {
    let pool: CountingMemoryPool<u64, 2> = CountingMemoryPool::new().unwrap();
    assert_eq!(pool.capacity(), 2);
    assert_eq!(pool.size(), 2);

    let a = pool.allocate().unwrap();
    let _b = pool.try_allocate().unwrap().unwrap();
    assert_eq!(pool.size(), 0);
    assert!(pool.is_empty());
    assert!(pool.try_allocate().unwrap().is_none());

    let start = Instant::now();
    assert!(pool.try_allocate_for(Milliseconds::new(20)).unwrap().is_none());
    assert!(start.elapsed() >= StdDuration::from_millis(20));

    let freed = addr(a);
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(StdDuration::from_millis(20));
            unsafe { pool.free(chunk::<u64>(freed)).unwrap() };
        });
        // Blocks until the other thread frees its chunk.
        let again = pool.allocate().unwrap();
        assert_eq!(addr(again), freed);
    });
    assert_eq!(pool.size(), 0);
}

#[test]
fn counting_pool_timed_allocation_succeeds() {
    let pool: CountingMemoryPool<u32, 1> = CountingMemoryPool::new().unwrap();
    let a = addr(pool.allocate().unwrap());
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(StdDuration::from_millis(10));
            unsafe { pool.free(chunk::<u32>(a)).unwrap() };
        });
        let got = pool.try_allocate_for(Milliseconds::new(5000)).unwrap();
        assert_eq!(got.map(addr), Some(a));
    });
}

struct Tracked {
    value: u32,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn object_pool_drops_values() {
    let drops = Arc::new(AtomicUsize::new(0));
    let pool: ObjectPool<Tracked, 2> = ObjectPool::new().unwrap();
    let make = |value| Tracked { value, drops: drops.clone() };

    let a = pool.construct(make(1)).ok().unwrap();
    let mut b = pool.alloc(make(2)).ok().unwrap();
    assert!(pool.is_empty());

    // A full pool hands the value back.
    let rejected = pool.construct(make(3)).err().unwrap();
    assert_eq!(rejected.value, 3);
    drop(rejected);
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    let mut called = false;
    assert!(pool
        .construct_with(|| {
            called = true;
            make(4)
        })
        .is_none());
    assert!(!called);

    b.value += 40;
    assert_eq!(b.value, 42);
    drop(b);
    assert_eq!(drops.load(Ordering::SeqCst), 2);

    unsafe {
        assert_eq!(a.as_ref().value, 1);
        pool.destroy(a);
    }
    assert_eq!(drops.load(Ordering::SeqCst), 3);

    let c = pool.construct_with(|| make(5)).unwrap();
    let d = pool.alloc(make(6)).ok().unwrap().into_raw();
    unsafe {
        pool.destroy(c);
        pool.destroy(d);
    }
    assert_eq!(drops.load(Ordering::SeqCst), 5);
}
