// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Condition variable.
//!
//! Each waiting thread puts a waiter on the stack, holding a private semaphore, and links it onto
//! a FIFO queue owned by the condition variable.  A notification takes waiters off the front of
//! the queue and posts their semaphores.  The queue is guarded by its own kernel mutex, separate
//! from the user's mutex.
//!
//! The waiter is queued before the user's mutex is released, so a notification sent by a thread
//! that took the user's mutex after the waiter checked its condition always finds it.
//!
//! A timed wait that expires has to take its waiter back off the queue.  A notification can get
//! there first, between the expiry and the removal.  The waiter then finds itself already
//! dequeued, and reports a wakeup rather than a timeout, so the notification isn't lost.

use core::cell::Cell;
use core::fmt;
use core::ptr;

use super::mutex::{LockResult, MutexGuard};
use crate::error::{or_raise, Result};
use crate::ratio::Period;
use crate::sys::sync::{Mutex, Semaphore};
use crate::sys::{DefaultKernel, Kernel};
use crate::time::{Clock, Duration, Rep, SysTick, SystemClock, TimePoint};

/// Whether a timed wait returned because of a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CvStatus {
    /// Woken by a notification (or the condition became false).
    NoTimeout,
    /// The timeout expired.
    Timeout,
}

impl CvStatus {
    /// Whether the wait timed out.
    pub fn timed_out(self) -> bool {
        self == CvStatus::Timeout
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// On the queue.
    Queued,
    /// Taken off the queue by a notification.
    Notified,
    /// Taken off the queue by the waiting thread itself.
    Removed,
}

/// One waiting thread.  Lives on that thread's stack for the duration of the wait.
struct Waiter<K: Kernel> {
    next: Cell<*const Waiter<K>>,
    state: Cell<State>,
    wakeup: Semaphore<K>,
}

impl<K: Kernel> Waiter<K> {
    fn new() -> Result<Waiter<K>> {
        Ok(Waiter {
            next: Cell::new(ptr::null()),
            state: Cell::new(State::Queued),
            wakeup: Semaphore::new(0)?,
        })
    }
}

/// A condition variable, used with a [`Mutex`](crate::sync::Mutex) of the same kernel.
///
/// The API follows
/// [`std::sync::Condvar`](https://doc.rust-lang.org/stable/std/sync/struct.Condvar.html).
/// Waiters are woken in the order they started waiting, and a notification with nobody waiting
/// is lost.
pub struct Condvar<K: Kernel = DefaultKernel> {
    queue: Mutex<K>,
    head: Cell<*const Waiter<K>>,
}

// The queue is only touched with the queue mutex held.  Waiters borrow the condition variable, so
// it can only move while the queue is empty.
unsafe impl<K: Kernel> Send for Condvar<K> {}
unsafe impl<K: Kernel> Sync for Condvar<K> {}

/// A waiter linked on the queue.  Dropping it takes the waiter off the queue if a notification
/// hasn't already, so the queue never refers to a waiter that is gone.
struct Queued<'a, K: Kernel> {
    condvar: &'a Condvar<K>,
    waiter: &'a Waiter<K>,
}

impl<K: Kernel> Queued<'_, K> {
    /// Make sure the waiter is off the queue.  Returns whether a notification took it off.
    fn dequeue(&self) -> bool {
        let target: *const Waiter<K> = self.waiter;
        self.condvar.with_queue(|head| match self.waiter.state.get() {
            State::Notified => true,
            State::Removed => false,
            State::Queued => {
                let mut link = head;
                while let Some(w) = unsafe { link.get().as_ref() } {
                    if ptr::eq(w, target) {
                        link.set(w.next.get());
                        break;
                    }
                    link = &w.next;
                }
                self.waiter.state.set(State::Removed);
                false
            }
        })
    }
}

impl<K: Kernel> Drop for Queued<'_, K> {
    fn drop(&mut self) {
        self.dequeue();
    }
}

impl<K: Kernel> Condvar<K> {
    /// Construct a new condition variable, creating the kernel mutex guarding its queue.
    pub fn new() -> Result<Condvar<K>> {
        Ok(Condvar { queue: Mutex::new()?, head: Cell::new(ptr::null()) })
    }

    fn with_queue<R>(&self, f: impl FnOnce(&Cell<*const Waiter<K>>) -> R) -> R {
        or_raise(self.queue.lock());
        let result = f(&self.head);
        or_raise(unsafe { self.queue.unlock() });
        result
    }

    fn enqueue<'a>(&'a self, waiter: &'a Waiter<K>) -> Queued<'a, K> {
        self.with_queue(|head| {
            let mut link = head;
            while let Some(w) = unsafe { link.get().as_ref() } {
                link = &w.next;
            }
            link.set(waiter);
        });
        Queued { condvar: self, waiter }
    }

    /// Release the mutex behind `guard` and sleep until notified, then take the mutex again.
    ///
    /// Any notification sent after the caller last held the mutex wakes this thread.  Wakeups
    /// are not tied to the data, so the caller re-checks its condition on return.
    ///
    /// An error is returned, with the mutex released, only if the waiter can't be created.
    pub fn wait<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T, K>,
    ) -> LockResult<MutexGuard<'a, T, K>> {
        let waiter = Waiter::new()?;
        let queued = self.enqueue(&waiter);
        let mutex = guard.raw();
        or_raise(unsafe { mutex.unlock() });
        or_raise(waiter.wakeup.wait());
        drop(queued);
        or_raise(mutex.lock());
        Ok(guard)
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    ///
    /// A timeout of zero or less still releases and retakes the mutex.
    pub fn wait_for<'a, T: ?Sized, R: Rep, P: Period>(
        &self,
        guard: MutexGuard<'a, T, K>,
        timeout: Duration<R, P>,
    ) -> LockResult<(MutexGuard<'a, T, K>, CvStatus)> {
        let waiter = Waiter::new()?;
        let queued = self.enqueue(&waiter);
        let mutex = guard.raw();
        or_raise(unsafe { mutex.unlock() });
        let woken = or_raise(waiter.wakeup.try_wait_for(timeout));
        // A notification that raced with the timeout has already dequeued us.
        let status = if woken || queued.dequeue() {
            CvStatus::NoTimeout
        } else {
            CvStatus::Timeout
        };
        drop(queued);
        or_raise(mutex.lock());
        Ok((guard, status))
    }

    /// Like [`wait`](Self::wait), giving up at `deadline`.
    pub fn wait_until<'a, T: ?Sized, C: Clock>(
        &self,
        guard: MutexGuard<'a, T, K>,
        deadline: TimePoint<C>,
    ) -> LockResult<(MutexGuard<'a, T, K>, CvStatus)> {
        self.wait_for(guard, deadline.remaining())
    }

    /// Blocks the current thread for as long as `condition` returns true.
    ///
    /// The condition is checked with the mutex held, before the first wait and after each wakeup.
    pub fn wait_while<'a, T: ?Sized, F>(
        &self,
        mut guard: MutexGuard<'a, T, K>,
        mut condition: F,
    ) -> LockResult<MutexGuard<'a, T, K>>
    where
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut *guard) {
            guard = self.wait(guard)?;
        }
        Ok(guard)
    }

    /// Blocks the current thread for as long as `condition` returns true, but at most `timeout`.
    ///
    /// Returns [`CvStatus::Timeout`] if the condition was still true when the time ran out.
    pub fn wait_for_while<'a, T: ?Sized, R: Rep, P: Period, F>(
        &self,
        guard: MutexGuard<'a, T, K>,
        timeout: Duration<R, P>,
        condition: F,
    ) -> LockResult<(MutexGuard<'a, T, K>, CvStatus)>
    where
        F: FnMut(&mut T) -> bool,
    {
        self.wait_until_while(guard, deadline_after::<K, R, P>(timeout), condition)
    }

    /// Blocks the current thread for as long as `condition` returns true, but at most until
    /// `deadline`.
    ///
    /// Returns [`CvStatus::Timeout`] if the condition was still true at the deadline.
    pub fn wait_until_while<'a, T: ?Sized, C: Clock, F>(
        &self,
        mut guard: MutexGuard<'a, T, K>,
        deadline: TimePoint<C>,
        mut condition: F,
    ) -> LockResult<(MutexGuard<'a, T, K>, CvStatus)>
    where
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut *guard) {
            let (next, status) = self.wait_until(guard, deadline)?;
            guard = next;
            if status.timed_out() {
                let status = if condition(&mut *guard) {
                    CvStatus::Timeout
                } else {
                    CvStatus::NoTimeout
                };
                return Ok((guard, status));
            }
        }
        Ok((guard, CvStatus::NoTimeout))
    }

    /// Wake the thread that has waited longest, if any.
    pub fn notify_one(&self) {
        self.with_queue(|head| {
            if let Some(w) = unsafe { head.get().as_ref() } {
                head.set(w.next.get());
                w.state.set(State::Notified);
                or_raise(w.wakeup.post());
            }
        });
    }

    /// Wake every waiting thread.
    pub fn notify_all(&self) {
        self.with_queue(|head| {
            while let Some(w) = unsafe { head.get().as_ref() } {
                head.set(w.next.get());
                w.state.set(State::Notified);
                or_raise(w.wakeup.post());
            }
        });
    }

    /// The number of threads currently waiting.
    pub fn waiters(&self) -> usize {
        self.with_queue(|head| {
            let mut count = 0;
            let mut next = head.get();
            while let Some(w) = unsafe { next.as_ref() } {
                count += 1;
                next = w.next.get();
            }
            count
        })
    }
}

/// The tick at which `timeout` from now runs out, saturating at the last representable tick.
fn deadline_after<K: Kernel, R: Rep, P: Period>(
    timeout: Duration<R, P>,
) -> TimePoint<SystemClock<K>> {
    let now = SystemClock::<K>::now();
    if timeout.is_expired() {
        return now;
    }
    let room = Duration::<i64, SysTick>::MAX - now.time_since_epoch();
    if timeout >= room {
        return TimePoint::MAX;
    }
    // Floating point counts can round up past `room`.
    let ticks: Duration<i128, SysTick> = timeout.ceil();
    now + Duration::new(ticks.count().min(room.count() as i128) as i64)
}

impl<K: Kernel> Drop for Condvar<K> {
    fn drop(&mut self) {
        assert!(self.head.get().is_null(), "condition variable dropped with waiting threads");
    }
}

impl<K: Kernel> fmt::Debug for Condvar<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condvar {:?}", self.queue)
    }
}
