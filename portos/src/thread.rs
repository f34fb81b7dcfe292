// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Thread support.
//!
//! Threads can be started with any `Send` closure, joined, or detached, without a heap.  Each
//! running thread is backed by a control block taken from a fixed pool of
//! [`MAX_THREADS`](crate::config::MAX_THREADS) entries.  The block holds the closure, a
//! "finished" semaphore, and a reference count:
//!
//! - The [`Thread`] handle holds one reference, taken when the block is built.
//! - The native thread holds the second, taken just before the kernel is asked to start it.  The
//!   entry trampoline runs the closure, posts "finished", and drops this reference.
//! - [`Thread::join`] waits on "finished" and drops the handle's reference; [`Thread::detach`]
//!   drops it without waiting.
//!
//! The block goes back to the pool when the count reaches zero, so after a join its slot is free
//! for the next thread.
//!
//! A panic inside a thread is not recoverable.

use core::ffi::c_void;
use core::fmt;
use core::ptr::NonNull;

use portable_atomic::{fence, AtomicUsize, Ordering};

use crate::config::MAX_THREADS;
use crate::error::{or_raise, Error, ErrorKind, Result};
use crate::pool::ObjectPool;
use crate::sys::sync::Semaphore;
use crate::sys::{DefaultKernel, Kernel};

mod callable;
pub mod this_thread;

use callable::Callable;

pub use callable::CALLABLE_ALIGN;
pub use crate::sys::thread::{Attributes, Priority, SignalSet};

/// The control block behind a [`Thread`].
struct ThreadData {
    callable: Callable,
    finished: Semaphore<DefaultKernel>,
    refs: AtomicUsize,
}

// The callable is only touched by the native thread once it starts, or dropped with the block.
unsafe impl Send for ThreadData {}

type ThreadPool = ObjectPool<ThreadData, MAX_THREADS, <DefaultKernel as Kernel>::Mutex>;

static POOL: spin::Once<ThreadPool> = spin::Once::new();

fn pool() -> Result<&'static ThreadPool> {
    POOL.try_call_once(ThreadPool::new)
}

impl ThreadData {
    /// Drop one reference, returning the block to the pool with the last one.
    ///
    /// # Safety
    ///
    /// `data` must be a live block from the pool, and the caller must own the reference.
    unsafe fn release(data: NonNull<ThreadData>) {
        if data.as_ref().refs.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);
        if let Some(pool) = POOL.get() {
            pool.destroy(data);
        }
    }
}

unsafe extern "C" fn trampoline(arg: *mut c_void) {
    let data = NonNull::new_unchecked(arg.cast::<ThreadData>());
    data.as_ref().callable.invoke();
    or_raise(data.as_ref().finished.post());
    ThreadData::release(data);
}

/// Identifies a thread.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Id(pub(crate) <DefaultKernel as Kernel>::ThreadId);

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({:?})", self.0)
    }
}

/// Thread configuration, used to start a thread with non-default attributes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Builder {
    attrs: Attributes,
}

impl Builder {
    /// A builder with the default attributes.
    pub const fn new() -> Builder {
        Builder { attrs: Attributes::new() }
    }

    /// Set the scheduling priority.
    pub fn priority(mut self, priority: Priority) -> Builder {
        self.attrs.priority = priority;
        self
    }

    /// Set the stack size, in bytes.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.attrs.stack_size = Some(size);
        self
    }

    /// Set the thread name.
    pub fn name(mut self, name: &'static str) -> Builder {
        self.attrs.name = Some(name);
        self
    }

    /// The attributes threads will be started with.
    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// Start a thread running `f`.
    ///
    /// Fails with [`ErrorKind::ResourceUnavailable`] if all `MAX_THREADS` control blocks are in
    /// use, or with the kernel's error if it can't start the thread.
    pub fn spawn<F>(self, f: F) -> Result<Thread>
    where
        F: FnOnce() + Send + 'static,
    {
        let pool = pool()?;
        let block = ThreadData {
            callable: Callable::new(f),
            finished: Semaphore::new(0)?,
            refs: AtomicUsize::new(1),
        };
        let data = match pool.construct(block) {
            Ok(data) => data,
            Err(_) => {
                log::warn!("All {} thread control blocks are in use", MAX_THREADS);
                return Err(Error::new(ErrorKind::ResourceUnavailable));
            }
        };

        // The running thread's reference.
        unsafe { data.as_ref() }.refs.fetch_add(1, Ordering::Relaxed);
        match unsafe { DefaultKernel::spawn(trampoline, data.as_ptr().cast(), &self.attrs) } {
            Ok(id) => {
                log::debug!("Started thread {:?} ({:?})", id, self.attrs.name);
                Ok(Thread { data: Some(data), id: Some(Id(id)) })
            }
            Err(err) => {
                log::warn!("Unable to start thread: {}", err);
                unsafe {
                    ThreadData::release(data);
                    ThreadData::release(data);
                }
                Err(err)
            }
        }
    }
}

/// A handle to a running thread.
///
/// A handle is joinable until [`join`](Thread::join) or [`detach`](Thread::detach) is called.
/// Dropping a joinable handle detaches the thread.
pub struct Thread {
    data: Option<NonNull<ThreadData>>,
    id: Option<Id>,
}

// The block is shared through its reference count, and its semaphore is thread safe.
unsafe impl Send for Thread {}
unsafe impl Sync for Thread {}

impl Thread {
    /// Start a thread running `f`, with the default attributes.
    pub fn spawn<F>(f: F) -> Result<Thread>
    where
        F: FnOnce() + Send + 'static,
    {
        Builder::new().spawn(f)
    }

    /// Whether this handle still refers to a thread.
    pub fn joinable(&self) -> bool {
        self.data.is_some()
    }

    /// The id of the thread, while the handle is joinable.
    pub fn id(&self) -> Option<Id> {
        self.id
    }

    /// Wait for the thread to finish.
    ///
    /// Fails with [`ErrorKind::NotPermitted`] if the handle isn't joinable, and with
    /// [`ErrorKind::Deadlock`] if called by the thread itself.  After a successful join, the handle
    /// is no longer joinable.
    pub fn join(&mut self) -> Result<()> {
        let data = self.data.ok_or(Error::new(ErrorKind::NotPermitted))?;
        if self.id == Some(this_thread::get_id()) {
            return Err(Error::new(ErrorKind::Deadlock));
        }
        let result = unsafe { data.as_ref() }.finished.wait();
        self.data = None;
        self.id = None;
        unsafe { ThreadData::release(data) };
        result
    }

    /// Let the thread run on its own.  Its control block is returned to the pool when it finishes.
    ///
    /// Fails with [`ErrorKind::NotPermitted`] if the handle isn't joinable.
    pub fn detach(&mut self) -> Result<()> {
        let data = self.data.take().ok_or(Error::new(ErrorKind::NotPermitted))?;
        self.id = None;
        unsafe { ThreadData::release(data) };
        Ok(())
    }

    /// Set signal flags of the thread, returning the flags it had before.
    ///
    /// Fails with [`ErrorKind::NotPermitted`] if the handle isn't joinable.  The kernel rejects
    /// signals for a thread that has already finished.
    pub fn set_signals(&self, signals: SignalSet) -> Result<SignalSet> {
        DefaultKernel::set_signals(self.native_id()?, signals)
    }

    /// Clear signal flags of the thread, returning the flags it had before.
    pub fn clear_signals(&self, signals: SignalSet) -> Result<SignalSet> {
        DefaultKernel::clear_signals(self.native_id()?, signals)
    }

    fn native_id(&self) -> Result<<DefaultKernel as Kernel>::ThreadId> {
        self.id.map(|id| id.0).ok_or(Error::new(ErrorKind::NotPermitted))
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if self.joinable() {
            let _ = self.detach();
        }
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "Thread({:?})", id),
            None => write!(f, "Thread(detached)"),
        }
    }
}
