// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Inline storage for the callable a thread runs.
//!
//! The closure passed to [`Thread::spawn`](super::Thread::spawn) is moved into a fixed buffer
//! inside the thread's pool slot, so starting a thread never allocates.  Closures that don't fit
//! the buffer, or need a larger alignment, are rejected at compile time.

use core::cell::{Cell, UnsafeCell};
use core::mem::{align_of, size_of, MaybeUninit};
use core::ptr;

use crate::align::AlignAs;
use crate::config::MAX_THREAD_ARGUMENT_SIZE;

/// Alignment of the buffer, and so the largest alignment a callable may have.
pub const CALLABLE_ALIGN: usize = 8;

#[repr(C)]
struct Storage {
    _align: AlignAs<CALLABLE_ALIGN>,
    bytes: [MaybeUninit<u8>; MAX_THREAD_ARGUMENT_SIZE],
}

/// A type erased `FnOnce() + Send` held inline.
pub(crate) struct Callable {
    storage: UnsafeCell<Storage>,
    call: Cell<Option<unsafe fn(*mut u8)>>,
    drop: Cell<Option<unsafe fn(*mut u8)>>,
}

unsafe fn call_stored<F: FnOnce()>(p: *mut u8) {
    let f = ptr::read(p.cast::<F>());
    f();
}

unsafe fn drop_stored<F>(p: *mut u8) {
    ptr::drop_in_place(p.cast::<F>());
}

impl Callable {
    pub(crate) fn new<F: FnOnce() + Send + 'static>(f: F) -> Callable {
        const {
            assert!(
                size_of::<F>() <= MAX_THREAD_ARGUMENT_SIZE,
                "thread closure is larger than MAX_THREAD_ARGUMENT_SIZE"
            );
            assert!(align_of::<F>() <= CALLABLE_ALIGN, "thread closure is over-aligned");
        };
        let callable = Callable {
            storage: UnsafeCell::new(Storage {
                _align: AlignAs::new(),
                bytes: [MaybeUninit::uninit(); MAX_THREAD_ARGUMENT_SIZE],
            }),
            call: Cell::new(Some(call_stored::<F>)),
            drop: Cell::new(Some(drop_stored::<F>)),
        };
        unsafe { callable.bytes().cast::<F>().write(f) };
        callable
    }

    fn bytes(&self) -> *mut u8 {
        unsafe { ptr::addr_of_mut!((*self.storage.get()).bytes).cast() }
    }

    /// Run the callable.  Later calls do nothing.
    ///
    /// # Safety
    ///
    /// No other thread may be using this callable.
    pub(crate) unsafe fn invoke(&self) {
        self.drop.set(None);
        if let Some(call) = self.call.take() {
            call(self.bytes());
        }
    }
}

impl Drop for Callable {
    fn drop(&mut self) {
        if let Some(drop) = self.drop.take() {
            unsafe { drop(self.bytes()) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c2 = count.clone();
        let callable = Callable::new(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        });
        unsafe {
            callable.invoke();
            callable.invoke();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        drop(callable);
        // The closure, and its clone of the Arc, went away when it ran.
        assert_eq!(Arc::strong_count(&count), 1);
    }

    #[test]
    fn dropped_unrun() {
        let count = Arc::new(());
        let c2 = count.clone();
        let callable = Callable::new(move || drop(c2));
        assert_eq!(Arc::strong_count(&count), 2);
        drop(callable);
        assert_eq!(Arc::strong_count(&count), 1);
    }
}
