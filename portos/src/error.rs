// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! # Kernel errors
//!
//! This module contains an `Error` and `Result` type for the fallible operations in this crate.
//! Kernel calls return backend specific status codes.  Those are mapped to a small set of
//! [`ErrorKind`]s, while the backend name and its raw code are kept alongside for diagnostics.
//!
//! Timeouts are not errors: timed operations report them through their return value.  Errors
//! that have no `Result` to travel through (a guard being dropped, a thread entry returning, a
//! kernel failure while blocked) are passed to [`raise`], which calls the hook installed with
//! [`set_raise_hook`] and then panics.

use core::fmt;

use crate::sync::atomic::{AtomicPtr, Ordering};

/// The general class of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A kernel object or pool slot could not be obtained.
    ResourceUnavailable,
    /// A kernel wait expired.  Only produced by backends mapping their own status codes.
    Timeout,
    /// The operation is not allowed in the current state (joining a detached thread, unlocking a
    /// mutex that isn't held, calling from interrupt context).
    NotPermitted,
    /// Locking would never succeed, because the calling thread already owns the mutex.
    Deadlock,
    /// The kernel ran out of memory for an object.
    OutOfMemory,
    /// A parameter was rejected by the kernel.
    InvalidArgument,
    /// Any other kernel failure.
    Other,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ResourceUnavailable => "resource unavailable",
            ErrorKind::Timeout => "timed out",
            ErrorKind::NotPermitted => "operation not permitted",
            ErrorKind::Deadlock => "resource deadlock would occur",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Other => "kernel error",
        }
    }
}

/// A kernel error.
///
/// Carries the [`ErrorKind`], the category (the name of the backend, or "generic" for errors
/// raised by this crate itself), and the raw backend code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    category: &'static str,
    code: i32,
}

impl Error {
    /// An error raised by this crate, not by a kernel call.
    pub const fn new(kind: ErrorKind) -> Error {
        Error { kind, category: "generic", code: 0 }
    }

    /// An error reported by a kernel backend.
    pub const fn kernel(kind: ErrorKind, category: &'static str, code: i32) -> Error {
        Error { kind, category, code }
    }

    /// The class of this error.
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The category this error belongs to.
    pub const fn category(&self) -> &'static str {
        self.category
    }

    /// The raw code, as reported by the backend.  Zero for generic errors.
    pub const fn code(&self) -> i32 {
        self.code
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::new(kind)
    }
}

impl core::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code == 0 {
            write!(f, "{} error: {}", self.category, self.kind.as_str())
        } else {
            write!(f, "{} error {:#x}: {}", self.category, self.code, self.kind.as_str())
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error({:?}, {}, {:#x})", self.kind, self.category, self.code)
    }
}

/// Wraps a value with a possible kernel error.
pub type Result<T> = core::result::Result<T, Error>;

/// The signature of a raise hook.
pub type RaiseHook = fn(&Error);

static RAISE_HOOK: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Install the hook called by [`raise`], replacing any previous one.
///
/// The hook runs before the panic, on the thread that hit the error.  It can log, record, or reset
/// the system.  If it returns, the panic still happens.
pub fn set_raise_hook(hook: RaiseHook) {
    RAISE_HOOK.store(hook as *mut (), Ordering::Release);
}

/// Report an error that cannot be returned to a caller.
///
/// The error is logged, handed to the raise hook if one is installed, and then turned into a
/// panic.
#[cold]
pub fn raise(err: Error) -> ! {
    log::error!("{}", err);
    let hook = RAISE_HOOK.load(Ordering::Acquire);
    if !hook.is_null() {
        // Only ever stored from a `RaiseHook` in `set_raise_hook`.
        let hook = unsafe { core::mem::transmute::<*mut (), RaiseHook>(hook) };
        hook(&err);
    }
    panic!("{}", err);
}

/// Unwrap a result, sending any error to [`raise`].
#[inline]
pub(crate) fn or_raise<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => raise(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = Error::new(ErrorKind::Deadlock);
        assert_eq!(format!("{}", err), "generic error: resource deadlock would occur");
        let err = Error::kernel(ErrorKind::ResourceUnavailable, "cmsis", 0x81);
        assert_eq!(format!("{}", err), "cmsis error 0x81: resource unavailable");
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
        assert_eq!(err.code(), 0x81);
    }
}
