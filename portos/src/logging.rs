// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Rust logging for portos
//!
//! All diagnostics from this crate go through the `log` crate: pool exhaustion and failed thread
//! creation at `warn`, errors passed to [`raise`](crate::error::raise) at `error`, and object
//! lifecycle at `debug`.  The application is free to install any logger it likes.
//!
//! [`set_logger`] installs a simple logger appropriate to the backend.  With the hosted backend,
//! messages are written to stderr.  Without it, there is no console this crate knows about, and
//! the call does nothing.

use log::{LevelFilter, Log, SetLoggerError};

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        mod impl_stderr;
        pub use impl_stderr::set_logger;
    } else {
        /// No logging is possible, provide an empty handler that does nothing.
        ///
        /// # Safety
        ///
        /// Always safe, it is unsafe only to match the signature of the other loggers.
        pub unsafe fn set_logger() -> Result<(), SetLoggerError> {
            Ok(())
        }
    }
}

// The Rust logging system has different entry points based on whether or not we are on a target
// with atomic pointers.  We will provide a single function for this, which will be safe or unsafe
// depending on this.  The safety has to do with initialization order, and as long as this is called
// before any other threads run, it should be safe.
cfg_if::cfg_if! {
    if #[cfg(target_has_atomic = "ptr")] {
        #[allow(dead_code)]
        unsafe fn set_logger_internal(logger: &'static dyn Log) -> Result<(), SetLoggerError> {
            log::set_logger(logger)?;
            log::set_max_level(LevelFilter::Info);
            Ok(())
        }
    } else {
        #[allow(dead_code)]
        unsafe fn set_logger_internal(logger: &'static dyn Log) -> Result<(), SetLoggerError> {
            log::set_logger_racy(logger)?;
            log::set_max_level_racy(LevelFilter::Info);
            Ok(())
        }
    }
}
