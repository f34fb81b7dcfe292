// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Portable RTOS support for Rust
//!
//! This crate provides the threading and timing layer of an application that runs on top of a
//! small real-time kernel.  It is built in two layers:
//!
//! - [`sys`]: the kernel capability interface (mutex, semaphore, thread, tick counter, signals)
//!   and the backends implementing it, along with thin wrappers that turn the native bounded waits
//!   into arbitrary-length timed waits.
//! - Everything else: compile-time [`ratio`] arithmetic, [`time`] durations and clocks, the
//!   higher level [`sync`] primitives (including a condition variable the kernel doesn't provide),
//!   fixed capacity memory [`pool`]s, and reference-counted [`thread`]s.
//!
//! Nothing here allocates from a heap.  Threads are backed by a statically sized pool whose
//! capacity is part of the build [`config`].

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

pub mod align;
pub mod error;
pub mod logging;
pub mod pool;
pub mod ratio;
pub mod sync;
pub mod sys;
pub mod thread;
pub mod time;

pub use error::{Error, Result};

pub use logging::set_logger;

// Bring in the generated configuration module
pub mod config {
    //! Build configuration values.
    //!
    //! This module contains an auto-generated set of constants, set through the `PORTOS_CONFIG`
    //! file or `PORTOS_*` environment variables at build time.
    //!
    //! **Note**: Unless you are viewing docs generated for a specific build, the values below are
    //! the defaults, and are unlikely to match those of a given build.

    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}
