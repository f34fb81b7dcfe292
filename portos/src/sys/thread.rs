// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Low level thread definitions shared by the kernel backends.
//!
//! These describe how a native thread is started: the C-compatible entry point it runs, and the
//! attributes it is created with.  The managed thread type built on top of this is in
//! [`crate::thread`].

use core::ffi::c_void;

/// The entry point of a native thread.
pub type Entry = unsafe extern "C" fn(arg: *mut c_void);

/// Per-thread signal flags.  Kernels provide 16 of them.
pub type SignalSet = u16;

/// Thread priority, using the CMSIS-RTOS levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Only runs when nothing else can.
    Idle,
    /// Low.
    Low,
    /// Below normal.
    BelowNormal,
    /// The default.
    #[default]
    Normal,
    /// Above normal.
    AboveNormal,
    /// High.
    High,
    /// Realtime: the highest priority.
    Realtime,
}

impl Priority {
    /// The CMSIS-RTOS `osPriority` value of this level.
    pub const fn cmsis_level(self) -> i32 {
        match self {
            Priority::Idle => -3,
            Priority::Low => -2,
            Priority::BelowNormal => -1,
            Priority::Normal => 0,
            Priority::AboveNormal => 1,
            Priority::High => 2,
            Priority::Realtime => 3,
        }
    }
}

/// The attributes a thread is created with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    /// Scheduling priority.
    pub priority: Priority,
    /// Stack size in bytes.  `None` uses the kernel's default.
    pub stack_size: Option<usize>,
    /// Name, where the kernel keeps one.
    pub name: Option<&'static str>,
}

impl Attributes {
    /// The default attributes.
    pub const fn new() -> Attributes {
        Attributes { priority: Priority::Normal, stack_size: None, name: None }
    }
}
