// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! CMSIS-RTOS v1 (Keil RTX) declarations.
//!
//! Only the calls the backend uses are declared.  The layouts follow `cmsis_os.h` for a 32-bit
//! target.

#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals, missing_docs)]

use core::ffi::c_void;

pub type osStatus = i32;
pub type osPriority = i32;
pub type osThreadId = *mut c_void;
pub type osMutexId = *mut c_void;
pub type osSemaphoreId = *mut c_void;
// Declared `void (*)(void const *)` in C; the constness of the argument doesn't change the ABI.
pub type os_pthread = unsafe extern "C" fn(argument: *mut c_void);

pub const osOK: osStatus = 0x00;
pub const osEventSignal: osStatus = 0x08;
pub const osEventTimeout: osStatus = 0x40;
pub const osErrorParameter: osStatus = 0x80;
pub const osErrorResource: osStatus = 0x81;
pub const osErrorTimeoutResource: osStatus = 0xC1;
pub const osErrorISR: osStatus = 0x82;
pub const osErrorISRRecursive: osStatus = 0x83;
pub const osErrorPriority: osStatus = 0x84;
pub const osErrorNoMemory: osStatus = 0x85;
pub const osErrorValue: osStatus = 0x86;

pub const osWaitForever: u32 = 0xFFFF_FFFF;

/// Returned by `osSignalSet`/`osSignalClear` on failure.
pub const osSignalError: i32 = 0x8000_0000_u32 as i32;

/// Words of RTX storage behind a mutex.
pub const MUTEX_CB_WORDS: usize = 3;
/// Words of RTX storage behind a semaphore.
pub const SEMAPHORE_CB_WORDS: usize = 2;

#[repr(C)]
pub struct osMutexDef_t {
    pub mutex: *mut c_void,
}

#[repr(C)]
pub struct osSemaphoreDef_t {
    pub semaphore: *mut c_void,
}

#[repr(C)]
pub struct osThreadDef_t {
    pub pthread: os_pthread,
    pub tpriority: osPriority,
    pub instances: u32,
    pub stacksize: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union osEventValue {
    pub v: u32,
    pub p: *mut c_void,
    pub signals: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct osEvent {
    pub status: osStatus,
    pub value: osEventValue,
    pub def: *mut c_void,
}

/// The first word of an RTX semaphore control block.
#[repr(C)]
pub struct SemaphoreHeader {
    pub cb_type: u8,
    pub mask: u8,
    pub tokens: u16,
}

extern "C" {
    pub fn osMutexCreate(mutex_def: *const osMutexDef_t) -> osMutexId;
    pub fn osMutexWait(mutex_id: osMutexId, millisec: u32) -> osStatus;
    pub fn osMutexRelease(mutex_id: osMutexId) -> osStatus;
    pub fn osMutexDelete(mutex_id: osMutexId) -> osStatus;

    pub fn osSemaphoreCreate(semaphore_def: *const osSemaphoreDef_t, count: i32) -> osSemaphoreId;
    pub fn osSemaphoreWait(semaphore_id: osSemaphoreId, millisec: u32) -> i32;
    pub fn osSemaphoreRelease(semaphore_id: osSemaphoreId) -> osStatus;
    pub fn osSemaphoreDelete(semaphore_id: osSemaphoreId) -> osStatus;

    pub fn osThreadCreate(thread_def: *const osThreadDef_t, argument: *mut c_void) -> osThreadId;
    pub fn osThreadGetId() -> osThreadId;
    pub fn osThreadYield() -> osStatus;
    pub fn osDelay(millisec: u32) -> osStatus;

    pub fn osSignalSet(thread_id: osThreadId, signals: i32) -> i32;
    pub fn osSignalClear(thread_id: osThreadId, signals: i32) -> i32;
    pub fn osSignalWait(signals: i32, millisec: u32) -> osEvent;

    /// The RTX tick counter.
    pub fn rt_time_get() -> u32;
}
