// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! CMSIS-RTOS v1 kernel.
//!
//! Thin wrappers around the Keil RTX implementation of CMSIS-RTOS v1.  RTX keeps the state of a
//! mutex or semaphore in a small control block supplied by the caller, which must not move while
//! the object exists.  These blocks come from fixed pools, sized by
//! [`CMSIS_MAX_MUTEXES`](crate::config::CMSIS_MAX_MUTEXES) and
//! [`CMSIS_MAX_SEMAPHORES`](crate::config::CMSIS_MAX_SEMAPHORES), guarded by a critical section.
//!
//! The RTX tick counter is 32 bits wide.  [`Cmsis::ticks`] extends it to 64 bits, which requires
//! it to be called at least once per wrap of the counter.

use core::cell::Cell;
use core::ffi::c_void;
use core::fmt;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use super::sync::CriticalSectionMutex;
use super::{Attributes, Entry, Kernel, RawMutex, RawSemaphore, SignalSet};
use crate::config;
use crate::error::{raise, Error, ErrorKind, Result};
use crate::pool::MemoryPool;

mod raw;

/// The CMSIS-RTOS kernel.
#[derive(Debug)]
pub struct Cmsis;

const NAME: &str = "cmsis";

/// Most tokens a semaphore can hold.
pub const SEMAPHORE_MAX: u32 = 0xFFFF;

// RTX takes timeouts in ticks, at most 0xFFFE of them.
const NATIVE_LIMIT_MS: u32 = (0xFFFE_i64 * 1000 / config::SYSTICK_HZ) as u32;

const fn min(a: u32, b: u32) -> u32 {
    if a < b {
        a
    } else {
        b
    }
}

// A timeout of one tick may expire at the very next tick boundary, so one millisecond is added
// to every non-zero wait.
fn native_ms(ms: u32) -> u32 {
    if ms == 0 {
        0
    } else {
        ms + 1
    }
}

fn cmsis_error(status: raw::osStatus) -> Error {
    let kind = match status {
        raw::osErrorResource => ErrorKind::ResourceUnavailable,
        raw::osErrorTimeoutResource => ErrorKind::Timeout,
        raw::osErrorNoMemory => ErrorKind::OutOfMemory,
        raw::osErrorISR | raw::osErrorISRRecursive => ErrorKind::NotPermitted,
        raw::osErrorParameter | raw::osErrorValue | raw::osErrorPriority => {
            ErrorKind::InvalidArgument
        }
        _ => ErrorKind::Other,
    };
    Error::kernel(kind, NAME, status)
}

fn check(status: raw::osStatus) -> Result<()> {
    if status == raw::osOK {
        Ok(())
    } else {
        Err(cmsis_error(status))
    }
}

/// A timed wait: `osOK` is success, running out of time is `false`.
fn check_wait(status: raw::osStatus) -> Result<bool> {
    match status {
        raw::osOK => Ok(true),
        raw::osErrorResource | raw::osErrorTimeoutResource => Ok(false),
        status => Err(cmsis_error(status)),
    }
}

type MutexBlock = [u32; raw::MUTEX_CB_WORDS];
type SemaphoreBlock = [u32; raw::SEMAPHORE_CB_WORDS];

type BlockPool<B, const N: usize> = MemoryPool<B, N, CriticalSectionMutex>;

static MUTEX_BLOCKS: spin::Once<BlockPool<MutexBlock, { config::CMSIS_MAX_MUTEXES }>> =
    spin::Once::new();
static SEMAPHORE_BLOCKS: spin::Once<BlockPool<SemaphoreBlock, { config::CMSIS_MAX_SEMAPHORES }>> =
    spin::Once::new();

/// Take a zeroed control block from `pool`.
fn take_block<B: Copy, const N: usize>(
    pool: &BlockPool<B, N>,
    zero: B,
    what: &str,
) -> Result<NonNull<MaybeUninit<B>>> {
    match pool.allocate() {
        Some(block) => {
            unsafe { block.as_ptr().write(MaybeUninit::new(zero)) };
            Ok(block)
        }
        None => {
            log::warn!("All {} {} control blocks are in use", N, what);
            Err(cmsis_error(raw::osErrorNoMemory))
        }
    }
}

fn mutex_blocks() -> &'static BlockPool<MutexBlock, { config::CMSIS_MAX_MUTEXES }> {
    MUTEX_BLOCKS.call_once(|| MemoryPool::with_mutex(CriticalSectionMutex::new()))
}

fn semaphore_blocks() -> &'static BlockPool<SemaphoreBlock, { config::CMSIS_MAX_SEMAPHORES }> {
    SEMAPHORE_BLOCKS.call_once(|| MemoryPool::with_mutex(CriticalSectionMutex::new()))
}

/// An RTX mutex.
pub struct CmsisMutex {
    id: NonNull<c_void>,
    block: NonNull<MaybeUninit<MutexBlock>>,
}

// RTX objects are used through their id from any thread.
unsafe impl Send for CmsisMutex {}
unsafe impl Sync for CmsisMutex {}

impl RawMutex for CmsisMutex {
    fn new() -> Result<Self> {
        let blocks = mutex_blocks();
        let block = take_block(blocks, [0; raw::MUTEX_CB_WORDS], "mutex")?;
        let def = raw::osMutexDef_t { mutex: block.as_ptr().cast() };
        match NonNull::new(unsafe { raw::osMutexCreate(&def) }) {
            Some(id) => Ok(CmsisMutex { id, block }),
            None => {
                unsafe { blocks.free(block) };
                Err(cmsis_error(raw::osErrorResource))
            }
        }
    }

    fn lock(&self) -> Result<()> {
        check(unsafe { raw::osMutexWait(self.id.as_ptr(), raw::osWaitForever) })
    }

    fn try_lock(&self) -> Result<bool> {
        check_wait(unsafe { raw::osMutexWait(self.id.as_ptr(), 0) })
    }

    fn try_lock_ms(&self, ms: u32) -> Result<bool> {
        check_wait(unsafe { raw::osMutexWait(self.id.as_ptr(), native_ms(ms)) })
    }

    unsafe fn unlock(&self) -> Result<()> {
        check(raw::osMutexRelease(self.id.as_ptr()))
    }
}

impl Drop for CmsisMutex {
    fn drop(&mut self) {
        unsafe {
            raw::osMutexDelete(self.id.as_ptr());
            mutex_blocks().free(self.block);
        }
    }
}

impl fmt::Debug for CmsisMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CmsisMutex({:p})", self.id)
    }
}

/// An RTX semaphore.
pub struct CmsisSemaphore {
    id: NonNull<c_void>,
    block: NonNull<MaybeUninit<SemaphoreBlock>>,
}

unsafe impl Send for CmsisSemaphore {}
unsafe impl Sync for CmsisSemaphore {}

impl CmsisSemaphore {
    fn wait_ms(&self, ms: u32) -> Result<bool> {
        // The number of tokens before taking one, zero on timeout, or -1 for a bad id.
        let tokens = unsafe { raw::osSemaphoreWait(self.id.as_ptr(), ms) };
        match tokens {
            n if n > 0 => Ok(true),
            0 => Ok(false),
            _ => Err(cmsis_error(raw::osErrorParameter)),
        }
    }
}

impl RawSemaphore for CmsisSemaphore {
    fn new(count: u32) -> Result<Self> {
        if count > SEMAPHORE_MAX {
            return Err(cmsis_error(raw::osErrorValue));
        }
        let blocks = semaphore_blocks();
        let block = take_block(blocks, [0; raw::SEMAPHORE_CB_WORDS], "semaphore")?;
        let def = raw::osSemaphoreDef_t { semaphore: block.as_ptr().cast() };
        match NonNull::new(unsafe { raw::osSemaphoreCreate(&def, count as i32) }) {
            Some(id) => Ok(CmsisSemaphore { id, block }),
            None => {
                unsafe { blocks.free(block) };
                Err(cmsis_error(raw::osErrorResource))
            }
        }
    }

    fn post(&self) -> Result<()> {
        check(unsafe { raw::osSemaphoreRelease(self.id.as_ptr()) })
    }

    fn wait(&self) -> Result<()> {
        if self.wait_ms(raw::osWaitForever)? {
            Ok(())
        } else {
            Err(cmsis_error(raw::osErrorTimeoutResource))
        }
    }

    fn try_wait(&self) -> Result<bool> {
        self.wait_ms(0)
    }

    fn try_wait_ms(&self, ms: u32) -> Result<bool> {
        self.wait_ms(native_ms(ms))
    }

    fn value(&self) -> u32 {
        let header = self.block.as_ptr().cast::<raw::SemaphoreHeader>();
        unsafe { ptr::read_volatile(ptr::addr_of!((*header).tokens)) as u32 }
    }
}

impl Drop for CmsisSemaphore {
    fn drop(&mut self) {
        unsafe {
            raw::osSemaphoreDelete(self.id.as_ptr());
            semaphore_blocks().free(self.block);
        }
    }
}

impl fmt::Debug for CmsisSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CmsisSemaphore({:p})", self.id)
    }
}

/// An RTX thread id.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CmsisThreadId(NonNull<c_void>);

unsafe impl Send for CmsisThreadId {}
unsafe impl Sync for CmsisThreadId {}

impl fmt::Debug for CmsisThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", self.0)
    }
}

#[derive(Clone, Copy)]
struct TickExtension {
    last: u32,
    wraps: u32,
}

static TICKS: critical_section::Mutex<Cell<TickExtension>> =
    critical_section::Mutex::new(Cell::new(TickExtension { last: 0, wraps: 0 }));

impl Kernel for Cmsis {
    type Mutex = CmsisMutex;
    type Semaphore = CmsisSemaphore;
    type ThreadId = CmsisThreadId;

    const NAME: &'static str = NAME;
    const MAX_WAIT_MS: u32 = min(config::MAX_WAIT_MS, NATIVE_LIMIT_MS - 1);

    fn ticks() -> i64 {
        critical_section::with(|cs| {
            let cell = TICKS.borrow(cs);
            let mut ext = cell.get();
            let now = unsafe { raw::rt_time_get() };
            if now < ext.last {
                ext.wraps += 1;
            }
            ext.last = now;
            cell.set(ext);
            ((ext.wraps as i64) << 32) | now as i64
        })
    }

    unsafe fn spawn(entry: Entry, arg: *mut c_void, attrs: &Attributes) -> Result<CmsisThreadId> {
        // RTX v1 threads have no name.
        let stacksize = match attrs.stack_size {
            Some(size) => u32::try_from(size).map_err(|_| cmsis_error(raw::osErrorParameter))?,
            None => 0,
        };
        let def = raw::osThreadDef_t {
            pthread: entry,
            tpriority: attrs.priority.cmsis_level(),
            instances: 1,
            stacksize,
        };
        NonNull::new(raw::osThreadCreate(&def, arg))
            .map(CmsisThreadId)
            .ok_or(cmsis_error(raw::osErrorResource))
    }

    fn current() -> CmsisThreadId {
        match NonNull::new(unsafe { raw::osThreadGetId() }) {
            Some(id) => CmsisThreadId(id),
            None => raise(cmsis_error(raw::osErrorISR)),
        }
    }

    fn sleep_ms(ms: u32) {
        unsafe { raw::osDelay(native_ms(ms)) };
    }

    fn yield_now() {
        unsafe { raw::osThreadYield() };
    }

    fn set_signals(thread: CmsisThreadId, signals: SignalSet) -> Result<SignalSet> {
        match unsafe { raw::osSignalSet(thread.0.as_ptr(), signals as i32) } {
            raw::osSignalError => Err(cmsis_error(raw::osErrorParameter)),
            previous => Ok(previous as SignalSet),
        }
    }

    fn clear_signals(thread: CmsisThreadId, signals: SignalSet) -> Result<SignalSet> {
        match unsafe { raw::osSignalClear(thread.0.as_ptr(), signals as i32) } {
            raw::osSignalError => Err(cmsis_error(raw::osErrorParameter)),
            previous => Ok(previous as SignalSet),
        }
    }

    fn wait_signals(mask: SignalSet, ms: Option<u32>) -> Result<SignalSet> {
        let timeout = ms.map_or(raw::osWaitForever, native_ms);
        let event = unsafe { raw::osSignalWait(mask as i32, timeout) };
        match event.status {
            raw::osEventSignal => Ok(unsafe { event.value.signals } as SignalSet),
            raw::osOK | raw::osEventTimeout => Ok(0),
            status => Err(cmsis_error(status)),
        }
    }
}
