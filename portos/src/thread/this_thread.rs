// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Operations on the calling thread.
//!
//! Every thread has [`SIGNALS_COUNT`] signal flags, set by other threads through
//! [`Thread::set_signals`](super::Thread::set_signals).  A wait takes the flags that satisfy it,
//! clearing them.

use super::{Id, SignalSet};
use crate::error::{Error, ErrorKind, Result};
use crate::ratio::Period;
use crate::sys::{Chunks, DefaultKernel, Kernel};
use crate::time::{wait_millis, Clock, Duration, Rep, TimePoint};

/// The number of signal flags per thread.
pub const SIGNALS_COUNT: usize = 16;

/// All signal flags.
pub const ALL_SIGNALS: SignalSet = ((1u32 << SIGNALS_COUNT) - 1) as SignalSet;

/// The id of the calling thread.
pub fn get_id() -> Id {
    Id(DefaultKernel::current())
}

/// Let other ready threads of the same priority run.
pub fn yield_now() {
    DefaultKernel::yield_now();
}

/// Block for at least `duration`.  Durations of zero or less return at once.
pub fn sleep_for<R: Rep, P: Period>(duration: Duration<R, P>) {
    let total = wait_millis(duration);
    if total == 0 {
        return;
    }
    for ms in Chunks::new(total, DefaultKernel::MAX_WAIT_MS) {
        DefaultKernel::sleep_ms(ms);
    }
}

/// Block until `deadline` has passed.
pub fn sleep_until<C: Clock>(deadline: TimePoint<C>) {
    loop {
        let remaining = deadline.remaining();
        if remaining.is_expired() {
            break;
        }
        sleep_for(remaining);
    }
}

/// Wait until any signal flag is set, returning (and clearing) the flags that were set.
pub fn wait_for_any_signal() -> Result<SignalSet> {
    DefaultKernel::wait_signals(0, None)
}

/// Take whatever signal flags are set, without waiting.  Returns zero if none were.
pub fn try_wait_for_any_signal() -> Result<SignalSet> {
    DefaultKernel::wait_signals(0, Some(0))
}

/// Wait at most `timeout` for any signal flag.  Returns zero on timeout.
pub fn try_wait_for_any_signal_for<R: Rep, P: Period>(
    timeout: Duration<R, P>,
) -> Result<SignalSet> {
    for ms in Chunks::new(wait_millis(timeout), DefaultKernel::MAX_WAIT_MS) {
        let taken = DefaultKernel::wait_signals(0, Some(ms))?;
        if taken != 0 {
            return Ok(taken);
        }
    }
    Ok(0)
}

/// Wait until all flags in `signals` are set, and clear them.
///
/// An empty set is an [`ErrorKind::InvalidArgument`].
pub fn wait_for_all_signals(signals: SignalSet) -> Result<()> {
    DefaultKernel::wait_signals(check_mask(signals)?, None).map(|_| ())
}

/// Take all flags in `signals` if they are set, without waiting.
pub fn try_wait_for_all_signals(signals: SignalSet) -> Result<bool> {
    Ok(DefaultKernel::wait_signals(check_mask(signals)?, Some(0))? != 0)
}

/// Wait at most `timeout` for all flags in `signals` to be set, and clear them.  Returns false on
/// timeout, leaving the flags alone.
pub fn try_wait_for_all_signals_for<R: Rep, P: Period>(
    signals: SignalSet,
    timeout: Duration<R, P>,
) -> Result<bool> {
    let mask = check_mask(signals)?;
    for ms in Chunks::new(wait_millis(timeout), DefaultKernel::MAX_WAIT_MS) {
        if DefaultKernel::wait_signals(mask, Some(ms))? != 0 {
            return Ok(true);
        }
    }
    Ok(false)
}

// A zero mask would mean "any" to the kernel.
fn check_mask(signals: SignalSet) -> Result<SignalSet> {
    if signals == 0 {
        Err(Error::new(ErrorKind::InvalidArgument))
    } else {
        Ok(signals)
    }
}
