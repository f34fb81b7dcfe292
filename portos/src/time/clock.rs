// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Clocks and time points.

use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Add, AddAssign, Sub, SubAssign};

use super::{Duration, DurationType, Rep};
use crate::ratio::{Period, Ratio};
use crate::sys::{DefaultKernel, Kernel};

/// A source of [`TimePoint`]s.
pub trait Clock: Sized + 'static {
    /// The representation of the clock's durations.
    type Rep: Rep;
    /// The tick period of the clock.
    type Period: Period;
    /// Whether the clock never runs backwards.
    const IS_STEADY: bool;

    /// The current time.
    fn now() -> TimePoint<Self>;
}

/// A point in time, as a duration since the epoch of clock `C`.
pub struct TimePoint<C: Clock, R: Rep = <C as Clock>::Rep, P: Period = <C as Clock>::Period> {
    since_epoch: Duration<R, P>,
    _clock: PhantomData<fn() -> C>,
}

impl<C: Clock, R: Rep, P: Period> TimePoint<C, R, P> {
    /// The earliest representable time point.
    pub const MIN: Self = Self::from_epoch(Duration::MIN);
    /// The latest representable time point.
    pub const MAX: Self = Self::from_epoch(Duration::MAX);

    /// The time point `d` after the clock's epoch.
    pub const fn from_epoch(d: Duration<R, P>) -> Self {
        TimePoint { since_epoch: d, _clock: PhantomData }
    }

    /// The duration since the clock's epoch.
    pub fn time_since_epoch(&self) -> Duration<R, P> {
        self.since_epoch
    }

    /// Convert the duration since the epoch to another duration type, truncating toward zero.
    pub fn cast<To: DurationType>(self) -> TimePoint<C, To::Rep, To::Period> {
        TimePoint::from_epoch(self.since_epoch.cast::<To>().into_duration())
    }

    /// Convert, rounding toward the future.
    pub fn ceil<To: DurationType>(self) -> TimePoint<C, To::Rep, To::Period> {
        TimePoint::from_epoch(self.since_epoch.ceil::<To>().into_duration())
    }

    /// Convert, rounding toward the past.
    pub fn floor<To: DurationType>(self) -> TimePoint<C, To::Rep, To::Period> {
        TimePoint::from_epoch(self.since_epoch.floor::<To>().into_duration())
    }
}

/// Convert a time point of clock `C` to another duration type, truncating toward zero.
///
/// The free function form of [`TimePoint::cast`].
#[inline]
pub fn time_point_cast<To: DurationType, C: Clock, R: Rep, P: Period>(
    t: TimePoint<C, R, P>,
) -> TimePoint<C, To::Rep, To::Period> {
    t.cast::<To>()
}

impl<C: Clock> TimePoint<C> {
    /// How long until this time point, measured now.  Negative once it has passed.
    pub fn remaining(&self) -> Duration<C::Rep, C::Period> {
        *self - C::now()
    }
}

impl<C: Clock, R: Rep, P: Period> Clone for TimePoint<C, R, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Clock, R: Rep, P: Period> Copy for TimePoint<C, R, P> {}

impl<C: Clock, R: Rep, P: Period> fmt::Debug for TimePoint<C, R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimePoint(+{:?})", self.since_epoch)
    }
}

impl<C: Clock, R: Rep, P: Period> PartialEq for TimePoint<C, R, P> {
    fn eq(&self, other: &Self) -> bool {
        self.since_epoch == other.since_epoch
    }
}

impl<C: Clock, R: Rep + Eq, P: Period> Eq for TimePoint<C, R, P> {}

impl<C: Clock, R: Rep, P: Period> PartialOrd for TimePoint<C, R, P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.since_epoch.partial_cmp(&other.since_epoch)
    }
}

impl<C: Clock, R: Rep + Ord, P: Period> Ord for TimePoint<C, R, P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.since_epoch.cmp(&other.since_epoch)
    }
}

impl<C: Clock, R: Rep, P: Period> Add<Duration<R, P>> for TimePoint<C, R, P> {
    type Output = Self;

    fn add(self, rhs: Duration<R, P>) -> Self {
        Self::from_epoch(self.since_epoch + rhs)
    }
}

impl<C: Clock, R: Rep, P: Period> Sub<Duration<R, P>> for TimePoint<C, R, P> {
    type Output = Self;

    fn sub(self, rhs: Duration<R, P>) -> Self {
        Self::from_epoch(self.since_epoch - rhs)
    }
}

impl<C: Clock, R: Rep, P: Period> Sub for TimePoint<C, R, P> {
    type Output = Duration<R, P>;

    fn sub(self, rhs: Self) -> Duration<R, P> {
        self.since_epoch - rhs.since_epoch
    }
}

impl<C: Clock, R: Rep, P: Period> AddAssign<Duration<R, P>> for TimePoint<C, R, P> {
    fn add_assign(&mut self, rhs: Duration<R, P>) {
        self.since_epoch += rhs;
    }
}

impl<C: Clock, R: Rep, P: Period> SubAssign<Duration<R, P>> for TimePoint<C, R, P> {
    fn sub_assign(&mut self, rhs: Duration<R, P>) {
        self.since_epoch -= rhs;
    }
}

/// The period of the kernel tick counter.
pub type SysTick = Ratio<1, { crate::config::SYSTICK_HZ }>;

/// The kernel tick counter, as a clock.
///
/// The epoch is the start of the kernel.  The counter is steady: it is never adjusted.
pub struct SystemClock<K: Kernel = DefaultKernel>(PhantomData<K>);

/// A steady clock.  The kernel tick counter is the only clock, so this is the same as
/// [`SystemClock`].
pub type SteadyClock<K = DefaultKernel> = SystemClock<K>;

impl<K: Kernel> Clock for SystemClock<K> {
    type Rep = i64;
    type Period = SysTick;
    const IS_STEADY: bool = true;

    fn now() -> TimePoint<Self> {
        TimePoint::from_epoch(Duration::new(K::ticks()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Milliseconds, Seconds};

    struct Fixed;

    impl Clock for Fixed {
        type Rep = i64;
        type Period = crate::ratio::Milli;
        const IS_STEADY: bool = true;

        fn now() -> TimePoint<Self> {
            TimePoint::from_epoch(Milliseconds::new(5000))
        }
    }

    #[test]
    fn arithmetic() {
        let start = Fixed::now();
        let later = start + Milliseconds::new(1500);
        assert_eq!((later - start).count(), 1500);
        assert!(later > start);
        assert_eq!((later - Milliseconds::new(500)).time_since_epoch().count(), 6000);
        assert_eq!(later.cast::<Seconds>().time_since_epoch().count(), 6);
        assert_eq!(later.ceil::<Seconds>().time_since_epoch().count(), 7);
        assert_eq!(time_point_cast::<Seconds, _, _, _>(later).time_since_epoch().count(), 6);
        assert_eq!(later.remaining().count(), 1500);
    }
}
