// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Time types.
//!
//! A [`Duration`] is a count of ticks of some [`Period`], where the period is carried entirely in
//! the type.  Converting between periods multiplies and divides by a factor computed at compile
//! time, so conversions between the usual units cost at most one multiply or one divide.
//!
//! Integral conversions truncate toward zero.  Conversions that can't lose information are
//! available through [`Duration::convert`], which refuses to compile otherwise.  Durations of
//! different periods and representations can be compared directly; they are compared exactly in
//! their common period.
//!
//! [`TimePoint`]s are durations measured from the epoch of a [`Clock`].  The kernel tick counter
//! is exposed as [`SystemClock`].

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::ratio::{Common, Conversion, Micro, Milli, Nano, Period, Ratio, Rational, Unit};

mod clock;
mod fugit;

pub use clock::{time_point_cast, Clock, SteadyClock, SysTick, SystemClock, TimePoint};

/// The representation of a duration's tick count.
///
/// Implemented for the signed integers and the floats.
pub trait Rep:
    Copy
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Rem<Output = Self>
    + Neg<Output = Self>
{
    /// Whether this is a floating point type.
    const IS_FLOAT: bool;
    /// Width in bits.
    const BITS: u32;
    /// Zero.
    const ZERO: Self;
    /// One.
    const ONE: Self;
    /// The smallest (most negative) value.
    const MIN: Self;
    /// The largest value.
    const MAX: Self;

    /// Convert to `i64`, truncating floats toward zero.
    fn to_i64(self) -> i64;
    /// Convert from `i64`, with `as` semantics.
    fn from_i64(value: i64) -> Self;
    /// Convert to `i128`, truncating floats toward zero.
    fn to_i128(self) -> i128;
    /// Convert from `i128`, with `as` semantics.
    fn from_i128(value: i128) -> Self;
    /// Convert to `f64`.
    fn to_f64(self) -> f64;
    /// Convert from `f64`, truncating toward zero for integers.
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_rep {
    ($is_float:literal, $bits:literal, $zero:literal, $one:literal; $($t:ty),*) => {
        $(
            impl Rep for $t {
                const IS_FLOAT: bool = $is_float;
                const BITS: u32 = $bits;
                const ZERO: Self = $zero;
                const ONE: Self = $one;
                const MIN: Self = <$t>::MIN;
                const MAX: Self = <$t>::MAX;

                #[inline]
                fn to_i64(self) -> i64 { self as i64 }
                #[inline]
                fn from_i64(value: i64) -> Self { value as $t }
                #[inline]
                fn to_i128(self) -> i128 { self as i128 }
                #[inline]
                fn from_i128(value: i128) -> Self { value as $t }
                #[inline]
                fn to_f64(self) -> f64 { self as f64 }
                #[inline]
                fn from_f64(value: f64) -> Self { value as $t }
            }
        )*
    };
}

impl_rep!(false, 8, 0, 1; i8);
impl_rep!(false, 16, 0, 1; i16);
impl_rep!(false, 32, 0, 1; i32);
impl_rep!(false, 64, 0, 1; i64);
impl_rep!(false, 128, 0, 1; i128);
impl_rep!(true, 32, 0.0, 1.0; f32);
impl_rep!(true, 64, 0.0, 1.0; f64);

/// Scale a count by `ratio`.
///
/// The work is done in `f64` if either side is floating point, otherwise in `i64` unless one side
/// is wider, in which case `i128` is used.  Unit ratios are a plain cast, integral ratios a single
/// multiply, and reciprocals a single divide.
#[inline]
pub(crate) fn cast_count<R1: Rep, R2: Rep>(count: R1, ratio: Rational) -> R2 {
    let (num, den) = (ratio.num(), ratio.den());
    if R1::IS_FLOAT || R2::IS_FLOAT {
        let v = count.to_f64();
        R2::from_f64(match (num == 1, den == 1) {
            (true, true) => v,
            (false, true) => v * num as f64,
            (true, false) => v / den as f64,
            (false, false) => v * num as f64 / den as f64,
        })
    } else if R1::BITS <= 64 && R2::BITS <= 64 {
        let v = count.to_i64();
        R2::from_i64(match (num == 1, den == 1) {
            (true, true) => v,
            (false, true) => v * num,
            (true, false) => v / den,
            (false, false) => v * num / den,
        })
    } else {
        let (v, num, den) = (count.to_i128(), num as i128, den as i128);
        R2::from_i128(match (num == 1, den == 1) {
            (true, true) => v,
            (false, true) => v * num,
            (true, false) => v / den,
            (false, false) => v * num / den,
        })
    }
}

/// Compare two counts of different periods exactly, in their common period.
fn compare<R1: Rep, P1: Period, R2: Rep, P2: Period>(a: R1, b: R2) -> Option<Ordering> {
    // Both factors are integers, since the common period divides both periods.
    let left = Conversion::<P1, Common<P1, P2>>::RATIO.num();
    let right = Conversion::<P2, Common<P1, P2>>::RATIO.num();
    if !R1::IS_FLOAT && !R2::IS_FLOAT {
        let a = a.to_i128().checked_mul(left as i128);
        let b = b.to_i128().checked_mul(right as i128);
        if let (Some(a), Some(b)) = (a, b) {
            return Some(a.cmp(&b));
        }
    }
    (a.to_f64() * left as f64).partial_cmp(&(b.to_f64() * right as f64))
}

/// A span of time: a count of ticks of period `P`, stored as an `R`.
pub struct Duration<R, P = Unit> {
    count: R,
    _period: PhantomData<P>,
}

/// Implemented by the [`Duration`] types, so that a destination type can be named with a single
/// parameter, as in `d.cast::<Milliseconds>()`.
pub trait DurationType: Copy + sealed::Sealed {
    /// The representation.
    type Rep: Rep;
    /// The period.
    type Period: Period;

    /// Build from the underlying duration.
    fn from_duration(d: Duration<Self::Rep, Self::Period>) -> Self;

    /// The underlying duration.
    fn into_duration(self) -> Duration<Self::Rep, Self::Period>;
}

mod sealed {
    pub trait Sealed {}
}

impl<R: Rep, P: Period> sealed::Sealed for Duration<R, P> {}

impl<R: Rep, P: Period> DurationType for Duration<R, P> {
    type Rep = R;
    type Period = P;

    #[inline]
    fn from_duration(d: Self) -> Self {
        d
    }

    #[inline]
    fn into_duration(self) -> Self {
        self
    }
}

impl<R: Rep, P: Period> Duration<R, P> {
    /// A zero length duration.
    pub const ZERO: Self = Self::new(R::ZERO);
    /// The most negative duration.
    pub const MIN: Self = Self::new(R::MIN);
    /// The largest duration.
    pub const MAX: Self = Self::new(R::MAX);

    /// A duration of `count` ticks.
    #[inline]
    pub const fn new(count: R) -> Self {
        const { assert!(P::RATIO.num() > 0, "a duration period must be positive") };
        Duration { count, _period: PhantomData }
    }

    /// A duration from a count of another representation.  Integral durations can't be built
    /// from a floating point count.
    pub fn from_count<R2: Rep>(count: R2) -> Self {
        const {
            assert!(R::IS_FLOAT || !R2::IS_FLOAT, "integral durations can't hold a float count")
        };
        if R2::IS_FLOAT {
            Self::new(R::from_f64(count.to_f64()))
        } else {
            Self::new(R::from_i128(count.to_i128()))
        }
    }

    /// The number of ticks.
    #[inline]
    pub fn count(&self) -> R {
        self.count
    }

    /// The period of a tick, in seconds.
    pub const fn period() -> Rational {
        P::RATIO
    }

    /// Convert to another duration type.  Integral results are truncated toward zero.
    #[inline]
    pub fn cast<To: DurationType>(self) -> To {
        let count = cast_count::<R, To::Rep>(self.count, Conversion::<P, To::Period>::RATIO);
        To::from_duration(Duration::new(count))
    }

    /// Convert to another duration type without any loss: the destination is floating point, or
    /// its period evenly divides this one.  Other conversions don't compile.
    #[inline]
    pub fn convert<To: DurationType>(self) -> To {
        const {
            assert!(
                <To::Rep as Rep>::IS_FLOAT
                    || (!R::IS_FLOAT && Conversion::<P, To::Period>::RATIO.is_integer()),
                "conversion may lose precision, use cast()"
            )
        };
        self.cast()
    }

    /// Convert, rounding toward negative infinity.
    pub fn floor<To: DurationType>(self) -> To {
        let t = self.cast::<To>().into_duration();
        if t > self {
            To::from_duration(t - Duration::new(<To::Rep as Rep>::ONE))
        } else {
            To::from_duration(t)
        }
    }

    /// Convert, rounding toward positive infinity.
    pub fn ceil<To: DurationType>(self) -> To {
        let t = self.cast::<To>().into_duration();
        if t < self {
            To::from_duration(t + Duration::new(<To::Rep as Rep>::ONE))
        } else {
            To::from_duration(t)
        }
    }

    /// The absolute value.
    pub fn abs(self) -> Self {
        if self.count < R::ZERO {
            -self
        } else {
            self
        }
    }

    /// Whether this is zero or negative.
    pub fn is_expired(&self) -> bool {
        self.count <= R::ZERO
    }

    /// Add one tick, returning the new value.
    pub fn inc(&mut self) -> Self {
        self.count = self.count + R::ONE;
        *self
    }

    /// Subtract one tick, returning the new value.
    pub fn dec(&mut self) -> Self {
        self.count = self.count - R::ONE;
        *self
    }

    /// Add a duration of another period, producing a duration in the common period.
    pub fn add_common<P2: Period>(self, rhs: Duration<R, P2>) -> Duration<R, Common<P, P2>> {
        self.cast::<Duration<R, Common<P, P2>>>() + rhs.cast()
    }

    /// Subtract a duration of another period, producing a duration in the common period.
    pub fn sub_common<P2: Period>(self, rhs: Duration<R, P2>) -> Duration<R, Common<P, P2>> {
        self.cast::<Duration<R, Common<P, P2>>>() - rhs.cast()
    }
}

/// Convert a duration to another duration type, truncating toward zero.
///
/// ```
/// use portos::time::{duration_cast, Milliseconds, Seconds};
///
/// let ms: Milliseconds = duration_cast(Seconds::new(3));
/// assert_eq!(ms.count(), 3000);
/// assert_eq!(duration_cast::<Seconds>(Milliseconds::new(-1999)).count(), -1);
/// ```
#[inline]
pub fn duration_cast<To: DurationType>(d: impl DurationType) -> To {
    d.into_duration().cast()
}

impl<R: Copy, P> Clone for Duration<R, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Copy, P> Copy for Duration<R, P> {}

impl<R: Rep, P: Period> Default for Duration<R, P> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<R: Rep, P: Period> fmt::Debug for Duration<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match P::RATIO {
            r if r == Nano::RATIO => "ns",
            r if r == Micro::RATIO => "us",
            r if r == Milli::RATIO => "ms",
            r if r == Unit::RATIO => "s",
            r if r == Ratio::<60>::RATIO => "min",
            r if r == Ratio::<3600>::RATIO => "h",
            r => return write!(f, "{}*[{}]s", self.count, r),
        };
        write!(f, "{}{}", self.count, unit)
    }
}

impl<R1: Rep, P1: Period, R2: Rep, P2: Period> PartialEq<Duration<R2, P2>> for Duration<R1, P1> {
    fn eq(&self, other: &Duration<R2, P2>) -> bool {
        compare::<R1, P1, R2, P2>(self.count, other.count) == Some(Ordering::Equal)
    }
}

impl<R1: Rep, P1: Period, R2: Rep, P2: Period> PartialOrd<Duration<R2, P2>> for Duration<R1, P1> {
    fn partial_cmp(&self, other: &Duration<R2, P2>) -> Option<Ordering> {
        compare::<R1, P1, R2, P2>(self.count, other.count)
    }
}

impl<R: Rep + Eq, P: Period> Eq for Duration<R, P> {}

impl<R: Rep + Ord, P: Period> Ord for Duration<R, P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count.cmp(&other.count)
    }
}

impl<R: Rep + Hash, P: Period> Hash for Duration<R, P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.count.hash(state);
    }
}

impl<R: Rep, P: Period> Add for Duration<R, P> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.count + rhs.count)
    }
}

impl<R: Rep, P: Period> Sub for Duration<R, P> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.count - rhs.count)
    }
}

impl<R: Rep, P: Period> Neg for Duration<R, P> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.count)
    }
}

impl<R: Rep, P: Period> Mul<R> for Duration<R, P> {
    type Output = Self;

    fn mul(self, rhs: R) -> Self {
        Self::new(self.count * rhs)
    }
}

impl<R: Rep, P: Period> Div<R> for Duration<R, P> {
    type Output = Self;

    fn div(self, rhs: R) -> Self {
        Self::new(self.count / rhs)
    }
}

/// The number of times `rhs` fits in `self`.
impl<R: Rep, P: Period> Div for Duration<R, P> {
    type Output = R;

    fn div(self, rhs: Self) -> R {
        self.count / rhs.count
    }
}

impl<R: Rep, P: Period> Rem<R> for Duration<R, P> {
    type Output = Self;

    fn rem(self, rhs: R) -> Self {
        Self::new(self.count % rhs)
    }
}

impl<R: Rep, P: Period> Rem for Duration<R, P> {
    type Output = Self;

    fn rem(self, rhs: Self) -> Self {
        Self::new(self.count % rhs.count)
    }
}

impl<R: Rep, P: Period> AddAssign for Duration<R, P> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<R: Rep, P: Period> SubAssign for Duration<R, P> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<R: Rep, P: Period> MulAssign<R> for Duration<R, P> {
    fn mul_assign(&mut self, rhs: R) {
        *self = *self * rhs;
    }
}

impl<R: Rep, P: Period> DivAssign<R> for Duration<R, P> {
    fn div_assign(&mut self, rhs: R) {
        *self = *self / rhs;
    }
}

impl<R: Rep, P: Period> RemAssign<R> for Duration<R, P> {
    fn rem_assign(&mut self, rhs: R) {
        *self = *self % rhs;
    }
}

impl<R: Rep, P: Period> RemAssign for Duration<R, P> {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

// `n * d` for each representation.
macro_rules! impl_scalar_mul {
    ($($t:ty),*) => {
        $(
            impl<P: Period> Mul<Duration<$t, P>> for $t {
                type Output = Duration<$t, P>;

                fn mul(self, rhs: Duration<$t, P>) -> Duration<$t, P> {
                    rhs * self
                }
            }
        )*
    };
}

impl_scalar_mul!(i8, i16, i32, i64, i128, f32, f64);

/// Nanoseconds.
pub type Nanoseconds = Duration<i64, Nano>;
/// Microseconds.
pub type Microseconds = Duration<i64, Micro>;
/// Milliseconds.
pub type Milliseconds = Duration<i64, Milli>;
/// Seconds.
pub type Seconds = Duration<i64, Unit>;
/// Minutes.
pub type Minutes = Duration<i32, Ratio<60>>;
/// Hours.
pub type Hours = Duration<i32, Ratio<3600>>;

/// Milliseconds to wait natively for a timeout of `d`: rounded up, and clamped at zero.
pub(crate) fn wait_millis<R: Rep, P: Period>(d: Duration<R, P>) -> u64 {
    if d.is_expired() {
        return 0;
    }
    let ms: Duration<i128, Milli> = d.ceil();
    ms.count().clamp(0, u64::MAX as i128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_paths() {
        // ratio 1
        assert_eq!(Milliseconds::new(7).cast::<Duration<i32, Milli>>().count(), 7);
        // N/1
        assert_eq!(Seconds::new(2).cast::<Milliseconds>().count(), 2000);
        // 1/D
        assert_eq!(Milliseconds::new(2999).cast::<Seconds>().count(), 2);
        assert_eq!(Milliseconds::new(-2999).cast::<Seconds>().count(), -2);
        // general
        let d: Duration<i64, Ratio<1, 3>> = Duration::new(10);
        assert_eq!(d.cast::<Duration<i64, Ratio<1, 2>>>().count(), 6);
    }

    #[test]
    fn wait_millis_rounds_up() {
        assert_eq!(wait_millis(Microseconds::new(1)), 1);
        assert_eq!(wait_millis(Microseconds::new(-5)), 0);
        assert_eq!(wait_millis(Seconds::new(2)), 2000);
        assert_eq!(wait_millis(Duration::<f64>::new(0.0015)), 2);
    }

    #[test]
    fn debug_units() {
        assert_eq!(format!("{:?}", Milliseconds::new(5)), "5ms");
        assert_eq!(format!("{:?}", Duration::<i64, Ratio<1, 3>>::new(2)), "2*[1/3]s");
    }
}
