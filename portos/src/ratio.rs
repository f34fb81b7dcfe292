// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Compile-time rational arithmetic.
//!
//! A [`Period`] is a type that carries a positive rational number of seconds.  The values are
//! always reduced to lowest terms, so two periods describing the same fraction have identical
//! constants.  Arithmetic on periods is done in `const` context: any overflow, or a zero
//! denominator, becomes a compile error at the point of use rather than a runtime surprise.
//!
//! [`Rational`] holds the arithmetic itself, and [`Ratio`] lifts a pair of literals into a type.

use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;

/// Greatest common divisor of the magnitudes of `a` and `b`.  `gcd(0, 0)` is 0.
pub const fn gcd(a: i64, b: i64) -> i64 {
    let mut a = a.unsigned_abs();
    let mut b = b.unsigned_abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a as i64
}

/// Least common multiple of the magnitudes of `a` and `b`, or `None` on overflow.
pub const fn lcm(a: i64, b: i64) -> Option<i64> {
    if a == 0 || b == 0 {
        return Some(0);
    }
    let a = (a / gcd(a, b)).abs();
    a.checked_mul(b.abs())
}

/// A rational number in lowest terms, with a positive denominator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i64,
    den: i64,
}

impl Rational {
    /// The value one.
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Build `num / den` reduced to lowest terms.
    ///
    /// Panics (a compile error in const context) if `den` is zero.
    pub const fn new(num: i64, den: i64) -> Rational {
        assert!(den != 0, "ratio denominator is zero");
        let g = gcd(num, den);
        let (num, den) = (num / g, den / g);
        if den < 0 {
            Rational { num: -num, den: -den }
        } else {
            Rational { num, den }
        }
    }

    /// The numerator.
    pub const fn num(self) -> i64 {
        self.num
    }

    /// The denominator, always positive.
    pub const fn den(self) -> i64 {
        self.den
    }

    /// Whether the denominator is 1.
    pub const fn is_integer(self) -> bool {
        self.den == 1
    }

    /// `self * other`, or `None` if the reduced result doesn't fit.
    pub const fn checked_mul(self, other: Rational) -> Option<Rational> {
        // Cross-reduce first so the products are as small as possible.
        let g1 = gcd(self.num, other.den);
        let g2 = gcd(other.num, self.den);
        let (g1, g2) = (if g1 == 0 { 1 } else { g1 }, if g2 == 0 { 1 } else { g2 });
        let num = match (self.num / g1).checked_mul(other.num / g2) {
            Some(n) => n,
            None => return None,
        };
        let den = match (self.den / g2).checked_mul(other.den / g1) {
            Some(d) => d,
            None => return None,
        };
        Some(Rational::new(num, den))
    }

    /// `self / other`, or `None` if `other` is zero or the result doesn't fit.
    ///
    /// The gcd of the numerators and the gcd of the denominators are divided out before
    /// multiplying, so a result is produced whenever the reduced value fits.
    pub const fn checked_div(self, other: Rational) -> Option<Rational> {
        if other.num == 0 {
            return None;
        }
        let gn = gcd(self.num, other.num);
        let gd = gcd(self.den, other.den);
        let gn = if gn == 0 { 1 } else { gn };
        let num = match (self.num / gn).checked_mul(other.den / gd) {
            Some(n) => n,
            None => return None,
        };
        let den = match (self.den / gd).checked_mul(other.num / gn) {
            Some(d) => d,
            None => return None,
        };
        Some(Rational::new(num, den))
    }

    /// `self + other`, or `None` on overflow.
    pub const fn checked_add(self, other: Rational) -> Option<Rational> {
        let g = gcd(self.den, other.den);
        let (a, b) = (self.den / g, other.den / g);
        let left = match self.num.checked_mul(b) {
            Some(v) => v,
            None => return None,
        };
        let right = match other.num.checked_mul(a) {
            Some(v) => v,
            None => return None,
        };
        let num = match left.checked_add(right) {
            Some(v) => v,
            None => return None,
        };
        let den = match self.den.checked_mul(b) {
            Some(v) => v,
            None => return None,
        };
        Some(Rational::new(num, den))
    }

    /// `self - other`, or `None` on overflow.
    pub const fn checked_sub(self, other: Rational) -> Option<Rational> {
        match other.num.checked_neg() {
            Some(num) => self.checked_add(Rational { num, den: other.den }),
            None => None,
        }
    }

    /// The largest rational that divides both `self` and `other` an integral number of times: the
    /// gcd of the numerators over the lcm of the denominators.
    ///
    /// This is the period of the common type of two durations.
    pub const fn gcd_with(self, other: Rational) -> Option<Rational> {
        match lcm(self.den, other.den) {
            Some(den) => Some(Rational::new(gcd(self.num, other.num), den)),
            None => None,
        }
    }

    /// Three way comparison, computed exactly.
    pub const fn cmp(self, other: Rational) -> Ordering {
        let left = self.num as i128 * other.den as i128;
        let right = other.num as i128 * self.den as i128;
        if left < right {
            Ordering::Less
        } else if left > right {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Rational) -> Option<Ordering> {
        Some(Ord::cmp(self, other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Rational) -> Ordering {
        Rational::cmp(*self, *other)
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// A type level positive rational number of seconds.
pub trait Period: Copy + Send + Sync + 'static {
    /// The value, reduced.
    const RATIO: Rational;
}

/// A period given by two literals.  The values are reduced, so `Ratio<2, 4>` and `Ratio<1, 2>`
/// have the same [`Period::RATIO`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Ratio<const N: i64, const D: i64 = 1>;

impl<const N: i64, const D: i64> Period for Ratio<N, D> {
    const RATIO: Rational = Rational::new(N, D);
}

/// The common period of two periods: the largest period that both are integral multiples of.
pub struct Common<P1, P2>(PhantomData<(P1, P2)>);

impl<P1, P2> Clone for Common<P1, P2> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P1, P2> Copy for Common<P1, P2> {}

impl<P1, P2> fmt::Debug for Common<P1, P2> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Common")
    }
}

impl<P1: Period, P2: Period> Period for Common<P1, P2> {
    const RATIO: Rational = match P1::RATIO.gcd_with(P2::RATIO) {
        Some(r) => r,
        None => panic!("common period overflows"),
    };
}

/// The exact factor converting a count in period `P1` into a count in period `P2`.
pub(crate) struct Conversion<P1, P2>(PhantomData<(P1, P2)>);

impl<P1: Period, P2: Period> Conversion<P1, P2> {
    pub(crate) const RATIO: Rational = match P1::RATIO.checked_div(P2::RATIO) {
        Some(r) => r,
        None => panic!("period conversion overflows"),
    };
}

/// 10^-18
pub type Atto = Ratio<1, 1_000_000_000_000_000_000>;
/// 10^-15
pub type Femto = Ratio<1, 1_000_000_000_000_000>;
/// 10^-12
pub type Pico = Ratio<1, 1_000_000_000_000>;
/// 10^-9
pub type Nano = Ratio<1, 1_000_000_000>;
/// 10^-6
pub type Micro = Ratio<1, 1_000_000>;
/// 10^-3
pub type Milli = Ratio<1, 1_000>;
/// 10^-2
pub type Centi = Ratio<1, 100>;
/// 10^-1
pub type Deci = Ratio<1, 10>;
/// 1
pub type Unit = Ratio<1, 1>;
/// 10
pub type Deca = Ratio<10, 1>;
/// 10^2
pub type Hecto = Ratio<100, 1>;
/// 10^3
pub type Kilo = Ratio<1_000, 1>;
/// 10^6
pub type Mega = Ratio<1_000_000, 1>;
/// 10^9
pub type Giga = Ratio<1_000_000_000, 1>;
/// 10^12
pub type Tera = Ratio<1_000_000_000_000, 1>;
/// 10^15
pub type Peta = Ratio<1_000_000_000_000_000, 1>;
/// 10^18
pub type Exa = Ratio<1_000_000_000_000_000_000, 1>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces() {
        assert_eq!(Ratio::<2, 4>::RATIO, Rational::new(1, 2));
        assert_eq!(Ratio::<6, -4>::RATIO, Rational::new(-3, 2));
        assert_eq!(Rational::new(-3, 2).den(), 2);
        assert_eq!(Ratio::<1_000, 1>::RATIO, Kilo::RATIO);
    }

    #[test]
    fn divide_reduces_before_multiplying() {
        // (1/10^9) / (1/10^18) would overflow if multiplied out first.
        let r = Nano::RATIO.checked_div(Atto::RATIO).unwrap();
        assert_eq!(r, Rational::new(1_000_000_000, 1));
        assert_eq!(Milli::RATIO.checked_div(Nano::RATIO), Some(Rational::new(1_000_000, 1)));
        assert_eq!(Exa::RATIO.checked_div(Atto::RATIO), None);
        assert_eq!(Unit::RATIO.checked_div(Rational::new(0, 1)), None);
    }

    #[test]
    fn common_period() {
        assert_eq!(Common::<Milli, Micro>::RATIO, Micro::RATIO);
        assert_eq!(Common::<Ratio<1, 3>, Ratio<1, 2>>::RATIO, Rational::new(1, 6));
        assert_eq!(Common::<Ratio<60>, Ratio<3600>>::RATIO, Rational::new(60, 1));
        assert_eq!(Common::<Ratio<2, 3>, Ratio<4, 9>>::RATIO, Rational::new(2, 9));
    }

    #[test]
    fn add_sub_cmp() {
        let third = Rational::new(1, 3);
        let half = Rational::new(1, 2);
        assert_eq!(third.checked_add(half), Some(Rational::new(5, 6)));
        assert_eq!(third.checked_sub(half), Some(Rational::new(-1, 6)));
        assert_eq!(third.checked_mul(half), Some(Rational::new(1, 6)));
        assert!(third < half);
        assert_eq!(Rational::new(2, 6).cmp(third), Ordering::Equal);
        assert_eq!(lcm(4, 6), Some(12));
        assert_eq!(lcm(i64::MAX, i64::MAX - 1), None);
        assert_eq!(gcd(0, 0), 0);
    }
}
