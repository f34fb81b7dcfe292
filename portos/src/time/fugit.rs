// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Interop with [`fugit`] durations, which most embedded HAL crates use for their timeouts.
//!
//! Fugit durations count unsigned ticks of `NOM / DENOM` seconds.  Converting from fugit truncates
//! toward zero like any other cast.  Converting to fugit truncates, and clamps negative durations
//! to zero.

use core::marker::PhantomData;

use super::{cast_count, Duration, Rep};
use crate::ratio::{Period, Rational};

struct FugitConversion<P, const NOM: u32, const DENOM: u32>(PhantomData<P>);

impl<P: Period, const NOM: u32, const DENOM: u32> FugitConversion<P, NOM, DENOM> {
    const FUGIT: Rational = Rational::new(NOM as i64, DENOM as i64);

    const FROM: Rational = match Self::FUGIT.checked_div(P::RATIO) {
        Some(r) => r,
        None => panic!("fugit conversion overflows"),
    };

    const TO: Rational = match P::RATIO.checked_div(Self::FUGIT) {
        Some(r) => r,
        None => panic!("fugit conversion overflows"),
    };
}

impl<R: Rep, P: Period> Duration<R, P> {
    /// Convert from a fugit duration.
    pub fn from_fugit<const NOM: u32, const DENOM: u32>(
        d: ::fugit::Duration<u64, NOM, DENOM>,
    ) -> Self {
        let ratio = FugitConversion::<P, NOM, DENOM>::FROM;
        Self::new(cast_count::<i128, R>(d.ticks() as i128, ratio))
    }

    /// Convert to a fugit duration.
    pub fn to_fugit<const NOM: u32, const DENOM: u32>(self) -> ::fugit::Duration<u64, NOM, DENOM> {
        let ratio = FugitConversion::<P, NOM, DENOM>::TO;
        let ticks = cast_count::<R, i128>(self.count, ratio);
        ::fugit::Duration::<u64, NOM, DENOM>::from_ticks(ticks.clamp(0, u64::MAX as i128) as u64)
    }
}

#[cfg(test)]
mod tests {
    use crate::time::{Microseconds, Milliseconds};

    #[test]
    fn round_trip() {
        let d = ::fugit::MillisDurationU64::from_ticks(1500);
        let ms = Milliseconds::from_fugit(d);
        assert_eq!(ms.count(), 1500);
        let us: ::fugit::MicrosDurationU64 = ms.to_fugit();
        assert_eq!(us.ticks(), 1_500_000);
        assert_eq!(Microseconds::from_fugit(us), ms);
    }

    #[test]
    fn negative_clamps() {
        let d: ::fugit::MillisDurationU64 = Milliseconds::new(-3).to_fugit();
        assert_eq!(d.ticks(), 0);
    }
}
