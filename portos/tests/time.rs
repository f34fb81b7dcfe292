// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

use portos::ratio::{Milli, Ratio, Rational};
use portos::thread::this_thread;
use portos::time::{
    duration_cast, Clock, Duration, Hours, Microseconds, Milliseconds, Minutes, Nanoseconds,
    Seconds, SysTick, SystemClock, TimePoint,
};
use rand::Rng;
use rand_pcg::Pcg32;

type Sys = SystemClock;
type Tick = Duration<i64, SysTick>;

#[test]
fn casts_truncate_floor_and_ceil() {
    let mut rng = Pcg32::new(1, 1);
    for _ in 0..1000 {
        let ms: i64 = rng.gen_range(-1_000_000..1_000_000);
        let d = Milliseconds::new(ms);

        assert_eq!(d.cast::<Seconds>().count(), ms / 1000);
        let floor = ms.div_euclid(1000);
        assert_eq!(d.floor::<Seconds>().count(), floor);
        let ceil = if ms.rem_euclid(1000) == 0 { floor } else { floor + 1 };
        assert_eq!(d.ceil::<Seconds>().count(), ceil);

        assert!(d.floor::<Seconds>() <= d);
        assert!(d.ceil::<Seconds>() >= d);

        // Going to a finer period is exact.
        assert_eq!(d.convert::<Microseconds>().count(), ms * 1000);
        assert_eq!(d.convert::<Microseconds>(), d);
    }
}

#[test]
fn comparisons_across_periods() {
    assert_eq!(Seconds::new(1), Milliseconds::new(1000));
    assert!(Milliseconds::new(1001) > Seconds::new(1));
    assert!(Nanoseconds::new(999_999) < Milliseconds::new(1));
    assert_eq!(Minutes::new(2), Seconds::new(120));
    assert_eq!(Hours::new(1), Minutes::new(60));
    assert!(Duration::<f64>::new(0.5) < Seconds::new(1));
    assert_eq!(Duration::<f64, Milli>::new(1500.0), Duration::<f64>::new(1.5));

    // Thirds of a second against halves: compared exactly in sixths.
    let third = Duration::<i64, Ratio<1, 3>>::new(1);
    let half = Duration::<i64, Ratio<1, 2>>::new(1);
    assert!(third < half);
    assert_eq!(Duration::<i64, Ratio<1, 3>>::new(3), Duration::<i64, Ratio<1, 2>>::new(2));
}

#[test]
fn arithmetic() {
    let third = Duration::<i64, Ratio<1, 3>>::new(1);
    let half = Duration::<i64, Ratio<1, 2>>::new(1);
    let sum = third.add_common(half);
    assert_eq!(sum.count(), 5);
    assert_eq!(Duration::<i64, Ratio<1, 3>>::period(), Rational::new(1, 3));

    assert_eq!(3i64 * Milliseconds::new(4), Milliseconds::new(12));
    assert_eq!(Milliseconds::new(12) / 5i64, Milliseconds::new(2));
    assert_eq!(Milliseconds::new(12) / Milliseconds::new(5), 2);
    assert_eq!(Milliseconds::new(12) % Milliseconds::new(5), Milliseconds::new(2));
    assert_eq!((-Milliseconds::new(7)).abs(), Milliseconds::new(7));

    let mut d = Seconds::new(1);
    d += Seconds::new(2);
    d *= 2i64;
    assert_eq!(d.count(), 6);
    assert_eq!(d.inc().count(), 7);
    assert_eq!(d.dec().count(), 6);

    assert!(Milliseconds::ZERO.is_expired());
    assert!(!Nanoseconds::new(1).is_expired());
    assert_eq!(duration_cast::<Minutes>(Hours::new(2)).count(), 120);
}

#[test]
fn wide_and_float_casts() {
    // Needs more than 64 bits in the middle of the conversion.
    let big = Duration::<i128, Ratio<1, 1_000_000_000>>::new(i64::MAX as i128 * 1000);
    assert_eq!(big.cast::<Duration<i128, Ratio<1, 1_000_000>>>().count(), i64::MAX as i128);

    let f = Duration::<f64, Milli>::new(1.5);
    assert_eq!(f.cast::<Microseconds>().count(), 1500);
    assert_eq!(Milliseconds::new(1).cast::<Duration<f64>>().count(), 0.001);
}

#[test]
fn time_points() {
    let start = Sys::now();
    let later = start + Tick::new(10);
    assert!(later > start);
    assert_eq!(later - start, Tick::new(10));
    assert_eq!((later - Tick::new(10)), start);

    let origin: TimePoint<Sys> = TimePoint::from_epoch(Tick::new(0));
    assert!(origin <= start);
    assert!(TimePoint::<Sys, i64, SysTick>::MAX > start);
}

#[test]
fn system_clock_is_monotonic() {
    assert!(Sys::IS_STEADY);
    let mut last = Sys::now();
    for _ in 0..100 {
        let now = Sys::now();
        assert!(now >= last);
        last = now;
    }
}

#[test]
fn sleeping() {
    let start = Sys::now();
    this_thread::sleep_for(Milliseconds::new(10));
    assert!(Sys::now() - start >= Milliseconds::new(10));

    let deadline = Sys::now() + Milliseconds::new(20).ceil::<Tick>();
    this_thread::sleep_until(deadline);
    assert!(Sys::now() >= deadline);
    assert!(deadline.remaining().is_expired());

    // Nothing to wait for.
    this_thread::sleep_for(Milliseconds::new(-5));
    this_thread::sleep_until(start);
}
