//! Quartz Time
//!
//! Simulated time for the quartz emulator, measured in integer ticks of one
//! master crystal. Every derived clock in the machine is an integer divisor
//! of [MASTER_FREQUENCY], which is what keeps hour-long runs drift free and
//! save states byte exact. Floating point never appears on the time-advance
//! path; it is allowed only for display.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display},
    ops::{Add, AddAssign, Mul, Sub},
};

pub use clock::Clock;

mod clock;

/// The master crystal frequency in Hz that every other clock is derived from
///
/// 960 times the 3.58 MHz colorburst bus clock, which makes the common video,
/// audio and CPU rates of the machine integer divisors
pub const MASTER_FREQUENCY: u64 = 3_579_545 * 960;

/// The divisor a clock of `frequency` Hz uses to convert its own ticks into
/// master ticks, rounded to the nearest integer
///
/// Frequencies that do not evenly divide the master frequency come out with a
/// small modeled-frequency error, fixed at construction. That error never
/// accumulates, unlike fractional tick arithmetic which would
pub const fn master_divisor(frequency: u64) -> u64 {
    assert!(frequency != 0, "a clock cannot have a frequency of zero");
    assert!(
        frequency <= MASTER_FREQUENCY,
        "a clock cannot outrun the master crystal"
    );

    (MASTER_FREQUENCY + frequency / 2) / frequency
}

/// Absolute simulated time, as master ticks since the start of the run
///
/// Totally ordered and non-decreasing over the lifetime of one run. Never
/// constructed from wall-clock samples
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EmuTime(u64);

impl EmuTime {
    /// The start of the run
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_master_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    #[inline]
    pub const fn master_ticks(self) -> u64 {
        self.0
    }
}

impl Add<EmuDuration> for EmuTime {
    type Output = EmuTime;

    #[inline]
    fn add(self, rhs: EmuDuration) -> Self::Output {
        // Unreachable at 64 bits for over a century of simulated time
        EmuTime(self.0.checked_add(rhs.0).unwrap())
    }
}

impl AddAssign<EmuDuration> for EmuTime {
    #[inline]
    fn add_assign(&mut self, rhs: EmuDuration) {
        *self = *self + rhs;
    }
}

impl Sub for EmuTime {
    type Output = EmuDuration;

    /// The interval between two instants. Subtracting a later time from an
    /// earlier one is a caller logic bug, not a representable value
    #[inline]
    fn sub(self, rhs: EmuTime) -> Self::Output {
        debug_assert!(rhs <= self, "simulated time ran backwards");

        EmuDuration(self.0.checked_sub(rhs.0).unwrap())
    }
}

impl Display for EmuTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}mt", self.0)
    }
}

/// A simulated time interval, as a master tick count
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EmuDuration(u64);

impl EmuDuration {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_master_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    /// `ticks` of a `frequency` Hz clock, rescaled to master resolution once
    /// here rather than on every use
    #[inline]
    pub const fn from_ticks_at(ticks: u64, frequency: u64) -> Self {
        Self(ticks * master_divisor(frequency))
    }

    #[inline]
    pub const fn master_ticks(self) -> u64 {
        self.0
    }

    /// For display and statistics only; scheduling decisions must stay on
    /// integer master ticks
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MASTER_FREQUENCY as f64
    }
}

impl Add for EmuDuration {
    type Output = EmuDuration;

    #[inline]
    fn add(self, rhs: EmuDuration) -> Self::Output {
        EmuDuration(self.0.checked_add(rhs.0).unwrap())
    }
}

impl Sub for EmuDuration {
    type Output = EmuDuration;

    #[inline]
    fn sub(self, rhs: EmuDuration) -> Self::Output {
        EmuDuration(self.0.checked_sub(rhs.0).unwrap())
    }
}

impl Mul<u64> for EmuDuration {
    type Output = EmuDuration;

    #[inline]
    fn mul(self, rhs: u64) -> Self::Output {
        EmuDuration(self.0.checked_mul(rhs).unwrap())
    }
}

impl Display for EmuDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}s", self.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_arithmetic() {
        let start = EmuTime::ZERO;
        let later = start + EmuDuration::from_master_ticks(960);

        assert_eq!(later.master_ticks(), 960);
        assert_eq!(later - start, EmuDuration::from_master_ticks(960));
        assert!(start < later);
    }

    #[test]
    fn duration_rescales_once_at_construction() {
        // The colorburst clock divides the master crystal exactly
        assert_eq!(master_divisor(3_579_545), 960);
        assert_eq!(
            EmuDuration::from_ticks_at(10, 3_579_545),
            EmuDuration::from_master_ticks(9600)
        );
    }

    #[test]
    fn inexact_frequency_rounds_to_nearest_divisor() {
        // 44.1 kHz does not divide the master crystal; the divisor is fixed
        // by rounding instead of carrying a fraction around
        let divisor = master_divisor(44_100);

        assert_eq!(divisor, 77_922);
        assert_eq!(
            EmuDuration::from_ticks_at(44_100, 44_100).master_ticks(),
            44_100 * divisor
        );
    }

    #[test]
    fn duration_display_is_seconds() {
        let one_second = EmuDuration::from_master_ticks(MASTER_FREQUENCY);

        assert_eq!(one_second.as_secs_f64(), 1.0);
        assert_eq!(one_second.to_string(), "1.000000000s");
    }

    #[test]
    #[should_panic]
    fn backwards_subtraction_is_a_logic_error() {
        let early = EmuTime::ZERO;
        let late = early + EmuDuration::from_master_ticks(1);

        let _ = early - late;
    }

    #[test]
    fn time_round_trips_as_a_bare_tick_count() {
        let time = EmuTime::from_master_ticks(123_456_789);
        let encoded = bincode::serde::encode_to_vec(time, bincode::config::standard()).unwrap();
        let (decoded, _): (EmuTime, _) =
            bincode::serde::decode_from_slice(&encoded, bincode::config::standard()).unwrap();

        assert_eq!(time, decoded);
    }
}
