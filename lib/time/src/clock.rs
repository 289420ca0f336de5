use crate::{EmuDuration, EmuTime, master_divisor};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// A device clock of `FREQUENCY` Hz derived from the master crystal
///
/// The only state is the time of the last completed device tick, kept on an
/// exact divisor boundary relative to the start of the run. Because a
/// fractional tick is never stored, repeated advances over millions of steps
/// are off by at most `DIVISOR - 1` master ticks at any instant, and the
/// error never accumulates.
///
/// Persists as its single tick count (see the save-state layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clock<const FREQUENCY: u64> {
    last_tick: EmuTime,
}

impl<const FREQUENCY: u64> Clock<FREQUENCY> {
    /// Master ticks per tick of this clock, fixed at compile time
    pub const DIVISOR: u64 = master_divisor(FREQUENCY);

    /// A clock whose last tick boundary is exactly `start`
    #[inline]
    pub const fn new(start: EmuTime) -> Self {
        Self { last_tick: start }
    }

    /// `ticks` of this clock expressed as a master-clock duration, exact
    #[inline]
    pub const fn duration(ticks: u64) -> EmuDuration {
        EmuDuration::from_master_ticks(ticks * Self::DIVISOR)
    }

    /// Realigns the last tick boundary to `time` exactly, used on device
    /// power-on and reset
    #[inline]
    pub fn reset(&mut self, time: EmuTime) {
        self.last_tick = time;
    }

    #[inline]
    pub const fn last_tick(&self) -> EmuTime {
        self.last_tick
    }

    /// The number of completed device ticks between the last tick boundary
    /// and `time`
    ///
    /// Pure query; repeated calls return the same value. `time` must not
    /// precede the last tick boundary
    #[inline]
    pub fn ticks_until(&self, time: EmuTime) -> u64 {
        (time - self.last_tick).master_ticks() / Self::DIVISOR
    }

    /// Moves the clock forward to the latest tick boundary not exceeding
    /// `time`
    ///
    /// `time` must not precede the last tick boundary
    #[inline]
    pub fn advance(&mut self, time: EmuTime) {
        let completed = self.ticks_until(time);
        self.last_tick = self.last_tick + Self::duration(completed);
    }

    /// The instant at which this clock will have ticked `ticks` more times
    #[inline]
    pub fn time_after(&self, ticks: u64) -> EmuTime {
        self.last_tick + Self::duration(ticks)
    }
}

/// Consumes exactly `ticks` device ticks, for devices that process fixed
/// batches and decide themselves how much time that took
impl<const FREQUENCY: u64> AddAssign<u64> for Clock<FREQUENCY> {
    #[inline]
    fn add_assign(&mut self, ticks: u64) {
        self.last_tick = self.time_after(ticks);
    }
}
