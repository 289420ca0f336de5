use num::rational::Ratio;
use quartz_time::{EmuDuration, EmuTime, MASTER_FREQUENCY};
use std::{
    thread::sleep,
    time::{Duration, Instant},
};

/// Sleeping in quanta below this just burns scheduler wakeups, so smaller
/// leads are left to run ahead until they add up
const SLEEP_RESOLUTION: Duration = Duration::from_millis(1);

/// Paces the driving loop against the wall clock
///
/// A pure consumer of the kernel: it reads how much simulated time has
/// elapsed, compares against how much real time has elapsed, and sleeps the
/// driving thread when emulation runs ahead. It never writes simulated time
/// and has no effect on callback ordering, so a run is bit-identical with or
/// without it.
#[derive(Debug)]
pub struct Throttle {
    /// Emulation speed relative to real time, 1/1 being real time
    speed: Ratio<u32>,
    emu_anchor: EmuTime,
    wall_anchor: Instant,
}

impl Throttle {
    pub fn new(speed: Ratio<u32>) -> Self {
        assert!(*speed.numer() > 0, "emulation speed must be positive");

        Self {
            speed,
            emu_anchor: EmuTime::ZERO,
            wall_anchor: Instant::now(),
        }
    }

    pub fn speed(&self) -> Ratio<u32> {
        self.speed
    }

    /// Re-anchors at `now`, forgetting any accumulated lead or lag; used
    /// after a pause, a snapshot load, or a speed change
    pub fn reset(&mut self, now: EmuTime) {
        self.emu_anchor = now;
        self.wall_anchor = Instant::now();

        tracing::debug!("Throttle re-anchored at {}", now);
    }

    /// The wall-clock time `elapsed` of simulated time should take at the
    /// configured speed
    ///
    /// Integer nanosecond math; the u64 nanosecond result covers centuries
    pub fn wall_duration(&self, elapsed: EmuDuration) -> Duration {
        let nanos = elapsed.master_ticks() as u128 * Duration::from_secs(1).as_nanos()
            * *self.speed.denom() as u128
            / (MASTER_FREQUENCY as u128 * *self.speed.numer() as u128);

        Duration::from_nanos(nanos.try_into().unwrap())
    }

    /// Sleeps if emulation has run ahead of the wall clock by at least one
    /// sleep quantum; leads smaller than that are allowed to persist
    pub fn sync(&mut self, now: EmuTime) {
        let target = self.wall_duration(now - self.emu_anchor);
        let elapsed = self.wall_anchor.elapsed();

        if let Some(lead) = target.checked_sub(elapsed)
            && lead >= SLEEP_RESOLUTION
        {
            sleep(lead);
        }
    }

    /// How far emulation is behind the wall clock, for statistics; zero when
    /// keeping up
    pub fn lag(&self, now: EmuTime) -> Duration {
        let target = self.wall_duration(now - self.emu_anchor);

        self.wall_anchor.elapsed().saturating_sub(target)
    }
}
