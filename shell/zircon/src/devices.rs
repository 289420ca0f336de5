use quartz_kernel::{
    component::{DeviceId, Schedulable, SyncTag},
    scheduler::Scheduler,
};
use quartz_time::{Clock, EmuTime};
use std::error::Error;

pub const FRAME_RATE: u64 = 50;
pub const BUS_HZ: u64 = 3_579_545;

/// Vertical-blank style 50 Hz ticker that re-arms itself every frame
#[derive(Debug)]
pub struct FrameTicker {
    id: DeviceId,
    clock: Clock<FRAME_RATE>,
    frames: u64,
}

impl FrameTicker {
    pub const TAG: SyncTag = 0;

    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            clock: Clock::new(EmuTime::ZERO),
            frames: 0,
        }
    }
}

impl Schedulable for FrameTicker {
    fn execute_until(
        &mut self,
        scheduler: &mut Scheduler,
        time: EmuTime,
        _tag: SyncTag,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.clock.advance(time);
        self.frames += 1;

        if self.frames % FRAME_RATE == 0 {
            tracing::info!(
                "{} simulated seconds ({} frames) at {}",
                self.frames / FRAME_RATE,
                self.frames,
                time
            );
        }

        scheduler.set_sync_point(self.clock.time_after(1), self.id, Self::TAG);

        Ok(())
    }
}

/// Counts 3.58 MHz bus ticks in coarse batches, the way a CPU or PSG model
/// consumes its clock between sync points
#[derive(Debug)]
pub struct BusCounter {
    id: DeviceId,
    clock: Clock<BUS_HZ>,
    total_ticks: u64,
}

impl BusCounter {
    pub const TAG: SyncTag = 0;
    /// ~10 ms of bus time per batch
    pub const BATCH: u64 = 35_795;

    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            clock: Clock::new(EmuTime::ZERO),
            total_ticks: 0,
        }
    }
}

impl Schedulable for BusCounter {
    fn execute_until(
        &mut self,
        scheduler: &mut Scheduler,
        time: EmuTime,
        _tag: SyncTag,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let elapsed = self.clock.ticks_until(time);
        self.clock.advance(time);
        self.total_ticks += elapsed;

        tracing::debug!(
            "Bus consumed {} ticks this batch, {} total",
            elapsed,
            self.total_ticks
        );

        scheduler.set_sync_point(self.clock.time_after(Self::BATCH), self.id, Self::TAG);

        Ok(())
    }
}
