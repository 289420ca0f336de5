use crate::{
    component::{DeviceId, DeviceRegistry, RegistryError, Schedulable},
    scheduler::{Scheduler, SchedulerError},
};
use quartz_time::EmuTime;

/// Everything the time kernel knows about one emulated machine
///
/// Created once at startup and passed down explicitly; there is no ambient
/// global state anywhere in the kernel. The scheduler and the device
/// registry are public because the driving loop and device construction code
/// talk to them directly, but device teardown must go through
/// [remove_device](Self::remove_device) so pending sync points cannot
/// dangle.
#[derive(Debug, Default)]
pub struct Machine {
    pub scheduler: Scheduler,
    pub devices: DeviceRegistry,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_device(
        &mut self,
        name: impl Into<String>,
        device: Box<dyn Schedulable>,
    ) -> Result<DeviceId, RegistryError> {
        self.devices.insert(name, device)
    }

    /// Inserts a device that needs to know its own id, e.g. to re-arm its
    /// sync points
    pub fn insert_device_with(
        &mut self,
        name: impl Into<String>,
        build: impl FnOnce(DeviceId) -> Box<dyn Schedulable>,
    ) -> Result<DeviceId, RegistryError> {
        self.devices.insert_with(name, build)
    }

    /// Tears a device down, cancelling its pending sync points first
    pub fn remove_device(&mut self, id: DeviceId) -> Option<Box<dyn Schedulable>> {
        self.scheduler.remove_sync_point(id, None);
        self.devices.remove(id)
    }

    /// Drains every sync point due at or before `time`, then advances the
    /// machine's notion of "now" to `time`
    #[inline]
    pub fn run_until(&mut self, time: EmuTime) -> Result<(), SchedulerError> {
        self.scheduler.run_until(time, &mut self.devices)
    }

    #[inline]
    pub fn now(&self) -> EmuTime {
        self.scheduler.current_time()
    }
}
