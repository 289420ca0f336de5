use super::{Scheduler, SchedulerError};
use crate::component::DeviceRegistry;
use quartz_time::EmuTime;

impl Scheduler {
    /// Advances simulated time to `time`, firing every sync point that is
    /// due on the way, in (time, insertion) order
    ///
    /// Each point is removed from the pending set before its callback runs,
    /// so an erroring callback can neither fire twice nor leave the
    /// scheduler inconsistent. Callbacks re-arm through the `&mut Scheduler`
    /// they are handed; a point set for the firing instant itself is due
    /// immediately and fires within the same call.
    ///
    /// `time` must not precede the current time. A pending point whose owner
    /// is no longer registered is a fatal error, not a skip: the machine's
    /// timeline can no longer be trusted.
    pub fn run_until(
        &mut self,
        time: EmuTime,
        devices: &mut DeviceRegistry,
    ) -> Result<(), SchedulerError> {
        debug_assert!(time >= self.now, "the driving loop rewound time");

        while let Some((&key, &entry)) = self.pending.first_key_value() {
            if key.time > time {
                break;
            }

            self.pending.remove(&key);
            self.now = key.time;

            let Some(mut device) = devices.take(entry.owner) else {
                tracing::error!(
                    "Dropping dead sync point at {} (tag {}); a device was torn down with points still pending",
                    key.time,
                    entry.tag
                );

                return Err(SchedulerError::StaleDevice {
                    time: key.time,
                    tag: entry.tag,
                });
            };

            tracing::trace!(
                "Firing sync point at {} for {:?} (tag {})",
                key.time,
                entry.owner,
                entry.tag
            );

            let result = device.execute_until(self, key.time, entry.tag);
            devices.restore(entry.owner, device);

            result.map_err(SchedulerError::Device)?;
        }

        self.now = time;

        Ok(())
    }
}
