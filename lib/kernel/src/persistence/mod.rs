use crate::{
    component::{DeviceRegistry, SyncTag},
    machine::Machine,
    scheduler::{Scheduler, SyncPoint},
};
use quartz_time::EmuTime;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

pub const MAGIC: [u8; 7] = *b"quartzk";
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("not a quartz kernel snapshot, or an unsupported version")]
    UnrecognizedFormat,
    #[error("sync point owner {0:?} is not registered with this machine")]
    UnknownDevice(String),
    #[error("a pending sync point references a device that no longer exists")]
    DanglingOwner,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),
    #[error(transparent)]
    Decode(#[from] bincode::error::DecodeError),
}

/// One pending sync point, with the owner recorded by registry name
///
/// Generational ids are only meaningful within one process; resolving names
/// back to live devices is the registry's job at load time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPointRecord {
    pub time: EmuTime,
    pub owner: String,
    pub tag: SyncTag,
}

/// The complete kernel timing state of one machine
///
/// Records are stored in firing order (time, then original insertion order),
/// and reloading re-inserts them in that order, so the FIFO tie-break
/// survives a round trip and replay stays byte exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub now: EmuTime,
    pub sync_points: Vec<SyncPointRecord>,
}

impl Scheduler {
    pub fn snapshot(&self, devices: &DeviceRegistry) -> Result<SchedulerSnapshot, SnapshotError> {
        let sync_points = self
            .sync_points()
            .map(|point| {
                Ok(SyncPointRecord {
                    time: point.time,
                    owner: devices
                        .name(point.owner)
                        .ok_or(SnapshotError::DanglingOwner)?
                        .to_owned(),
                    tag: point.tag,
                })
            })
            .collect::<Result<_, SnapshotError>>()?;

        Ok(SchedulerSnapshot {
            now: self.current_time(),
            sync_points,
        })
    }

    /// Replaces the scheduler state wholesale with `snapshot`, resolving
    /// owners against `devices`
    pub fn restore(
        &mut self,
        snapshot: SchedulerSnapshot,
        devices: &DeviceRegistry,
    ) -> Result<(), SnapshotError> {
        let points = snapshot
            .sync_points
            .into_iter()
            .map(|record| {
                Ok(SyncPoint {
                    time: record.time,
                    owner: devices
                        .device_id(&record.owner)
                        .ok_or(SnapshotError::UnknownDevice(record.owner))?,
                    tag: record.tag,
                })
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        self.reload(snapshot.now, points);

        tracing::info!("Restored kernel timing state at {}", self.current_time());

        Ok(())
    }
}

impl Machine {
    /// Writes the kernel timing state: magic, version, then the bincode body
    ///
    /// Device-internal state (clocks included) is stored by the surrounding
    /// save-state subsystem per device; this covers only what the kernel
    /// owns
    pub fn store_snapshot(&self, mut writer: impl Write) -> Result<(), SnapshotError> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;

        let snapshot = self.scheduler.snapshot(&self.devices)?;
        bincode::serde::encode_into_std_write(&snapshot, &mut writer, bincode::config::standard())?;

        Ok(())
    }

    pub fn load_snapshot(&mut self, mut reader: impl Read) -> Result<(), SnapshotError> {
        let mut magic = [0; MAGIC.len()];
        reader.read_exact(&mut magic)?;

        let mut version = [0; size_of::<u32>()];
        reader.read_exact(&mut version)?;

        if magic != MAGIC || u32::from_le_bytes(version) != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnrecognizedFormat);
        }

        let snapshot: SchedulerSnapshot =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;

        self.scheduler.restore(snapshot, &self.devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Schedulable;
    use quartz_time::EmuDuration;
    use std::{cell::RefCell, error::Error, io::Cursor, rc::Rc};

    type FiringLog = Rc<RefCell<Vec<(EmuTime, String, SyncTag)>>>;

    #[derive(Debug)]
    struct Recorder {
        label: String,
        log: FiringLog,
    }

    impl Schedulable for Recorder {
        fn execute_until(
            &mut self,
            _scheduler: &mut Scheduler,
            time: EmuTime,
            tag: SyncTag,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.log.borrow_mut().push((time, self.label.clone(), tag));

            Ok(())
        }
    }

    fn populated_machine(log: &FiringLog) -> Machine {
        let mut machine = Machine::new();

        for name in ["cpu", "vdp", "psg"] {
            machine
                .insert_device(
                    name,
                    Box::new(Recorder {
                        label: name.to_owned(),
                        log: log.clone(),
                    }),
                )
                .unwrap();
        }

        machine
    }

    fn at(ticks: u64) -> EmuTime {
        EmuTime::from_master_ticks(ticks)
    }

    #[test]
    fn snapshot_reproduces_firing_behavior() {
        let original_log: FiringLog = Rc::default();
        let mut original = populated_machine(&original_log);

        let cpu = original.devices.device_id("cpu").unwrap();
        let vdp = original.devices.device_id("vdp").unwrap();
        let psg = original.devices.device_id("psg").unwrap();

        original.run_until(at(100)).unwrap();
        // Ties included, so the round trip must keep the insertion order
        original.scheduler.set_sync_point(at(200), vdp, 0);
        original.scheduler.set_sync_point(at(200), cpu, 0);
        original.scheduler.set_sync_point(at(150), psg, 3);

        let mut buffer = Vec::new();
        original.store_snapshot(&mut buffer).unwrap();

        let restored_log: FiringLog = Rc::default();
        let mut restored = populated_machine(&restored_log);
        restored.load_snapshot(Cursor::new(&buffer)).unwrap();

        assert_eq!(restored.now(), at(100));

        original.run_until(at(300)).unwrap();
        restored.run_until(at(300)).unwrap();

        assert_eq!(*original_log.borrow(), *restored_log.borrow());
        assert_eq!(
            *restored_log.borrow(),
            vec![
                (at(150), "psg".to_owned(), 3),
                (at(200), "vdp".to_owned(), 0),
                (at(200), "cpu".to_owned(), 0),
            ]
        );
    }

    #[test]
    fn snapshot_requires_matching_devices() {
        let log: FiringLog = Rc::default();
        let mut original = populated_machine(&log);

        let vdp = original.devices.device_id("vdp").unwrap();
        original.scheduler.set_sync_point(at(10), vdp, 0);

        let mut buffer = Vec::new();
        original.store_snapshot(&mut buffer).unwrap();

        // A machine missing the owner cannot resolve the record
        let mut incomplete = Machine::new();
        let error = incomplete.load_snapshot(Cursor::new(&buffer)).unwrap_err();

        assert!(matches!(error, SnapshotError::UnknownDevice(name) if name == "vdp"));
    }

    #[test]
    fn garbage_is_refused_up_front() {
        let mut machine = Machine::new();

        let error = machine
            .load_snapshot(Cursor::new(b"definitely not a snapshot"))
            .unwrap_err();

        assert!(matches!(error, SnapshotError::UnrecognizedFormat));
    }

    #[test]
    fn clock_state_is_one_tick_count() {
        // The save-state layout for clocks: a bare u64
        let mut clock: quartz_time::Clock<3_579_545> = quartz_time::Clock::new(EmuTime::ZERO);
        clock.advance(EmuTime::ZERO + EmuDuration::from_ticks_at(7, 3_579_545));

        let encoded = bincode::serde::encode_to_vec(clock, bincode::config::standard()).unwrap();
        let (expected, _): (u64, _) =
            bincode::serde::decode_from_slice(&encoded, bincode::config::standard()).unwrap();

        assert_eq!(expected, clock.last_tick().master_ticks());
    }
}
