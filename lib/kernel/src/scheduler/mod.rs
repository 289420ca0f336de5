use crate::component::{DeviceId, SyncTag};
use quartz_time::EmuTime;
use std::{collections::BTreeMap, error::Error};

mod run;

/// One scheduled future callback, as exposed to queries and persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPoint {
    pub time: EmuTime,
    pub owner: DeviceId,
    pub tag: SyncTag,
}

/// Primary order is firing time; the insertion sequence breaks ties, which
/// makes callback order on equal timestamps FIFO and therefore reproducible
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    time: EmuTime,
    sequence: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingSync {
    owner: DeviceId,
    tag: SyncTag,
}

#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    /// A sync point outlived its owner, which means a device was torn down
    /// without going through
    /// [Machine::remove_device](crate::machine::Machine::remove_device)
    #[error("sync point at {time} (tag {tag}) references a dead device")]
    StaleDevice { time: EmuTime, tag: SyncTag },
    #[error(transparent)]
    Device(Box<dyn Error + Send + Sync>),
}

/// The sync point scheduler for one emulated machine
///
/// Owns the full set of pending sync points and the machine's notion of
/// "now". Not thread safe by design: the whole kernel runs cooperatively on
/// one thread, and determinism comes from the total (time, insertion) order
/// rather than from locking.
///
/// Dropping the scheduler drops all pending points without firing them.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: EmuTime,
    next_sequence: u64,
    pending: BTreeMap<QueueKey, PendingSync>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic read of current simulated time
    ///
    /// During a callback this is the firing time of the sync point being
    /// executed; after [run_until](Self::run_until) returns it equals the
    /// requested instant
    #[inline]
    pub fn current_time(&self) -> EmuTime {
        self.now
    }

    /// Registers a callback for `owner` at `time`
    ///
    /// The scheduler does not deduplicate: a caller replacing an earlier
    /// point for the same (owner, tag) removes the old one first. Keeping
    /// the hot path free of lookups is deliberate
    pub fn set_sync_point(&mut self, time: EmuTime, owner: DeviceId, tag: SyncTag) {
        debug_assert!(time >= self.now, "sync point set in the past");

        let key = QueueKey {
            time,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        tracing::trace!("Sync point for {:?} (tag {}) set at {}", owner, tag, time);
        self.pending.insert(key, PendingSync { owner, tag });
    }

    /// Removes every pending point of `owner`, or only those matching `tag`
    ///
    /// A no-op when nothing matches; devices call this defensively on reset
    pub fn remove_sync_point(&mut self, owner: DeviceId, tag: Option<SyncTag>) {
        self.pending
            .retain(|_, entry| entry.owner != owner || tag.is_some_and(|tag| tag != entry.tag));
    }

    /// Whether `owner` has a pending point, optionally narrowed to `tag`
    pub fn pending(&self, owner: DeviceId, tag: Option<SyncTag>) -> bool {
        self.pending
            .values()
            .any(|entry| entry.owner == owner && tag.is_none_or(|tag| tag == entry.tag))
    }

    /// Pending sync points in firing order
    pub fn sync_points(&self) -> impl Iterator<Item = SyncPoint> + '_ {
        self.pending.iter().map(|(key, entry)| SyncPoint {
            time: key.time,
            owner: entry.owner,
            tag: entry.tag,
        })
    }

    /// Replaces the whole pending set, preserving the order of `points` as
    /// the insertion order. Restores snapshots
    pub(crate) fn reload(&mut self, now: EmuTime, points: impl IntoIterator<Item = SyncPoint>) {
        self.now = now;
        self.next_sequence = 0;
        self.pending.clear();

        for point in points {
            self.set_sync_point(point.time, point.owner, point.tag);
        }
    }
}
