use crate::scheduler::Scheduler;
use quartz_time::EmuTime;
use std::{error::Error, fmt::Debug};

pub use registry::*;

mod registry;

/// Distinguishes simultaneously pending sync points of one device
///
/// The kernel never interprets tags; a device picks its own scheme (one tag
/// per hardware event source is typical)
pub type SyncTag = i32;

/// Capability for receiving a time-scheduled callback
///
/// The scheduler does not auto-repeat: a device that wants periodic
/// callbacks re-arms itself with [Scheduler::set_sync_point] from inside its
/// own `execute_until`. `time` is the authoritative "now" for the callback
/// and equals exactly the instant that was registered for the firing sync
/// point. Errors propagate unmodified out of
/// [Scheduler::run_until](crate::scheduler::Scheduler::run_until).
pub trait Schedulable: Debug {
    fn execute_until(
        &mut self,
        scheduler: &mut Scheduler,
        time: EmuTime,
        tag: SyncTag,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}
