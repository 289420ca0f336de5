//! Quartz Kernel
//!
//! The deterministic virtual-time kernel for the quartz emulator. One
//! [Scheduler](scheduler::Scheduler) per emulated machine advances simulated
//! time and fires device callbacks at exact future instants, with FIFO
//! ordering on equal timestamps so that two runs fed the same inputs produce
//! bit-identical device state. Devices participate through the
//! [Schedulable](component::Schedulable) capability and are owned by a
//! generational [DeviceRegistry](component::DeviceRegistry), so a destroyed
//! device can never be called back through a stale sync point.
//!
//! Everything here is single threaded and run to completion. Wall-clock
//! pacing lives in [throttle] and only ever reads simulated time.

/// Device capability and the registry that owns devices
pub mod component;
/// The per-machine context object
pub mod machine;
/// Snapshotting of the kernel timing state
pub mod persistence;
/// The sync point scheduler
pub mod scheduler;
/// Wall-clock pacing for the driving loop
pub mod throttle;
