//! Minimal driving loop for the quartz time kernel
//!
//! Runs a machine with two toy devices at unrelated rates under the
//! wall-clock throttle. A stand-in for the CPU-execution loop of the full
//! emulator, and a smoke test that the kernel, the derived clocks and the
//! throttle compose.

use crate::{
    cli::Cli,
    devices::{BusCounter, FRAME_RATE, FrameTicker},
};
use clap::Parser;
use num::rational::Ratio;
use quartz_kernel::{machine::Machine, throttle::Throttle};
use quartz_time::{Clock, EmuDuration, EmuTime};
use std::{fs::File, io::BufWriter, time::Instant};
use tracing_subscriber::EnvFilter;

mod cli;
mod devices;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tracing::info!("Zircon v{}", env!("CARGO_PKG_VERSION"));

    let mut machine = Machine::new();

    let frame_ticker = machine
        .insert_device_with("frame", |id| Box::new(FrameTicker::new(id)))?;
    let bus_counter = machine
        .insert_device_with("bus", |id| Box::new(BusCounter::new(id)))?;

    machine.scheduler.set_sync_point(
        EmuTime::ZERO + Clock::<FRAME_RATE>::duration(1),
        frame_ticker,
        FrameTicker::TAG,
    );
    machine.scheduler.set_sync_point(
        EmuTime::ZERO + Clock::<{ devices::BUS_HZ }>::duration(BusCounter::BATCH),
        bus_counter,
        BusCounter::TAG,
    );

    let mut throttle = Throttle::new(Ratio::new(cli.speed, 100));
    throttle.reset(machine.now());

    let frame = EmuDuration::from_ticks_at(1, FRAME_RATE);
    let started = Instant::now();

    // The driving loop proper: advance one frame of simulated time, let the
    // scheduler drain what came due, then pace against the wall clock
    for _ in 0..cli.seconds * FRAME_RATE {
        let target = machine.now() + frame;

        machine.run_until(target)?;
        throttle.sync(target);
    }

    tracing::info!(
        "Ran {} of simulated time in {:.3?} (final lag {:?})",
        machine.now() - EmuTime::ZERO,
        started.elapsed(),
        throttle.lag(machine.now()),
    );

    if let Some(path) = cli.snapshot {
        machine.store_snapshot(BufWriter::new(File::create(&path)?))?;
        tracing::info!("Wrote kernel timing snapshot to {}", path.display());
    }

    Ok(())
}
