use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Simulated seconds to run
    #[clap(short, long, default_value_t = 5)]
    pub seconds: u64,
    /// Emulation speed as a percentage of real time
    #[clap(long, default_value_t = 100)]
    pub speed: u32,
    /// Write the kernel timing snapshot here on exit
    #[clap(long)]
    pub snapshot: Option<PathBuf>,
}
