//! Command line for ember-sim

use clap::Parser;
use std::path::PathBuf;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "ember-sim")]
#[command(about = "Runs Ember particle system definitions headless and reports pool statistics", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML file with `[[system]]` definitions
    pub definitions: PathBuf,

    /// Template to run (all templates when omitted)
    #[arg(short, long)]
    pub template: Option<String>,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 300)]
    pub frames: u32,

    /// Seconds per frame
    #[arg(long, default_value_t = 1.0 / 60.0)]
    pub dt: f32,

    /// Particle settings file
    #[arg(short, long, default_value = ember_particles::SETTINGS_FILE)]
    pub settings: PathBuf,

    /// Skip definition entries that cannot be applied instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Never notify a camera, so non-visible update timeouts apply
    #[arg(long)]
    pub hidden: bool,

    /// Log a statistics line every N frames (0 = only at the end)
    #[arg(long, default_value_t = 0)]
    pub report_every: u32,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Log directive for the requested verbosity.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "ember=info",
            1 => "ember=debug",
            _ => "ember=trace",
        }
    }
}
