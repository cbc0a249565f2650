//! # Ember Sim
//!
//! Headless runner for Ember particle system definitions.
//!
//! Loads particle settings and a TOML definition file, instantiates each
//! selected template, runs it for a fixed number of frames and logs the
//! resulting pool statistics.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod cli;
mod run;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(cli.json.then(|| fmt::layer().json()))
        .with((!cli.json).then(fmt::layer))
        .with(EnvFilter::from_default_env().add_directive(cli.log_directive().parse()?))
        .init();

    info!("Ember sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let summaries = run::run(&cli)?;

    info!("Simulated {} particle systems", summaries.len());
    Ok(())
}
