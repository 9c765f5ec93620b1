//! perfiso-ctl: userspace control plane for the perfiso network isolation kernel module.
//!
//! The module enforces per-tenant bandwidth shares on a host's network interfaces. This library
//! creates, weights, associates and deletes the module's transmit classes and virtual receive
//! queues, reads its statistics dump, tunes its parameters, and saves and restores the complete
//! configuration as a JSON snapshot.
use std::io::Write;

use config::Settings;
use kernel::ProcfsKernel;

pub mod cli;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod fsutil;
pub mod ids;
pub mod kernel;
pub mod params;
pub mod rps;
pub mod snapshot;
pub mod stats;
pub mod tenant;

pub use control::ControlPlane;
pub use error::{Error, Result};

/// Runs a single `perfiso-ctl` command against the host kernel.
///
/// Settings are taken from the environment (see [`Settings::from_env`]), and listings are
/// printed to stdout.
///
/// # Errors
///
/// Returns an error for invalid usage and for any fatal control plane error.
pub fn run(
    args: impl IntoIterator<Item = String>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = args.into_iter().collect();
    let command = cli::Command::parse(&args)?;

    let settings = Settings::from_env();
    let kernel = ProcfsKernel::new(settings.paths.clone());
    let mut plane = ControlPlane::new(kernel, settings);
    log::debug!("Running {command:?}");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    command.execute(&mut plane, &mut out)?;
    out.flush()?;
    Ok(())
}
