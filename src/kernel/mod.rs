//! Access to the perfiso kernel module and the host tools around it.
//!
//! The [`Kernel`] trait is the only way the control plane touches the host. [`ProcfsKernel`]
//! implements it on top of `/proc`, `/sys` and `std::process::Command`.
mod command;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod procfs;

pub use command::{ControlCommand, Endpoint, ExternalCommand};
pub use error::{Error, Result};
pub use procfs::ProcfsKernel;

use crate::ids::{CpuMask, DeviceName, RxQueue};

/// Textual interface of the kernel module.
///
/// Reads never change kernel state. Every method is a blocking call without timeout.
pub trait Kernel {
    /// Reads the full stats dump, or `Ok(None)` if the module is not loaded.
    fn read_stats(&self) -> Result<Option<String>>;

    /// Reads the CSV byte counters dump, or `Ok(None)` if the module is not loaded.
    fn read_counters(&self) -> Result<Option<String>>;

    /// Writes a single control line to its endpoint.
    fn write_control(&mut self, command: &ControlCommand) -> Result<()>;

    /// Lists every scalar parameter with its current value, sorted by name.
    fn read_params(&self) -> Result<Vec<(String, String)>>;

    /// Writes the value of a single scalar parameter.
    fn write_param(&mut self, name: &str, value: &str) -> Result<()>;

    /// Lists the RPS cpu mask of every receive queue of `device`, sorted by queue.
    fn read_rps(&self, device: &DeviceName) -> Result<Vec<(RxQueue, CpuMask)>>;

    /// Writes the RPS cpu mask of one receive queue.
    fn write_rps(&mut self, device: &DeviceName, queue: &RxQueue, mask: &CpuMask) -> Result<()>;

    /// Runs an external program to completion. A non-zero exit status is an error.
    fn exec(&mut self, command: &ExternalCommand) -> Result<()>;
}
