//! Device installation: the module must be loaded and the device must carry the perfiso qdisc
//! before any tx class or vq can be created on it.
use std::collections::HashSet;

use crate::control::ControlPlane;
use crate::error::{Error, Result};
use crate::ids::DeviceName;
use crate::kernel::{ExternalCommand, Kernel};

/// Devices known to be installed in the current module session.
#[derive(Debug, Default)]
pub struct Installer {
    installed: HashSet<DeviceName>,
}

impl Installer {
    pub fn is_installed(&self, device: &DeviceName) -> bool {
        self.installed.contains(device)
    }

    fn mark(&mut self, device: DeviceName) {
        self.installed.insert(device);
    }
}

impl<K: Kernel> ControlPlane<K> {
    /// Ensures the module is loaded and `device` has the qdisc attached.
    ///
    /// Repeated calls for the same device within a session return immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InstallFailed`] if loading the module or attaching the qdisc fails, or
    /// if the device is still missing from the stats dump afterwards.
    pub fn install(&mut self, device: &DeviceName) -> Result<()> {
        if self.session.installer.is_installed(device) {
            return Ok(());
        }

        let stats = match self.read_stats()? {
            Some(stats) => stats,
            None => {
                self.load_module()?;
                self.read_stats()?.ok_or_else(|| Error::InstallFailed {
                    what: format!("module `{}`", self.settings.module.name),
                    source: None,
                })?
            }
        };

        if stats.device(device).is_none() {
            let command = ExternalCommand::qdisc_add(device, &self.settings.qdisc_kind);
            self.kernel
                .exec(&command)
                .map_err(|source| Error::InstallFailed {
                    what: format!("qdisc on `{device}`"),
                    source: Some(source),
                })?;

            let attached = self
                .read_stats()?
                .is_some_and(|stats| stats.device(device).is_some());
            if !attached {
                return Err(Error::InstallFailed {
                    what: format!("qdisc on `{device}`"),
                    source: None,
                });
            }
            log::info!("Installed perfiso on `{device}`");
        }

        self.session.installer.mark(device.clone());
        Ok(())
    }
}
