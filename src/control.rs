//! The control plane context.
//!
//! [`ControlPlane`] owns the [`Kernel`] handle, the [`Settings`] and the state of the current
//! module session. A session starts whenever the module is (re)loaded: the set of devices known
//! to carry the qdisc and the cached parameter listing are only valid for one module instance
//! and are dropped with it.
use crate::config::Settings;
use crate::device::Installer;
use crate::error::{Error, Result};
use crate::ids::DeviceName;
use crate::kernel::{ControlCommand, ExternalCommand, Kernel};
use crate::params::Params;
use crate::stats::{Counters, Device, Stats, parse_counters};

#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) installer: Installer,
    pub(crate) params: Option<Params>,
}

#[derive(Debug)]
pub struct ControlPlane<K> {
    pub(crate) kernel: K,
    pub(crate) settings: Settings,
    pub(crate) session: Session,
}

impl<K: Kernel> ControlPlane<K> {
    pub fn new(kernel: K, settings: Settings) -> Self {
        Self {
            kernel,
            settings,
            session: Session::default(),
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Parses the current stats dump, or returns `Ok(None)` if the module is not loaded.
    pub fn read_stats(&self) -> Result<Option<Stats>> {
        match self.kernel.read_stats()? {
            Some(dump) => Ok(Some(Stats::parse(&dump)?)),
            None => Ok(None),
        }
    }

    /// Parses the current stats dump.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModuleNotLoaded`] if the dump is absent.
    pub fn stats(&self) -> Result<Stats> {
        self.read_stats()?.ok_or_else(|| Error::ModuleNotLoaded {
            path: self.settings.paths.stats_file.clone(),
        })
    }

    /// Parses the CSV byte counters.
    pub fn counters(&self) -> Result<Counters> {
        let dump = self
            .kernel
            .read_counters()?
            .ok_or_else(|| Error::ModuleNotLoaded {
                path: self.settings.paths.counters_file.clone(),
            })?;
        Ok(parse_counters(dump.as_bytes())?)
    }

    /// Lists every device, or only `device`.
    pub fn list(&self, device: Option<&DeviceName>) -> Result<Vec<Device>> {
        let stats = self.stats()?;
        Ok(stats.filter(device).into_iter().cloned().collect())
    }

    pub fn module_loaded(&self) -> Result<bool> {
        Ok(self.kernel.read_stats()?.is_some())
    }

    /// Loads the module with the configured object file and arguments and starts a new session.
    pub fn load_module(&mut self) -> Result<()> {
        let module = &self.settings.module;
        let command = ExternalCommand::insmod(&module.object_path, &module.args);
        self.kernel
            .exec(&command)
            .map_err(|source| Error::InstallFailed {
                what: format!("module `{}`", module.object_path.display()),
                source: Some(source),
            })?;
        log::info!("Loaded module `{}`", module.name);
        self.reset();
        Ok(())
    }

    /// Removes the qdisc from every device in the dump, then unloads the module.
    ///
    /// Failing qdisc removals are logged; a failing `rmmod` is returned.
    pub fn unload_module(&mut self) -> Result<()> {
        if let Some(stats) = self.read_stats()? {
            for device in stats.devices() {
                let command = ExternalCommand::qdisc_del(&device.name);
                if let Err(err) = self.kernel.exec(&command) {
                    log::warn!("Failed to remove qdisc from `{}`: {err}", device.name);
                }
            }
        }

        let command = ExternalCommand::rmmod(&self.settings.module.name);
        self.kernel.exec(&command)?;
        log::info!("Unloaded module `{}`", self.settings.module.name);
        self.reset();
        Ok(())
    }

    /// Drops every piece of session state.
    pub fn reset(&mut self) {
        self.session = Session::default();
    }

    /// Writes one control line, mapping any failure to [`Error::CommandFailure`].
    pub(crate) fn write_control(&mut self, command: ControlCommand) -> Result<()> {
        log::debug!("{command}");
        match self.kernel.write_control(&command) {
            Ok(()) => Ok(()),
            Err(source) => Err(Error::CommandFailure { command, source }),
        }
    }
}
