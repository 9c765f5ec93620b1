//! Saving the live configuration into a [`Snapshot`] and replaying a snapshot onto the kernel.
use std::collections::BTreeMap;
use std::path::Path;

use super::{
    DeviceConfig, DeviceConfigs, Snapshot, TxClassConfig, VqConfig, read_snapshot, write_snapshot,
};
use crate::control::ControlPlane;
use crate::error::{NonFatalExt, Result};
use crate::ids::{ClassId, CpuMask, DeviceName, RxQueue, Weight};
use crate::kernel::Kernel;

impl<K: Kernel> ControlPlane<K> {
    /// Captures parameters, tx classes, vqs and RPS masks of every device reporting state.
    ///
    /// Entities whose observed weight cannot be expressed as a [`Weight`] are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModuleNotLoaded`](crate::Error::ModuleNotLoaded) if the stats dump is
    /// absent.
    pub fn save(&mut self) -> Result<Snapshot> {
        let stats = self.stats()?;
        let params = self.refresh_params()?.to_map();

        let mut config = DeviceConfigs::new();
        let mut rps = BTreeMap::new();
        for device in stats.devices().iter().filter(|d| d.has_state()) {
            let mut entry = DeviceConfig::default();
            for txc in &device.tx_classes {
                let Some(weight) = observed_weight(txc.weight, &device.name, &txc.id) else {
                    continue;
                };
                entry.txcs.push(TxClassConfig {
                    class: txc.id.clone(),
                    weight,
                    assoc: txc.assoc_vq.clone(),
                });
            }
            for vq in &device.vqs {
                let Some(weight) = observed_weight(vq.weight, &device.name, &vq.id) else {
                    continue;
                };
                entry.vqs.push(VqConfig {
                    class: vq.id.clone(),
                    weight,
                });
            }

            match self.rps(&device.name) {
                Ok(masks) if !masks.is_empty() => {
                    rps.insert(
                        device.name.clone(),
                        masks.into_iter().collect::<BTreeMap<RxQueue, CpuMask>>(),
                    );
                }
                Ok(_) => {}
                Err(err) => log::warn!("Not saving rps masks of `{}`: {err}", device.name),
            }
            config.insert(device.name.clone(), entry);
        }

        Ok(Snapshot {
            params,
            config,
            rps,
            ..Snapshot::default()
        })
    }

    /// Saves the configuration to a JSON file.
    pub fn save_to(&mut self, path: impl AsRef<Path>) -> Result<Snapshot> {
        let snapshot = self.save()?;
        write_snapshot(path.as_ref(), &snapshot)?;
        log::info!("Saved configuration to `{}`", path.as_ref().display());
        Ok(snapshot)
    }

    /// Replaces the whole kernel configuration with `snapshot`.
    ///
    /// Removes every qdisc and unloads the module, loads it again, then applies parameters,
    /// RPS masks and, device by device, vqs followed by tx classes. Duplicates and missing
    /// entities are logged and skipped; any other failure aborts the load.
    pub fn load(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.validate()?;

        if self.module_loaded()? {
            self.unload_module()?;
        }
        self.load_module()?;

        for (key, value) in &snapshot.params {
            self.set_param(key, value)?;
        }

        for (device, masks) in &snapshot.rps {
            for (queue, mask) in masks {
                self.set_rps(device, queue, mask)?;
            }
        }

        for (device, config) in &snapshot.config {
            self.install(device)?;

            for vq in &config.vqs {
                self.vqs().create(device, &vq.class).skip_non_fatal()?;
                self.vqs()
                    .set_weight(device, &vq.class, vq.weight)
                    .skip_non_fatal()?;
            }
            for txc in &config.txcs {
                self.tx_classes()
                    .create(device, &txc.class)
                    .skip_non_fatal()?;
                self.tx_classes()
                    .set_weight(device, &txc.class, txc.weight)
                    .skip_non_fatal()?;
                if let Some(vq) = &txc.assoc {
                    self.tx_classes()
                        .associate(device, &txc.class, vq)
                        .skip_non_fatal()?;
                }
            }
        }

        log::info!("Loaded configuration of {} device(s)", snapshot.config.len());
        Ok(())
    }

    /// Reads a JSON snapshot file and loads it.
    pub fn load_from(&mut self, path: impl AsRef<Path>) -> Result<Snapshot> {
        let snapshot = read_snapshot(path)?;
        self.load(&snapshot)?;
        Ok(snapshot)
    }
}

fn observed_weight(raw: u64, device: &DeviceName, id: &ClassId) -> Option<Weight> {
    match Weight::try_from(raw) {
        Ok(weight) => Some(weight),
        Err(err) => {
            log::warn!("Not saving `{id}` on `{device}`: {err}");
            None
        }
    }
}
