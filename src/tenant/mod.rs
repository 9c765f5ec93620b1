//! Tenant registry: tx classes and vqs per device.
//!
//! The registry keeps no state of its own. Before every create or delete it parses a fresh
//! stats dump, so duplicates and missing entities are detected against the kernel's view.
mod registry;

use crate::control::ControlPlane;
use crate::error::Result;
use crate::ids::{ClassId, ClassKind, DeviceName, Weight};
use crate::kernel::{ControlCommand, Kernel};
use crate::stats::Device;

/// Manager for transmit classes, borrowed from a [`ControlPlane`].
#[derive(Debug)]
pub struct TxClasses<'a, K> {
    plane: &'a mut ControlPlane<K>,
}

/// Manager for virtual receive queues, borrowed from a [`ControlPlane`].
#[derive(Debug)]
pub struct Vqs<'a, K> {
    plane: &'a mut ControlPlane<K>,
}

impl<K: Kernel> TxClasses<'_, K> {
    const KIND: ClassKind = ClassKind::TxClass;

    /// Creates a tx class, installing the device first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateEntity`] without writing if the class exists already.
    pub fn create(&mut self, device: &DeviceName, id: &ClassId) -> Result<()> {
        registry::create(self.plane, Self::KIND, device, id)
    }

    /// Deletes a tx class.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] without writing if the device or class is unknown.
    pub fn delete(&mut self, device: &DeviceName, id: &ClassId) -> Result<()> {
        registry::delete(self.plane, Self::KIND, device, id)
    }

    pub fn set_weight(&mut self, device: &DeviceName, id: &ClassId, weight: Weight) -> Result<()> {
        registry::set_weight(self.plane, Self::KIND, device, id, weight)
    }

    /// Associates tx class `txc` with vq `vq`. Both must exist on `device`.
    pub fn associate(&mut self, device: &DeviceName, txc: &ClassId, vq: &ClassId) -> Result<()> {
        let stats = self.plane.stats()?;
        let dev = stats.device(device);
        if !dev.is_some_and(|d| d.contains(ClassKind::TxClass, txc)) {
            return Err(registry::not_found(ClassKind::TxClass, device, txc));
        }
        if !dev.is_some_and(|d| d.contains(ClassKind::Vq, vq)) {
            return Err(registry::not_found(ClassKind::Vq, device, vq));
        }

        self.plane
            .write_control(ControlCommand::associate(device, txc, vq))?;
        log::info!("Associated tx class `{txc}` with vq `{vq}` on `{device}`");
        Ok(())
    }

    pub fn list(&self, device: Option<&DeviceName>) -> Result<Vec<Device>> {
        registry::list(self.plane, device)
    }
}

impl<K: Kernel> Vqs<'_, K> {
    const KIND: ClassKind = ClassKind::Vq;

    /// Creates a vq, installing the device first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateEntity`] without writing if the vq exists already.
    pub fn create(&mut self, device: &DeviceName, id: &ClassId) -> Result<()> {
        registry::create(self.plane, Self::KIND, device, id)
    }

    /// Deletes a vq.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] without writing if the device or vq is unknown.
    pub fn delete(&mut self, device: &DeviceName, id: &ClassId) -> Result<()> {
        registry::delete(self.plane, Self::KIND, device, id)
    }

    pub fn set_weight(&mut self, device: &DeviceName, id: &ClassId, weight: Weight) -> Result<()> {
        registry::set_weight(self.plane, Self::KIND, device, id, weight)
    }

    pub fn list(&self, device: Option<&DeviceName>) -> Result<Vec<Device>> {
        registry::list(self.plane, device)
    }
}

impl<K: Kernel> ControlPlane<K> {
    pub fn tx_classes(&mut self) -> TxClasses<'_, K> {
        TxClasses { plane: self }
    }

    pub fn vqs(&mut self) -> Vqs<'_, K> {
        Vqs { plane: self }
    }

    /// Sets up a complete tenant on `device`: a tx class and a vq named `id`, associated with
    /// each other and both weighted `weight`.
    ///
    /// Stops at the first failing step. Steps already applied are not rolled back.
    pub fn create_tenant(
        &mut self,
        device: &DeviceName,
        id: &ClassId,
        weight: Weight,
    ) -> Result<()> {
        self.tx_classes().create(device, id)?;
        self.vqs().create(device, id)?;
        self.tx_classes().associate(device, id, id)?;
        self.tx_classes().set_weight(device, id, weight)?;
        self.vqs().set_weight(device, id, weight)?;
        Ok(())
    }

    /// Asks the module to recompute the bandwidth shares of `device`.
    pub fn recompute(&mut self, device: &DeviceName) -> Result<()> {
        self.write_control(ControlCommand::recompute(device))?;
        log::info!("Recomputed `{device}`");
        Ok(())
    }
}
