//! Operations shared by tx classes and vqs. Every existence check re-reads the stats dump.
use crate::control::ControlPlane;
use crate::error::{Error, Result};
use crate::ids::{ClassId, ClassKind, DeviceName, Weight};
use crate::kernel::{ControlCommand, Kernel};
use crate::stats::Device;

pub(super) fn create<K: Kernel>(
    plane: &mut ControlPlane<K>,
    kind: ClassKind,
    device: &DeviceName,
    id: &ClassId,
) -> Result<()> {
    plane.install(device)?;

    let stats = plane.stats()?;
    if stats
        .device(device)
        .is_some_and(|dev| dev.contains(kind, id))
    {
        log::debug!("Refusing to create {kind} `{id}` on `{device}` twice");
        return Err(Error::DuplicateEntity {
            kind,
            device: device.clone(),
            id: id.clone(),
        });
    }

    plane.write_control(ControlCommand::create(kind, device, id))?;
    log::info!("Created {kind} `{id}` on `{device}`");
    Ok(())
}

pub(super) fn delete<K: Kernel>(
    plane: &mut ControlPlane<K>,
    kind: ClassKind,
    device: &DeviceName,
    id: &ClassId,
) -> Result<()> {
    let stats = plane.stats()?;
    if !stats
        .device(device)
        .is_some_and(|dev| dev.contains(kind, id))
    {
        return Err(not_found(kind, device, id));
    }

    plane.write_control(ControlCommand::delete(kind, device, id))?;
    log::info!("Deleted {kind} `{id}` from `{device}`");
    Ok(())
}

pub(super) fn set_weight<K: Kernel>(
    plane: &mut ControlPlane<K>,
    kind: ClassKind,
    device: &DeviceName,
    id: &ClassId,
    weight: Weight,
) -> Result<()> {
    plane.write_control(ControlCommand::set_weight(kind, device, id, weight))?;
    log::info!("Set weight of {kind} `{id}` on `{device}` to {weight}");
    Ok(())
}

pub(super) fn list<K: Kernel>(
    plane: &ControlPlane<K>,
    device: Option<&DeviceName>,
) -> Result<Vec<Device>> {
    plane.list(device)
}

pub(super) fn not_found(kind: ClassKind, device: &DeviceName, id: &ClassId) -> Error {
    Error::NotFound {
        kind,
        device: device.clone(),
        id: id.clone(),
    }
}
