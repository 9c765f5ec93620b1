//! Receive packet steering masks of a device's receive queues.
use crate::control::ControlPlane;
use crate::error::{Error, Result};
use crate::ids::{CpuMask, DeviceName, RxQueue};
use crate::kernel::Kernel;

impl<K: Kernel> ControlPlane<K> {
    /// Lists the cpu mask of every receive queue of `device`, sorted by queue.
    /// The rps mask of every receive queue of `device`, ordered by queue number.
    pub fn rps(&self, device: &DeviceName) -> Result<Vec<(RxQueue, CpuMask)>> {
        let mut masks = self.kernel.read_rps(device)?;
        masks.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(masks)
    }

    pub fn set_rps(&mut self, device: &DeviceName, queue: &RxQueue, mask: &CpuMask) -> Result<()> {
        self.kernel
            .write_rps(device, queue, mask)
            .map_err(|source| Error::RpsWriteFailed {
                device: device.clone(),
                queue: queue.clone(),
                mask: mask.clone(),
                source,
            })?;
        log::info!("Set rps mask of `{device}/{queue}` to {mask}");
        Ok(())
    }
}
