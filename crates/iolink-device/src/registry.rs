//! Host-side collection of independent devices addressed by `DeviceId`.

use crate::config::DeviceConfig;
use crate::device::{Application, Device};
use crate::dl::DlState;
use crate::hal::{IoLinkError, Transceiver};
use crate::log::{LinkContext, link_info, link_warn};
use crate::types::DeviceId;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

const LAYER: &str = "Registry";

/// Owns several devices; they share no state and are ticked in id order.
pub struct DeviceRegistry<T: Transceiver, A: Application> {
    devices: BTreeMap<DeviceId, Device<T, A>>,
}

impl<T: Transceiver, A: Application> Default for DeviceRegistry<T, A> {
    fn default() -> Self {
        Self { devices: BTreeMap::new() }
    }
}

impl<T: Transceiver, A: Application> DeviceRegistry<T, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a device and registers it under `id`.
    pub fn create(
        &mut self,
        id: DeviceId,
        config: DeviceConfig,
        transceiver: T,
        app: A,
    ) -> Result<&mut Device<T, A>, IoLinkError> {
        let ctx = LinkContext::new(id, LAYER);
        if self.devices.contains_key(&id) {
            link_warn!(ctx, "Device already exists");
            return Err(IoLinkError::InvalidParameter);
        }
        let device = Device::new(id, config, transceiver, app)?;
        link_info!(ctx, "Device registered");
        Ok(self.devices.entry(id).or_insert(device))
    }

    /// Registers an already built device under its own id.
    pub fn insert(&mut self, device: Device<T, A>) -> Result<(), IoLinkError> {
        let id = device.id();
        let ctx = LinkContext::new(id, LAYER);
        if self.devices.contains_key(&id) {
            link_warn!(ctx, "Device already exists");
            return Err(IoLinkError::InvalidParameter);
        }
        self.devices.insert(id, device);
        link_info!(ctx, "Device registered");
        Ok(())
    }

    /// Removes a device; its outstanding requests are dropped with it.
    pub fn remove(&mut self, id: DeviceId) -> Result<Device<T, A>, IoLinkError> {
        let device = self.devices.remove(&id).ok_or(IoLinkError::InvalidHandle)?;
        link_info!(LinkContext::new(id, LAYER), "Device removed");
        Ok(device)
    }

    pub fn get(&self, id: DeviceId) -> Result<&Device<T, A>, IoLinkError> {
        self.devices.get(&id).ok_or(IoLinkError::InvalidHandle)
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Result<&mut Device<T, A>, IoLinkError> {
        self.devices.get_mut(&id).ok_or(IoLinkError::InvalidHandle)
    }

    pub fn tick(&mut self, id: DeviceId, now_us: u64) -> Result<DlState, IoLinkError> {
        Ok(self.get_mut(id)?.tick(now_us))
    }

    /// Ticks every device once and reports the resulting states.
    pub fn tick_all(&mut self, now_us: u64) -> Vec<(DeviceId, DlState)> {
        self.devices
            .iter_mut()
            .map(|(id, device)| (*id, device.tick(now_us)))
            .collect()
    }

    /// Earliest timer deadline across all devices.
    pub fn next_deadline(&self) -> Option<u64> {
        self.devices.values().filter_map(Device::next_deadline).min()
    }

    pub fn ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
