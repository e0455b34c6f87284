use std::rc::Rc;

use crate::backend::{DeviceInfo, HostApiInfo};
use crate::catalog::DeviceCatalog;
use crate::error::Result;

/// What a selection widget needs to enumerate and render rows.
pub trait ListModel {
    fn count(&self) -> usize;
    fn display_name(&self, row: usize) -> Option<&str>;
    fn is_selectable(&self, row: usize) -> bool {
        row < self.count()
    }
    /// Bumped on every full reset of the rows.
    fn revision(&self) -> u64;
}

pub struct HostApiListModel {
    apis: Vec<HostApiInfo>,
}

impl HostApiListModel {
    pub fn new(catalog: &DeviceCatalog) -> Result<Self> {
        Ok(Self {
            apis: catalog.list_host_apis()?,
        })
    }
}

impl ListModel for HostApiListModel {
    fn count(&self) -> usize {
        self.apis.len()
    }
    fn display_name(&self, row: usize) -> Option<&str> {
        self.apis.get(row).map(|api| api.name.as_str())
    }
    fn revision(&self) -> u64 {
        0
    }
}

/// Devices of one host API. Output-only devices are listed but not selectable.
pub struct DeviceListModel {
    catalog: Rc<DeviceCatalog>,
    host_api: Option<usize>,
    devices: Vec<DeviceInfo>,
    revision: u64,
}

impl DeviceListModel {
    pub fn new(catalog: Rc<DeviceCatalog>) -> Self {
        Self {
            catalog,
            host_api: None,
            devices: Vec::new(),
            revision: 0,
        }
    }

    /// Replaces every row with a fresh snapshot of `host_api`'s devices.
    pub fn set_host_api(&mut self, host_api: usize) -> Result<()> {
        self.devices = self.catalog.list_devices_for_host_api(host_api)?;
        self.host_api = Some(host_api);
        self.revision += 1;
        log::debug!(
            "Device list reset for host API {host_api}: {} devices",
            self.devices.len()
        );
        Ok(())
    }

    pub(crate) fn host_api(&self) -> Option<usize> {
        self.host_api
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }
}

impl ListModel for DeviceListModel {
    fn count(&self) -> usize {
        self.devices.len()
    }
    fn display_name(&self, row: usize) -> Option<&str> {
        self.devices.get(row).map(|d| d.name.as_str())
    }
    fn is_selectable(&self, row: usize) -> bool {
        self.devices.get(row).is_some_and(DeviceInfo::is_input)
    }
    fn revision(&self) -> u64 {
        self.revision
    }
}
