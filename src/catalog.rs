use crate::backend::{AudioBackend, DeviceInfo, HostApiInfo};
use crate::error::{Result, ScopeError};

/// Position of the device at `global_index` within `host_api`'s own device list.
///
/// Counts the devices of the same host API that precede it globally.
pub fn host_api_device_index(devices: &[DeviceInfo], global_index: usize, host_api: usize) -> usize {
    devices
        .iter()
        .filter(|d| d.index < global_index && d.host_api == host_api)
        .count()
}

/// Fresh snapshots of the backend's host APIs and devices. Nothing is cached.
pub struct DeviceCatalog {
    backend: Box<dyn AudioBackend>,
}

impl DeviceCatalog {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        log::info!("Using {} backend", backend.display_text());
        Self { backend }
    }

    pub fn backend(&self) -> &dyn AudioBackend {
        self.backend.as_ref()
    }

    pub fn list_host_apis(&self) -> Result<Vec<HostApiInfo>> {
        let apis = self.backend.host_apis()?;
        if apis.is_empty() {
            return Err(ScopeError::DeviceEnumeration("no host APIs found".into()));
        }
        Ok(apis)
    }

    /// All devices (input and output) of one host API, in backend order.
    pub fn list_devices_for_host_api(&self, host_api: usize) -> Result<Vec<DeviceInfo>> {
        if host_api >= self.backend.host_apis()?.len() {
            return Err(ScopeError::UnknownHostApi(host_api));
        }
        Ok(self
            .backend
            .devices()?
            .into_iter()
            .filter(|d| d.host_api == host_api)
            .collect())
    }

    pub fn device_by_host_api_index(&self, host_api: usize, index: usize) -> Result<DeviceInfo> {
        self.list_devices_for_host_api(host_api)?
            .into_iter()
            .nth(index)
            .ok_or(ScopeError::UnknownDevice { host_api, index })
    }

    /// The backend's default input as `(host API, index within that host API)`.
    pub fn default_input_device(&self) -> Result<(usize, usize)> {
        let global = self
            .backend
            .default_input_device()?
            .ok_or(ScopeError::NoDefaultInput)?;
        let devices = self.backend.devices()?;
        let host_api = devices
            .iter()
            .find(|d| d.index == global)
            .map(|d| d.host_api)
            .ok_or(ScopeError::NoDefaultInput)?;
        Ok((host_api, host_api_device_index(&devices, global, host_api)))
    }

    /// Index to preselect under `host_api`: the default input if it lives there,
    /// else the first input-capable device.
    pub fn preferred_device(&self, host_api: usize) -> Result<Option<usize>> {
        if let Ok((default_api, index)) = self.default_input_device() {
            if default_api == host_api {
                return Ok(Some(index));
            }
        }
        Ok(self
            .list_devices_for_host_api(host_api)?
            .iter()
            .position(DeviceInfo::is_input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, DummyDevice};

    fn device(index: usize, host_api: usize) -> DeviceInfo {
        DeviceInfo {
            index,
            name: format!("dev{index}"),
            host_api,
            max_input_channels: 1,
            default_sample_rate: 48_000,
        }
    }

    fn two_hosts() -> DeviceCatalog {
        DeviceCatalog::new(Box::new(
            DummyBackend::new()
                .with_host(
                    "ALSA",
                    vec![
                        DummyDevice::output("HDMI", 48_000),
                        DummyDevice::input("Line In", 2, 48_000),
                    ],
                )
                .with_host(
                    "JACK",
                    vec![
                        DummyDevice::output("system out", 48_000),
                        DummyDevice::input("system in", 2, 48_000),
                        DummyDevice::input("looper", 1, 48_000),
                    ],
                )
                .with_default_input(3),
        ))
    }

    #[test]
    fn relative_index_counts_same_api_predecessors() {
        // Host API 1 owns global devices 2, 3 and 5.
        let devices = vec![
            device(0, 0),
            device(1, 0),
            device(2, 1),
            device(3, 1),
            device(4, 0),
            device(5, 1),
        ];
        assert_eq!(host_api_device_index(&devices, 3, 1), 1);
        assert_eq!(host_api_device_index(&devices, 5, 1), 2);
        assert_eq!(host_api_device_index(&devices, 4, 0), 2);
        assert_eq!(host_api_device_index(&devices, 0, 0), 0);
    }

    #[test]
    fn devices_belong_to_requested_host_api() {
        let catalog = two_hosts();
        for api in catalog.list_host_apis().unwrap() {
            let devices = catalog.list_devices_for_host_api(api.index).unwrap();
            assert_eq!(devices.len(), api.device_count);
            assert!(devices.iter().all(|d| d.host_api == api.index));
        }
    }

    #[test]
    fn default_input_resolves_to_host_relative_index() {
        let catalog = two_hosts();
        assert_eq!(catalog.default_input_device().unwrap(), (1, 1));
        let device = catalog.device_by_host_api_index(1, 1).unwrap();
        assert_eq!(device.name, "system in");
        assert_eq!(device.index, 3);
    }

    #[test]
    fn preferred_device_falls_back_to_first_input() {
        let catalog = two_hosts();
        assert_eq!(catalog.preferred_device(1).unwrap(), Some(1));
        assert_eq!(catalog.preferred_device(0).unwrap(), Some(1));
    }

    #[test]
    fn empty_backend_is_an_enumeration_failure() {
        let catalog = DeviceCatalog::new(Box::new(DummyBackend::new()));
        assert!(matches!(
            catalog.list_host_apis(),
            Err(ScopeError::DeviceEnumeration(_))
        ));
        assert_eq!(catalog.default_input_device(), Err(ScopeError::NoDefaultInput));
    }

    #[test]
    fn unknown_ids_are_errors() {
        let catalog = two_hosts();
        assert_eq!(
            catalog.list_devices_for_host_api(7),
            Err(ScopeError::UnknownHostApi(7))
        );
        assert_eq!(
            catalog.device_by_host_api_index(0, 9),
            Err(ScopeError::UnknownDevice {
                host_api: 0,
                index: 9
            })
        );
    }
}
