use std::time::Duration;

use crate::models::config::CaptureConfig;
use crate::models::device::DeviceInfo;
use crate::models::error::CaptureError;
use crate::stream::device_handle::DeviceHandle;
use crate::traits::input_driver::InputDriver;

/// Owner of all live device handles for one driver connection.
///
/// This is the explicit context object of the engine: construct one, pump
/// `update(dt)` at a steady cadence, drop it to tear everything down. No
/// process-wide state exists anywhere in the crate.
///
/// Handles are created when a device first shows up in a scan and
/// destroyed when it disappears; a handle whose device persists across a
/// refresh is reused, keeping its stream open. Data accessors route
/// through `prepare`, so streams open lazily on first access.
pub struct DeviceRegistry<D: InputDriver> {
    driver: D,
    config: CaptureConfig,
    handles: Vec<DeviceHandle>,
}

impl<D: InputDriver> DeviceRegistry<D> {
    /// Validate the configuration, connect to the driver, and run the
    /// initial device scan.
    pub fn new(driver: D, config: CaptureConfig) -> Result<Self, CaptureError> {
        config.validate()?;
        let mut registry = Self {
            driver,
            config,
            handles: Vec::new(),
        };
        registry.refresh()?;
        Ok(registry)
    }

    /// Rescan the device list, reusing handles whose device is still
    /// present and dropping handles for devices that vanished. The default
    /// device ends up first.
    pub fn refresh(&mut self) -> Result<(), CaptureError> {
        let devices = self.driver.devices()?;

        let mut next = Vec::with_capacity(devices.len());
        for info in devices.into_iter().filter(|d| d.is_usable) {
            match self.handles.iter().position(|h| h.device().id == info.id) {
                Some(pos) => next.push(self.handles.swap_remove(pos)),
                None => next.push(DeviceHandle::new(info, self.config.clone())),
            }
        }

        if let Some(pos) = next.iter().position(|h| h.device().is_default) {
            next[..=pos].rotate_right(1);
        }

        // Whatever is left belongs to disconnected devices; dropping the
        // handles closes their streams.
        self.handles = next;
        Ok(())
    }

    /// Tick every handle once. Picks up hot-plug changes first when the
    /// driver reports any.
    pub fn update(&mut self, dt: Duration) -> Result<(), CaptureError> {
        if self.driver.devices_changed() {
            self.refresh()?;
        }
        for handle in &mut self.handles {
            handle.update(dt);
        }
        Ok(())
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.handles.iter().map(|h| h.device())
    }

    pub fn default_device(&self) -> Option<&DeviceInfo> {
        self.handles.first().map(|h| h.device())
    }

    pub fn handle(&self, device_id: &str) -> Option<&DeviceHandle> {
        self.handles.iter().find(|h| h.device().id == device_id)
    }

    /// Look up a handle and mark it as in use, opening its stream if
    /// needed. Returns `None` for unknown device ids.
    pub fn prepare(&mut self, device_id: &str) -> Option<&mut DeviceHandle> {
        let Self {
            driver, handles, ..
        } = self;
        let handle = handles.iter_mut().find(|h| h.device().id == device_id)?;
        handle.prepare(&*driver);
        Some(handle)
    }

    /// Like `prepare`, for the default device.
    pub fn prepare_default(&mut self) -> Option<&mut DeviceHandle> {
        let Self {
            driver, handles, ..
        } = self;
        let handle = handles.first_mut()?;
        handle.prepare(&*driver);
        Some(handle)
    }

    /// Per-band RMS of one channel of a device, most recent tick. Zero for
    /// unknown devices or while the stream is warming up.
    pub fn channel_level(&mut self, device_id: &str, channel: usize) -> [f32; 4] {
        self.prepare(device_id)
            .map(|h| h.channel_level(channel))
            .unwrap_or_default()
    }

    /// Normalized spectrum of a device, linear frequency axis.
    pub fn spectrum(&mut self, device_id: &str) -> &[f32] {
        match self.prepare(device_id) {
            Some(handle) => handle.spectrum(),
            None => &[],
        }
    }

    /// Normalized spectrum of a device on a log frequency axis.
    pub fn log_spectrum(&mut self, device_id: &str) -> &[f32] {
        match self.prepare(device_id) {
            Some(handle) => handle.log_spectrum(),
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::state::StreamState;
    use crate::stream::test_driver::{sine_bytes, FakeDriver, TICK};

    fn device(id: &str, is_default: bool) -> DeviceInfo {
        DeviceInfo {
            id: id.into(),
            name: format!("Device {id}"),
            channel_count: 1,
            sample_rate: 48_000,
            is_usable: true,
            is_default,
        }
    }

    fn raw_device(id: &str) -> DeviceInfo {
        DeviceInfo {
            is_usable: false,
            ..device(id, false)
        }
    }

    #[test]
    fn initial_scan_filters_and_orders() {
        let driver = FakeDriver::new(vec![
            device("a", false),
            raw_device("raw"),
            device("b", true),
        ]);
        let registry = DeviceRegistry::new(driver, CaptureConfig::default()).unwrap();

        let ids: Vec<_> = registry.devices().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(registry.default_device().unwrap().id, "b");
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let driver = FakeDriver::new(vec![device("a", true)]);
        let config = CaptureConfig {
            spectrum_resolution: Some(300),
            ..Default::default()
        };
        assert!(DeviceRegistry::new(driver, config).is_err());
    }

    #[test]
    fn refresh_reuses_surviving_handles() {
        let driver = FakeDriver::new(vec![device("a", true), device("b", false)]);
        let mut registry = DeviceRegistry::new(driver, CaptureConfig::default()).unwrap();

        registry.prepare("b");
        assert!(registry.handle("b").unwrap().state().is_streaming());

        // "a" vanishes, "b" survives with its stream intact.
        registry.driver.set_devices(vec![device("b", true)]);
        registry.update(TICK).unwrap();

        assert!(registry.handle("a").is_none());
        let b = registry.handle("b").unwrap();
        assert_eq!(b.state(), StreamState::Streaming);
        // No re-open happened for the surviving handle.
        assert_eq!(registry.driver.open_count(), 1);
    }

    #[test]
    fn accessors_open_lazily_and_read_data() {
        let driver = FakeDriver::new(vec![device("a", true)]);
        let mut registry = DeviceRegistry::new(driver, CaptureConfig::default()).unwrap();
        assert_eq!(registry.driver.open_count(), 0);

        // First access opens the stream; data is still warming up.
        assert_eq!(registry.channel_level("a", 0), [0.0; 4]);
        assert_eq!(registry.driver.open_count(), 1);

        registry.driver.deliver(&sine_bytes(48_000, 1_000.0, 800));
        registry.update(TICK).unwrap();

        let level = registry.channel_level("a", 0);
        assert!(level[0] > 0.5, "bypass {}", level[0]);
        assert_eq!(registry.spectrum("a").len(), 512);
        assert_eq!(registry.log_spectrum("a").len(), 512);
    }

    #[test]
    fn unknown_device_yields_empty_views() {
        let driver = FakeDriver::new(vec![device("a", true)]);
        let mut registry = DeviceRegistry::new(driver, CaptureConfig::default()).unwrap();

        assert_eq!(registry.channel_level("nope", 0), [0.0; 4]);
        assert!(registry.spectrum("nope").is_empty());
        assert!(registry.prepare("nope").is_none());
    }

    #[test]
    fn hot_plug_triggers_rescan_on_update() {
        let driver = FakeDriver::new(vec![device("a", true)]);
        let mut registry = DeviceRegistry::new(driver, CaptureConfig::default()).unwrap();
        assert_eq!(registry.devices().count(), 1);

        registry.driver.set_devices(vec![device("a", true), device("c", false)]);
        registry.update(TICK).unwrap();
        assert_eq!(registry.devices().count(), 2);
        assert!(registry.handle("c").is_some());
    }
}
