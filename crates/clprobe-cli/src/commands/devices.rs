//! Device discovery command.

use std::io::Write;

use clprobe::{ClRuntime, ContextConfig, discover_devices, select_device};
use tracing::debug;

use crate::error::CliError;
use crate::output::{DeviceEntry, DeviceList, OutputFormat};

/// Devices command executor.
pub struct DevicesCommand<'a, R: ClRuntime> {
    runtime: &'a R,
    config: &'a ContextConfig,
}

impl<'a, R: ClRuntime> DevicesCommand<'a, R> {
    /// Create a devices command over `runtime`.
    #[must_use]
    pub const fn new(runtime: &'a R, config: &'a ContextConfig) -> Self {
        Self { runtime, config }
    }

    /// Discover devices and mark the one the configuration selects.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails.
    pub fn fetch(&self) -> Result<DeviceList, CliError> {
        let discovery = discover_devices(self.runtime)?;
        let selected = match select_device(&discovery, &self.config.device) {
            Ok(device) => Some((device.platform_index, device.device_index)),
            Err(e) => {
                debug!(error = %e, "no device matches the configuration");
                None
            }
        };

        Ok(DeviceList {
            backend: self.runtime.name(),
            platforms: discovery.platforms,
            devices: discovery
                .devices
                .into_iter()
                .map(|device| DeviceEntry {
                    selected: selected == Some((device.platform_index, device.device_index)),
                    device,
                })
                .collect(),
        })
    }

    /// Execute the devices command.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery or output fails.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let list = self.fetch()?;
        format.write(writer, &list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clprobe::{FakeCall, FakeRuntime, StatusCode};

    #[test]
    fn fake_devices_marks_gpu() {
        let runtime = FakeRuntime::demo();
        let config = ContextConfig::default();
        let list = DevicesCommand::new(&runtime, &config).fetch().expect("devices");

        assert_eq!(list.backend, "fake");
        assert_eq!(list.devices.len(), 2);
        assert!(list.devices[0].selected);
        assert!(!list.devices[1].selected);
    }

    #[test]
    fn empty_runtime_lists_nothing() {
        let runtime = FakeRuntime::new();
        let config = ContextConfig::default();
        let list = DevicesCommand::new(&runtime, &config).fetch().expect("devices");
        assert!(list.devices.is_empty());
        assert_eq!(list.platforms, 0);

        let mut out = Vec::new();
        list_table(&list, &mut out);
        assert!(String::from_utf8_lossy(&out).contains("No devices found"));
    }

    #[test]
    fn discovery_failure_propagates() {
        let runtime = FakeRuntime::demo();
        runtime.fail(FakeCall::PlatformIds, StatusCode::OUT_OF_HOST_MEMORY);
        let config = ContextConfig::default();
        let err = DevicesCommand::new(&runtime, &config).fetch().expect_err("fails");
        assert_eq!(err.to_string(), "clGetPlatformIDs failed: CL_OUT_OF_HOST_MEMORY");
    }

    fn list_table(list: &DeviceList, out: &mut Vec<u8>) {
        use crate::output::TableDisplay;
        list.write_table(out).expect("table");
    }
}
