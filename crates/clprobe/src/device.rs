//! Platform and device discovery.
//!
//! Enumerates every platform and device the runtime exposes and picks the
//! one a context should use.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DeviceSelection;
use crate::error::{ComputeError, Result};
use crate::runtime::{ClRuntime, DeviceId};
use crate::status::StatusCode;

/// Information about a compute platform (one vendor driver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// Platform name.
    pub name: String,
    /// Platform vendor.
    pub vendor: String,
    /// Supported OpenCL version string.
    pub version: String,
}

/// Kind of compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Host processor.
    Cpu,
    /// Graphics processor.
    Gpu,
    /// Dedicated accelerator (DSP, FPGA, ...).
    Accelerator,
    /// Anything else the runtime reports.
    Other,
}

impl DeviceType {
    /// Ranking used by automatic selection (higher is preferred).
    #[must_use]
    pub const fn priority(self) -> u32 {
        match self {
            Self::Gpu => 3,
            Self::Accelerator => 2,
            Self::Cpu => 1,
            Self::Other => 0,
        }
    }

    /// Get display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
            Self::Accelerator => "Accelerator",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which kinds of device automatic selection may pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTypePreference {
    /// Any device, best ranked first.
    #[default]
    Any,
    /// GPUs only.
    Gpu,
    /// CPUs only.
    Cpu,
    /// Accelerators only.
    Accelerator,
}

impl DeviceTypePreference {
    /// Whether a device of `kind` satisfies this preference.
    #[must_use]
    pub const fn accepts(self, kind: DeviceType) -> bool {
        match self {
            Self::Any => true,
            Self::Gpu => matches!(kind, DeviceType::Gpu),
            Self::Cpu => matches!(kind, DeviceType::Cpu),
            Self::Accelerator => matches!(kind, DeviceType::Accelerator),
        }
    }
}

impl std::str::FromStr for DeviceTypePreference {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "gpu" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            "accelerator" => Ok(Self::Accelerator),
            other => Err(ComputeError::Config(format!("unknown device type: {other}"))),
        }
    }
}

/// Information about a compute device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name.
    pub name: String,
    /// Device vendor.
    pub vendor: String,
    /// Device OpenCL version string.
    pub version: String,
    /// Driver version string.
    pub driver_version: String,
    /// Device kind.
    pub device_type: DeviceType,
    /// Parallel compute units.
    pub compute_units: u32,
    /// Global memory in bytes.
    pub global_memory_bytes: u64,
    /// Maximum work-group size.
    pub max_work_group_size: usize,
    /// Whether the device can currently accept work.
    pub available: bool,
}

impl DeviceInfo {
    /// Get memory in MiB.
    #[must_use]
    pub const fn memory_mib(&self) -> u64 {
        self.global_memory_bytes / (1024 * 1024)
    }
}

/// A device found during discovery, with its position in the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// Index of the platform in enumeration order.
    pub platform_index: usize,
    /// Index of the device within its platform.
    pub device_index: usize,
    /// Owning platform.
    pub platform: PlatformInfo,
    /// Runtime identifier.
    #[serde(skip)]
    pub id: DeviceId,
    /// Device properties.
    pub info: DeviceInfo,
}

/// Everything discovery found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Number of platforms the runtime reported, with or without devices.
    pub platforms: usize,
    /// Devices across all platforms, in enumeration order.
    pub devices: Vec<DiscoveredDevice>,
}

/// Discover all devices on all platforms.
///
/// A platform that reports `CL_DEVICE_NOT_FOUND` contributes no devices but
/// still counts as a platform; any other failure aborts discovery.
pub fn discover_devices<R: ClRuntime + ?Sized>(runtime: &R) -> Result<Discovery> {
    let platforms = runtime
        .platform_ids()
        .map_err(|code| ComputeError::api("clGetPlatformIDs", code))?;
    debug!(backend = runtime.name(), count = platforms.len(), "enumerated platforms");

    let platform_count = platforms.len();
    let mut devices = Vec::new();
    for (platform_index, platform) in platforms.into_iter().enumerate() {
        let platform_info = runtime
            .platform_info(platform)
            .map_err(|code| ComputeError::api("clGetPlatformInfo", code))?;

        let ids = match runtime.device_ids(platform) {
            Ok(ids) => ids,
            Err(StatusCode::DEVICE_NOT_FOUND) => {
                debug!(platform = %platform_info.name, "platform has no devices");
                continue;
            }
            Err(code) => return Err(ComputeError::api("clGetDeviceIDs", code)),
        };

        for (device_index, id) in ids.into_iter().enumerate() {
            let info = runtime
                .device_info(id)
                .map_err(|code| ComputeError::api("clGetDeviceInfo", code))?;
            devices.push(DiscoveredDevice {
                platform_index,
                device_index,
                platform: platform_info.clone(),
                id,
                info,
            });
        }
    }

    Ok(Discovery {
        platforms: platform_count,
        devices,
    })
}

/// Pick the device a context should use.
///
/// Explicit indices win. Otherwise available devices matching the type
/// preference are ranked by [`DeviceType::priority`], then compute units,
/// then discovery order.
pub fn select_device(discovery: &Discovery, selection: &DeviceSelection) -> Result<DiscoveredDevice> {
    if discovery.platforms == 0 {
        return Err(ComputeError::NoPlatform);
    }
    let devices = &discovery.devices;

    if let Some(platform) = selection.platform {
        if platform >= discovery.platforms {
            return Err(ComputeError::PlatformIndex {
                index: platform,
                available: discovery.platforms,
            });
        }
        let on_platform: Vec<&DiscoveredDevice> = devices
            .iter()
            .filter(|d| d.platform_index == platform)
            .collect();
        if on_platform.is_empty() {
            return Err(ComputeError::NoDevice);
        }

        let chosen = match selection.device {
            Some(index) => on_platform
                .iter()
                .find(|d| d.device_index == index)
                .copied()
                .ok_or(ComputeError::DeviceIndex {
                    platform,
                    index,
                    available: on_platform.len(),
                })?,
            None => best_of(on_platform.iter().copied(), selection)?,
        };
        info!(
            platform = %chosen.platform.name,
            device = %chosen.info.name,
            "selected configured device"
        );
        return Ok(chosen.clone());
    }

    let chosen = best_of(devices.iter(), selection)?;
    info!(
        platform = %chosen.platform.name,
        device = %chosen.info.name,
        kind = %chosen.info.device_type,
        "selected device"
    );
    Ok(chosen.clone())
}

fn best_of<'a>(
    candidates: impl Iterator<Item = &'a DiscoveredDevice>,
    selection: &DeviceSelection,
) -> Result<&'a DiscoveredDevice> {
    candidates
        .filter(|d| d.info.available && selection.device_type.accepts(d.info.device_type))
        .enumerate()
        // max_by_key keeps the last maximum, so invert the order key
        .max_by_key(|(order, d)| {
            (
                d.info.device_type.priority(),
                d.info.compute_units,
                std::cmp::Reverse(*order),
            )
        })
        .map(|(_, d)| d)
        .ok_or(ComputeError::NoDevice)
}
