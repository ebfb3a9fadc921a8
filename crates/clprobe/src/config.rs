//! Context configuration.
//!
//! Configuration for a [`ComputeContext`](crate::ComputeContext), including:
//! - Platform/device selection
//! - Program build options
//! - Kernel caching

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::DeviceTypePreference;
use crate::error::{ComputeError, Result};

/// How the context picks its device.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSelection {
    /// Platform index in enumeration order.
    #[serde(default)]
    pub platform: Option<usize>,
    /// Device index within the platform. Requires `platform`.
    #[serde(default)]
    pub device: Option<usize>,
    /// Kind of device automatic selection may pick.
    #[serde(default, rename = "type")]
    pub device_type: DeviceTypePreference,
}

/// Program build settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildConfig {
    /// Options passed to the compiler.
    #[serde(default)]
    pub options: String,
    /// Log the kernels of every successfully built program.
    #[serde(default = "default_true")]
    pub log_kernels: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            options: String::new(),
            log_kernels: true,
        }
    }
}

/// Main context configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextConfig {
    /// Keep kernel objects alive between lookups.
    #[serde(default = "default_true")]
    pub cache_kernels: bool,
    /// Device selection.
    #[serde(default)]
    pub device: DeviceSelection,
    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_kernels: true,
            device: DeviceSelection::default(),
            build: BuildConfig::default(),
        }
    }
}

const fn default_true() -> bool {
    true
}

impl ContextConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ComputeError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ComputeError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.device.device.is_some() && self.device.platform.is_none() {
            return Err(ComputeError::Config(
                "device.device requires device.platform".to_string(),
            ));
        }

        if self.build.options.contains('\0') {
            return Err(ComputeError::Config(
                "build.options cannot contain NUL bytes".to_string(),
            ));
        }

        Ok(())
    }
}
