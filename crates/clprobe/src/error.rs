//! Error types for clprobe.

use thiserror::Error;

use crate::status::StatusCode;

/// Errors that can occur while driving the compute runtime.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// A compute API call returned a failure status.
    #[error("{call} failed: {code}")]
    Api {
        /// Name of the API entry point.
        call: &'static str,
        /// Status it returned.
        code: StatusCode,
    },

    /// The runtime reports no platforms.
    #[error("no OpenCL platform available")]
    NoPlatform,

    /// No device matched the selection.
    #[error("no suitable OpenCL device found")]
    NoDevice,

    /// Configured platform index does not exist.
    #[error("platform index {index} out of range ({available} available)")]
    PlatformIndex {
        /// Requested index.
        index: usize,
        /// Number of platforms the runtime reported.
        available: usize,
    },

    /// Configured device index does not exist on the platform.
    #[error("device index {index} out of range on platform {platform} ({available} available)")]
    DeviceIndex {
        /// Platform index.
        platform: usize,
        /// Requested index.
        index: usize,
        /// Number of devices on that platform.
        available: usize,
    },

    /// Program compilation failed.
    #[error("program build failed: {code}\n{log}")]
    Build {
        /// Status returned by the build call.
        code: StatusCode,
        /// Compiler output for the selected device.
        log: String,
    },

    /// Program source was empty.
    #[error("program source is empty")]
    EmptySource,

    /// Operation needs a built program.
    #[error("no program has been built")]
    NoProgram,

    /// Kernel is not part of the current program.
    #[error("kernel not found: {0}")]
    KernelNotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ComputeError {
    /// Wrap a failed API call.
    #[must_use]
    pub const fn api(call: &'static str, code: StatusCode) -> Self {
        Self::Api { call, code }
    }

    /// Status code carried by this error, if it came from the runtime.
    #[must_use]
    pub const fn code(&self) -> Option<StatusCode> {
        match self {
            Self::Api { code, .. } | Self::Build { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for compute operations.
pub type Result<T> = std::result::Result<T, ComputeError>;
