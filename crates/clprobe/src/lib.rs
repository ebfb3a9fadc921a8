//! # clprobe
//!
//! OpenCL compute context with robust runtime diagnostics.
//!
//! This crate provides:
//! - **Status catalog** - every OpenCL result code mapped to its name, total
//!   and allocation free
//! - **Kernel inspection** - fail-fast listing of the kernels compiled into
//!   a program, with a pluggable diagnostic sink
//! - **Compute context** - device selection, program builds with compiler
//!   logs, and a kernel cache that releases every handle it owns
//!
//! ## Backends
//!
//! - [`FakeRuntime`] (always available) - in-process runtime with failure
//!   injection
//! - `OpenClRuntime` (feature `opencl`) - the system OpenCL ICD loader
//!
//! ## Example
//!
//! ```rust
//! use clprobe::{ComputeContext, ContextConfig, FakeRuntime, describe, StatusCode};
//!
//! assert_eq!(describe(StatusCode(-5)), "CL_OUT_OF_RESOURCES");
//!
//! let ctx = ComputeContext::new(FakeRuntime::demo(), ContextConfig::default())?;
//! ctx.build_program("__kernel void saxpy(__global float* y) {}")?;
//! assert_eq!(ctx.kernel_names()?, vec!["saxpy"]);
//! # Ok::<(), clprobe::ComputeError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           ComputeContext                │
//! │  ┌─────────┐  ┌──────────┐  ┌─────────┐ │
//! │  │ Device  │  │ Inspect  │  │ Status  │ │
//! │  └─────────┘  └──────────┘  └─────────┘ │
//! └─────────────────────┬───────────────────┘
//!                       │ ClRuntime
//!            ┌──────────┴──────────┐
//!            ▼                     ▼
//!       FakeRuntime          OpenClRuntime
//!                             (libOpenCL)
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod fake;
pub mod inspect;
#[cfg(feature = "opencl")]
#[allow(unsafe_code)]
pub mod opencl;
pub mod runtime;
pub mod status;

// Re-exports
pub use config::{BuildConfig, ContextConfig, DeviceSelection};
pub use context::ComputeContext;
pub use device::{
    DeviceInfo, DeviceType, DeviceTypePreference, DiscoveredDevice, Discovery, PlatformInfo,
    discover_devices, select_device,
};
pub use error::{ComputeError, Result};
pub use fake::{FakeCall, FakeRuntime};
pub use inspect::{
    DIAG_TAG, DiagnosticSink, KernelNames, RecordingSink, TracingSink, kernel_names,
    list_kernel_names, print_kernel_names,
};
#[cfg(feature = "opencl")]
pub use opencl::OpenClRuntime;
pub use runtime::{ClRuntime, ContextHandle, DeviceId, KernelHandle, PlatformId, ProgramHandle};
pub use status::{StatusCode, UNKNOWN_ERROR, check, describe, known_codes};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
