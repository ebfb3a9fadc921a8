//! Compute runtime abstraction.
//!
//! [`ClRuntime`] is the seam between the context logic and the compute API.
//! Every method maps onto one query of the underlying runtime and reports
//! failure as the raw [`StatusCode`] it produced; callers decide how to
//! surface it. Handles are opaque identifiers owned by the runtime.

use crate::device::{DeviceInfo, PlatformInfo};
use crate::status::StatusCode;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name(pub usize);

        impl $name {
            /// The null handle.
            pub const NULL: Self = Self(0);

            /// Whether this is the null handle.
            #[must_use]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    };
}

handle!(
    /// Opaque platform identifier.
    PlatformId
);
handle!(
    /// Opaque device identifier.
    DeviceId
);
handle!(
    /// Opaque context handle.
    ContextHandle
);
handle!(
    /// Opaque handle to a program object.
    ProgramHandle
);
handle!(
    /// Opaque handle to one kernel of a program.
    KernelHandle
);

/// Trait for compute runtime implementations.
///
/// This allows for different backends (the system OpenCL loader, the
/// in-process fake) and enables testing with failure injection.
pub trait ClRuntime: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// All platforms known to the runtime.
    fn platform_ids(&self) -> Result<Vec<PlatformId>, StatusCode>;

    /// Descriptive properties of a platform.
    fn platform_info(&self, platform: PlatformId) -> Result<PlatformInfo, StatusCode>;

    /// All devices of a platform. Platforms without devices report
    /// `CL_DEVICE_NOT_FOUND`.
    fn device_ids(&self, platform: PlatformId) -> Result<Vec<DeviceId>, StatusCode>;

    /// Descriptive properties of a device.
    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, StatusCode>;

    /// Create a context for a single device.
    fn create_context(&self, device: DeviceId) -> Result<ContextHandle, StatusCode>;

    /// Create a program object from source text.
    fn create_program(&self, context: ContextHandle, source: &str)
    -> Result<ProgramHandle, StatusCode>;

    /// Compile and link a program for a device.
    fn build_program(
        &self,
        program: ProgramHandle,
        device: DeviceId,
        options: &str,
    ) -> Result<(), StatusCode>;

    /// Compiler output of the last build for a device.
    fn build_log(&self, program: ProgramHandle, device: DeviceId) -> Result<String, StatusCode>;

    /// Number of kernels in a built program.
    fn kernel_count(&self, program: ProgramHandle) -> Result<u32, StatusCode>;

    /// Create one kernel object per entry point into `out`.
    ///
    /// `out` must hold at least [`kernel_count`](Self::kernel_count) slots.
    fn create_kernels(&self, program: ProgramHandle, out: &mut [KernelHandle])
    -> Result<(), StatusCode>;

    /// Byte length of a kernel's function name, terminator included.
    fn kernel_name_len(&self, kernel: KernelHandle) -> Result<usize, StatusCode>;

    /// Copy a kernel's null-terminated function name into `buf`.
    fn kernel_name(&self, kernel: KernelHandle, buf: &mut [u8]) -> Result<(), StatusCode>;

    /// Create the kernel object for a named entry point.
    fn create_kernel(&self, program: ProgramHandle, name: &str)
    -> Result<KernelHandle, StatusCode>;

    /// Drop a kernel reference.
    fn release_kernel(&self, kernel: KernelHandle);

    /// Drop a program reference.
    fn release_program(&self, program: ProgramHandle);

    /// Drop a context reference.
    fn release_context(&self, context: ContextHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handle_is_null() {
        assert!(KernelHandle::default().is_null());
        assert_eq!(ProgramHandle::default(), ProgramHandle::NULL);
        assert!(!ContextHandle(7).is_null());
    }

    #[test]
    fn runtime_trait_is_object_safe() {
        fn takes_dyn(_: &dyn ClRuntime) {}
        let fake = crate::fake::FakeRuntime::new();
        takes_dyn(&fake);
    }
}
