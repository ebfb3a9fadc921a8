//! OpenCL runtime via the system ICD loader.
//!
//! Thin FFI layer over `opencl-sys`. Every variable-length query uses the
//! two-call pattern: ask for the size, allocate exactly that, then fetch.

use std::ffi::{CString, c_char, c_void};
use std::ptr;

use opencl_sys::{
    CL_DEVICE_AVAILABLE, CL_DEVICE_GLOBAL_MEM_SIZE, CL_DEVICE_MAX_COMPUTE_UNITS,
    CL_DEVICE_MAX_WORK_GROUP_SIZE, CL_DEVICE_NAME, CL_DEVICE_TYPE, CL_DEVICE_TYPE_ACCELERATOR,
    CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU, CL_DEVICE_VENDOR,
    CL_DEVICE_VERSION, CL_DRIVER_VERSION, CL_KERNEL_FUNCTION_NAME, CL_PLATFORM_NAME,
    CL_PLATFORM_VENDOR, CL_PLATFORM_VERSION, CL_PROGRAM_BUILD_LOG, cl_bool, cl_context,
    cl_device_id, cl_device_type, cl_int, cl_kernel, cl_platform_id, cl_program, cl_uint,
    cl_ulong, clBuildProgram, clCreateContext, clCreateKernel, clCreateKernelsInProgram,
    clCreateProgramWithSource, clGetDeviceIDs, clGetDeviceInfo, clGetKernelInfo,
    clGetPlatformIDs, clGetPlatformInfo, clGetProgramBuildInfo, clReleaseContext,
    clReleaseKernel, clReleaseProgram,
};
use tracing::debug;

use crate::device::{DeviceInfo, DeviceType, PlatformInfo};
use crate::runtime::{ClRuntime, ContextHandle, DeviceId, KernelHandle, PlatformId, ProgramHandle};
use crate::status::{StatusCode, check};

/// Compute runtime backed by the installed OpenCL drivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenClRuntime;

impl OpenClRuntime {
    /// Create the runtime. No driver call is made until the first query.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Check if any OpenCL platform is installed.
    #[must_use]
    pub fn is_available() -> bool {
        Self.platform_ids().is_ok_and(|p| !p.is_empty())
    }
}

fn query_bytes(
    query: impl Fn(usize, *mut c_void, *mut usize) -> cl_int,
) -> Result<Vec<u8>, StatusCode> {
    let mut size = 0usize;
    check(query(0, ptr::null_mut(), &raw mut size))?;
    let mut buf = vec![0u8; size];
    if size > 0 {
        check(query(size, buf.as_mut_ptr().cast(), ptr::null_mut()))?;
    }
    Ok(buf)
}

fn query_string(
    query: impl Fn(usize, *mut c_void, *mut usize) -> cl_int,
) -> Result<String, StatusCode> {
    let buf = query_bytes(query)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

fn query_value<T: Copy + Default>(
    query: impl Fn(usize, *mut c_void, *mut usize) -> cl_int,
) -> Result<T, StatusCode> {
    let mut value = T::default();
    check(query(
        size_of::<T>(),
        (&raw mut value).cast(),
        ptr::null_mut(),
    ))?;
    Ok(value)
}

const fn device_type(bits: cl_device_type) -> DeviceType {
    if bits & CL_DEVICE_TYPE_GPU != 0 {
        DeviceType::Gpu
    } else if bits & CL_DEVICE_TYPE_ACCELERATOR != 0 {
        DeviceType::Accelerator
    } else if bits & CL_DEVICE_TYPE_CPU != 0 {
        DeviceType::Cpu
    } else {
        DeviceType::Other
    }
}

impl ClRuntime for OpenClRuntime {
    fn name(&self) -> &'static str {
        "opencl"
    }

    fn platform_ids(&self) -> Result<Vec<PlatformId>, StatusCode> {
        let mut count: cl_uint = 0;
        // SAFETY: count-only query with a valid out pointer.
        check(unsafe { clGetPlatformIDs(0, ptr::null_mut(), &raw mut count) })?;
        let mut ids: Vec<cl_platform_id> = vec![ptr::null_mut(); count as usize];
        if count > 0 {
            // SAFETY: `ids` holds exactly `count` slots.
            check(unsafe { clGetPlatformIDs(count, ids.as_mut_ptr(), ptr::null_mut()) })?;
        }
        Ok(ids.into_iter().map(|p| PlatformId(p as usize)).collect())
    }

    fn platform_info(&self, platform: PlatformId) -> Result<PlatformInfo, StatusCode> {
        let id = platform.0 as cl_platform_id;
        let field = |param| {
            // SAFETY: the runtime validates the handle; buffers are sized by query_bytes.
            query_string(|size, value, ret| unsafe {
                clGetPlatformInfo(id, param, size, value, ret)
            })
        };
        Ok(PlatformInfo {
            name: field(CL_PLATFORM_NAME)?,
            vendor: field(CL_PLATFORM_VENDOR)?,
            version: field(CL_PLATFORM_VERSION)?,
        })
    }

    fn device_ids(&self, platform: PlatformId) -> Result<Vec<DeviceId>, StatusCode> {
        let id = platform.0 as cl_platform_id;
        let mut count: cl_uint = 0;
        // SAFETY: count-only query with a valid out pointer.
        check(unsafe {
            clGetDeviceIDs(id, CL_DEVICE_TYPE_ALL, 0, ptr::null_mut(), &raw mut count)
        })?;
        let mut ids: Vec<cl_device_id> = vec![ptr::null_mut(); count as usize];
        if count > 0 {
            // SAFETY: `ids` holds exactly `count` slots.
            check(unsafe {
                clGetDeviceIDs(id, CL_DEVICE_TYPE_ALL, count, ids.as_mut_ptr(), ptr::null_mut())
            })?;
        }
        Ok(ids.into_iter().map(|d| DeviceId(d as usize)).collect())
    }

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, StatusCode> {
        let id = device.0 as cl_device_id;
        // SAFETY (all closures below): sizes come from the value type or a
        // preceding size query.
        let text = |param| {
            query_string(|size, value, ret| unsafe { clGetDeviceInfo(id, param, size, value, ret) })
        };
        let device_bits: cl_device_type =
            query_value(|size, value, ret| unsafe {
                clGetDeviceInfo(id, CL_DEVICE_TYPE, size, value, ret)
            })?;
        let compute_units: cl_uint = query_value(|size, value, ret| unsafe {
            clGetDeviceInfo(id, CL_DEVICE_MAX_COMPUTE_UNITS, size, value, ret)
        })?;
        let global_memory: cl_ulong = query_value(|size, value, ret| unsafe {
            clGetDeviceInfo(id, CL_DEVICE_GLOBAL_MEM_SIZE, size, value, ret)
        })?;
        let max_work_group_size: usize = query_value(|size, value, ret| unsafe {
            clGetDeviceInfo(id, CL_DEVICE_MAX_WORK_GROUP_SIZE, size, value, ret)
        })?;
        let available: cl_bool = query_value(|size, value, ret| unsafe {
            clGetDeviceInfo(id, CL_DEVICE_AVAILABLE, size, value, ret)
        })?;

        Ok(DeviceInfo {
            name: text(CL_DEVICE_NAME)?,
            vendor: text(CL_DEVICE_VENDOR)?,
            version: text(CL_DEVICE_VERSION)?,
            driver_version: text(CL_DRIVER_VERSION)?,
            device_type: device_type(device_bits),
            compute_units,
            global_memory_bytes: global_memory,
            max_work_group_size,
            available: available != 0,
        })
    }

    fn create_context(&self, device: DeviceId) -> Result<ContextHandle, StatusCode> {
        let id = device.0 as cl_device_id;
        let mut status: cl_int = 0;
        // SAFETY: one valid device pointer, no properties, no callback.
        let context = unsafe {
            clCreateContext(ptr::null(), 1, &raw const id, None, ptr::null_mut(), &raw mut status)
        };
        check(status)?;
        Ok(ContextHandle(context as usize))
    }

    fn create_program(
        &self,
        context: ContextHandle,
        source: &str,
    ) -> Result<ProgramHandle, StatusCode> {
        let strings: [*const c_char; 1] = [source.as_ptr().cast()];
        let lengths = [source.len()];
        let mut status: cl_int = 0;
        // SAFETY: one string with an explicit length, so no terminator is needed.
        let program = unsafe {
            clCreateProgramWithSource(
                context.0 as cl_context,
                1,
                strings.as_ptr(),
                lengths.as_ptr(),
                &raw mut status,
            )
        };
        check(status)?;
        Ok(ProgramHandle(program as usize))
    }

    fn build_program(
        &self,
        program: ProgramHandle,
        device: DeviceId,
        options: &str,
    ) -> Result<(), StatusCode> {
        let options = CString::new(options).map_err(|_| StatusCode::INVALID_BUILD_OPTIONS)?;
        let id = device.0 as cl_device_id;
        debug!(options = ?options, "clBuildProgram");
        // SAFETY: synchronous build (no callback) for one valid device.
        check(unsafe {
            clBuildProgram(
                program.0 as cl_program,
                1,
                &raw const id,
                options.as_ptr(),
                None,
                ptr::null_mut(),
            )
        })
    }

    fn build_log(&self, program: ProgramHandle, device: DeviceId) -> Result<String, StatusCode> {
        let program = program.0 as cl_program;
        let device = device.0 as cl_device_id;
        // SAFETY: buffer sized by the preceding size query.
        query_string(|size, value, ret| unsafe {
            clGetProgramBuildInfo(program, device, CL_PROGRAM_BUILD_LOG, size, value, ret)
        })
    }

    fn kernel_count(&self, program: ProgramHandle) -> Result<u32, StatusCode> {
        let mut count: cl_uint = 0;
        // SAFETY: count-only query with a valid out pointer.
        check(unsafe {
            clCreateKernelsInProgram(program.0 as cl_program, 0, ptr::null_mut(), &raw mut count)
        })?;
        Ok(count)
    }

    fn create_kernels(
        &self,
        program: ProgramHandle,
        out: &mut [KernelHandle],
    ) -> Result<(), StatusCode> {
        let mut raw: Vec<cl_kernel> = vec![ptr::null_mut(); out.len()];
        // SAFETY: `raw` has `out.len()` slots and that is the capacity passed.
        check(unsafe {
            clCreateKernelsInProgram(
                program.0 as cl_program,
                raw.len() as cl_uint,
                raw.as_mut_ptr(),
                ptr::null_mut(),
            )
        })?;
        for (slot, kernel) in out.iter_mut().zip(raw) {
            *slot = KernelHandle(kernel as usize);
        }
        Ok(())
    }

    fn kernel_name_len(&self, kernel: KernelHandle) -> Result<usize, StatusCode> {
        let mut len = 0usize;
        // SAFETY: size-only query with a valid out pointer.
        check(unsafe {
            clGetKernelInfo(
                kernel.0 as cl_kernel,
                CL_KERNEL_FUNCTION_NAME,
                0,
                ptr::null_mut(),
                &raw mut len,
            )
        })?;
        Ok(len)
    }

    fn kernel_name(&self, kernel: KernelHandle, buf: &mut [u8]) -> Result<(), StatusCode> {
        // SAFETY: the runtime writes at most `buf.len()` bytes.
        check(unsafe {
            clGetKernelInfo(
                kernel.0 as cl_kernel,
                CL_KERNEL_FUNCTION_NAME,
                buf.len(),
                buf.as_mut_ptr().cast(),
                ptr::null_mut(),
            )
        })
    }

    fn create_kernel(&self, program: ProgramHandle, name: &str) -> Result<KernelHandle, StatusCode> {
        let name = CString::new(name).map_err(|_| StatusCode::INVALID_KERNEL_NAME)?;
        let mut status: cl_int = 0;
        // SAFETY: `name` is null terminated and outlives the call.
        let kernel =
            unsafe { clCreateKernel(program.0 as cl_program, name.as_ptr(), &raw mut status) };
        check(status)?;
        Ok(KernelHandle(kernel as usize))
    }

    fn release_kernel(&self, kernel: KernelHandle) {
        // SAFETY: each handle is released once by its owner.
        let status = unsafe { clReleaseKernel(kernel.0 as cl_kernel) };
        if let Err(code) = check(status) {
            debug!(status = %code, "clReleaseKernel failed");
        }
    }

    fn release_program(&self, program: ProgramHandle) {
        // SAFETY: each handle is released once by its owner.
        let status = unsafe { clReleaseProgram(program.0 as cl_program) };
        if let Err(code) = check(status) {
            debug!(status = %code, "clReleaseProgram failed");
        }
    }

    fn release_context(&self, context: ContextHandle) {
        // SAFETY: each handle is released once by its owner.
        let status = unsafe { clReleaseContext(context.0 as cl_context) };
        if let Err(code) = check(status) {
            debug!(status = %code, "clReleaseContext failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_bits() {
        assert_eq!(device_type(CL_DEVICE_TYPE_GPU), DeviceType::Gpu);
        assert_eq!(device_type(CL_DEVICE_TYPE_CPU), DeviceType::Cpu);
        assert_eq!(device_type(CL_DEVICE_TYPE_ACCELERATOR), DeviceType::Accelerator);
        assert_eq!(device_type(0), DeviceType::Other);
    }

    #[test]
    fn test_interior_nul_options_rejected() {
        let err = OpenClRuntime
            .build_program(ProgramHandle::NULL, DeviceId::NULL, "-D A=\0")
            .expect_err("nul");
        assert_eq!(err, StatusCode::INVALID_BUILD_OPTIONS);
    }
}
