//! In-process compute runtime.
//!
//! [`FakeRuntime`] behaves like a small OpenCL driver: it hands out
//! handles, "compiles" programs by scanning them for kernel declarations,
//! and answers every query with the status code a real runtime would give
//! for the same misuse. Any call can be made to fail on demand, which is
//! how the diagnostic paths are exercised without a GPU.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use regex::Regex;

use crate::device::{DeviceInfo, DeviceType, PlatformInfo};
use crate::runtime::{ClRuntime, ContextHandle, DeviceId, KernelHandle, PlatformId, ProgramHandle};
use crate::status::StatusCode;

#[allow(clippy::expect_used)]
static KERNEL_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:__kernel|kernel)\s+void\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(")
        .expect("kernel declaration pattern is valid")
});

/// Runtime entry points that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeCall {
    /// `clGetPlatformIDs`.
    PlatformIds,
    /// `clGetPlatformInfo`.
    PlatformInfo,
    /// `clGetDeviceIDs`.
    DeviceIds,
    /// `clGetDeviceInfo`.
    DeviceInfo,
    /// `clCreateContext`.
    CreateContext,
    /// `clCreateProgramWithSource`.
    CreateProgram,
    /// `clBuildProgram`.
    BuildProgram,
    /// `clGetProgramBuildInfo`.
    BuildLog,
    /// `clCreateKernelsInProgram`, count query.
    KernelCount,
    /// `clCreateKernelsInProgram`, handle retrieval.
    CreateKernels,
    /// `clGetKernelInfo`, name length query.
    KernelNameLen,
    /// `clGetKernelInfo`, name retrieval.
    KernelName,
    /// `clCreateKernel`.
    CreateKernel,
}

#[derive(Debug)]
struct Failure {
    successes_left: usize,
    code: StatusCode,
}

#[derive(Debug)]
struct FakeProgram {
    device: DeviceId,
    source: String,
    kernels: Vec<String>,
    built: bool,
    log: String,
}

#[derive(Debug)]
struct FakeKernel {
    name: String,
}

#[derive(Debug, Default)]
struct FakeState {
    platforms: Vec<(PlatformInfo, Vec<DeviceInfo>)>,
    next_handle: usize,
    contexts: HashMap<usize, DeviceId>,
    programs: HashMap<usize, FakeProgram>,
    kernels: HashMap<usize, FakeKernel>,
    failures: HashMap<FakeCall, Failure>,
    calls: HashMap<FakeCall, usize>,
}

impl FakeState {
    fn gate(&mut self, call: FakeCall) -> Result<(), StatusCode> {
        *self.calls.entry(call).or_default() += 1;
        match self.failures.get_mut(&call) {
            Some(failure) if failure.successes_left > 0 => {
                failure.successes_left -= 1;
                Ok(())
            }
            Some(failure) => Err(failure.code),
            None => Ok(()),
        }
    }

    fn allocate(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn device(&self, device: DeviceId) -> Option<&DeviceInfo> {
        let (platform, index) = decode_device(device)?;
        self.platforms.get(platform)?.1.get(index)
    }

    fn built_program(&self, program: ProgramHandle) -> Result<&FakeProgram, StatusCode> {
        let program = self
            .programs
            .get(&program.0)
            .ok_or(StatusCode::INVALID_PROGRAM)?;
        if program.built {
            Ok(program)
        } else {
            Err(StatusCode::INVALID_PROGRAM_EXECUTABLE)
        }
    }
}

fn encode_device(platform: usize, index: usize) -> DeviceId {
    DeviceId(((platform + 1) << 16) | (index + 1))
}

fn decode_device(device: DeviceId) -> Option<(usize, usize)> {
    let platform = (device.0 >> 16).checked_sub(1)?;
    let index = (device.0 & 0xFFFF).checked_sub(1)?;
    Some((platform, index))
}

/// Kernel entry points declared in OpenCL C source, in declaration order.
#[must_use]
pub fn scan_kernels(source: &str) -> Vec<String> {
    KERNEL_DECL
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn compile(source: &str, options: &str) -> Result<Vec<String>, (StatusCode, String)> {
    let mut tokens = options.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "-D" || token == "-I" {
            tokens.next();
        } else if !token.starts_with('-') {
            return Err((
                StatusCode::INVALID_BUILD_OPTIONS,
                format!("error: invalid build option '{token}'"),
            ));
        }
    }

    if let Some((line, text)) = source
        .lines()
        .enumerate()
        .find(|(_, text)| text.trim_start().starts_with("#error"))
    {
        let message = text.trim_start().trim_start_matches("#error").trim();
        return Err((
            StatusCode::BUILD_PROGRAM_FAILURE,
            format!("<source>:{}:1: error: {message}", line + 1),
        ));
    }

    Ok(scan_kernels(source))
}

/// A fake compute runtime for tests and driverless hosts.
///
/// Clones share state, so a test can keep a handle to inspect the runtime
/// after moving a clone into a context.
#[derive(Debug, Clone, Default)]
pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRuntime {
    /// Create a runtime with no platforms.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime with one platform carrying a GPU and a CPU device.
    #[must_use]
    pub fn demo() -> Self {
        Self::new().with_platform(
            PlatformInfo {
                name: "clprobe Fake Platform".to_string(),
                vendor: "clprobe".to_string(),
                version: "OpenCL 3.0 fake".to_string(),
            },
            vec![
                DeviceInfo {
                    name: "Fake GPU".to_string(),
                    vendor: "clprobe".to_string(),
                    version: "OpenCL 3.0".to_string(),
                    driver_version: env!("CARGO_PKG_VERSION").to_string(),
                    device_type: DeviceType::Gpu,
                    compute_units: 32,
                    global_memory_bytes: 8 * 1024 * 1024 * 1024,
                    max_work_group_size: 1024,
                    available: true,
                },
                DeviceInfo {
                    name: "Fake CPU".to_string(),
                    vendor: "clprobe".to_string(),
                    version: "OpenCL 3.0".to_string(),
                    driver_version: env!("CARGO_PKG_VERSION").to_string(),
                    device_type: DeviceType::Cpu,
                    compute_units: 8,
                    global_memory_bytes: 16 * 1024 * 1024 * 1024,
                    max_work_group_size: 8192,
                    available: true,
                },
            ],
        )
    }

    /// Add a platform with its devices.
    #[must_use]
    pub fn with_platform(self, platform: PlatformInfo, devices: Vec<DeviceInfo>) -> Self {
        self.state.lock().platforms.push((platform, devices));
        self
    }

    /// Make every call of `call` fail with `code`.
    pub fn fail(&self, call: FakeCall, code: StatusCode) {
        self.fail_after(call, 0, code);
    }

    /// Let `successes` calls of `call` pass, then fail the rest with `code`.
    pub fn fail_after(&self, call: FakeCall, successes: usize, code: StatusCode) {
        self.state.lock().failures.insert(
            call,
            Failure {
                successes_left: successes,
                code,
            },
        );
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// How many times `call` was made.
    #[must_use]
    pub fn calls(&self, call: FakeCall) -> usize {
        self.state.lock().calls.get(&call).copied().unwrap_or(0)
    }

    /// Kernel objects created and not yet released.
    #[must_use]
    pub fn live_kernels(&self) -> usize {
        self.state.lock().kernels.len()
    }

    /// Program objects created and not yet released.
    #[must_use]
    pub fn live_programs(&self) -> usize {
        self.state.lock().programs.len()
    }

    /// Contexts created and not yet released.
    #[must_use]
    pub fn live_contexts(&self) -> usize {
        self.state.lock().contexts.len()
    }

    /// Source text of a live program.
    #[must_use]
    pub fn program_source(&self, program: ProgramHandle) -> Option<String> {
        self.state
            .lock()
            .programs
            .get(&program.0)
            .map(|p| p.source.clone())
    }
}

impl ClRuntime for FakeRuntime {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn platform_ids(&self) -> Result<Vec<PlatformId>, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::PlatformIds)?;
        Ok((1..=state.platforms.len()).map(PlatformId).collect())
    }

    fn platform_info(&self, platform: PlatformId) -> Result<PlatformInfo, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::PlatformInfo)?;
        platform
            .0
            .checked_sub(1)
            .and_then(|i| state.platforms.get(i))
            .map(|(info, _)| info.clone())
            .ok_or(StatusCode::INVALID_PLATFORM)
    }

    fn device_ids(&self, platform: PlatformId) -> Result<Vec<DeviceId>, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::DeviceIds)?;
        let index = platform.0.checked_sub(1).ok_or(StatusCode::INVALID_PLATFORM)?;
        let (_, devices) = state
            .platforms
            .get(index)
            .ok_or(StatusCode::INVALID_PLATFORM)?;
        if devices.is_empty() {
            return Err(StatusCode::DEVICE_NOT_FOUND);
        }
        Ok((0..devices.len()).map(|d| encode_device(index, d)).collect())
    }

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::DeviceInfo)?;
        state.device(device).cloned().ok_or(StatusCode::INVALID_DEVICE)
    }

    fn create_context(&self, device: DeviceId) -> Result<ContextHandle, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::CreateContext)?;
        if state.device(device).is_none() {
            return Err(StatusCode::INVALID_DEVICE);
        }
        let handle = state.allocate();
        state.contexts.insert(handle, device);
        Ok(ContextHandle(handle))
    }

    fn create_program(
        &self,
        context: ContextHandle,
        source: &str,
    ) -> Result<ProgramHandle, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::CreateProgram)?;
        let device = *state
            .contexts
            .get(&context.0)
            .ok_or(StatusCode::INVALID_CONTEXT)?;
        if source.is_empty() {
            return Err(StatusCode::INVALID_VALUE);
        }
        let handle = state.allocate();
        state.programs.insert(
            handle,
            FakeProgram {
                device,
                source: source.to_string(),
                kernels: Vec::new(),
                built: false,
                log: String::new(),
            },
        );
        Ok(ProgramHandle(handle))
    }

    fn build_program(
        &self,
        program: ProgramHandle,
        device: DeviceId,
        options: &str,
    ) -> Result<(), StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::BuildProgram)?;
        let program = state
            .programs
            .get_mut(&program.0)
            .ok_or(StatusCode::INVALID_PROGRAM)?;
        if program.device != device {
            return Err(StatusCode::INVALID_DEVICE);
        }
        match compile(&program.source, options) {
            Ok(kernels) => {
                program.kernels = kernels;
                program.built = true;
                program.log.clear();
                Ok(())
            }
            Err((code, log)) => {
                program.kernels.clear();
                program.built = false;
                program.log = log;
                Err(code)
            }
        }
    }

    fn build_log(&self, program: ProgramHandle, device: DeviceId) -> Result<String, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::BuildLog)?;
        let program = state
            .programs
            .get(&program.0)
            .ok_or(StatusCode::INVALID_PROGRAM)?;
        if program.device != device {
            return Err(StatusCode::INVALID_DEVICE);
        }
        Ok(program.log.clone())
    }

    fn kernel_count(&self, program: ProgramHandle) -> Result<u32, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::KernelCount)?;
        let program = state.built_program(program)?;
        Ok(program.kernels.len() as u32)
    }

    fn create_kernels(
        &self,
        program: ProgramHandle,
        out: &mut [KernelHandle],
    ) -> Result<(), StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::CreateKernels)?;
        let names = state.built_program(program)?.kernels.clone();
        if out.len() < names.len() {
            return Err(StatusCode::INVALID_VALUE);
        }
        for (slot, name) in out.iter_mut().zip(names) {
            let handle = state.allocate();
            state.kernels.insert(handle, FakeKernel { name });
            *slot = KernelHandle(handle);
        }
        Ok(())
    }

    fn kernel_name_len(&self, kernel: KernelHandle) -> Result<usize, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::KernelNameLen)?;
        let kernel = state
            .kernels
            .get(&kernel.0)
            .ok_or(StatusCode::INVALID_KERNEL)?;
        Ok(kernel.name.len() + 1)
    }

    fn kernel_name(&self, kernel: KernelHandle, buf: &mut [u8]) -> Result<(), StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::KernelName)?;
        let kernel = state
            .kernels
            .get(&kernel.0)
            .ok_or(StatusCode::INVALID_KERNEL)?;
        let name = kernel.name.as_bytes();
        if buf.len() < name.len() + 1 {
            return Err(StatusCode::INVALID_VALUE);
        }
        buf[..name.len()].copy_from_slice(name);
        buf[name.len()] = 0;
        Ok(())
    }

    fn create_kernel(&self, program: ProgramHandle, name: &str) -> Result<KernelHandle, StatusCode> {
        let mut state = self.state.lock();
        state.gate(FakeCall::CreateKernel)?;
        if !state.built_program(program)?.kernels.iter().any(|k| k == name) {
            return Err(StatusCode::INVALID_KERNEL_NAME);
        }
        let handle = state.allocate();
        state.kernels.insert(
            handle,
            FakeKernel {
                name: name.to_string(),
            },
        );
        Ok(KernelHandle(handle))
    }

    fn release_kernel(&self, kernel: KernelHandle) {
        self.state.lock().kernels.remove(&kernel.0);
    }

    fn release_program(&self, program: ProgramHandle) {
        self.state.lock().programs.remove(&program.0);
    }

    fn release_context(&self, context: ContextHandle) {
        self.state.lock().contexts.remove(&context.0);
    }
}
