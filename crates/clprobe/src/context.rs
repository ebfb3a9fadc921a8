//! Compute context.
//!
//! [`ComputeContext`] owns one device's context, the program currently
//! built on it, and the kernel objects created from that program. It is the
//! only owner of those handles and releases them on rebuild and on drop.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::ContextConfig;
use crate::device::{DiscoveredDevice, discover_devices, select_device};
use crate::error::{ComputeError, Result};
use crate::inspect::{DiagnosticSink, TracingSink, list_kernel_names, print_kernel_names};
use crate::runtime::{ClRuntime, ContextHandle, KernelHandle, ProgramHandle};
use crate::status::StatusCode;

#[derive(Debug, Default)]
struct ProgramState {
    program: Option<ProgramHandle>,
    cache: HashMap<String, KernelHandle>,
    // Uncached kernels handed out for the current program.
    loose: Vec<KernelHandle>,
    builds: u64,
}

/// A compute context bound to one device.
///
/// Rebuilding the program takes an exclusive lock; kernel lookup and
/// introspection share it.
pub struct ComputeContext<R: ClRuntime> {
    runtime: R,
    config: ContextConfig,
    device: DiscoveredDevice,
    context: ContextHandle,
    state: RwLock<ProgramState>,
}

impl<R: ClRuntime> std::fmt::Debug for ComputeContext<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeContext")
            .field("backend", &self.runtime.name())
            .field("device", &self.device.info.name)
            .field("context", &self.context)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl<R: ClRuntime> ComputeContext<R> {
    /// Discover devices, select one per `config`, and create its context.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, no device matches,
    /// or the runtime refuses to create the context.
    pub fn new(runtime: R, config: ContextConfig) -> Result<Self> {
        config.validate()?;

        let discovery = discover_devices(&runtime)?;
        let device = select_device(&discovery, &config.device)?;
        let context = runtime
            .create_context(device.id)
            .map_err(|code| ComputeError::api("clCreateContext", code))?;

        info!(
            backend = runtime.name(),
            platform = %device.platform.name,
            device = %device.info.name,
            "compute context ready"
        );

        Ok(Self {
            runtime,
            config,
            device,
            context,
            state: RwLock::new(ProgramState::default()),
        })
    }

    /// The device this context runs on.
    #[must_use]
    pub fn device(&self) -> &DiscoveredDevice {
        &self.device
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Underlying runtime.
    #[must_use]
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Whether a program is currently built.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.state.read().program.is_some()
    }

    /// Number of successful builds so far.
    #[must_use]
    pub fn builds(&self) -> u64 {
        self.state.read().builds
    }

    /// Number of kernel objects held in the cache.
    #[must_use]
    pub fn cached_kernels(&self) -> usize {
        self.state.read().cache.len()
    }

    /// Compile `source` for the context's device, replacing any previous
    /// program and its kernels.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Build`] with the compiler log if compilation
    /// fails, or an API error if the program cannot be created.
    pub fn build_program(&self, source: &str) -> Result<()> {
        if source.trim().is_empty() {
            return Err(ComputeError::EmptySource);
        }

        let mut state = self.state.write();
        self.release_program(&mut state);

        let program = self
            .runtime
            .create_program(self.context, source)
            .map_err(|code| ComputeError::api("clCreateProgramWithSource", code))?;

        if let Err(code) =
            self.runtime
                .build_program(program, self.device.id, &self.config.build.options)
        {
            let log = match self.runtime.build_log(program, self.device.id) {
                Ok(log) => log,
                Err(log_code) => {
                    debug!(status = %log_code, "build log unavailable");
                    String::new()
                }
            };
            warn!(
                status = %code,
                device = %self.device.info.name,
                log = %log,
                "program build failed"
            );
            self.runtime.release_program(program);
            return Err(ComputeError::Build { code, log });
        }

        state.program = Some(program);
        state.builds += 1;
        info!(device = %self.device.info.name, build = state.builds, "program built");

        if self.config.build.log_kernels {
            print_kernel_names(&self.runtime, program, &mut TracingSink);
        }
        Ok(())
    }

    /// Kernel object for the entry point `name` of the current program.
    ///
    /// With `cache_kernels` the same handle is returned on every call.
    /// Handles stay valid until the next rebuild or until the context is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::NoProgram`] before the first successful build
    /// and [`ComputeError::KernelNotFound`] for unknown entry points.
    pub fn kernel(&self, name: &str) -> Result<KernelHandle> {
        if self.config.cache_kernels {
            let state = self.state.read();
            if state.program.is_none() {
                return Err(ComputeError::NoProgram);
            }
            if let Some(kernel) = state.cache.get(name) {
                return Ok(*kernel);
            }
        }

        let mut state = self.state.write();
        let program = state.program.ok_or(ComputeError::NoProgram)?;
        if let Some(kernel) = state.cache.get(name) {
            // Another caller filled the cache between the locks.
            return Ok(*kernel);
        }

        let kernel = self
            .runtime
            .create_kernel(program, name)
            .map_err(|code| match code {
                StatusCode::INVALID_KERNEL_NAME => {
                    ComputeError::KernelNotFound(name.to_string())
                }
                code => ComputeError::api("clCreateKernel", code),
            })?;
        debug!(kernel = name, cached = self.config.cache_kernels, "created kernel");

        if self.config.cache_kernels {
            state.cache.insert(name.to_string(), kernel);
        } else {
            state.loose.push(kernel);
        }
        Ok(kernel)
    }

    /// Names of all kernels in the current program, in runtime order.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::NoProgram`] before the first successful
    /// build, or the first failing runtime query.
    pub fn kernel_names(&self) -> Result<Vec<String>> {
        let state = self.state.read();
        let program = state.program.ok_or(ComputeError::NoProgram)?;
        list_kernel_names(&self.runtime, program)
    }

    /// Write the current program's kernel names to `sink`.
    pub fn log_kernel_names<S: DiagnosticSink + ?Sized>(&self, sink: &mut S) {
        let state = self.state.read();
        match state.program {
            Some(program) => print_kernel_names(&self.runtime, program, sink),
            None => sink.line("no program built"),
        }
    }

    fn release_program(&self, state: &mut ProgramState) {
        for (_, kernel) in state.cache.drain() {
            self.runtime.release_kernel(kernel);
        }
        for kernel in state.loose.drain(..) {
            self.runtime.release_kernel(kernel);
        }
        if let Some(program) = state.program.take() {
            self.runtime.release_program(program);
        }
    }
}

impl<R: ClRuntime> Drop for ComputeContext<R> {
    fn drop(&mut self) {
        let mut state = std::mem::take(self.state.get_mut());
        self.release_program(&mut state);
        self.runtime.release_context(self.context);
        debug!(device = %self.device.info.name, "compute context released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeCall, FakeRuntime};
    use crate::inspect::RecordingSink;

    const SOURCE: &str = r"
        __kernel void add(__global float* a, __global const float* b) {}
        __kernel void mul(__global float* a, __global const float* b) {}
    ";

    fn context(rt: &FakeRuntime) -> ComputeContext<FakeRuntime> {
        ComputeContext::new(rt.clone(), ContextConfig::default()).expect("context")
    }

    #[test]
    fn test_new_selects_gpu() {
        let rt = FakeRuntime::demo();
        let ctx = context(&rt);
        assert_eq!(ctx.device().info.name, "Fake GPU");
        assert!(!ctx.is_built());
        assert_eq!(rt.live_contexts(), 1);
    }

    #[test]
    fn test_new_without_platforms() {
        let err = ComputeContext::new(FakeRuntime::new(), ContextConfig::default())
            .expect_err("no platforms");
        assert!(matches!(err, ComputeError::NoPlatform));
    }

    #[test]
    fn test_new_context_failure() {
        let rt = FakeRuntime::demo();
        rt.fail(FakeCall::CreateContext, StatusCode::OUT_OF_HOST_MEMORY);
        let err = ComputeContext::new(rt, ContextConfig::default()).expect_err("fails");
        assert_eq!(err.to_string(), "clCreateContext failed: CL_OUT_OF_HOST_MEMORY");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = ContextConfig::default();
        config.device.device = Some(0);
        let err = ComputeContext::new(FakeRuntime::demo(), config).expect_err("invalid");
        assert!(matches!(err, ComputeError::Config(_)));
    }

    #[test]
    fn test_build_and_list() {
        let rt = FakeRuntime::demo();
        let ctx = context(&rt);
        ctx.build_program(SOURCE).expect("build");
        assert!(ctx.is_built());
        assert_eq!(ctx.builds(), 1);
        assert_eq!(ctx.kernel_names().expect("names"), vec!["add", "mul"]);
        // Listing leaves no kernel objects behind.
        assert_eq!(rt.live_kernels(), 0);
    }

    #[test]
    fn test_build_empty_source() {
        let ctx = context(&FakeRuntime::demo());
        assert!(matches!(ctx.build_program("  \n"), Err(ComputeError::EmptySource)));
    }

    #[test]
    fn test_build_failure_returns_log() {
        let rt = FakeRuntime::demo();
        let ctx = context(&rt);
        let err = ctx
            .build_program("kernel void k() {}\n#error no float support\n")
            .expect_err("build fails");
        match err {
            ComputeError::Build { code, log } => {
                assert_eq!(code, StatusCode::BUILD_PROGRAM_FAILURE);
                assert!(log.contains("no float support"));
            }
            other => panic!("expected build error, got {other:?}"),
        }
        assert!(!ctx.is_built());
        assert_eq!(rt.live_programs(), 0);
    }

    #[test]
    fn test_build_failure_without_log() {
        let rt = FakeRuntime::demo();
        rt.fail(FakeCall::BuildProgram, StatusCode::OUT_OF_RESOURCES);
        rt.fail(FakeCall::BuildLog, StatusCode::INVALID_PROGRAM);
        let ctx = context(&rt);
        let err = ctx.build_program(SOURCE).expect_err("build fails");
        assert!(matches!(
            err,
            ComputeError::Build { code: StatusCode::OUT_OF_RESOURCES, ref log } if log.is_empty()
        ));
    }

    #[test]
    fn test_build_uses_configured_options() {
        let rt = FakeRuntime::demo();
        let mut config = ContextConfig::default();
        config.build.options = "not-an-option".to_string();
        let ctx = ComputeContext::new(rt, config).expect("context");
        let err = ctx.build_program(SOURCE).expect_err("bad options");
        assert_eq!(err.code(), Some(StatusCode::INVALID_BUILD_OPTIONS));
    }

    #[test]
    fn test_kernel_before_build() {
        let ctx = context(&FakeRuntime::demo());
        assert!(matches!(ctx.kernel("add"), Err(ComputeError::NoProgram)));
        assert!(matches!(ctx.kernel_names(), Err(ComputeError::NoProgram)));
    }

    #[test]
    fn test_kernel_cache_returns_same_handle() {
        let rt = FakeRuntime::demo();
        let ctx = context(&rt);
        ctx.build_program(SOURCE).expect("build");

        let first = ctx.kernel("add").expect("kernel");
        let second = ctx.kernel("add").expect("kernel");
        assert_eq!(first, second);
        assert_eq!(ctx.cached_kernels(), 1);
        assert_eq!(rt.calls(FakeCall::CreateKernel), 1);
    }

    #[test]
    fn test_kernel_without_cache_creates_each_time() {
        let rt = FakeRuntime::demo();
        let config = ContextConfig {
            cache_kernels: false,
            ..ContextConfig::default()
        };
        let ctx = ComputeContext::new(rt.clone(), config).expect("context");
        ctx.build_program(SOURCE).expect("build");

        let first = ctx.kernel("mul").expect("kernel");
        let second = ctx.kernel("mul").expect("kernel");
        assert_ne!(first, second);
        assert_eq!(ctx.cached_kernels(), 0);
        assert_eq!(rt.live_kernels(), 2);

        drop(ctx);
        assert_eq!(rt.live_kernels(), 0);
    }

    #[test]
    fn test_unknown_kernel() {
        let ctx = context(&FakeRuntime::demo());
        ctx.build_program(SOURCE).expect("build");
        assert!(matches!(
            ctx.kernel("sub"),
            Err(ComputeError::KernelNotFound(name)) if name == "sub"
        ));
    }

    #[test]
    fn test_rebuild_releases_previous_program() {
        let rt = FakeRuntime::demo();
        let ctx = context(&rt);
        ctx.build_program(SOURCE).expect("build");
        ctx.kernel("add").expect("kernel");
        assert_eq!(rt.live_kernels(), 1);

        ctx.build_program("__kernel void only(void) {}").expect("rebuild");
        assert_eq!(ctx.builds(), 2);
        assert_eq!(rt.live_programs(), 1);
        assert_eq!(rt.live_kernels(), 0);
        assert_eq!(ctx.kernel_names().expect("names"), vec!["only"]);
        assert!(matches!(ctx.kernel("add"), Err(ComputeError::KernelNotFound(_))));
    }

    #[test]
    fn test_failed_rebuild_leaves_no_program() {
        let rt = FakeRuntime::demo();
        let ctx = context(&rt);
        ctx.build_program(SOURCE).expect("build");
        assert!(ctx.build_program("#error broken").is_err());
        assert!(!ctx.is_built());
        assert_eq!(rt.live_programs(), 0);
    }

    #[test]
    fn test_log_kernel_names() {
        let ctx = context(&FakeRuntime::demo());
        let mut sink = RecordingSink::new();
        ctx.log_kernel_names(&mut sink);
        assert_eq!(sink.lines(), ["OpenCL: no program built"]);

        ctx.build_program(SOURCE).expect("build");
        let mut sink = RecordingSink::new();
        ctx.log_kernel_names(&mut sink);
        assert_eq!(sink.lines(), ["OpenCL:  add", "OpenCL:  mul"]);
    }

    #[test]
    fn test_build_logs_kernels_when_enabled() {
        let rt = FakeRuntime::demo();
        let ctx = context(&rt);
        ctx.build_program(SOURCE).expect("build");
        assert_eq!(rt.calls(FakeCall::KernelCount), 1);

        let quiet = ComputeContext::new(
            rt.clone(),
            ContextConfig {
                build: crate::config::BuildConfig {
                    log_kernels: false,
                    ..Default::default()
                },
                ..ContextConfig::default()
            },
        )
        .expect("context");
        quiet.build_program(SOURCE).expect("build");
        assert_eq!(rt.calls(FakeCall::KernelCount), 1);
    }

    #[test]
    fn test_drop_releases_everything() {
        let rt = FakeRuntime::demo();
        {
            let ctx = context(&rt);
            ctx.build_program(SOURCE).expect("build");
            ctx.kernel("add").expect("kernel");
            ctx.kernel("mul").expect("kernel");
        }
        assert_eq!(rt.live_kernels(), 0);
        assert_eq!(rt.live_programs(), 0);
        assert_eq!(rt.live_contexts(), 0);
    }

    #[test]
    fn test_context_is_shareable_across_threads() {
        let rt = FakeRuntime::demo();
        let ctx = std::sync::Arc::new(context(&rt));
        ctx.build_program(SOURCE).expect("build");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ctx = std::sync::Arc::clone(&ctx);
                std::thread::spawn(move || ctx.kernel("add").expect("kernel"))
            })
            .collect();
        let kernels: Vec<KernelHandle> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();
        assert!(kernels.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(rt.calls(FakeCall::CreateKernel), 1);
    }
}
