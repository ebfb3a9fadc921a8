//! End-to-end tests of the compute context over the fake runtime.

use std::sync::Arc;
use std::thread;

use clprobe::{
    ComputeContext, ComputeError, ContextConfig, DIAG_TAG, DeviceType, FakeCall, FakeRuntime,
    PlatformInfo, RecordingSink, StatusCode, describe,
};

const SAXPY: &str = r"
__kernel void saxpy(float a, __global const float* x, __global float* y) {
    size_t i = get_global_id(0);
    y[i] = a * x[i] + y[i];
}

kernel void scale(__global float* y, float s) {
    y[get_global_id(0)] *= s;
}
";

fn demo_context() -> (FakeRuntime, ComputeContext<FakeRuntime>) {
    let runtime = FakeRuntime::demo();
    let ctx = ComputeContext::new(runtime.clone(), ContextConfig::default()).expect("context");
    (runtime, ctx)
}

#[test]
fn build_and_list_kernels() {
    let (_, ctx) = demo_context();
    assert_eq!(ctx.device().info.device_type, DeviceType::Gpu);

    ctx.build_program(SAXPY).expect("build");
    assert_eq!(ctx.kernel_names().expect("names"), vec!["saxpy", "scale"]);

    let mut sink = RecordingSink::new();
    ctx.log_kernel_names(&mut sink);
    assert_eq!(
        sink.lines(),
        [format!("{DIAG_TAG}  saxpy"), format!("{DIAG_TAG}  scale")]
    );
}

#[test]
fn config_file_drives_device_choice() {
    let config = ContextConfig::from_toml(
        r#"
        cache_kernels = false

        [device]
        type = "cpu"

        [build]
        options = "-cl-fast-relaxed-math"
        log_kernels = false
        "#,
    )
    .expect("config");

    let runtime = FakeRuntime::demo();
    let ctx = ComputeContext::new(runtime.clone(), config).expect("context");
    assert_eq!(ctx.device().info.name, "Fake CPU");

    ctx.build_program(SAXPY).expect("build");
    ctx.kernel("saxpy").expect("kernel");
    ctx.kernel("saxpy").expect("kernel");
    assert_eq!(ctx.cached_kernels(), 0);
    assert_eq!(runtime.live_kernels(), 2);

    drop(ctx);
    assert_eq!(runtime.live_kernels(), 0);
}

#[test]
fn build_failure_reports_log_and_keeps_context_usable() {
    let (runtime, ctx) = demo_context();

    let err = ctx
        .build_program("#error unsupported device\n__kernel void k() {}")
        .expect_err("build should fail");
    match &err {
        ComputeError::Build { code, log } => {
            assert_eq!(*code, StatusCode::BUILD_PROGRAM_FAILURE);
            assert!(log.contains("unsupported device"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ctx.is_built());
    assert_eq!(runtime.live_programs(), 0);

    ctx.build_program(SAXPY).expect("rebuild");
    assert!(ctx.is_built());
}

#[test]
fn failed_kernel_query_surfaces_in_diagnostics() {
    let (runtime, ctx) = demo_context();
    ctx.build_program(SAXPY).expect("build");

    runtime.fail_after(FakeCall::KernelNameLen, 1, StatusCode::OUT_OF_RESOURCES);
    let mut sink = RecordingSink::new();
    ctx.log_kernel_names(&mut sink);

    assert_eq!(
        sink.lines(),
        [
            format!("{DIAG_TAG}  saxpy"),
            format!(
                "{DIAG_TAG} clGetKernelInfo failed: {}",
                describe(StatusCode::OUT_OF_RESOURCES)
            ),
        ]
    );
    // Enumeration handles are gone even after the abort.
    assert_eq!(runtime.live_kernels(), 0);
}

#[test]
fn no_device_when_preference_unmet() {
    let config = ContextConfig::from_toml("[device]\ntype = \"accelerator\"\n").expect("config");
    let err = ComputeContext::new(FakeRuntime::demo(), config).expect_err("no accelerator");
    assert!(matches!(err, ComputeError::NoDevice));
}

#[test]
fn platform_without_devices_is_no_device() {
    let runtime = FakeRuntime::new().with_platform(
        PlatformInfo {
            name: "Empty Platform".to_string(),
            vendor: "clprobe".to_string(),
            version: "OpenCL 3.0".to_string(),
        },
        vec![],
    );
    let err = ComputeContext::new(runtime, ContextConfig::default()).expect_err("no device");
    assert!(matches!(err, ComputeError::NoDevice), "got {err:?}");

    let err = ComputeContext::new(FakeRuntime::new(), ContextConfig::default())
        .expect_err("no platform");
    assert!(matches!(err, ComputeError::NoPlatform), "got {err:?}");
}

#[test]
fn configured_platform_index_counts_empty_platforms() {
    let runtime = FakeRuntime::demo().with_platform(
        PlatformInfo {
            name: "Empty Platform".to_string(),
            vendor: "clprobe".to_string(),
            version: "OpenCL 3.0".to_string(),
        },
        vec![],
    );
    let config = ContextConfig::from_toml("[device]\nplatform = 2\n").expect("config");
    let err = ComputeContext::new(runtime.clone(), config).expect_err("out of range");
    assert_eq!(err.to_string(), "platform index 2 out of range (2 available)");

    let config = ContextConfig::from_toml("[device]\nplatform = 1\n").expect("config");
    let err = ComputeContext::new(runtime, config).expect_err("empty platform");
    assert!(matches!(err, ComputeError::NoDevice), "got {err:?}");
}

#[test]
fn context_creation_failure_is_api_error() {
    let runtime = FakeRuntime::demo();
    runtime.fail(FakeCall::CreateContext, StatusCode::OUT_OF_HOST_MEMORY);

    let err = ComputeContext::new(runtime.clone(), ContextConfig::default()).expect_err("fails");
    assert_eq!(
        err.to_string(),
        "clCreateContext failed: CL_OUT_OF_HOST_MEMORY"
    );
    assert_eq!(runtime.live_contexts(), 0);
}

#[test]
fn shared_across_threads() {
    let (runtime, ctx) = demo_context();
    ctx.build_program(SAXPY).expect("build");
    let ctx = Arc::new(ctx);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                for _ in 0..16 {
                    ctx.kernel("scale").expect("kernel");
                    assert_eq!(ctx.kernel_names().expect("names").len(), 2);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }

    assert_eq!(ctx.cached_kernels(), 1);
    drop(ctx);
    assert_eq!(runtime.live_kernels(), 0);
    assert_eq!(runtime.live_programs(), 0);
    assert_eq!(runtime.live_contexts(), 0);
}
