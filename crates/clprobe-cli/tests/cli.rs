//! Binary tests for the `clprobe` command with the fake backend.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn clprobe() -> Command {
    let mut cmd = Command::cargo_bin("clprobe").expect("binary");
    cmd.env_remove("CLPROBE_CONFIG")
        .env_remove("RUST_LOG")
        .env("CLPROBE_BACKEND", "fake");
    cmd
}

fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write");
    file
}

#[test]
fn describe_prints_names() {
    clprobe()
        .args(["describe", "-5", "0", "-9999"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CL_OUT_OF_RESOURCES"))
        .stdout(predicate::str::contains("CL_SUCCESS"))
        .stdout(predicate::str::contains("CL_UNKNOWN_ERROR"));
}

#[test]
fn codes_json_covers_catalog() {
    clprobe()
        .args(["--format", "json", "codes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"CL_INVALID_DEVICE_QUEUE\""))
        .stdout(predicate::str::contains("\"CL_SUCCESS\""));
}

#[test]
fn devices_lists_fake_platform() {
    clprobe()
        .arg("devices")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fake GPU"))
        .stdout(predicate::str::contains("Fake CPU"))
        .stdout(predicate::str::contains("clprobe Fake Platform"));
}

#[test]
fn kernels_lists_names() {
    let source = temp_file("__kernel void saxpy(__global float* y) {}\nkernel void fill() {}\n");
    clprobe()
        .arg("kernels")
        .arg(source.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("saxpy"))
        .stdout(predicate::str::contains("fill"));
}

#[test]
fn kernels_build_failure_exits_nonzero_with_log() {
    let source = temp_file("#error missing extension\n__kernel void k() {}\n");
    clprobe()
        .arg("kernels")
        .arg(source.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CL_BUILD_PROGRAM_FAILURE"))
        .stderr(predicate::str::contains("missing extension"));
}

#[test]
fn config_selects_cpu() {
    let config = temp_file("[device]\ntype = \"cpu\"\n");
    let source = temp_file("__kernel void k() {}\n");
    clprobe()
        .args(["--format", "json", "--config"])
        .arg(config.path())
        .arg("kernels")
        .arg(source.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"device\": \"Fake CPU\""));
}

#[test]
fn invalid_config_is_reported() {
    let config = temp_file("[device]\ndevice = 1\n");
    clprobe()
        .arg("--config")
        .arg(config.path())
        .arg("devices")
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("Error: configuration error"));
}
