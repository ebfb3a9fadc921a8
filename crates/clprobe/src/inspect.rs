//! Kernel introspection.
//!
//! Lists the kernels compiled into a program. Enumeration is fail-fast:
//! the first failing runtime query ends it, and nothing after that point is
//! inspected. Every kernel object created for the listing is released when
//! the listing is dropped.

use tracing::debug;

use crate::error::{ComputeError, Result};
use crate::runtime::{ClRuntime, KernelHandle, ProgramHandle};

/// Tag prefixed to every diagnostic line.
pub const DIAG_TAG: &str = "OpenCL:";

/// Destination for human-readable diagnostic lines.
pub trait DiagnosticSink {
    /// Record one line.
    fn line(&mut self, message: &str);
}

/// Sink that forwards lines to `tracing` under the `opencl` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn line(&mut self, message: &str) {
        debug!(target: "opencl", "{DIAG_TAG} {message}");
    }
}

/// Sink that keeps tagged lines in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    lines: Vec<String>,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines recorded so far.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Take the recorded lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl DiagnosticSink for RecordingSink {
    fn line(&mut self, message: &str) {
        self.lines.push(format!("{DIAG_TAG} {message}"));
    }
}

/// Lazy listing of a program's kernel names.
///
/// Yields one `Ok(name)` per kernel in runtime order. The first `Err` ends
/// the sequence.
pub struct KernelNames<'a, R: ClRuntime + ?Sized> {
    runtime: &'a R,
    kernels: Vec<KernelHandle>,
    next: usize,
    failed: bool,
}

impl<R: ClRuntime + ?Sized> std::fmt::Debug for KernelNames<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelNames")
            .field("kernels", &self.kernels.len())
            .field("next", &self.next)
            .field("failed", &self.failed)
            .finish()
    }
}

impl<R: ClRuntime + ?Sized> KernelNames<'_, R> {
    /// Number of kernels the program reported.
    #[must_use]
    pub fn kernel_count(&self) -> usize {
        self.kernels.len()
    }

    fn read_name(&self, kernel: KernelHandle) -> Result<String> {
        let len = self
            .runtime
            .kernel_name_len(kernel)
            .map_err(|code| ComputeError::api("clGetKernelInfo", code))?;

        let mut buf = vec![0u8; len];
        self.runtime
            .kernel_name(kernel, &mut buf)
            .map_err(|code| ComputeError::api("clGetKernelInfo", code))?;

        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }
}

impl<R: ClRuntime + ?Sized> Iterator for KernelNames<'_, R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let kernel = *self.kernels.get(self.next)?;
        self.next += 1;

        let name = self.read_name(kernel);
        if name.is_err() {
            self.failed = true;
        }
        Some(name)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.kernels.len() - self.next))
        }
    }
}

impl<R: ClRuntime + ?Sized> std::iter::FusedIterator for KernelNames<'_, R> {}

impl<R: ClRuntime + ?Sized> Drop for KernelNames<'_, R> {
    fn drop(&mut self) {
        for kernel in self.kernels.drain(..) {
            self.runtime.release_kernel(kernel);
        }
    }
}

/// Start listing the kernels compiled into `program`.
///
/// Fetches the kernel count and all kernel handles up front; a failure in
/// either step aborts with no partial result. Names are read lazily.
pub fn kernel_names<R: ClRuntime + ?Sized>(
    runtime: &R,
    program: ProgramHandle,
) -> Result<KernelNames<'_, R>> {
    let count = runtime
        .kernel_count(program)
        .map_err(|code| ComputeError::api("clCreateKernelsInProgram", code))?;

    let mut kernels = vec![KernelHandle::NULL; count as usize];
    if !kernels.is_empty() {
        runtime
            .create_kernels(program, &mut kernels)
            .map_err(|code| {
                // Slots the runtime filled before failing are still ours.
                for kernel in kernels.iter().filter(|k| !k.is_null()) {
                    runtime.release_kernel(*kernel);
                }
                ComputeError::api("clCreateKernelsInProgram", code)
            })?;
    }

    Ok(KernelNames {
        runtime,
        kernels,
        next: 0,
        failed: false,
    })
}

/// Collect all kernel names of `program`, failing on the first error.
pub fn list_kernel_names<R: ClRuntime + ?Sized>(
    runtime: &R,
    program: ProgramHandle,
) -> Result<Vec<String>> {
    kernel_names(runtime, program)?.collect()
}

/// Write the kernel names of `program` to `sink`.
///
/// Best effort: a failing query produces one `"<call> failed: <status>"`
/// line and ends the listing. Names written before the failure stay.
pub fn print_kernel_names<R, S>(runtime: &R, program: ProgramHandle, sink: &mut S)
where
    R: ClRuntime + ?Sized,
    S: DiagnosticSink + ?Sized,
{
    let names = match kernel_names(runtime, program) {
        Ok(names) => names,
        Err(e) => {
            sink.line(&e.to_string());
            return;
        }
    };

    for name in names {
        match name {
            Ok(name) => sink.line(&format!(" {name}")),
            Err(e) => {
                sink.line(&e.to_string());
                return;
            }
        }
    }
}
