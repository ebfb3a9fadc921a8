//! Kernel listing command.
//!
//! Builds a source file on the configured device and prints the kernels
//! the compiler produced. A failed build prints the compiler log.

use std::fs;
use std::io::Write;

use clprobe::{ClRuntime, ComputeContext, ContextConfig};
use tracing::info;

use crate::cli::KernelsArgs;
use crate::error::CliError;
use crate::output::{KernelListing, OutputFormat};

/// Kernels command executor.
pub struct KernelsCommand<R: ClRuntime> {
    runtime: R,
    config: ContextConfig,
}

impl<R: ClRuntime> KernelsCommand<R> {
    /// Create a kernels command owning `runtime`.
    #[must_use]
    pub const fn new(runtime: R, config: ContextConfig) -> Self {
        Self { runtime, config }
    }

    /// Build the file and collect its kernel names.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, no device is usable, or
    /// the build fails.
    pub fn fetch(self, args: &KernelsArgs) -> Result<KernelListing, CliError> {
        let source = fs::read_to_string(&args.file)?;

        let mut config = self.config;
        if let Some(options) = &args.options {
            config.build.options.clone_from(options);
        }

        let ctx = ComputeContext::new(self.runtime, config)?;
        info!(file = %args.file.display(), "building kernel source");
        ctx.build_program(&source)?;

        Ok(KernelListing {
            file: args.file.display().to_string(),
            device: ctx.device().info.name.clone(),
            options: ctx.config().build.options.clone(),
            kernels: ctx.kernel_names()?,
        })
    }

    /// Execute the kernels command.
    ///
    /// # Errors
    ///
    /// Returns an error if building or output fails.
    pub fn execute<W: Write>(
        self,
        writer: &mut W,
        format: &OutputFormat,
        args: &KernelsArgs,
    ) -> Result<(), CliError> {
        let listing = self.fetch(args)?;
        format.write(writer, &listing)
    }
}
