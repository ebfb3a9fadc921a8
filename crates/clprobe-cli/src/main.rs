//! clprobe CLI binary entrypoint.
//!
//! This is the main entry point for the `clprobe` command-line tool.

use std::io;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use clprobe::{ClRuntime, ContextConfig, FakeRuntime};
use clprobe_cli::cli::{Backend, Cli, Commands};
use clprobe_cli::commands::{CatalogCommand, DescribeCommand, DevicesCommand, KernelsCommand};
use clprobe_cli::error::CliError;
use clprobe_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    // Catalog commands need neither a runtime nor a configuration.
    match &cli.command {
        Commands::Describe { codes } => {
            return DescribeCommand::new(codes.clone()).execute(&mut stdout, &format);
        }
        Commands::Codes => return CatalogCommand::new().execute(&mut stdout, &format),
        Commands::Devices | Commands::Kernels(_) => {}
    }

    let config = load_config(cli.config.as_deref())?;
    match cli.backend {
        Backend::Fake => dispatch(FakeRuntime::demo(), &cli.command, config, &mut stdout, &format),
        Backend::Opencl => opencl(&cli.command, config, &mut stdout, &format),
    }
}

fn load_config(path: Option<&Path>) -> Result<ContextConfig, CliError> {
    match path {
        Some(path) => ContextConfig::from_file(path).map_err(CliError::from),
        None => Ok(ContextConfig::default()),
    }
}

fn dispatch<R: ClRuntime, W: io::Write>(
    runtime: R,
    command: &Commands,
    config: ContextConfig,
    writer: &mut W,
    format: &OutputFormat,
) -> Result<(), CliError> {
    match command {
        Commands::Devices => DevicesCommand::new(&runtime, &config).execute(writer, format),
        Commands::Kernels(args) => {
            KernelsCommand::new(runtime, config).execute(writer, format, args)
        }
        Commands::Describe { .. } | Commands::Codes => Ok(()),
    }
}

#[cfg(feature = "opencl")]
fn opencl<W: io::Write>(
    command: &Commands,
    config: ContextConfig,
    writer: &mut W,
    format: &OutputFormat,
) -> Result<(), CliError> {
    dispatch(clprobe::OpenClRuntime::new(), command, config, writer, format)
}

#[cfg(not(feature = "opencl"))]
fn opencl<W: io::Write>(
    _command: &Commands,
    _config: ContextConfig,
    _writer: &mut W,
    _format: &OutputFormat,
) -> Result<(), CliError> {
    Err(CliError::BackendUnavailable("opencl"))
}
