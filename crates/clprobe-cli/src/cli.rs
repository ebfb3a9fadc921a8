//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// clprobe - OpenCL runtime diagnostics.
#[derive(Parser, Debug, Clone)]
#[command(name = "clprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Compute backend.
    #[arg(short, long, value_enum, env = "CLPROBE_BACKEND", default_value_t = Backend::default())]
    pub backend: Backend,

    /// Context configuration file (TOML).
    #[arg(short, long, env = "CLPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Compute backend options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// In-process fake runtime with one demo platform.
    Fake,
    /// System OpenCL drivers.
    Opencl,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "opencl") {
            Self::Opencl
        } else {
            Self::Fake
        }
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the names of status codes.
    Describe {
        /// Status codes, e.g. `-5` or `0`.
        #[arg(required = true, allow_negative_numbers = true)]
        codes: Vec<i32>,
    },

    /// Print the whole status catalog.
    Codes,

    /// List platforms and devices.
    Devices,

    /// Build a kernel file and list its kernels.
    Kernels(KernelsArgs),
}

/// Arguments for the kernels command.
#[derive(Parser, Debug, Clone)]
pub struct KernelsArgs {
    /// OpenCL C source file.
    #[arg(required = true)]
    pub file: PathBuf,

    /// Build options, overriding the configuration file.
    #[arg(short, long, allow_hyphen_values = true)]
    pub options: Option<String>,
}
