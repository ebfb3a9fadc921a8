//! # clprobe-cli
//!
//! Command-line front end for `clprobe`.
//!
//! Provides commands for:
//! - Translating OpenCL status codes to their names
//! - Listing the whole status catalog
//! - Discovering platforms and devices
//! - Building a kernel file and listing its kernels
//!
//! # Architecture
//!
//! Every command is generic over [`clprobe::ClRuntime`]. The binary picks
//! the backend (`fake` or, with the `opencl` feature, the system ICD loader)
//! and hands it to the command.
//!
//! ```text
//! ┌─────────┐   ClRuntime   ┌──────────────────────┐
//! │ clprobe │──────────────►│ FakeRuntime / OpenCL │
//! └─────────┘               └──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Backend, Cli, Commands, Format, KernelsArgs};
pub use error::CliError;
pub use output::OutputFormat;
