//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`codes`] - Status code lookup and the full catalog
//! - [`devices`] - Platform and device discovery
//! - [`kernels`] - Kernel listing for a source file

pub mod codes;
pub mod devices;
pub mod kernels;

pub use codes::{CatalogCommand, DescribeCommand};
pub use devices::DevicesCommand;
pub use kernels::KernelsCommand;
