//! Status code commands.
//!
//! These never touch a runtime: the catalog is static.

use std::io::Write;

use clprobe::{StatusCode, known_codes};

use crate::error::CliError;
use crate::output::{CodeEntry, CodeList, OutputFormat};

/// Describe command executor.
pub struct DescribeCommand {
    codes: Vec<i32>,
}

impl DescribeCommand {
    /// Create a describe command for the given raw codes.
    #[must_use]
    pub fn new(codes: Vec<i32>) -> Self {
        Self { codes }
    }

    /// Execute the describe command.
    ///
    /// # Errors
    ///
    /// Returns an error if output fails.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let list = CodeList(
            self.codes
                .iter()
                .map(|&code| CodeEntry::from(StatusCode(code)))
                .collect(),
        );
        format.write(writer, &list)
    }
}

/// Catalog command executor.
#[derive(Default)]
pub struct CatalogCommand;

impl CatalogCommand {
    /// Create a catalog command.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Execute the catalog command.
    ///
    /// # Errors
    ///
    /// Returns an error if output fails.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let list = CodeList(known_codes().map(|(code, _)| CodeEntry::from(code)).collect());
        format.write(writer, &list)
    }
}
