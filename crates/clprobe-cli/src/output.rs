//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;

use clprobe::{DiscoveredDevice, StatusCode};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// One status code and its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeEntry {
    /// Raw status value.
    pub code: i32,
    /// Symbolic name.
    pub name: &'static str,
}

impl From<StatusCode> for CodeEntry {
    fn from(code: StatusCode) -> Self {
        Self {
            code: code.code(),
            name: clprobe::describe(code),
        }
    }
}

/// A list of status codes.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct CodeList(pub Vec<CodeEntry>);

impl TableDisplay for CodeList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{:>6}  NAME", "CODE")?;
        for entry in &self.0 {
            writeln!(writer, "{:>6}  {}", entry.code, entry.name)?;
        }
        Ok(())
    }
}

/// A discovered device with its selection status.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceEntry {
    /// Device as discovered.
    #[serde(flatten)]
    pub device: DiscoveredDevice,
    /// Whether the configured selection picks this device.
    pub selected: bool,
}

/// Devices across all platforms.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceList {
    /// Backend that produced the listing.
    pub backend: &'static str,
    /// Platforms reported, including those without devices.
    pub platforms: usize,
    /// Devices in discovery order.
    pub devices: Vec<DeviceEntry>,
}

impl TableDisplay for DeviceList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.devices.is_empty() {
            writeln!(
                writer,
                "No devices found on {} platform(s) (backend: {}).",
                self.platforms, self.backend
            )?;
            return Ok(());
        }

        writeln!(
            writer,
            "  {:<4} {:<24} {:<12} {:>6} {:>10}  PLATFORM",
            "ID", "NAME", "TYPE", "CUS", "MEMORY"
        )?;
        for entry in &self.devices {
            let device = &entry.device;
            let marker = if entry.selected { '*' } else { ' ' };
            writeln!(
                writer,
                "{marker} {:<4} {:<24} {:<12} {:>6} {:>6} MiB  {}",
                format!("{}.{}", device.platform_index, device.device_index),
                truncate(&device.info.name, 24),
                device.info.device_type.name(),
                device.info.compute_units,
                device.info.memory_mib(),
                device.platform.name,
            )?;
        }
        Ok(())
    }
}

/// Kernels compiled from one source file.
#[derive(Debug, Clone, Serialize)]
pub struct KernelListing {
    /// Source file.
    pub file: String,
    /// Device the program was built for.
    pub device: String,
    /// Build options used.
    pub options: String,
    /// Kernel names in runtime order.
    pub kernels: Vec<String>,
}

impl TableDisplay for KernelListing {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Kernels in {}", self.file)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Device:   {}", self.device)?;
        if !self.options.is_empty() {
            writeln!(writer, "Options:  {}", self.options)?;
        }
        writeln!(writer)?;
        if self.kernels.is_empty() {
            writeln!(writer, "  (none)")?;
        }
        for name in &self.kernels {
            writeln!(writer, "  {name}")?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}
