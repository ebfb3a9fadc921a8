//! CLI error types.

use std::fmt;

use clprobe::ComputeError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Requested backend is not compiled in.
    BackendUnavailable(&'static str),
    /// Compute runtime failure.
    Compute(ComputeError),
    /// Output formatting error.
    Format(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnavailable(name) => {
                write!(f, "backend '{name}' is not available in this build")
            }
            Self::Compute(e) => write!(f, "{e}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Compute(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ComputeError> for CliError {
    fn from(err: ComputeError) -> Self {
        Self::Compute(err)
    }
}
