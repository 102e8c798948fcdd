use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `MiasmaError` and maps other errors into it
#[derive(Debug)]
pub enum MiasmaError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// A setup-time configuration problem; the run refuses to start.
    ConfigError(String),
    ReportError(String),
}

impl From<io::Error> for MiasmaError {
    fn from(error: io::Error) -> Self {
        MiasmaError::IoError(error)
    }
}

impl From<serde_json::Error> for MiasmaError {
    fn from(error: serde_json::Error) -> Self {
        MiasmaError::JsonError(error)
    }
}

impl From<csv::Error> for MiasmaError {
    fn from(error: csv::Error) -> Self {
        MiasmaError::CsvError(error)
    }
}

impl From<String> for MiasmaError {
    fn from(error: String) -> Self {
        MiasmaError::ConfigError(error)
    }
}

impl From<&str> for MiasmaError {
    fn from(error: &str) -> Self {
        MiasmaError::ConfigError(error.to_string())
    }
}

impl std::error::Error for MiasmaError {}

impl Display for MiasmaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {self:?}")?;
        Ok(())
    }
}
