//! Error and warning types for the export pipeline.
//!
//! The driver is fail-fast on chart loading, role initialization and the
//! defaults file, and best-effort per template thereafter: recoverable
//! problems become [`ExportWarning`]s on the report instead of errors.

use helmible_core::ChartError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("cannot find ansible-galaxy; is it installed?")]
    GalaxyNotFound,

    #[error("ansible-galaxy role init failed:\n{output}")]
    GalaxyInit { output: String },

    #[error("failed to update {path}: {source}")]
    Defaults {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("tasks template is invalid: {0}")]
    TasksTemplate(#[from] helmible_template::ParseError),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Warning severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningSeverity {
    /// A conversion was applied; review optional.
    Info,
    /// Manual attention recommended.
    Warning,
    /// A file could not be converted and was skipped.
    Error,
}

impl WarningSeverity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A structured conversion note tied to a file.
#[derive(Debug, Clone)]
pub struct ExportWarning {
    pub severity: WarningSeverity,
    pub file: PathBuf,
    /// The construct that triggered the warning.
    pub pattern: String,
    pub message: String,
}

impl ExportWarning {
    pub fn info(file: PathBuf, pattern: &str, message: impl Into<String>) -> Self {
        Self {
            severity: WarningSeverity::Info,
            file,
            pattern: pattern.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(file: PathBuf, pattern: &str, message: impl Into<String>) -> Self {
        Self {
            severity: WarningSeverity::Warning,
            file,
            pattern: pattern.to_string(),
            message: message.into(),
        }
    }

    pub fn error(file: PathBuf, pattern: &str, message: impl Into<String>) -> Self {
        Self {
            severity: WarningSeverity::Error,
            file,
            pattern: pattern.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}: {} - {}",
            self.severity.label(),
            self.file.display(),
            self.pattern,
            self.message
        )
    }
}
