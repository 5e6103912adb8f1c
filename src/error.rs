use std::path::PathBuf;

use crate::exit_code::ExitCode;
use crate::types::ValidationError;

/// Central error enum for validator operations.
///
/// Validation findings are values (`ValidationError` lists inside layer
/// results), never errors; this enum covers the operational failures around
/// them — I/O, parsing, configuration — plus the one exception-like surface
/// the hooks expose when `throw_on_error` is set.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot determine file type for {0}")]
    UnknownFileType(PathBuf),

    #[error("Invalid config at {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Corrupt audit log at {path} line {line}: {source}")]
    AuditCorrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Schema compilation failed: {0}")]
    SchemaCompile(String),

    // Raised by hooks when throw_on_error is set and validation fails.
    #[error("Validation failed with exit code {} ({} error(s))", .exit_code, .errors.len())]
    Validation {
        exit_code: ExitCode,
        errors: Vec<ValidationError>,
    },
}

impl WardenError {
    /// The exit code a process should terminate with for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            WardenError::FileRead { .. }
            | WardenError::FileWrite { .. }
            | WardenError::AuditCorrupt { .. }
            | WardenError::SchemaCompile(_) => ExitCode::GeneralError,
            WardenError::Parse { .. } => ExitCode::ValidationSchema,
            WardenError::UnknownFileType(_) | WardenError::Config { .. } => {
                ExitCode::InvalidArguments
            }
            WardenError::Validation { exit_code, .. } => *exit_code,
        }
    }

    /// True if the failure came from validation findings rather than an
    /// operational fault.
    pub fn is_validation(&self) -> bool {
        matches!(self, WardenError::Validation { .. })
    }
}
