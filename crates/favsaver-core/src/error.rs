//! Error types for the favorites migration engine.
//!
//! `FavSaverError` covers run-aborting failures. Per-file failures of the
//! metadata tool are reported through [`crate::tool::ToolError`] and never
//! escape the write orchestrator.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a fully successful run.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a run that completed with one or more failed writes.
pub const EXIT_GENERAL_ERROR: i32 = 1;
/// Exit code when exiftool could not be located or executed.
pub const EXIT_TOOL_UNAVAILABLE: i32 = 2;
/// Exit code for an unreadable or non-Photos database.
pub const EXIT_INVALID_DATABASE: i32 = 3;
/// Exit code when no supported photo files were discovered.
pub const EXIT_NO_PHOTOS: i32 = 4;
/// Exit code for a run stopped by Ctrl-C.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Main error type for the migration engine.
#[derive(Debug, Error)]
pub enum FavSaverError {
    // Source database errors
    #[error("Invalid Photos database {path:?}: {message}")]
    InvalidDatabase {
        path: Option<PathBuf>,
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Metadata tool errors
    #[error("Metadata tool unavailable: {message}")]
    ToolUnavailable { message: String },

    // Photo tree errors
    #[error("No supported photo files found under {0}")]
    NoFilesFound(PathBuf),

    #[error("Photo directory {root} could not be read")]
    PhotoRootUnreadable {
        root: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, FavSaverError>;

impl From<std::io::Error> for FavSaverError {
    fn from(err: std::io::Error) -> Self {
        FavSaverError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for FavSaverError {
    fn from(err: serde_json::Error) -> Self {
        FavSaverError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for FavSaverError {
    fn from(err: rusqlite::Error) -> Self {
        FavSaverError::InvalidDatabase {
            path: None,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl FavSaverError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        FavSaverError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a database error tied to the database file.
    pub fn invalid_database(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        FavSaverError::InvalidDatabase {
            path: Some(path.into()),
            message: message.into(),
            source: None,
        }
    }

    /// Map the error to the process exit code.
    ///
    /// - 2: exiftool unavailable
    /// - 3: database invalid, unreadable or missing `ZASSET`
    /// - 4: photo root unreadable or without supported files
    /// - 1: anything else
    pub fn exit_code(&self) -> i32 {
        match self {
            FavSaverError::ToolUnavailable { .. } => EXIT_TOOL_UNAVAILABLE,
            FavSaverError::InvalidDatabase { .. } => EXIT_INVALID_DATABASE,
            FavSaverError::NoFilesFound(_) | FavSaverError::PhotoRootUnreadable { .. } => {
                EXIT_NO_PHOTOS
            }
            _ => EXIT_GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FavSaverError::NoFilesFound(PathBuf::from("/photos"));
        assert_eq!(err.to_string(), "No supported photo files found under /photos");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            FavSaverError::ToolUnavailable {
                message: "exiftool not found".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(
            FavSaverError::invalid_database("/tmp/Photos.sqlite", "missing ZASSET").exit_code(),
            3
        );
        assert_eq!(FavSaverError::NoFilesFound(PathBuf::from("/p")).exit_code(), 4);
        assert_eq!(
            FavSaverError::PhotoRootUnreadable {
                root: PathBuf::from("/p"),
                source: None
            }
            .exit_code(),
            4
        );
        assert_eq!(FavSaverError::Other("boom".into()).exit_code(), 1);
    }

    #[test]
    fn test_rusqlite_errors_are_invalid_database() {
        let err: FavSaverError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.exit_code(), EXIT_INVALID_DATABASE);
    }
}
