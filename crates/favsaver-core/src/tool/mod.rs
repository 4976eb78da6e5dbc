//! Capability interface for the external metadata tool.
//!
//! The engine only depends on [`MetadataTool`]; [`ExifTool`] is the production
//! implementation and tests substitute an in-memory fake.

mod exiftool;

pub use exiftool::{find_on_path, parse_read_output, quote_arg, ExifTool, ToolInfo};

use crate::models::{ExifSnapshot, MetadataUpdate};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Per-file failure of a metadata tool invocation.
///
/// These never abort a run: a read failure is treated as "no existing
/// metadata" and a write failure becomes a failed outcome.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unexpected tool output: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads and writes the rating and description tags of one file.
pub trait MetadataTool {
    /// Read the embedded rating and description.
    fn read(&self, path: &Path) -> Result<ExifSnapshot, ToolError>;

    /// Write the fields present in `update`.
    ///
    /// With `keep_backup` the tool's default backup file is preserved;
    /// without it the file is modified in place.
    fn write(&self, path: &Path, update: &MetadataUpdate, keep_backup: bool)
        -> Result<(), ToolError>;

    /// Human-readable equivalent of the write, for the audit log.
    fn describe_write(&self, path: &Path, update: &MetadataUpdate, keep_backup: bool) -> String {
        let mut parts = vec!["write".to_string()];
        if !keep_backup {
            parts.push("in-place".to_string());
        }
        if let Some(rating) = update.rating {
            parts.push(format!("rating={}", rating));
        }
        if let Some(description) = &update.description {
            parts.push(format!("description={}", quote_arg(description)));
        }
        parts.push(quote_arg(&path.to_string_lossy()));
        parts.join(" ")
    }
}
