//! exiftool subprocess backend.

use super::{MetadataTool, ToolError};
use crate::config::ToolConfig;
use crate::models::{ExifSnapshot, MetadataUpdate};
use crate::{FavSaverError, Result};
use serde_json::Value;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Location and version of the exiftool executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub path: PathBuf,
    pub version: String,
}

/// Captured result of one exiftool run.
struct ToolOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// [`MetadataTool`] backed by the `exiftool` command-line program.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    timeout: Duration,
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new(ToolConfig::EXECUTABLE)
    }
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: ToolConfig::PROCESS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `exiftool -ver` to confirm the tool works.
    ///
    /// Fails with `ToolUnavailable` if it cannot be started or reports an error.
    pub fn locate(&self) -> Result<ToolInfo> {
        let output = self
            .run(&[OsString::from("-ver")], ToolConfig::VERSION_TIMEOUT)
            .map_err(|e| FavSaverError::ToolUnavailable {
                message: e.to_string(),
            })?;

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            return Err(FavSaverError::ToolUnavailable {
                message: format!("{} -ver printed no version", self.program_name()),
            });
        }

        let path = find_on_path(&self.program).unwrap_or_else(|| self.program.clone());
        Ok(ToolInfo { path, version })
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Spawn exiftool and wait for it, killing it once `timeout` elapses.
    fn run(&self, args: &[OsString], timeout: Duration) -> std::result::Result<ToolOutput, ToolError> {
        let program = self.program_name();
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Drain both pipes so a chatty child cannot block on a full buffer.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || drain(stdout));
        let stderr_reader = thread::spawn(move || drain(stderr));

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    terminate(&mut child);
                    return Err(ToolError::Io(e));
                }
            }
            if started.elapsed() >= timeout {
                terminate(&mut child);
                return Err(ToolError::Timeout { program, timeout });
            }
            thread::sleep(ToolConfig::POLL_INTERVAL);
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(ToolError::NonZeroExit {
                program,
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        Ok(ToolOutput {
            status,
            stdout,
            stderr,
        })
    }

    /// Arguments for reading rating and description as JSON.
    pub fn read_args(path: &Path) -> Vec<OsString> {
        let mut args = base_args();
        args.extend(
            ["-j", "-Rating", "-ImageDescription", "-Description"]
                .iter()
                .map(OsString::from),
        );
        args.push(path.as_os_str().to_os_string());
        args
    }

    /// Tag assignments for an update, one argument each.
    pub fn tag_args(update: &MetadataUpdate) -> Vec<String> {
        let mut tags = Vec::new();
        if let Some(rating) = update.rating {
            tags.push(format!("-Rating={}", rating));
        }
        if let Some(description) = &update.description {
            tags.push(format!("-ImageDescription={}", description));
            tags.push(format!("-Description={}", description));
        }
        tags
    }

    /// Options preceding the tag assignments of a write.
    fn write_prefix(keep_backup: bool) -> Vec<OsString> {
        let mut args = base_args();
        args.push(OsString::from("-q"));
        args.push(OsString::from("-q"));
        if !keep_backup {
            args.push(OsString::from("-overwrite_original"));
        }
        args
    }
}

fn base_args() -> Vec<OsString> {
    ["-charset", "utf8", "-charset", "filename=utf8"]
        .iter()
        .map(OsString::from)
        .collect()
}

fn drain(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

/// Kill a child that will not be waited on normally and reap it.
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl MetadataTool for ExifTool {
    fn read(&self, path: &Path) -> std::result::Result<ExifSnapshot, ToolError> {
        let output = self.run(&Self::read_args(path), self.timeout)?;
        if !output.stderr.is_empty() {
            debug!(
                "exiftool stderr for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        parse_read_output(&output.stdout)
    }

    fn write(
        &self,
        path: &Path,
        update: &MetadataUpdate,
        keep_backup: bool,
    ) -> std::result::Result<(), ToolError> {
        let tags = Self::tag_args(update);
        if tags.is_empty() {
            return Ok(());
        }

        let mut args = Self::write_prefix(keep_backup);

        // Argument files are line oriented, so multi-line values go on the
        // command line instead.
        let multiline = tags.iter().any(|tag| tag.contains(['\n', '\r']));
        let _argfile = if multiline {
            args.extend(tags.iter().map(OsString::from));
            None
        } else {
            let mut file = tempfile::Builder::new()
                .prefix("favsaver-args-")
                .suffix(".txt")
                .tempfile()?;
            for tag in &tags {
                writeln!(file, "{}", tag)?;
            }
            file.flush()?;
            args.push(OsString::from("-@"));
            args.push(file.path().as_os_str().to_os_string());
            Some(file)
        };

        args.push(path.as_os_str().to_os_string());
        let output = self.run(&args, self.timeout)?;
        debug!(
            "exiftool wrote {} (status {})",
            path.display(),
            output.status
        );
        Ok(())
    }

    fn describe_write(&self, path: &Path, update: &MetadataUpdate, keep_backup: bool) -> String {
        let mut parts = vec![quote_arg(&self.program_name())];
        parts.extend(
            Self::write_prefix(keep_backup)
                .iter()
                .map(|arg| quote_arg(&arg.to_string_lossy())),
        );
        parts.extend(Self::tag_args(update).iter().map(|tag| quote_arg(tag)));
        parts.push(quote_arg(&path.to_string_lossy()));
        parts.join(" ")
    }
}

/// Parse `exiftool -j` output into a snapshot.
///
/// The first non-empty of `ImageDescription` and `Description` wins.
pub fn parse_read_output(stdout: &[u8]) -> std::result::Result<ExifSnapshot, ToolError> {
    let entries: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(stdout)
        .map_err(|e| ToolError::Output(format!("invalid exiftool JSON: {}", e)))?;
    let Some(entry) = entries.into_iter().next() else {
        return Ok(ExifSnapshot::default());
    };

    let rating = entry.get("Rating").and_then(|value| match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(|r| r as i32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    let description = ["ImageDescription", "Description"]
        .iter()
        .filter_map(|tag| entry.get(*tag))
        .filter_map(|value| match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .find(|s| !s.is_empty());

    Ok(ExifSnapshot {
        rating,
        description,
    })
}

/// Quote an argument for display the way a POSIX shell would need it.
pub fn quote_arg(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\"'\"'"))
    }
}

/// Find an executable on `PATH`. Absolute or relative paths are returned as-is if they exist.
pub fn find_on_path(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{}.exe", program.to_string_lossy()));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}
