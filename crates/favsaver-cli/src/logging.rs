//! Console and per-run log file setup.
//!
//! Each run gets its own `iphone_favorites_saver_<YYYYmmdd_HHMMSS>.log` file.
//! Only the newest [`LogConfig::MAX_LOG_FILES`] files are kept.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use favsaver_core::LogConfig;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Default log directory under the user's local data directory.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LogConfig::APP_DIR_NAME)
        .join(LogConfig::LOGS_DIR_NAME)
}

/// Log file name for a run started at `started`.
pub fn log_file_name(started: &DateTime<Local>) -> String {
    format!(
        "{}{}.log",
        LogConfig::LOG_FILE_PREFIX,
        started.format("%Y%m%d_%H%M%S")
    )
}

/// Create the log file for this run inside `dir`.
pub fn create_log_file(dir: &Path, started: &DateTime<Local>) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let path = dir.join(log_file_name(started));
    let file =
        File::create(&path).with_context(|| format!("Failed to create log file {}", path.display()))?;
    Ok((file, path))
}

/// Delete the oldest run logs so that at most `keep` remain.
///
/// Only files named like run logs are considered. Returns how many were removed.
pub fn prune_logs(dir: &Path, keep: usize) -> Result<usize> {
    let mut logs: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to list log directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with(LogConfig::LOG_FILE_PREFIX) && name.ends_with(".log"))
                    .unwrap_or(false)
        })
        .collect();

    if logs.len() <= keep {
        return Ok(0);
    }

    // Timestamped names sort chronologically.
    logs.sort();
    let excess = logs.len() - keep;
    let mut removed = 0;
    for path in logs.into_iter().take(excess) {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

/// Default console level and file level. The run log file stays at INFO.
fn layer_levels(verbose: bool) -> (LevelFilter, LevelFilter) {
    let console = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    (console, LevelFilter::INFO)
}

/// Install the console layer and, when possible, the run log file layer.
///
/// `RUST_LOG` overrides the console level. A log file that cannot be created
/// is reported and the run continues with console output only. Returns the
/// log file path when one was created.
pub fn init(verbose: bool, log_dir: &Path, started: &DateTime<Local>) -> Option<PathBuf> {
    let (console_level, file_level) = layer_levels(verbose);
    let console_filter = EnvFilter::builder()
        .with_default_directive(console_level.into())
        .from_env_lossy();

    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let log_file = create_log_file(log_dir, started);
    let (file_layer, log_path, file_error) = match log_file {
        Ok((file, path)) => {
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(file_level);
            (Some(layer), Some(path), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!("Logging to console only: {:#}", e);
    }
    if log_path.is_some() {
        if let Err(e) = prune_logs(log_dir, LogConfig::MAX_LOG_FILES) {
            warn!("Failed to prune old logs: {:#}", e);
        }
    }
    log_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(seconds: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, seconds).unwrap()
    }

    #[test]
    fn test_log_file_name_format() {
        assert_eq!(
            log_file_name(&at(7)),
            "iphone_favorites_saver_20240309_140507.log"
        );
    }

    #[test]
    fn test_verbose_only_raises_console_level() {
        assert_eq!(layer_levels(false), (LevelFilter::INFO, LevelFilter::INFO));
        assert_eq!(layer_levels(true), (LevelFilter::DEBUG, LevelFilter::INFO));
    }

    #[test]
    fn test_create_log_file_makes_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("logs");
        let (_, path) = create_log_file(&dir, &at(0)).unwrap();
        assert!(path.is_file());
        assert_eq!(path.parent(), Some(dir.as_path()));
    }

    #[test]
    fn test_prune_keeps_newest() {
        let temp = TempDir::new().unwrap();
        for second in 0..5 {
            create_log_file(temp.path(), &at(second)).unwrap();
        }
        fs::write(temp.path().join("notes.txt"), "keep me").unwrap();

        assert_eq!(prune_logs(temp.path(), 3).unwrap(), 2);

        let mut remaining: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "iphone_favorites_saver_20240309_140502.log",
                "iphone_favorites_saver_20240309_140503.log",
                "iphone_favorites_saver_20240309_140504.log",
                "notes.txt",
            ]
        );
    }

    #[test]
    fn test_prune_below_limit_is_noop() {
        let temp = TempDir::new().unwrap();
        create_log_file(temp.path(), &at(0)).unwrap();
        assert_eq!(prune_logs(temp.path(), 20).unwrap(), 0);
    }
}
