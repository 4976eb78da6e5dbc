//! Run configuration and fixed migration constants.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration supplied to the engine for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Path to the `Photos.sqlite` database copied from the phone.
    pub database_path: PathBuf,
    /// Root of the copied photo tree (contains `100APPLE`-style folders).
    pub photo_root: PathBuf,
    pub verbose: bool,
    /// Simulate writes without touching any file.
    pub dry_run: bool,
    /// Keep exiftool's `*_original` backup files.
    pub keep_originals: bool,
}

impl MigrationConfig {
    pub fn new(database_path: impl Into<PathBuf>, photo_root: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            photo_root: photo_root.into(),
            verbose: false,
            dry_run: false,
            keep_originals: true,
        }
    }
}

/// Fixed values governing what gets migrated and how.
pub struct MigrationDefaults;

impl MigrationDefaults {
    /// Rating written for favorited photos.
    pub const FAVORITE_RATING: u32 = 4;
    /// Lowercase extensions eligible for migration.
    pub const SUPPORTED_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "heic", "png"];
    /// Suffix of the camera bucket folders (`100APPLE`, `101APPLE`, ...).
    pub const BUCKET_SUFFIX: &'static str = "APPLE";
}

/// Limits for external metadata tool invocations.
pub struct ToolConfig;

impl ToolConfig {
    pub const EXECUTABLE: &'static str = "exiftool";
    pub const PROCESS_TIMEOUT: Duration = Duration::from_secs(30);
    pub const VERSION_TIMEOUT: Duration = Duration::from_secs(5);
    pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
}

/// Log file naming and retention.
pub struct LogConfig;

impl LogConfig {
    pub const APP_DIR_NAME: &'static str = "iphone-favorites-saver";
    pub const LOGS_DIR_NAME: &'static str = "logs";
    pub const LOG_FILE_PREFIX: &'static str = "iphone_favorites_saver_";
    pub const MAX_LOG_FILES: usize = 20;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_keeps_originals() {
        let config = MigrationConfig::new("Photos.sqlite", "photos");
        assert!(config.keep_originals);
        assert!(!config.dry_run);
        assert!(!config.verbose);
    }

    #[test]
    fn test_favorite_rating_is_nonzero() {
        assert!(MigrationDefaults::FAVORITE_RATING > 0);
    }
}
